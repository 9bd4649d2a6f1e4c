//! Named commands and their parameters.
//!
//! A command is looked up by its string identifier and built from a
//! [`CommandParams`] object, which deserializes from the host's parameter
//! map (camelCase keys). [`MprViewer::run`] dispatches it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{RenderBackend, SegmentationStyle, ViewportUid};
use crate::dataset::DatasetIdentity;
use crate::enums::{BlendMode, Orientation};
use crate::error::{Result, ViewerError};
use crate::viewer::MprViewer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandName {
    Axial,
    Sagittal,
    Coronal,
    Mpr2d,
    Enable3DView,
    ResetMprView,
    EnableRotateTool,
    EnableCrosshairsTool,
    EnableLevelTool,
    SetBlendModeToComposite,
    SetBlendModeToMaximumIntensity,
    SetBlendModeToMinimumIntensity,
    SetBlendModeToAverageIntensity,
    SetSlabThickness,
    IncreaseSlabThickness,
    DecreaseSlabThickness,
    RequestNewSegmentation,
    JumpToSlice,
    SetSegmentationConfiguration,
    SetSegmentConfiguration,
    GetVtkApiForViewportIndex,
}

impl CommandName {
    pub const ALL: [CommandName; 21] = [
        CommandName::Axial,
        CommandName::Sagittal,
        CommandName::Coronal,
        CommandName::Mpr2d,
        CommandName::Enable3DView,
        CommandName::ResetMprView,
        CommandName::EnableRotateTool,
        CommandName::EnableCrosshairsTool,
        CommandName::EnableLevelTool,
        CommandName::SetBlendModeToComposite,
        CommandName::SetBlendModeToMaximumIntensity,
        CommandName::SetBlendModeToMinimumIntensity,
        CommandName::SetBlendModeToAverageIntensity,
        CommandName::SetSlabThickness,
        CommandName::IncreaseSlabThickness,
        CommandName::DecreaseSlabThickness,
        CommandName::RequestNewSegmentation,
        CommandName::JumpToSlice,
        CommandName::SetSegmentationConfiguration,
        CommandName::SetSegmentConfiguration,
        CommandName::GetVtkApiForViewportIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Axial => "axial",
            CommandName::Sagittal => "sagittal",
            CommandName::Coronal => "coronal",
            CommandName::Mpr2d => "mpr2d",
            CommandName::Enable3DView => "enable3DView",
            CommandName::ResetMprView => "resetMPRView",
            CommandName::EnableRotateTool => "enableRotateTool",
            CommandName::EnableCrosshairsTool => "enableCrosshairsTool",
            CommandName::EnableLevelTool => "enableLevelTool",
            CommandName::SetBlendModeToComposite => "setBlendModeToComposite",
            CommandName::SetBlendModeToMaximumIntensity => "setBlendModeToMaximumIntensity",
            CommandName::SetBlendModeToMinimumIntensity => "setBlendModeToMinimumIntensity",
            CommandName::SetBlendModeToAverageIntensity => "setBlendModeToAverageIntensity",
            CommandName::SetSlabThickness => "setSlabThickness",
            CommandName::IncreaseSlabThickness => "increaseSlabThickness",
            CommandName::DecreaseSlabThickness => "decreaseSlabThickness",
            CommandName::RequestNewSegmentation => "requestNewSegmentation",
            CommandName::JumpToSlice => "jumpToSlice",
            CommandName::SetSegmentationConfiguration => "setSegmentationConfiguration",
            CommandName::SetSegmentConfiguration => "setSegmentConfiguration",
            CommandName::GetVtkApiForViewportIndex => "getVtkApiForViewportIndex",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ViewerError::UnknownCommand(s.to_string()))
    }
}

/// Parameters a host may pass with any command. Each command reads the
/// fields it needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandParams {
    /// Slot of the active viewport.
    pub viewport_index: usize,
    pub study_instance_uid: Option<String>,
    pub display_set_instance_uid: Option<String>,
    /// Instance within the display set for `mpr2d`; `frameIndex` picks its
    /// frame.
    #[serde(rename = "SOPInstanceUID")]
    pub sop_instance_uid: Option<String>,
    pub slab_thickness: Option<f64>,
    pub segment_number: Option<u16>,
    pub frame_index: Option<usize>,
    pub global_opacity: Option<f64>,
    pub visible: Option<bool>,
    pub render_outline: Option<bool>,
    pub outline_thickness: Option<u32>,
    /// Slot asked for by `getVtkApiForViewportIndex`; defaults to the
    /// active viewport.
    pub index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetOrientation { slot: usize, orientation: Orientation },
    /// Show `dataset` in an MPR layout; `None` reuses the current dataset.
    Mpr2d { dataset: Option<DatasetIdentity> },
    Enable3DView,
    ResetMprView,
    EnableRotateTool,
    EnableCrosshairsTool,
    EnableLevelTool,
    SetBlendMode(BlendMode),
    SetSlabThickness(f64),
    IncreaseSlabThickness,
    DecreaseSlabThickness,
    RequestNewSegmentation,
    JumpToSlice { slot: usize, segment: u16, frame_index: usize },
    SetSegmentationConfiguration(SegmentationStyle),
    SetSegmentConfiguration { segment: u16, visible: bool },
    GetViewport { slot: usize },
}

fn required<T>(command: CommandName, field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ViewerError::InvalidParameters {
        command: command.as_str(),
        reason: format!("missing `{field}`"),
    })
}

impl Command {
    pub fn from_params(name: CommandName, params: &CommandParams) -> Result<Self> {
        let command = match name {
            CommandName::Axial => Command::SetOrientation {
                slot: params.viewport_index,
                orientation: Orientation::Axial,
            },
            CommandName::Sagittal => Command::SetOrientation {
                slot: params.viewport_index,
                orientation: Orientation::Sagittal,
            },
            CommandName::Coronal => Command::SetOrientation {
                slot: params.viewport_index,
                orientation: Orientation::Coronal,
            },
            CommandName::Mpr2d => {
                let dataset = match (&params.study_instance_uid, &params.display_set_instance_uid) {
                    (Some(study), Some(display_set)) => {
                        let identity = DatasetIdentity::new(study.clone(), display_set.clone());
                        match &params.sop_instance_uid {
                            Some(instance) => {
                                let frame = params.frame_index.unwrap_or(0);
                                let frame = u32::try_from(frame).map_err(|_| {
                                    ViewerError::InvalidParameters {
                                        command: name.as_str(),
                                        reason: format!("frame {frame} is out of range"),
                                    }
                                })?;
                                Some(identity.with_instance(instance.clone(), frame))
                            }
                            None => Some(identity),
                        }
                    }
                    (None, None) => None,
                    _ => {
                        return Err(ViewerError::InvalidParameters {
                            command: name.as_str(),
                            reason: "study and display set UIDs must be given together".into(),
                        });
                    }
                };
                Command::Mpr2d { dataset }
            }
            CommandName::Enable3DView => Command::Enable3DView,
            CommandName::ResetMprView => Command::ResetMprView,
            CommandName::EnableRotateTool => Command::EnableRotateTool,
            CommandName::EnableCrosshairsTool => Command::EnableCrosshairsTool,
            CommandName::EnableLevelTool => Command::EnableLevelTool,
            CommandName::SetBlendModeToComposite => Command::SetBlendMode(BlendMode::Composite),
            CommandName::SetBlendModeToMaximumIntensity => {
                Command::SetBlendMode(BlendMode::MaximumIntensity)
            }
            CommandName::SetBlendModeToMinimumIntensity => {
                Command::SetBlendMode(BlendMode::MinimumIntensity)
            }
            CommandName::SetBlendModeToAverageIntensity => {
                Command::SetBlendMode(BlendMode::AverageIntensity)
            }
            CommandName::SetSlabThickness => {
                let thickness = required(name, "slabThickness", params.slab_thickness)?;
                if !thickness.is_finite() {
                    return Err(ViewerError::InvalidParameters {
                        command: name.as_str(),
                        reason: format!("slab thickness {thickness} is not a number"),
                    });
                }
                Command::SetSlabThickness(thickness)
            }
            CommandName::IncreaseSlabThickness => Command::IncreaseSlabThickness,
            CommandName::DecreaseSlabThickness => Command::DecreaseSlabThickness,
            CommandName::RequestNewSegmentation => Command::RequestNewSegmentation,
            CommandName::JumpToSlice => Command::JumpToSlice {
                slot: params.viewport_index,
                segment: required(name, "segmentNumber", params.segment_number)?,
                frame_index: required(name, "frameIndex", params.frame_index)?,
            },
            CommandName::SetSegmentationConfiguration => {
                let defaults = SegmentationStyle::default();
                Command::SetSegmentationConfiguration(SegmentationStyle {
                    global_opacity: params.global_opacity.unwrap_or(defaults.global_opacity),
                    visible: params.visible.unwrap_or(defaults.visible),
                    render_outline: params.render_outline.unwrap_or(defaults.render_outline),
                    outline_thickness: params
                        .outline_thickness
                        .unwrap_or(defaults.outline_thickness),
                })
            }
            CommandName::SetSegmentConfiguration => Command::SetSegmentConfiguration {
                segment: required(name, "segmentNumber", params.segment_number)?,
                visible: required(name, "visible", params.visible)?,
            },
            CommandName::GetVtkApiForViewportIndex => Command::GetViewport {
                slot: params.index.unwrap_or(params.viewport_index),
            },
        };
        Ok(command)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// The command had nothing to act on, e.g. an orientation change aimed
    /// at a volumetric view.
    Skipped,
    /// Viewports of the layout after a transition, by slot.
    Layout(Vec<ViewportUid>),
    Viewport(Option<ViewportUid>),
}

impl From<bool> for CommandOutcome {
    fn from(applied: bool) -> Self {
        if applied {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Skipped
        }
    }
}

impl<B: RenderBackend> MprViewer<B> {
    /// Look a command up by name, build it from `params` and run it.
    pub async fn run_named(&mut self, name: &str, params: &CommandParams) -> Result<CommandOutcome> {
        let name: CommandName = name.parse()?;
        let command = Command::from_params(name, params)?;
        self.run(command).await
    }

    pub async fn run(&mut self, command: Command) -> Result<CommandOutcome> {
        debug!(?command, "Running command");
        let outcome = match command {
            Command::SetOrientation { slot, orientation } => {
                self.set_orientation(slot, orientation)?.into()
            }
            Command::Mpr2d { dataset } => {
                let dataset = dataset
                    .or_else(|| self.dataset().cloned())
                    .ok_or_else(|| ViewerError::InvalidParameters {
                        command: CommandName::Mpr2d.as_str(),
                        reason: "no dataset given and none displayed".into(),
                    })?;
                CommandOutcome::Layout(self.mpr2d(&dataset).await?.uids())
            }
            Command::Enable3DView => CommandOutcome::Layout(self.enable_3d_view().await?.uids()),
            Command::ResetMprView => {
                self.reset_mpr_view()?;
                CommandOutcome::Applied
            }
            Command::EnableRotateTool => {
                self.enable_rotate_tool();
                CommandOutcome::Applied
            }
            Command::EnableCrosshairsTool => {
                self.enable_crosshairs_tool()?;
                CommandOutcome::Applied
            }
            Command::EnableLevelTool => {
                self.enable_level_tool();
                CommandOutcome::Applied
            }
            Command::SetBlendMode(mode) => {
                self.set_blend_mode(mode);
                CommandOutcome::Applied
            }
            Command::SetSlabThickness(thickness) => {
                self.set_slab_thickness(thickness);
                CommandOutcome::Applied
            }
            Command::IncreaseSlabThickness => {
                let step = self.config().slab_step;
                self.change_slab_thickness(step);
                CommandOutcome::Applied
            }
            Command::DecreaseSlabThickness => {
                let step = self.config().slab_step;
                self.change_slab_thickness(-step);
                CommandOutcome::Applied
            }
            Command::RequestNewSegmentation => {
                self.request_new_segmentation();
                CommandOutcome::Applied
            }
            Command::JumpToSlice {
                slot,
                segment,
                frame_index,
            } => self.jump_to_slice(slot, segment, frame_index)?.into(),
            Command::SetSegmentationConfiguration(style) => {
                self.set_segmentation_configuration(style);
                CommandOutcome::Applied
            }
            Command::SetSegmentConfiguration { segment, visible } => {
                self.set_segment_configuration(segment, visible);
                CommandOutcome::Applied
            }
            Command::GetViewport { slot } => {
                CommandOutcome::Viewport(self.viewport(slot).map(|handle| handle.uid()))
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_parses_back() {
        for name in CommandName::ALL {
            assert_eq!(name.as_str().parse::<CommandName>().unwrap(), name);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "enable3dView".parse::<CommandName>(),
            Err(ViewerError::UnknownCommand(name)) if name == "enable3dView"
        ));
    }

    #[test]
    fn params_deserialize_from_camel_case() {
        let params: CommandParams = toml::from_str(
            r#"
            viewportIndex = 2
            segmentNumber = 4
            frameIndex = 11
            "#,
        )
        .unwrap();
        assert_eq!(
            Command::from_params(CommandName::JumpToSlice, &params).unwrap(),
            Command::JumpToSlice {
                slot: 2,
                segment: 4,
                frame_index: 11
            }
        );
    }

    #[test]
    fn slab_thickness_is_required() {
        let error = Command::from_params(CommandName::SetSlabThickness, &CommandParams::default())
            .unwrap_err();
        assert!(matches!(
            error,
            ViewerError::InvalidParameters {
                command: "setSlabThickness",
                ..
            }
        ));

        let params = CommandParams {
            slab_thickness: Some(f64::NAN),
            ..Default::default()
        };
        assert!(Command::from_params(CommandName::SetSlabThickness, &params).is_err());
    }

    #[test]
    fn segmentation_configuration_falls_back_to_defaults() {
        let params = CommandParams {
            global_opacity: Some(0.4),
            ..Default::default()
        };
        let Command::SetSegmentationConfiguration(style) =
            Command::from_params(CommandName::SetSegmentationConfiguration, &params).unwrap()
        else {
            panic!("wrong command");
        };
        assert_eq!(style.global_opacity, 0.4);
        assert_eq!(style.outline_thickness, 3);
        assert!(style.visible);
    }

    #[test]
    fn mpr2d_needs_both_uids_or_neither() {
        let params = CommandParams {
            study_instance_uid: Some("1.2".into()),
            ..Default::default()
        };
        assert!(Command::from_params(CommandName::Mpr2d, &params).is_err());
        assert_eq!(
            Command::from_params(CommandName::Mpr2d, &CommandParams::default()).unwrap(),
            Command::Mpr2d { dataset: None }
        );
    }

    #[test]
    fn viewport_lookup_prefers_explicit_index() {
        let params = CommandParams {
            viewport_index: 1,
            index: Some(3),
            ..Default::default()
        };
        assert_eq!(
            Command::from_params(CommandName::GetVtkApiForViewportIndex, &params).unwrap(),
            Command::GetViewport { slot: 3 }
        );
    }

    #[test]
    fn mpr2d_carries_instance_and_frame() {
        let params = instance_params();
        assert_eq!(
            Command::from_params(CommandName::Mpr2d, &params).unwrap(),
            Command::Mpr2d {
                dataset: Some(DatasetIdentity::new("1.2", "ds-1").with_instance("1.2.3", 4)),
            }
        );
    }

    fn instance_params() -> CommandParams {
        toml::from_str(
            r#"
            studyInstanceUid = "1.2"
            displaySetInstanceUid = "ds-1"
            SOPInstanceUID = "1.2.3"
            frameIndex = 4
            "#,
        )
        .unwrap()
    }
}
