use tracing::debug;

use crate::backend::ViewportUid;
use crate::enums::InteractionTool;
use crate::registry::ViewportRegistry;

/// What a planar viewport's interactor needs to drive its siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleConfiguration {
    /// Slots of every planar viewport in the layout, this one included.
    pub siblings: Vec<usize>,
    /// Position of this viewport within `siblings`.
    pub api_index: usize,
    pub uid: ViewportUid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InteractionStyle {
    pub tool: InteractionTool,
    pub configuration: StyleConfiguration,
    /// Whether drags report window/level changes back to the session.
    pub reports_level_changes: bool,
}

/// Binds one interaction style per planar viewport and tracks which tool
/// new layouts start with.
#[derive(Debug, Default)]
pub struct InteractionStyleManager {
    level_tool_enabled: bool,
}

impl InteractionStyleManager {
    pub fn level_tool_enabled(&self) -> bool {
        self.level_tool_enabled
    }

    /// Tool a freshly built MPR layout starts with.
    pub fn default_tool(&self) -> InteractionTool {
        if self.level_tool_enabled {
            InteractionTool::WindowLevel
        } else {
            InteractionTool::Crosshair
        }
    }

    /// Activate `tool` on every viewport of the registry.
    pub fn activate(&mut self, registry: &mut ViewportRegistry, tool: InteractionTool) {
        match tool {
            InteractionTool::Crosshair => self.level_tool_enabled = false,
            InteractionTool::WindowLevel => self.level_tool_enabled = true,
            InteractionTool::Rotate => {}
        }
        debug!(?tool, "Activating interaction tool");

        Self::bind_planar(registry, tool);

        let window_level = match tool {
            InteractionTool::Crosshair => Some(false),
            InteractionTool::WindowLevel => Some(true),
            InteractionTool::Rotate => None,
        };
        if let Some(enabled) = window_level {
            for handle in registry.volumetric_mut() {
                handle.set_window_level_enabled(enabled);
            }
        }
    }

    /// Give every planar viewport a fresh style for `tool`, replacing its
    /// previous one.
    pub fn bind_planar(registry: &mut ViewportRegistry, tool: InteractionTool) {
        let siblings = registry.planar_slots();
        for (api_index, handle) in registry.planar_mut().enumerate() {
            let style = InteractionStyle {
                tool,
                configuration: StyleConfiguration {
                    siblings: siblings.clone(),
                    api_index,
                    uid: handle.uid(),
                },
                reports_level_changes: tool == InteractionTool::WindowLevel,
            };
            handle.set_style(style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::TransitionRequest;
    use crate::test_utils::{MprFixture, mpr_fixture};

    fn with_volumetric() -> MprFixture {
        let mut fixture = mpr_fixture();
        fixture.transition(TransitionRequest::AppendVolumetric);
        fixture
    }

    #[test]
    fn each_planar_viewport_knows_its_siblings() {
        let mut fixture = with_volumetric();
        let mut manager = InteractionStyleManager::default();
        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::Crosshair);

        for (api_index, handle) in fixture.coordinator.registry().planar().enumerate() {
            let style = handle.planar().unwrap().style.as_ref().unwrap();
            assert_eq!(style.tool, InteractionTool::Crosshair);
            assert_eq!(style.configuration.siblings, vec![0, 1, 2]);
            assert_eq!(style.configuration.api_index, api_index);
            assert_eq!(style.configuration.uid, handle.uid());
            assert!(!style.reports_level_changes);
        }
    }

    #[test]
    fn styles_are_replaced_not_stacked() {
        let mut fixture = mpr_fixture();
        let mut manager = InteractionStyleManager::default();
        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::Crosshair);
        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::Rotate);

        let backend = fixture.coordinator.backend();
        for handle in fixture.coordinator.registry().planar() {
            let record = backend.surface(handle.uid()).unwrap();
            assert_eq!(record.style_changes, 2);
            assert_eq!(
                record.style.as_ref().map(|style| style.tool),
                Some(InteractionTool::Rotate)
            );
        }
    }

    #[test]
    fn level_tool_toggles_volumetric_window_level() {
        let mut fixture = with_volumetric();
        let mut manager = InteractionStyleManager::default();
        let volumetric_enabled = |fixture: &MprFixture| {
            fixture
                .coordinator
                .registry()
                .get(3)
                .and_then(|handle| handle.volumetric())
                .map(|state| state.window_level_enabled)
        };

        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::WindowLevel);
        assert!(manager.level_tool_enabled());
        assert_eq!(manager.default_tool(), InteractionTool::WindowLevel);
        assert_eq!(volumetric_enabled(&fixture), Some(true));

        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::Rotate);
        assert!(manager.level_tool_enabled());
        assert_eq!(volumetric_enabled(&fixture), Some(true));

        manager.activate(fixture.coordinator.registry_mut(), InteractionTool::Crosshair);
        assert!(!manager.level_tool_enabled());
        assert_eq!(volumetric_enabled(&fixture), Some(false));
    }

    #[test]
    fn window_level_styles_report_level_changes() {
        let mut fixture = mpr_fixture();
        InteractionStyleManager::bind_planar(
            fixture.coordinator.registry_mut(),
            InteractionTool::WindowLevel,
        );
        let handle = fixture.coordinator.registry().get(1).unwrap();
        assert!(handle.planar().unwrap().style.as_ref().unwrap().reports_level_changes);
    }
}
