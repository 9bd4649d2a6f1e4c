//! Seam to the rendering library.
//!
//! The backend creates one [`RenderSurface`] per layout slot, asynchronously:
//! every creation request carries a [`SlotReady`] token the backend completes
//! once the surface is usable.

use std::fmt;
use std::rc::Rc;

use glam::DVec3;

use crate::barrier::Completion;
use crate::crosshair::ReferenceLine;
use crate::dataset::DatasetIdentity;
use crate::enums::{BlendMode, SliceOrientation, ViewportMode};
use crate::interaction::InteractionStyle;
use crate::layout::GridShape;
use crate::render_object::{LabelmapRenderObject, VolumeRenderObject};
use crate::voi::{DisplayRange, VoiState};

/// Stable identifier of a viewport for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportUid(pub u64);

impl fmt::Display for ViewportUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewport-{}", self.0)
    }
}

/// Everything the backend needs to build the surface for one slot.
#[derive(Clone)]
pub struct ViewportRequest {
    pub slot: usize,
    pub uid: ViewportUid,
    pub mode: ViewportMode,
    pub orientation: Option<SliceOrientation>,
    pub dataset: DatasetIdentity,
    pub volume: Rc<VolumeRenderObject>,
    pub labelmap: Option<Rc<LabelmapRenderObject>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub supports_3d_textures: bool,
    pub max_texture_size: u32,
}

impl Default for SurfaceCapabilities {
    fn default() -> Self {
        Self {
            supports_3d_textures: true,
            max_texture_size: 16384,
        }
    }
}

/// Labelmap fill/outline settings shared by all segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentationStyle {
    pub global_opacity: f64,
    pub visible: bool,
    pub render_outline: bool,
    pub outline_thickness: u32,
}

impl Default for SegmentationStyle {
    fn default() -> Self {
        Self {
            global_opacity: 0.7,
            visible: true,
            render_outline: true,
            outline_thickness: 3,
        }
    }
}

pub type SlotReady = Completion<Box<dyn RenderSurface>>;

pub trait RenderSurface {
    fn uid(&self) -> ViewportUid;

    fn capabilities(&self) -> SurfaceCapabilities;

    /// Remap the color transfer and scalar opacity functions.
    fn set_voi_range(&mut self, range: DisplayRange);

    fn update_voi(&mut self, voi: VoiState);

    fn set_initial_voi(&mut self, voi: VoiState);

    fn reset_window_level(&mut self);

    fn set_orientation(&mut self, orientation: SliceOrientation);

    fn set_slab_thickness(&mut self, thickness: f64);

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn set_interactor_style(&mut self, style: &InteractionStyle);

    fn clear_interactor_style(&mut self);

    fn set_window_level_enabled(&mut self, enabled: bool);

    fn add_crosshair_widget(&mut self);

    fn clear_widgets(&mut self);

    fn set_slice_center(&mut self, world: DVec3);

    fn set_reference_lines(&mut self, lines: &[ReferenceLine]);

    fn set_segmentation_style(&mut self, style: &SegmentationStyle);

    fn set_segment_visibility(&mut self, segment: u16, visible: bool);

    fn request_new_segmentation(&mut self);

    fn update_image(&mut self);

    fn reset_camera(&mut self);

    fn resize(&mut self);

    fn render(&mut self);
}

pub trait RenderBackend {
    /// Start building a surface; complete `ready` once it exists.
    fn create_viewport(&mut self, request: ViewportRequest, ready: SlotReady);

    /// Apply the grid after all creation requests of a transition were issued.
    fn commit_layout(&mut self, grid: GridShape);

    fn release_viewport(&mut self, surface: Box<dyn RenderSurface>);
}
