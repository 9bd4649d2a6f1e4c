//! Slot-indexed collection of live viewports.
//!
//! Viewports never hold references to each other. Anything that needs the
//! sibling set (interaction styles, crosshair reference lines) refers to
//! siblings by slot index and resolves them through the registry.

use std::rc::Rc;

use crate::backend::{RenderBackend, RenderSurface, ViewportUid};
use crate::dataset::DatasetIdentity;
use crate::enums::{SliceOrientation, ViewportMode};
use crate::interaction::InteractionStyle;
use crate::progressive::{LoadProgress, LoadUpdate};
use crate::render_object::{LabelmapRenderObject, VolumeRenderObject};
use crate::voi::{DisplayRange, VoiState};

#[derive(Clone, Debug, PartialEq)]
pub struct PlanarState {
    pub orientation: SliceOrientation,
    /// Orientation the slot was created with; restored by a view reset.
    pub initial_orientation: SliceOrientation,
    pub slab_thickness: f64,
    pub style: Option<InteractionStyle>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VolumetricState {
    pub window_level_enabled: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewportKind {
    Planar2D(PlanarState),
    Volumetric3D(VolumetricState),
}

impl ViewportKind {
    pub fn mode(&self) -> ViewportMode {
        match self {
            ViewportKind::Planar2D(_) => ViewportMode::Planar2D,
            ViewportKind::Volumetric3D(_) => ViewportMode::Volumetric3D,
        }
    }
}

pub struct ViewportHandle {
    slot: usize,
    uid: ViewportUid,
    dataset: DatasetIdentity,
    kind: ViewportKind,
    voi: Option<VoiState>,
    initial_voi: Option<VoiState>,
    volume: Rc<VolumeRenderObject>,
    labelmap: Option<Rc<LabelmapRenderObject>>,
    surface: Box<dyn RenderSurface>,
    load: LoadProgress,
}

impl ViewportHandle {
    pub(crate) fn new(
        slot: usize,
        dataset: DatasetIdentity,
        kind: ViewportKind,
        volume: Rc<VolumeRenderObject>,
        labelmap: Option<Rc<LabelmapRenderObject>>,
        surface: Box<dyn RenderSurface>,
        load: LoadProgress,
    ) -> Self {
        Self {
            slot,
            uid: surface.uid(),
            dataset,
            kind,
            voi: None,
            initial_voi: None,
            volume,
            labelmap,
            surface,
            load,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn uid(&self) -> ViewportUid {
        self.uid
    }

    pub fn dataset(&self) -> &DatasetIdentity {
        &self.dataset
    }

    pub fn kind(&self) -> &ViewportKind {
        &self.kind
    }

    pub fn mode(&self) -> ViewportMode {
        self.kind.mode()
    }

    pub fn is_planar(&self) -> bool {
        matches!(self.kind, ViewportKind::Planar2D(_))
    }

    pub fn planar(&self) -> Option<&PlanarState> {
        match &self.kind {
            ViewportKind::Planar2D(state) => Some(state),
            ViewportKind::Volumetric3D(_) => None,
        }
    }

    pub(crate) fn planar_mut(&mut self) -> Option<&mut PlanarState> {
        match &mut self.kind {
            ViewportKind::Planar2D(state) => Some(state),
            ViewportKind::Volumetric3D(_) => None,
        }
    }

    pub fn volumetric(&self) -> Option<&VolumetricState> {
        match &self.kind {
            ViewportKind::Volumetric3D(state) => Some(state),
            ViewportKind::Planar2D(_) => None,
        }
    }

    pub fn voi(&self) -> Option<VoiState> {
        self.voi
    }

    pub fn initial_voi(&self) -> Option<VoiState> {
        self.initial_voi
    }

    pub fn volume(&self) -> &Rc<VolumeRenderObject> {
        &self.volume
    }

    pub fn labelmap(&self) -> Option<&Rc<LabelmapRenderObject>> {
        self.labelmap.as_ref()
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    pub(crate) fn surface_mut(&mut self) -> &mut dyn RenderSurface {
        self.surface.as_mut()
    }

    pub fn load_progress(&self) -> &LoadProgress {
        &self.load
    }

    pub(crate) fn pump_load(&mut self) -> Vec<LoadUpdate> {
        self.load.pump()
    }

    /// Push a VOI to the surface: transfer range, then the VOI-update entry
    /// point, optionally recording it as the initial VOI.
    pub(crate) fn set_voi(&mut self, voi: VoiState, range: DisplayRange, record_initial: bool) {
        self.surface.set_voi_range(range);
        self.surface.update_voi(voi);
        if record_initial {
            self.surface.set_initial_voi(voi);
            self.initial_voi = Some(voi);
        }
        self.voi = Some(voi);
    }

    pub(crate) fn reset_window_level(&mut self) {
        self.surface.reset_window_level();
        self.voi = self.initial_voi;
    }

    pub(crate) fn set_window_level_enabled(&mut self, enabled: bool) {
        if let ViewportKind::Volumetric3D(state) = &mut self.kind {
            state.window_level_enabled = enabled;
            self.surface.set_window_level_enabled(enabled);
        }
    }

    /// Install `style`, replacing whatever style the viewport had.
    pub(crate) fn set_style(&mut self, style: InteractionStyle) {
        if let ViewportKind::Planar2D(state) = &mut self.kind {
            self.surface.set_interactor_style(&style);
            state.style = Some(style);
        }
    }

    pub(crate) fn set_orientation(&mut self, orientation: SliceOrientation) {
        if let ViewportKind::Planar2D(state) = &mut self.kind {
            state.orientation = orientation;
            self.surface.set_orientation(orientation);
        }
    }

    /// Destroy style, widgets and load subscription, then hand the surface
    /// back to the backend.
    pub(crate) fn teardown(mut self, backend: &mut dyn RenderBackend) {
        if let ViewportKind::Planar2D(state) = &mut self.kind {
            if state.style.take().is_some() {
                self.surface.clear_interactor_style();
            }
        }
        self.surface.clear_widgets();
        self.load.unsubscribe();
        backend.release_viewport(self.surface);
    }

    /// Unsubscribe and hand back the bare surface of a handle that was never
    /// installed.
    pub(crate) fn into_surface(mut self) -> Box<dyn RenderSurface> {
        self.load.unsubscribe();
        self.surface
    }
}

/// Viewports of the current layout, ordered by slot.
#[derive(Default)]
pub struct ViewportRegistry {
    handles: Vec<ViewportHandle>,
}

impl ViewportRegistry {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&ViewportHandle> {
        self.handles.get(slot)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut ViewportHandle> {
        self.handles.get_mut(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewportHandle> {
        self.handles.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ViewportHandle> {
        self.handles.iter_mut()
    }

    pub fn planar(&self) -> impl Iterator<Item = &ViewportHandle> {
        self.handles.iter().filter(|handle| handle.is_planar())
    }

    pub(crate) fn planar_mut(&mut self) -> impl Iterator<Item = &mut ViewportHandle> {
        self.handles.iter_mut().filter(|handle| handle.is_planar())
    }

    pub fn volumetric(&self) -> impl Iterator<Item = &ViewportHandle> {
        self.handles.iter().filter(|handle| !handle.is_planar())
    }

    pub(crate) fn volumetric_mut(&mut self) -> impl Iterator<Item = &mut ViewportHandle> {
        self.handles.iter_mut().filter(|handle| !handle.is_planar())
    }

    /// Slot indices of the planar viewports, in slot order.
    pub fn planar_slots(&self) -> Vec<usize> {
        self.planar().map(ViewportHandle::slot).collect()
    }

    pub fn has_volumetric(&self) -> bool {
        self.volumetric().next().is_some()
    }

    pub fn modes(&self) -> Vec<ViewportMode> {
        self.handles.iter().map(ViewportHandle::mode).collect()
    }

    pub fn uids(&self) -> Vec<ViewportUid> {
        self.handles.iter().map(ViewportHandle::uid).collect()
    }

    pub(crate) fn push(&mut self, handle: ViewportHandle) {
        debug_assert_eq!(handle.slot(), self.handles.len());
        self.handles.push(handle);
    }

    /// Remove every viewport from `slot` onwards.
    pub(crate) fn truncate(&mut self, slot: usize) -> Vec<ViewportHandle> {
        if slot >= self.handles.len() {
            return Vec::new();
        }
        self.handles.split_off(slot)
    }

    pub(crate) fn drain(&mut self) -> Vec<ViewportHandle> {
        std::mem::take(&mut self.handles)
    }
}
