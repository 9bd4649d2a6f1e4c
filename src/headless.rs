//! Rendering backend without a GPU.
//!
//! Surfaces record every call they receive into a [`SurfaceRecord`] that
//! stays readable after the surface is released, and the backend keeps a
//! journal of lifecycle events. Used by the demo binary and the tests.

use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::mem;
use std::rc::Rc;

use glam::DVec3;
use tracing::trace;

use crate::backend::{
    RenderBackend, RenderSurface, SegmentationStyle, SlotReady, SurfaceCapabilities,
    ViewportRequest, ViewportUid,
};
use crate::crosshair::ReferenceLine;
use crate::enums::{BlendMode, SliceOrientation, ViewportMode};
use crate::interaction::InteractionStyle;
use crate::layout::GridShape;
use crate::voi::{DisplayRange, VoiState};

/// When the backend reports a requested surface as ready.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Inside `create_viewport`.
    #[default]
    Immediate,
    /// On `commit_layout`, in request order.
    OnCommit,
    /// On `commit_layout`, last request first.
    Reversed,
    /// Never by itself; see [`HeadlessBackend::pending`].
    Manual,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackendEvent {
    Created(ViewportUid),
    Committed(GridShape),
    StyleCleared(ViewportUid),
    WidgetsCleared(ViewportUid),
    Released(ViewportUid),
}

#[derive(Clone, Debug, Default)]
pub struct SurfaceRecord {
    pub uid: Option<ViewportUid>,
    pub slot: usize,
    pub mode: Option<ViewportMode>,
    pub orientation: Option<SliceOrientation>,
    pub voi_range: Option<DisplayRange>,
    pub voi: Option<VoiState>,
    pub initial_voi: Option<VoiState>,
    pub slab_thickness: Option<f64>,
    pub slab_updates: usize,
    pub blend_mode: BlendMode,
    pub style: Option<InteractionStyle>,
    pub style_changes: usize,
    pub window_level_enabled: bool,
    pub crosshair_widget: bool,
    pub slice_center: Option<DVec3>,
    pub slice_center_updates: usize,
    pub reference_lines: Vec<ReferenceLine>,
    pub segmentation_style: Option<SegmentationStyle>,
    pub hidden_segments: BTreeSet<u16>,
    pub new_segmentation_requests: usize,
    pub image_updates: usize,
    pub window_level_resets: usize,
    pub camera_resets: usize,
    pub resizes: usize,
    pub renders: usize,
    pub released: bool,
}

type Journal = Rc<RefCell<Vec<BackendEvent>>>;

struct HeadlessSurface {
    uid: ViewportUid,
    capabilities: SurfaceCapabilities,
    record: Rc<RefCell<SurfaceRecord>>,
    journal: Journal,
}

impl HeadlessSurface {
    fn record(&self) -> std::cell::RefMut<'_, SurfaceRecord> {
        self.record.borrow_mut()
    }

    /// Dispose of a surface that was never handed out.
    fn discard(self) {
        self.record().released = true;
        self.journal
            .borrow_mut()
            .push(BackendEvent::Released(self.uid));
    }
}

impl RenderSurface for HeadlessSurface {
    fn uid(&self) -> ViewportUid {
        self.uid
    }

    fn capabilities(&self) -> SurfaceCapabilities {
        self.capabilities
    }

    fn set_voi_range(&mut self, range: DisplayRange) {
        self.record().voi_range = Some(range);
    }

    fn update_voi(&mut self, voi: VoiState) {
        self.record().voi = Some(voi);
    }

    fn set_initial_voi(&mut self, voi: VoiState) {
        self.record().initial_voi = Some(voi);
    }

    fn reset_window_level(&mut self) {
        let mut record = self.record();
        record.window_level_resets += 1;
        record.voi = record.initial_voi;
    }

    fn set_orientation(&mut self, orientation: SliceOrientation) {
        self.record().orientation = Some(orientation);
    }

    fn set_slab_thickness(&mut self, thickness: f64) {
        let mut record = self.record();
        record.slab_thickness = Some(thickness);
        record.slab_updates += 1;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.record().blend_mode = mode;
    }

    fn set_interactor_style(&mut self, style: &InteractionStyle) {
        let mut record = self.record();
        record.style = Some(style.clone());
        record.style_changes += 1;
    }

    fn clear_interactor_style(&mut self) {
        self.record().style = None;
        self.journal
            .borrow_mut()
            .push(BackendEvent::StyleCleared(self.uid));
    }

    fn set_window_level_enabled(&mut self, enabled: bool) {
        self.record().window_level_enabled = enabled;
    }

    fn add_crosshair_widget(&mut self) {
        self.record().crosshair_widget = true;
    }

    fn clear_widgets(&mut self) {
        let mut record = self.record();
        record.crosshair_widget = false;
        record.reference_lines.clear();
        self.journal
            .borrow_mut()
            .push(BackendEvent::WidgetsCleared(self.uid));
    }

    fn set_slice_center(&mut self, world: DVec3) {
        let mut record = self.record();
        record.slice_center = Some(world);
        record.slice_center_updates += 1;
    }

    fn set_reference_lines(&mut self, lines: &[ReferenceLine]) {
        self.record().reference_lines = lines.to_vec();
    }

    fn set_segmentation_style(&mut self, style: &SegmentationStyle) {
        self.record().segmentation_style = Some(*style);
    }

    fn set_segment_visibility(&mut self, segment: u16, visible: bool) {
        let mut record = self.record();
        if visible {
            record.hidden_segments.remove(&segment);
        } else {
            record.hidden_segments.insert(segment);
        }
    }

    fn request_new_segmentation(&mut self) {
        self.record().new_segmentation_requests += 1;
    }

    fn update_image(&mut self) {
        self.record().image_updates += 1;
    }

    fn reset_camera(&mut self) {
        self.record().camera_resets += 1;
    }

    fn resize(&mut self) {
        self.record().resizes += 1;
    }

    fn render(&mut self) {
        self.record().renders += 1;
    }
}

type PendingSurface = (usize, HeadlessSurface, SlotReady);

/// Creation requests the backend has not reported ready yet.
#[derive(Clone, Default)]
pub struct PendingCompletions {
    queue: Rc<RefCell<Vec<PendingSurface>>>,
}

impl PendingCompletions {
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Slots waiting for completion, in request order.
    pub fn slots(&self) -> Vec<usize> {
        self.queue
            .borrow()
            .iter()
            .map(|(slot, _, _)| *slot)
            .collect()
    }

    /// Report the surface for `slot` ready. Returns false if it is not pending.
    pub fn complete_slot(&self, slot: usize) -> bool {
        let entry = {
            let mut queue = self.queue.borrow_mut();
            let position = queue.iter().position(|(pending, _, _)| *pending == slot);
            position.map(|position| queue.remove(position))
        };
        match entry {
            Some((_, surface, ready)) => {
                ready.complete(Box::new(surface));
                true
            }
            None => false,
        }
    }

    pub fn complete_all(&self) {
        for (_, surface, ready) in self.take() {
            ready.complete(Box::new(surface));
        }
    }

    pub fn complete_all_reversed(&self) {
        for (_, surface, ready) in self.take().into_iter().rev() {
            ready.complete(Box::new(surface));
        }
    }

    /// Give up on every pending request. The surfaces are disposed of here
    /// and their readiness tokens dropped unreported.
    pub fn abandon_all(&self) {
        for (_, surface, ready) in self.take() {
            surface.discard();
            drop(ready);
        }
    }

    fn push(&self, slot: usize, surface: HeadlessSurface, ready: SlotReady) {
        self.queue.borrow_mut().push((slot, surface, ready));
    }

    fn take(&self) -> Vec<PendingSurface> {
        mem::take(&mut *self.queue.borrow_mut())
    }
}

#[derive(Default)]
pub struct HeadlessBackend {
    order: CompletionOrder,
    capabilities: SurfaceCapabilities,
    pending: PendingCompletions,
    records: Vec<Rc<RefCell<SurfaceRecord>>>,
    journal: Journal,
    grid: Option<GridShape>,
    failing: BTreeSet<usize>,
}

impl HeadlessBackend {
    pub fn new(order: CompletionOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn with_capabilities(mut self, capabilities: SurfaceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make the next creation request for `slot` fail.
    pub fn fail_next_creation(&mut self, slot: usize) {
        self.failing.insert(slot);
    }

    pub fn pending(&self) -> PendingCompletions {
        self.pending.clone()
    }

    pub fn grid(&self) -> Option<GridShape> {
        self.grid
    }

    pub fn created(&self) -> usize {
        self.records.len()
    }

    pub fn journal(&self) -> Ref<'_, Vec<BackendEvent>> {
        self.journal.borrow()
    }

    pub fn surface(&self, uid: ViewportUid) -> Option<Ref<'_, SurfaceRecord>> {
        self.records
            .iter()
            .find(|record| record.borrow().uid == Some(uid))
            .map(|record| record.borrow())
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_viewport(&mut self, request: ViewportRequest, ready: SlotReady) {
        trace!(slot = request.slot, uid = %request.uid, mode = ?request.mode, "Creating headless surface");
        let record = Rc::new(RefCell::new(SurfaceRecord {
            uid: Some(request.uid),
            slot: request.slot,
            mode: Some(request.mode),
            orientation: request.orientation,
            voi_range: Some(request.volume.display_range()),
            ..Default::default()
        }));
        self.records.push(Rc::clone(&record));
        self.journal
            .borrow_mut()
            .push(BackendEvent::Created(request.uid));

        let surface = HeadlessSurface {
            uid: request.uid,
            capabilities: self.capabilities,
            record,
            journal: Rc::clone(&self.journal),
        };

        if self.failing.remove(&request.slot) {
            trace!(slot = request.slot, "Failing surface creation");
            surface.discard();
            drop(ready);
            return;
        }
        match self.order {
            CompletionOrder::Immediate => ready.complete(Box::new(surface)),
            _ => self.pending.push(request.slot, surface, ready),
        }
    }

    fn commit_layout(&mut self, grid: GridShape) {
        self.grid = Some(grid);
        self.journal.borrow_mut().push(BackendEvent::Committed(grid));
        match self.order {
            CompletionOrder::OnCommit => self.pending.complete_all(),
            CompletionOrder::Reversed => self.pending.complete_all_reversed(),
            CompletionOrder::Immediate | CompletionOrder::Manual => {}
        }
    }

    fn release_viewport(&mut self, surface: Box<dyn RenderSurface>) {
        let uid = surface.uid();
        if let Some(record) = self
            .records
            .iter()
            .find(|record| record.borrow().uid == Some(uid))
        {
            record.borrow_mut().released = true;
        }
        self.journal.borrow_mut().push(BackendEvent::Released(uid));
    }
}
