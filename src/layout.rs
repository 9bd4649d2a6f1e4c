//! Layout transitions.
//!
//! A transition validates the requested configuration, resolves render
//! objects through the cache, asks the backend for one surface per new slot
//! and resolves once every slot has reported ready. Only one transition may
//! be in flight; a second one is rejected with [`ViewerError::Busy`].

use std::cell::Cell;
use std::mem;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::{debug, info, warn};

use crate::backend::{RenderBackend, RenderSurface, ViewportRequest, ViewportUid};
use crate::barrier::{BarrierError, BarrierWait, Reclaimed, barrier};
use crate::cache::RenderObjectCache;
use crate::dataset::{DatasetIdentity, DatasetSource};
use crate::enums::{Orientation, SliceOrientation, ViewportMode};
use crate::error::{Result, ViewerError};
use crate::progressive::LoadProgress;
use crate::registry::{PlanarState, ViewportHandle, ViewportKind, ViewportRegistry, VolumetricState};
use crate::render_object::{LabelmapRenderObject, VolumeRenderObject};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridShape {
    pub rows: usize,
    pub columns: usize,
}

impl GridShape {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    pub fn cells(&self) -> usize {
        self.rows * self.columns
    }
}

/// Slots of a layout and the orientations of its planar slots, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfiguration {
    pub grid: GridShape,
    pub slots: Vec<ViewportMode>,
    pub orientations: Vec<SliceOrientation>,
}

impl LayoutConfiguration {
    /// Axial, sagittal and coronal side by side.
    pub fn mpr() -> Self {
        Self {
            grid: GridShape::new(1, 3),
            slots: vec![ViewportMode::Planar2D; 3],
            orientations: [Orientation::Axial, Orientation::Sagittal, Orientation::Coronal]
                .into_iter()
                .map(SliceOrientation::from)
                .collect(),
        }
    }

    pub fn planar_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|mode| **mode == ViewportMode::Planar2D)
            .count()
    }

    pub fn validate(&self) -> Result<()> {
        let planar = self.planar_count();
        if self.orientations.len() != planar {
            return Err(ViewerError::ConfigurationMismatch {
                expected: planar,
                actual: self.orientations.len(),
            });
        }
        if self.grid.cells() != self.slots.len() {
            return Err(ViewerError::ConfigurationMismatch {
                expected: self.grid.cells(),
                actual: self.slots.len(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransitionRequest {
    /// Replace the whole layout.
    Replace(LayoutConfiguration),
    /// Keep the planar viewports and append a volumetric one unless the
    /// layout already has one.
    AppendVolumetric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionShape {
    Replace,
    Append,
    Unchanged,
}

/// Held while a transition is in flight; released on drop.
struct TransitionGuard(Rc<Cell<bool>>);

impl TransitionGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> Result<Self> {
        if flag.replace(true) {
            return Err(ViewerError::Busy);
        }
        Ok(Self(Rc::clone(flag)))
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct PlannedSlot {
    slot: usize,
    dataset: DatasetIdentity,
    kind: ViewportKind,
    volume: Rc<VolumeRenderObject>,
    labelmap: Option<Rc<LabelmapRenderObject>>,
    load: LoadProgress,
}

/// A transition waiting for the backend. Resolves to a [`ReadyLayout`] once
/// every requested slot has reported ready.
///
/// Dropping it, or a failure of any slot, leaves every surface created so far
/// in the coordinator's reclaim bin; see [`LayoutCoordinator::settle`].
pub struct PendingLayout {
    wait: BarrierWait<Box<dyn RenderSurface>>,
    plan: Option<Vec<PlannedSlot>>,
    shape: TransitionShape,
    grid: GridShape,
    keep: usize,
    reclaimed: Reclaimed<Box<dyn RenderSurface>>,
    guard: Option<TransitionGuard>,
}

impl PendingLayout {
    pub fn shape(&self) -> TransitionShape {
        self.shape
    }

    pub fn grid(&self) -> GridShape {
        self.grid
    }

    /// Slots that have not reported ready yet.
    pub fn remaining(&self) -> usize {
        self.wait.remaining()
    }
}

impl Future for PendingLayout {
    type Output = Result<ReadyLayout>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let surfaces = match Pin::new(&mut this.wait).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(outcome) => outcome,
        };
        let plan = this.plan.take().unwrap_or_default();
        let guard = this.guard.take();

        let surfaces = match surfaces {
            Ok(surfaces) => surfaces,
            Err(BarrierError::Abandoned { index }) => {
                let slot = plan.get(index).map_or(index, |planned| planned.slot);
                return Poll::Ready(Err(ViewerError::ViewportCreationFailed { slot }));
            }
        };

        let handles = plan
            .into_iter()
            .zip(surfaces)
            .map(|(planned, surface)| {
                ViewportHandle::new(
                    planned.slot,
                    planned.dataset,
                    planned.kind,
                    planned.volume,
                    planned.labelmap,
                    surface,
                    planned.load,
                )
            })
            .collect();

        Poll::Ready(Ok(ReadyLayout {
            handles,
            shape: this.shape,
            grid: this.grid,
            keep: this.keep,
            reclaimed: Rc::clone(&this.reclaimed),
            _guard: guard,
        }))
    }
}

/// Every surface of a transition, ordered by slot, not yet installed. The
/// current layout is untouched until [`LayoutCoordinator::install`].
pub struct ReadyLayout {
    handles: Vec<ViewportHandle>,
    shape: TransitionShape,
    grid: GridShape,
    keep: usize,
    reclaimed: Reclaimed<Box<dyn RenderSurface>>,
    _guard: Option<TransitionGuard>,
}

impl Drop for ReadyLayout {
    fn drop(&mut self) {
        let surfaces = mem::take(&mut self.handles)
            .into_iter()
            .map(ViewportHandle::into_surface);
        self.reclaimed.borrow_mut().extend(surfaces);
    }
}

impl ReadyLayout {
    pub fn shape(&self) -> TransitionShape {
        self.shape
    }

    pub fn handles(&self) -> &[ViewportHandle] {
        &self.handles
    }
}

pub struct LayoutCoordinator<B> {
    backend: B,
    registry: ViewportRegistry,
    in_flight: Rc<Cell<bool>>,
    next_uid: u64,
    grid: Option<GridShape>,
    committed: Option<GridShape>,
    reclaimed: Reclaimed<Box<dyn RenderSurface>>,
    initial_slab_thickness: f64,
}

impl<B: RenderBackend> LayoutCoordinator<B> {
    pub fn new(backend: B, initial_slab_thickness: f64) -> Self {
        Self {
            backend,
            registry: ViewportRegistry::default(),
            in_flight: Rc::default(),
            next_uid: 0,
            grid: None,
            committed: None,
            reclaimed: Reclaimed::default(),
            initial_slab_thickness,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn registry(&self) -> &ViewportRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ViewportRegistry {
        &mut self.registry
    }

    pub fn grid(&self) -> Option<GridShape> {
        self.grid
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.get()
    }

    /// Validate and issue a transition. Nothing reaches the backend when
    /// validation fails.
    pub fn begin_transition(
        &mut self,
        request: &TransitionRequest,
        dataset: &DatasetIdentity,
        source: &dyn DatasetSource,
        cache: &mut RenderObjectCache,
    ) -> Result<PendingLayout> {
        if self.in_flight.get() {
            return Err(ViewerError::Busy);
        }
        self.release_reclaimed();

        let (shape, grid, slots, keep) = match request {
            TransitionRequest::Replace(config) => {
                config.validate()?;
                let slots = self.replacement_slots(config);
                (TransitionShape::Replace, config.grid, slots, 0)
            }
            TransitionRequest::AppendVolumetric => {
                let prefix = self.registry.iter().take_while(|handle| handle.is_planar()).count();
                if prefix == 0 {
                    return Err(ViewerError::NoViewport { slot: 0 });
                }
                let has_volumetric = self
                    .registry
                    .get(prefix)
                    .is_some_and(|handle| !handle.is_planar());
                if has_volumetric {
                    let keep = prefix + 1;
                    (TransitionShape::Unchanged, GridShape::new(1, keep), Vec::new(), keep)
                } else {
                    let volumetric = ViewportKind::Volumetric3D(VolumetricState::default());
                    (
                        TransitionShape::Append,
                        GridShape::new(1, prefix + 1),
                        vec![(prefix, volumetric)],
                        prefix,
                    )
                }
            }
        };

        let (volume, labelmap) = if slots.is_empty() {
            (None, None)
        } else {
            let volume = cache.get_or_create(dataset, source)?;
            let labelmap = source
                .active_labelmap(dataset)
                .map(|labelmap| cache.get_or_create_labelmap(dataset, &labelmap))
                .transpose()?;
            (Some(volume), labelmap)
        };

        let guard = TransitionGuard::acquire(&self.in_flight)?;

        // Everything past the kept prefix goes on install: the whole registry
        // for a replacement, stray slots after the MPR group otherwise.
        let layout_changed = shape != TransitionShape::Unchanged || self.registry.len() > keep;

        let plan: Vec<PlannedSlot> = slots
            .into_iter()
            .zip(volume.into_iter().cycle())
            .map(|((slot, kind), volume)| PlannedSlot {
                slot,
                dataset: dataset.clone(),
                kind,
                volume,
                labelmap: labelmap.clone(),
                load: LoadProgress::new(source.begin_load(dataset)),
            })
            .collect();

        info!(
            ?shape,
            rows = grid.rows,
            columns = grid.columns,
            new_slots = plan.len(),
            dataset = %dataset,
            "Starting layout transition"
        );

        let (completions, wait) = barrier(plan.len(), Rc::clone(&self.reclaimed));
        for (planned, ready) in plan.iter().zip(completions) {
            let uid = self.allocate_uid();
            let orientation = match &planned.kind {
                ViewportKind::Planar2D(state) => Some(state.orientation),
                ViewportKind::Volumetric3D(_) => None,
            };
            self.backend.create_viewport(
                ViewportRequest {
                    slot: planned.slot,
                    uid,
                    mode: planned.kind.mode(),
                    orientation,
                    dataset: dataset.clone(),
                    volume: Rc::clone(&planned.volume),
                    labelmap: planned.labelmap.clone(),
                },
                ready,
            );
        }
        if layout_changed {
            self.commit(grid);
        }

        Ok(PendingLayout {
            wait,
            plan: Some(plan),
            shape,
            grid,
            keep,
            reclaimed: Rc::clone(&self.reclaimed),
            guard: Some(guard),
        })
    }

    /// Put the surfaces of a resolved transition into the registry.
    /// Viewports past the kept prefix are torn down first.
    pub fn install(&mut self, mut ready: ReadyLayout) -> &ViewportRegistry {
        for handle in self.registry.truncate(ready.keep) {
            handle.teardown(&mut self.backend);
        }
        for handle in mem::take(&mut ready.handles) {
            self.registry.push(handle);
        }
        self.grid = Some(ready.grid);
        debug!(viewports = self.registry.len(), shape = ?ready.shape, "Layout installed");
        &self.registry
    }

    /// Finish a transition: install it, or on failure release whatever it
    /// created and put the backend back on the installed grid.
    pub fn settle(&mut self, outcome: Result<ReadyLayout>) -> Result<&ViewportRegistry> {
        match outcome {
            Ok(ready) => Ok(self.install(ready)),
            Err(error) => {
                let released = self.release_reclaimed();
                warn!(%error, released, "Layout transition failed");
                let installed = self.grid.filter(|grid| self.committed != Some(*grid));
                if let Some(grid) = installed {
                    self.commit(grid);
                }
                Err(error)
            }
        }
    }

    /// Hand surfaces left behind by failed or dropped transitions back to the
    /// backend. Returns how many were released.
    pub fn release_reclaimed(&mut self) -> usize {
        let surfaces = mem::take(&mut *self.reclaimed.borrow_mut());
        let count = surfaces.len();
        for surface in surfaces {
            debug!(uid = %surface.uid(), "Releasing orphaned surface");
            self.backend.release_viewport(surface);
        }
        count
    }

    /// Run a whole transition: begin, wait for every slot, install.
    pub async fn transition(
        &mut self,
        request: &TransitionRequest,
        dataset: &DatasetIdentity,
        source: &dyn DatasetSource,
        cache: &mut RenderObjectCache,
    ) -> Result<&ViewportRegistry> {
        let pending = self.begin_transition(request, dataset, source, cache)?;
        let outcome = pending.await;
        self.settle(outcome)
    }

    /// Tear down every viewport.
    pub fn release_all(&mut self) {
        for handle in self.registry.drain() {
            handle.teardown(&mut self.backend);
        }
        self.release_reclaimed();
        self.grid = None;
    }

    fn commit(&mut self, grid: GridShape) {
        self.backend.commit_layout(grid);
        self.committed = Some(grid);
    }

    fn replacement_slots(&self, config: &LayoutConfiguration) -> Vec<(usize, ViewportKind)> {
        let mut orientations = config.orientations.iter().copied();
        config
            .slots
            .iter()
            .enumerate()
            .map(|(slot, mode)| {
                let kind = match mode {
                    ViewportMode::Planar2D => {
                        // validate() guarantees one orientation per planar slot
                        let orientation = orientations
                            .next()
                            .unwrap_or_else(|| Orientation::Axial.slice_orientation());
                        ViewportKind::Planar2D(PlanarState {
                            orientation,
                            initial_orientation: orientation,
                            slab_thickness: self.initial_slab_thickness,
                            style: None,
                        })
                    }
                    ViewportMode::Volumetric3D => {
                        ViewportKind::Volumetric3D(VolumetricState::default())
                    }
                };
                (slot, kind)
            })
            .collect()
    }

    fn allocate_uid(&mut self) -> ViewportUid {
        self.next_uid += 1;
        ViewportUid(self.next_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpr_configuration_is_valid() {
        let config = LayoutConfiguration::mpr();
        assert_eq!(config.planar_count(), 3);
        assert_eq!(config.grid, GridShape::new(1, 3));
        assert!(config.validate().is_ok());
        assert_eq!(config.orientations[0], Orientation::Axial.slice_orientation());
        assert_eq!(config.orientations[1], Orientation::Sagittal.slice_orientation());
        assert_eq!(config.orientations[2], Orientation::Coronal.slice_orientation());
    }

    #[test]
    fn orientation_count_must_match_planar_slots() {
        let mut config = LayoutConfiguration::mpr();
        config.orientations.pop();
        assert!(matches!(
            config.validate(),
            Err(ViewerError::ConfigurationMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn grid_must_cover_every_slot() {
        let mut config = LayoutConfiguration::mpr();
        config.grid = GridShape::new(2, 2);
        assert!(matches!(
            config.validate(),
            Err(ViewerError::ConfigurationMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn guard_rejects_a_second_holder() {
        let flag = Rc::new(Cell::new(false));
        let guard = TransitionGuard::acquire(&flag).unwrap();
        assert!(matches!(
            TransitionGuard::acquire(&flag),
            Err(ViewerError::Busy)
        ));
        drop(guard);
        assert!(TransitionGuard::acquire(&flag).is_ok());
    }
}
