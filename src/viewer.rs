//! A synchronized MPR viewing session.
//!
//! [`MprViewer`] owns the layout coordinator, the render object cache and the
//! shared VOI, crosshair and interaction state, and exposes the operations the
//! command layer dispatches to.

use std::rc::Rc;

use glam::DVec3;
use ndarray::Axis;
use tracing::{debug, info, trace};
use web_time::Instant;

use crate::backend::{RenderBackend, SegmentationStyle};
use crate::cache::RenderObjectCache;
use crate::config::ViewerConfig;
use crate::crosshair::{CrosshairSynchronizer, label_centroid, world_from_voxel};
use crate::dataset::{DatasetIdentity, DatasetSource};
use crate::display;
use crate::enums::{BlendMode, InteractionTool, Orientation};
use crate::error::{Result, ViewerError};
use crate::interaction::InteractionStyleManager;
use crate::layout::{LayoutConfiguration, LayoutCoordinator, TransitionRequest, TransitionShape};
use crate::notify::{Notification, NotificationClass, NotificationSink, Notifier, Severity};
use crate::progressive::LoadUpdate;
use crate::registry::{ViewportHandle, ViewportRegistry};
use crate::voi::{ReferenceViewport, VoiController, VoiState, derive_range, seed_from_reference};

/// A load update reported by the viewport in `slot`.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotLoadUpdate {
    pub slot: usize,
    pub update: LoadUpdate,
}

pub struct MprViewer<B> {
    config: ViewerConfig,
    coordinator: LayoutCoordinator<B>,
    cache: RenderObjectCache,
    voi: VoiController,
    crosshair: CrosshairSynchronizer,
    styles: InteractionStyleManager,
    notifier: Notifier,
    source: Rc<dyn DatasetSource>,
    reference: Option<Box<dyn ReferenceViewport>>,
    dataset: Option<DatasetIdentity>,
}

impl<B: RenderBackend> MprViewer<B> {
    pub fn new(backend: B, source: Rc<dyn DatasetSource>, config: ViewerConfig) -> Self {
        Self {
            coordinator: LayoutCoordinator::new(backend, config.initial_slab_thickness),
            cache: RenderObjectCache::new(config.volume_property.clone()),
            voi: VoiController::new(config.voi_throttle_interval()),
            crosshair: CrosshairSynchronizer::default(),
            styles: InteractionStyleManager::default(),
            notifier: Notifier::default(),
            source,
            reference: None,
            dataset: None,
            config,
        }
    }

    /// 2D viewport whose window/level seeds new MPR layouts.
    pub fn with_reference(mut self, reference: Box<dyn ReferenceViewport>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notifier = Notifier::new(sink);
        self
    }

    pub fn set_reference(&mut self, reference: Option<Box<dyn ReferenceViewport>>) {
        self.reference = reference;
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        self.coordinator.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.coordinator.backend_mut()
    }

    pub fn registry(&self) -> &ViewportRegistry {
        self.coordinator.registry()
    }

    pub fn coordinator(&self) -> &LayoutCoordinator<B> {
        &self.coordinator
    }

    pub fn cache(&self) -> &RenderObjectCache {
        &self.cache
    }

    pub fn crosshair(&self) -> &CrosshairSynchronizer {
        &self.crosshair
    }

    pub fn voi(&self) -> &VoiController {
        &self.voi
    }

    pub fn styles(&self) -> &InteractionStyleManager {
        &self.styles
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn dataset(&self) -> Option<&DatasetIdentity> {
        self.dataset.as_ref()
    }

    /// Handle at `slot`, if the layout has one.
    pub fn viewport(&self, slot: usize) -> Option<&ViewportHandle> {
        self.coordinator.registry().get(slot)
    }

    /// Replace the layout with axial, sagittal and coronal views of `dataset`.
    ///
    /// On failure the previous layout, dataset and default window stay as
    /// they were.
    pub async fn mpr2d(&mut self, dataset: &DatasetIdentity) -> Result<&ViewportRegistry> {
        let seed = seed_from_reference(self.reference.as_deref());

        let request = TransitionRequest::Replace(LayoutConfiguration::mpr());
        let pending =
            self.coordinator
                .begin_transition(&request, dataset, self.source.as_ref(), &mut self.cache)?;
        let outcome = pending.await;
        self.coordinator.settle(outcome)?;

        self.voi.set_default(seed);
        self.crosshair.clear();
        self.dataset = Some(dataset.clone());

        let registry = self.coordinator.registry_mut();
        if let Some(voi) = seed {
            self.voi.propagate(registry, voi);
        }
        for handle in registry.planar_mut() {
            handle.surface_mut().add_crosshair_widget();
        }
        InteractionStyleManager::bind_planar(registry, self.styles.default_tool());

        if let Some(origin) = registry.planar_slots().first().copied() {
            self.crosshair.reset_crosshairs(registry, origin)?;
        }
        info!(dataset = %dataset, viewports = registry.len(), "MPR layout ready");
        self.check_capabilities();

        Ok(self.coordinator.registry())
    }

    /// Add a volumetric view next to the MPR group. Does nothing when the
    /// layout already has one.
    pub async fn enable_3d_view(&mut self) -> Result<&ViewportRegistry> {
        let dataset = self
            .dataset
            .clone()
            .ok_or(ViewerError::NoViewport { slot: 0 })?;
        let seed = self.coordinator.registry().planar().next().and_then(ViewportHandle::voi);

        let pending = self.coordinator.begin_transition(
            &TransitionRequest::AppendVolumetric,
            &dataset,
            self.source.as_ref(),
            &mut self.cache,
        )?;
        let shape = pending.shape();
        let outcome = pending.await;
        self.coordinator.settle(outcome)?;

        let level_tool = self.styles.level_tool_enabled();
        let registry = self.coordinator.registry_mut();
        if shape == TransitionShape::Append {
            let slot = registry.len() - 1;
            if let Some(handle) = registry.get_mut(slot) {
                if let Some(voi) = seed {
                    let range = derive_range(voi.window_width, voi.window_center, handle.volume().modality());
                    handle.set_voi(voi, range, true);
                }
                if level_tool {
                    handle.set_window_level_enabled(true);
                }
            }
            info!(slot, "Volumetric view added");
        } else {
            debug!("Layout already has a volumetric view");
        }

        for handle in registry.iter_mut() {
            let surface = handle.surface_mut();
            surface.resize();
            surface.render();
        }
        Ok(self.coordinator.registry())
    }

    /// Restore window/level, orientations, crosshair and 3D cameras.
    pub fn reset_mpr_view(&mut self) -> Result<()> {
        let registry = self.coordinator.registry_mut();
        if registry.is_empty() {
            return Err(ViewerError::NoViewport { slot: 0 });
        }

        for handle in registry.iter_mut() {
            handle.reset_window_level();
        }
        if let Some(voi) = self.voi.default_voi() {
            self.voi.propagate(registry, voi);
        }
        for handle in registry.planar_mut() {
            if let Some(initial) = handle.planar().map(|state| state.initial_orientation) {
                handle.set_orientation(initial);
            }
        }
        if let Some(origin) = registry.planar_slots().first().copied() {
            self.crosshair.reset_crosshairs(registry, origin)?;
        }
        for handle in registry.volumetric_mut() {
            handle.surface_mut().reset_camera();
        }
        Ok(())
    }

    /// Point the planar viewport in `slot` along `orientation`. Returns false
    /// when the slot holds a volumetric view.
    pub fn set_orientation(&mut self, slot: usize, orientation: Orientation) -> Result<bool> {
        let registry = self.coordinator.registry_mut();
        let handle = registry
            .get_mut(slot)
            .ok_or(ViewerError::NoViewport { slot })?;
        if !handle.is_planar() {
            return Ok(false);
        }
        handle.set_orientation(orientation.slice_orientation());
        handle.surface_mut().render();
        self.crosshair.refresh(registry);
        Ok(true)
    }

    pub fn enable_rotate_tool(&mut self) {
        self.styles
            .activate(self.coordinator.registry_mut(), InteractionTool::Rotate);
    }

    pub fn enable_crosshairs_tool(&mut self) -> Result<()> {
        let registry = self.coordinator.registry_mut();
        self.styles.activate(registry, InteractionTool::Crosshair);
        if !self.crosshair.is_initialized() {
            if let Some(origin) = registry.planar_slots().first().copied() {
                self.crosshair.reset_crosshairs(registry, origin)?;
            }
        }
        Ok(())
    }

    pub fn enable_level_tool(&mut self) {
        self.styles
            .activate(self.coordinator.registry_mut(), InteractionTool::WindowLevel);
    }

    /// Window/level dragged in one viewport. Every surface is redrawn right
    /// away; the new VOI reaches the viewports at most once per throttle
    /// interval. Returns whether it was applied now. Ignored unless the level
    /// tool is active.
    pub fn on_levels_changed(&mut self, voi: VoiState, now: Instant) -> bool {
        if !self.styles.level_tool_enabled() {
            trace!(width = voi.window_width, center = voi.window_center, "Level tool inactive");
            return false;
        }
        let registry = self.coordinator.registry_mut();
        for handle in registry.iter_mut() {
            handle.surface_mut().render();
        }
        self.voi.offer_live(registry, voi, now)
    }

    /// Deliver a throttled window/level that has become due.
    pub fn poll_levels(&mut self, now: Instant) -> bool {
        self.voi.poll_live(self.coordinator.registry_mut(), now)
    }

    /// Deliver the last throttled window/level regardless of the interval.
    pub fn flush_levels(&mut self, now: Instant) -> bool {
        self.voi.flush_live(self.coordinator.registry_mut(), now)
    }

    /// Sleep until the throttled window/level is due, then deliver it.
    /// Returns false right away when nothing is waiting.
    pub async fn deliver_pending_levels(&mut self) -> bool {
        let Some(deadline) = self.voi.live_deadline() else {
            return false;
        };
        tokio::time::sleep(deadline.saturating_duration_since(Instant::now())).await;
        self.flush_levels(Instant::now())
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        display::set_blend_mode(self.coordinator.registry_mut(), mode);
    }

    pub fn set_slab_thickness(&mut self, thickness: f64) {
        for handle in self.coordinator.registry_mut().planar_mut() {
            display::set_slab_thickness(handle, thickness);
        }
    }

    /// Change every planar slab by `delta`, floored at the configured minimum.
    pub fn change_slab_thickness(&mut self, delta: f64) {
        let floor = self.config.min_slab_thickness;
        for handle in self.coordinator.registry_mut().planar_mut() {
            display::change_slab_thickness(handle, delta, floor);
        }
    }

    pub fn request_new_segmentation(&mut self) {
        for handle in self.coordinator.registry_mut().planar_mut() {
            let surface = handle.surface_mut();
            surface.request_new_segmentation();
            surface.update_image();
        }
    }

    pub fn set_segmentation_configuration(&mut self, style: SegmentationStyle) {
        for handle in self.coordinator.registry_mut().planar_mut() {
            let surface = handle.surface_mut();
            surface.set_segmentation_style(&style);
            surface.update_image();
        }
    }

    pub fn set_segment_configuration(&mut self, segment: u16, visible: bool) {
        for handle in self.coordinator.registry_mut().planar_mut() {
            let surface = handle.surface_mut();
            surface.set_segment_visibility(segment, visible);
            surface.update_image();
        }
    }

    /// Move the crosshair to the centroid of `segment` in labelmap frame
    /// `frame_index`, as seen from the planar viewport in `slot`. Returns
    /// false when there is nothing to jump to.
    pub fn jump_to_slice(&mut self, slot: usize, segment: u16, frame_index: usize) -> Result<bool> {
        let registry = self.coordinator.registry_mut();
        let handle = registry.get(slot).ok_or(ViewerError::NoViewport { slot })?;
        if !handle.is_planar() {
            return Ok(false);
        }
        let Some(labelmap) = handle.labelmap() else {
            debug!(slot, "No labelmap to jump within");
            return Ok(false);
        };
        let frames = labelmap.buffer().len_of(Axis(0));
        if frame_index >= frames {
            return Err(ViewerError::InvalidParameters {
                command: "jumpToSlice",
                reason: format!("frame {frame_index} is outside 0..{frames}"),
            });
        }
        let frame = labelmap.buffer().index_axis(Axis(0), frame_index);
        let Some((column, row)) = label_centroid(frame, segment) else {
            debug!(segment, frame_index, "Segment is absent from frame");
            return Ok(false);
        };

        let voxel = DVec3::new(column, row, frame_index as f64);
        let world = world_from_voxel(voxel, handle.volume().index_to_world());
        self.crosshair.move_crosshairs(world, registry);
        Ok(true)
    }

    /// Drain progressive-load events of every viewport. The first failure of
    /// the session is shown to the user.
    pub fn pump_loads(&mut self) -> Vec<SlotLoadUpdate> {
        let mut reported = Vec::new();
        for handle in self.coordinator.registry_mut().iter_mut() {
            let slot = handle.slot();
            for update in handle.pump_load() {
                match &update {
                    LoadUpdate::Percent(percent) => debug!(slot, percent, "Volume loading"),
                    LoadUpdate::Loaded => {
                        debug!(slot, "Volume loaded");
                        handle.surface_mut().render();
                    }
                    LoadUpdate::Failed(message) => {
                        self.notifier.notify_once(Notification {
                            class: NotificationClass::LoadError,
                            severity: Severity::Error,
                            title: "3D view load error".into(),
                            message: message.clone(),
                        });
                    }
                }
                reported.push(SlotLoadUpdate { slot, update });
            }
        }
        reported
    }

    /// Tear the layout down and forget every cached render object.
    pub fn end_session(&mut self) {
        self.coordinator.release_all();
        self.cache.clear();
        self.crosshair.clear();
        self.notifier.reset();
        self.voi.set_default(None);
        self.dataset = None;
        info!("Viewing session ended");
    }

    /// Warn once when the volume exceeds what the renderer can hold without
    /// 3D textures.
    fn check_capabilities(&mut self) {
        let Some(handle) = self.coordinator.registry().planar().next() else {
            return;
        };
        let capabilities = handle.surface().capabilities();
        if capabilities.supports_3d_textures {
            return;
        }
        let voxels = handle.volume().geometry().voxel_count() as u64;
        let max_texture = u64::from(capabilities.max_texture_size);
        if voxels <= max_texture * max_texture / 4 {
            return;
        }
        self.notifier.notify_once(Notification {
            class: NotificationClass::CapabilityWarning,
            severity: Severity::Warning,
            title: "Browser/GPU limitation".into(),
            message: format!(
                "The volume has {voxels} voxels, more than the renderer can hold without 3D textures; rendering may be degraded"
            ),
        });
    }
}
