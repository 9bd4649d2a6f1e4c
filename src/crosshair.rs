//! Shared crosshair across the planar viewports of a layout.
//!
//! One world-space point is shared by the whole planar group. Each planar
//! viewport is centred on it, and for every ordered pair of planar viewports
//! (viewer, source) the viewer shows where the source's slice plane cuts its
//! own plane, clipped to the volume.

use std::collections::BTreeMap;

use glam::DVec3;
use ndarray::ArrayView2;
use tracing::debug;

use crate::error::{Result, ViewerError};
use crate::geometry::{IndexToWorld, clip_line_to_box};
use crate::registry::{ViewportHandle, ViewportRegistry};

const VOXEL_CENTER: DVec3 = DVec3::splat(0.5);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceLine {
    /// Slot of the viewport the line is drawn in.
    pub viewer_slot: usize,
    /// Slot whose slice plane the line represents.
    pub source_slot: usize,
    pub start: DVec3,
    pub end: DVec3,
}

/// Map a voxel index to the world position of that voxel's centre.
pub fn world_from_voxel(position: DVec3, transform: &IndexToWorld) -> DVec3 {
    transform.to_world(position + VOXEL_CENTER)
}

pub fn voxel_from_world(world: DVec3, transform: &IndexToWorld) -> DVec3 {
    transform.to_index(world) - VOXEL_CENTER
}

/// Mean (column, row) of the pixels of `frame` equal to `label`.
pub fn label_centroid(frame: ArrayView2<'_, u16>, label: u16) -> Option<(f64, f64)> {
    let (sum_i, sum_j, count) = frame
        .indexed_iter()
        .filter(|&(_, &value)| value == label)
        .fold((0usize, 0usize, 0usize), |(si, sj, n), ((row, column), _)| {
            (si + column, sj + row, n + 1)
        });
    (count > 0).then(|| (sum_i as f64 / count as f64, sum_j as f64 / count as f64))
}

#[derive(Debug, Default)]
pub struct CrosshairSynchronizer {
    point: Option<DVec3>,
    lines: BTreeMap<(usize, usize), ReferenceLine>,
    resets: usize,
}

impl CrosshairSynchronizer {
    pub fn point(&self) -> Option<DVec3> {
        self.point
    }

    pub fn reference_lines(&self) -> impl Iterator<Item = &ReferenceLine> {
        self.lines.values()
    }

    pub fn reference_line(&self, viewer_slot: usize, source_slot: usize) -> Option<&ReferenceLine> {
        self.lines.get(&(viewer_slot, source_slot))
    }

    pub fn is_initialized(&self) -> bool {
        self.point.is_some()
    }

    /// How many times the shared crosshair was reset.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Forget the crosshair, e.g. when the planar group is replaced.
    pub fn clear(&mut self) {
        self.point = None;
        self.lines.clear();
    }

    /// Centre the crosshair on the volume shown in `origin_slot` and
    /// recompute every planar viewport. Called once per planar group.
    pub fn reset_crosshairs(&mut self, registry: &mut ViewportRegistry, origin_slot: usize) -> Result<()> {
        let center = registry
            .get(origin_slot)
            .ok_or(ViewerError::NoViewport { slot: origin_slot })?
            .volume()
            .geometry()
            .center();
        self.resets += 1;
        debug!(origin_slot, ?center, "Resetting crosshairs");
        self.place(registry, center);
        Ok(())
    }

    /// Move the shared crosshair. Returns false when `point` is already the
    /// current position, in which case nothing is touched.
    pub fn move_crosshairs(&mut self, point: DVec3, registry: &mut ViewportRegistry) -> bool {
        if self.point == Some(point) {
            return false;
        }
        self.place(registry, point);
        true
    }

    /// Recompute lines after a planar orientation changed.
    pub fn refresh(&mut self, registry: &mut ViewportRegistry) {
        if let Some(point) = self.point {
            self.place(registry, point);
        }
    }

    fn place(&mut self, registry: &mut ViewportRegistry, point: DVec3) {
        self.point = Some(point);

        let planar: Vec<&ViewportHandle> = registry.planar().collect();
        self.lines = planar
            .iter()
            .flat_map(|viewer| {
                planar
                    .iter()
                    .filter(move |source| source.slot() != viewer.slot())
                    .filter_map(move |source| reference_line(viewer, source, point))
            })
            .map(|line| ((line.viewer_slot, line.source_slot), line))
            .collect();

        for handle in registry.planar_mut() {
            let slot = handle.slot();
            let lines: Vec<ReferenceLine> = self
                .lines
                .values()
                .filter(|line| line.viewer_slot == slot)
                .copied()
                .collect();
            let surface = handle.surface_mut();
            surface.set_slice_center(point);
            surface.set_reference_lines(&lines);
            surface.render();
        }
    }
}

fn reference_line(viewer: &ViewportHandle, source: &ViewportHandle, point: DVec3) -> Option<ReferenceLine> {
    let viewer_normal = viewer.planar()?.orientation.slice_normal;
    let source_normal = source.planar()?.orientation.slice_normal;
    let direction = viewer_normal.cross(source_normal);
    if direction.length_squared() < 1e-12 {
        return None;
    }
    let direction = direction.normalize();

    let volume = viewer.volume();
    let transform = volume.index_to_world();
    let (t_start, t_end) = clip_line_to_box(
        transform.to_index(point),
        transform.vector_to_index(direction),
        DVec3::ZERO,
        volume.geometry().max_index(),
    )?;

    Some(ReferenceLine {
        viewer_slot: viewer.slot(),
        source_slot: source.slot(),
        start: point + direction * t_start,
        end: point + direction * t_end,
    })
}
