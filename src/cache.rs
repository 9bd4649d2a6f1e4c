//! Construction-and-cache layer for volume and labelmap render objects.
//!
//! Entries are never evicted while the cache lives. A cache belongs to one
//! viewing session; [`RenderObjectCache::clear`] resets it at the session
//! boundary.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info};

use crate::config::VolumePropertyConfig;
use crate::dataset::{DatasetIdentity, DatasetSource, LabelmapData};
use crate::error::{Result, ViewerError};
use crate::render_object::{LabelmapRenderObject, VolumeRenderObject};

#[derive(Default)]
pub struct RenderObjectCache {
    property: VolumePropertyConfig,
    volumes: HashMap<DatasetIdentity, Rc<VolumeRenderObject>>,
    labelmaps: HashMap<(DatasetIdentity, usize), Rc<LabelmapRenderObject>>,
    volumes_constructed: usize,
    labelmaps_constructed: usize,
}

impl RenderObjectCache {
    pub fn new(property: VolumePropertyConfig) -> Self {
        Self {
            property,
            ..Default::default()
        }
    }

    /// Drop every cached object and reset the construction counters.
    pub fn clear(&mut self) {
        info!(
            volumes = self.volumes.len(),
            labelmaps = self.labelmaps.len(),
            "Clearing render object cache"
        );
        self.volumes.clear();
        self.labelmaps.clear();
        self.volumes_constructed = 0;
        self.labelmaps_constructed = 0;
    }

    pub fn get_or_create(
        &mut self,
        identity: &DatasetIdentity,
        source: &dyn DatasetSource,
    ) -> Result<Rc<VolumeRenderObject>> {
        if let Some(volume) = self.volumes.get(identity) {
            return Ok(Rc::clone(volume));
        }

        let image = source.volume(identity)?;
        let volume = Rc::new(VolumeRenderObject::new(
            identity.clone(),
            image,
            &self.property,
        ));
        let range = volume.display_range();
        debug!(
            dataset = %identity,
            lower = range.lower,
            upper = range.upper,
            "Constructed volume render object"
        );

        self.volumes.insert(identity.clone(), Rc::clone(&volume));
        self.volumes_constructed += 1;
        Ok(volume)
    }

    /// Fetch or build the labelmap for `identity`. The parent volume must
    /// already be cached and the buffer must cover exactly its voxel grid.
    pub fn get_or_create_labelmap(
        &mut self,
        identity: &DatasetIdentity,
        labelmap: &LabelmapData,
    ) -> Result<Rc<LabelmapRenderObject>> {
        let key = (identity.clone(), labelmap.index);
        if let Some(existing) = self.labelmaps.get(&key) {
            return Ok(Rc::clone(existing));
        }

        let parent = self.volumes.get(identity).ok_or_else(|| {
            ViewerError::GeometryMismatch(format!("no volume cached for {identity}"))
        })?;

        let (depth, height, width) = labelmap.buffer.dim();
        let [nx, ny, nz] = parent.geometry().dimensions;
        if (width, height, depth) != (nx, ny, nz) {
            return Err(ViewerError::GeometryMismatch(format!(
                "labelmap {} is {width}x{height}x{depth}, volume is {nx}x{ny}x{nz}",
                labelmap.index
            )));
        }

        let object = Rc::new(LabelmapRenderObject::new(
            parent,
            labelmap.index,
            Rc::clone(&labelmap.buffer),
            &labelmap.segments_hidden,
        ));
        debug!(dataset = %identity, index = labelmap.index, "Constructed labelmap render object");

        self.labelmaps.insert(key, Rc::clone(&object));
        self.labelmaps_constructed += 1;
        Ok(object)
    }

    pub fn volume(&self, identity: &DatasetIdentity) -> Option<&Rc<VolumeRenderObject>> {
        self.volumes.get(identity)
    }

    pub fn volumes_constructed(&self) -> usize {
        self.volumes_constructed
    }

    pub fn labelmaps_constructed(&self) -> usize {
        self.labelmaps_constructed
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty() && self.labelmaps.is_empty()
    }
}
