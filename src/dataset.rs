use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use ndarray::Array3;

use crate::error::{Result, ViewerError};
use crate::progressive::{LoadFeed, LoadStatus};
use crate::volume::Volume;

/// Identifies one loaded series/volume. Immutable once assigned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetIdentity {
    pub study_uid: String,
    pub display_set_uid: String,
    pub instance_uid: Option<String>,
    pub frame_index: Option<u32>,
}

impl DatasetIdentity {
    pub fn new(study_uid: impl Into<String>, display_set_uid: impl Into<String>) -> Self {
        Self {
            study_uid: study_uid.into(),
            display_set_uid: display_set_uid.into(),
            instance_uid: None,
            frame_index: None,
        }
    }

    pub fn with_instance(mut self, instance_uid: impl Into<String>, frame_index: u32) -> Self {
        self.instance_uid = Some(instance_uid.into());
        self.frame_index = Some(frame_index);
        self
    }
}

impl fmt::Display for DatasetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.study_uid, self.display_set_uid)?;
        if let Some(instance) = &self.instance_uid {
            write!(f, "/{instance}")?;
        }
        if let Some(frame) = self.frame_index {
            write!(f, "#{frame}")?;
        }
        Ok(())
    }
}

/// Segmentation state attached to a dataset: the active labelmap's voxel
/// buffer in (depth, height, width) order and its per-segment hidden flags.
#[derive(Clone, Debug)]
pub struct LabelmapData {
    pub index: usize,
    pub buffer: Rc<Array3<u16>>,
    pub segments_hidden: Vec<bool>,
}

/// Where image data, segmentations and loading progress come from.
pub trait DatasetSource {
    fn volume(&self, identity: &DatasetIdentity) -> Result<Rc<Volume>>;

    fn active_labelmap(&self, identity: &DatasetIdentity) -> Option<LabelmapData>;

    fn begin_load(&self, _identity: &DatasetIdentity) -> LoadStatus {
        LoadStatus::loaded()
    }
}

/// Dataset source backed by volumes that are already in memory.
#[derive(Default)]
pub struct MemoryDatasetSource {
    volumes: HashMap<DatasetIdentity, Rc<Volume>>,
    labelmaps: HashMap<DatasetIdentity, LabelmapData>,
    feeds: HashMap<DatasetIdentity, LoadFeed>,
}

impl MemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_volume(&mut self, identity: DatasetIdentity, volume: Volume) {
        self.volumes.insert(identity, Rc::new(volume));
    }

    pub fn set_labelmap(&mut self, identity: DatasetIdentity, labelmap: LabelmapData) {
        self.labelmaps.insert(identity, labelmap);
    }

    /// Mark a dataset as still loading; the returned feed drives its events.
    pub fn load_progressively(&mut self, identity: DatasetIdentity, total_frames: usize) -> LoadFeed {
        let feed = LoadFeed::new(total_frames);
        self.feeds.insert(identity, feed.clone());
        feed
    }
}

impl DatasetSource for MemoryDatasetSource {
    fn volume(&self, identity: &DatasetIdentity) -> Result<Rc<Volume>> {
        self.volumes
            .get(identity)
            .cloned()
            .ok_or_else(|| ViewerError::UnknownDataset(identity.clone()))
    }

    fn active_labelmap(&self, identity: &DatasetIdentity) -> Option<LabelmapData> {
        self.labelmaps.get(identity).cloned()
    }

    fn begin_load(&self, identity: &DatasetIdentity) -> LoadStatus {
        self.feeds
            .get(identity)
            .map(LoadFeed::subscribe)
            .unwrap_or_else(LoadStatus::loaded)
    }
}
