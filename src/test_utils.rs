//! Helpers shared by the unit tests: synthetic volumes and a ready MPR
//! layout on the headless backend.

use std::rc::Rc;

use futures::executor::block_on;
use ndarray::Array3;

use crate::cache::RenderObjectCache;
use crate::dataset::{DatasetIdentity, MemoryDatasetSource};
use crate::headless::HeadlessBackend;
use crate::layout::{LayoutConfiguration, LayoutCoordinator, TransitionRequest};
use crate::volume::{ImageMetadata, Volume};

pub use approx::assert_relative_eq;

pub fn dataset() -> DatasetIdentity {
    DatasetIdentity::new("1.2.840.99", "display-set-1")
}

/// CT volume of `(depth, height, width)` voxels with unit spacing and a
/// 400/40 window.
pub fn ct_volume(dim: (usize, usize, usize)) -> Volume {
    Volume::new(Array3::zeros(dim), (1.0, 1.0, 1.0)).with_metadata(ImageMetadata {
        window_width: Some(400.0),
        window_center: Some(40.0),
        modality: Some("CT".into()),
    })
}

pub fn source_with(volume: Volume) -> MemoryDatasetSource {
    let mut source = MemoryDatasetSource::new();
    source.insert_volume(dataset(), volume);
    source
}

pub struct MprFixture {
    pub coordinator: LayoutCoordinator<HeadlessBackend>,
    pub cache: RenderObjectCache,
    pub source: Rc<MemoryDatasetSource>,
}

impl MprFixture {
    pub fn new(source: MemoryDatasetSource) -> Self {
        let mut fixture = Self {
            coordinator: LayoutCoordinator::new(HeadlessBackend::default(), 0.1),
            cache: RenderObjectCache::default(),
            source: Rc::new(source),
        };
        fixture.transition(TransitionRequest::Replace(LayoutConfiguration::mpr()));
        fixture
    }

    pub fn transition(&mut self, request: TransitionRequest) {
        let source = Rc::clone(&self.source);
        block_on(self.coordinator.transition(
            &request,
            &dataset(),
            &*source,
            &mut self.cache,
        ))
        .expect("transition should complete on the immediate backend");
    }
}

/// Three-view MPR layout over a 12×10×8 CT volume.
pub fn mpr_fixture() -> MprFixture {
    MprFixture::new(source_with(ct_volume((8, 10, 12))))
}
