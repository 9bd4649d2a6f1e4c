#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use mpr_viewports::headless::CompletionOrder;
use mpr_viewports::notify::{Notification, NotificationSink};
use mpr_viewports::volume::ImageMetadata;
use mpr_viewports::voi::{ReferenceViewport, ReferenceVoi};
use mpr_viewports::{
    DatasetIdentity, HeadlessBackend, MemoryDatasetSource, MprViewer, ViewerConfig, VoiState,
    Volume,
};
use ndarray::Array3;

pub fn dataset() -> DatasetIdentity {
    DatasetIdentity::new("1.3.6.1.4.1.5962", "display-set-ct")
}

/// Volume of `(depth, height, width)` voxels with the given modality and
/// window hints.
pub fn volume(dim: (usize, usize, usize), modality: &str, window: Option<(f64, f64)>) -> Volume {
    Volume::new(Array3::zeros(dim), (0.8, 0.8, 2.0)).with_metadata(ImageMetadata {
        window_width: window.map(|(width, _)| width),
        window_center: window.map(|(_, center)| center),
        modality: Some(modality.to_string()),
    })
}

pub fn ct_volume() -> Volume {
    volume((16, 24, 32), "CT", Some((400.0, 40.0)))
}

/// A CT volume whose frame `frame` holds a 2×3 block of `label` starting at
/// column 4, row 6.
pub fn labelmap_buffer(dim: (usize, usize, usize), frame: usize, label: u16) -> Array3<u16> {
    let mut buffer = Array3::zeros(dim);
    for row in 6..8 {
        for column in 4..7 {
            buffer[[frame, row, column]] = label;
        }
    }
    buffer
}

pub fn source_with(volume: Volume) -> MemoryDatasetSource {
    let mut source = MemoryDatasetSource::new();
    source.insert_volume(dataset(), volume);
    source
}

pub fn viewer(source: MemoryDatasetSource) -> MprViewer<HeadlessBackend> {
    viewer_with(source, CompletionOrder::Immediate)
}

pub fn viewer_with(source: MemoryDatasetSource, order: CompletionOrder) -> MprViewer<HeadlessBackend> {
    MprViewer::new(
        HeadlessBackend::new(order),
        Rc::new(source),
        ViewerConfig::default(),
    )
}

/// Reference 2D viewport showing a fixed window.
pub struct FixedReference {
    pub voi: VoiState,
    pub modality: &'static str,
}

impl ReferenceViewport for FixedReference {
    fn current_voi(&self) -> Option<ReferenceVoi> {
        Some(ReferenceVoi {
            voi: self.voi,
            modality: Some(self.modality.to_string()),
        })
    }
}

/// Sink that keeps every notification it is shown.
#[derive(Clone, Default)]
pub struct CollectingSink(pub Rc<RefCell<Vec<Notification>>>);

impl NotificationSink for CollectingSink {
    fn show(&mut self, notification: &Notification) {
        self.0.borrow_mut().push(notification.clone());
    }
}
