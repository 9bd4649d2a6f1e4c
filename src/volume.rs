use crate::enums::Orientation;
use crate::geometry::VolumeGeometry;

use glam::{DMat3, DVec3};
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;

/// Display hints read from the first image of a series.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageMetadata {
    pub window_width: Option<f64>,
    pub window_center: Option<f64>,
    pub modality: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Volume {
    pub data: Array3<u16>,
    pub spacing: (f32, f32, f32),
    pub origin: DVec3,
    pub direction: DMat3,
    pub metadata: ImageMetadata,
}

impl Volume {
    pub fn new(data: Array3<u16>, spacing: (f32, f32, f32)) -> Self {
        Self {
            data,
            spacing,
            origin: DVec3::ZERO,
            direction: DMat3::IDENTITY,
            metadata: ImageMetadata::default(),
        }
    }

    pub fn with_placement(mut self, origin: DVec3, direction: DMat3) -> Self {
        self.origin = origin;
        self.direction = direction;
        self
    }

    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    /// Grid geometry in (x, y, z) order.
    pub fn geometry(&self) -> VolumeGeometry {
        let (depth, height, width) = self.dim();
        let (x_spacing, y_spacing, z_spacing) = self.spacing;
        VolumeGeometry::new(
            [width, height, depth],
            DVec3::new(x_spacing as f64, y_spacing as f64, z_spacing as f64),
            self.origin,
            self.direction,
        )
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, u16>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}
