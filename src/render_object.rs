use std::rc::Rc;

use ndarray::Array3;

use crate::config::VolumePropertyConfig;
use crate::dataset::DatasetIdentity;
use crate::geometry::{IndexToWorld, VolumeGeometry};
use crate::voi::{DisplayRange, range_from_metadata};
use crate::volume::Volume;

/// A transfer-function control point: scalar value and output value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoint {
    pub value: f64,
    pub output: f64,
}

/// Rendering properties of a volume: grey ramp and linear opacity over the
/// display range plus shading and sampling parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeProperty {
    pub color_points: Vec<ControlPoint>,
    pub opacity_points: Vec<ControlPoint>,
    pub linear_interpolation: bool,
    pub shade: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
    pub scalar_opacity_unit_distance: f64,
    pub gradient_opacity_range: (f64, f64),
    pub sample_distance: f64,
    pub max_samples_per_ray: u32,
}

impl VolumeProperty {
    fn new(range: DisplayRange, geometry: &VolumeGeometry, config: &VolumePropertyConfig) -> Self {
        let ramp = vec![
            ControlPoint {
                value: range.lower,
                output: 0.0,
            },
            ControlPoint {
                value: range.upper,
                output: 1.0,
            },
        ];
        Self {
            color_points: ramp.clone(),
            opacity_points: ramp,
            linear_interpolation: true,
            shade: true,
            ambient: config.ambient,
            diffuse: config.diffuse,
            specular: config.specular,
            specular_power: config.specular_power,
            scalar_opacity_unit_distance: config.scalar_opacity_unit_distance,
            gradient_opacity_range: (
                config.gradient_opacity_min_value,
                config.gradient_opacity_max_value,
            ),
            // Half the mean voxel side length.
            sample_distance: geometry.spacing.element_sum() / 6.0,
            max_samples_per_ray: config.max_samples_per_ray,
        }
    }
}

/// Renderable volume built once per dataset identity.
#[derive(Debug)]
pub struct VolumeRenderObject {
    identity: DatasetIdentity,
    image: Rc<Volume>,
    geometry: VolumeGeometry,
    index_to_world: IndexToWorld,
    display_range: DisplayRange,
    property: VolumeProperty,
}

impl VolumeRenderObject {
    pub fn new(identity: DatasetIdentity, image: Rc<Volume>, config: &VolumePropertyConfig) -> Self {
        let geometry = image.geometry();
        let index_to_world = geometry.index_to_world();
        let display_range = range_from_metadata(&image.metadata);
        let property = VolumeProperty::new(display_range, &geometry, config);
        Self {
            identity,
            image,
            geometry,
            index_to_world,
            display_range,
            property,
        }
    }

    pub fn identity(&self) -> &DatasetIdentity {
        &self.identity
    }

    pub fn image(&self) -> &Volume {
        &self.image
    }

    pub fn scalars(&self) -> &Array3<u16> {
        self.image.data()
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn index_to_world(&self) -> &IndexToWorld {
        &self.index_to_world
    }

    pub fn display_range(&self) -> DisplayRange {
        self.display_range
    }

    pub fn property(&self) -> &VolumeProperty {
        &self.property
    }

    pub fn modality(&self) -> Option<&str> {
        self.image.metadata.modality.as_deref()
    }
}

/// Segmentation mask sharing its parent volume's voxel grid.
#[derive(Debug)]
pub struct LabelmapRenderObject {
    identity: DatasetIdentity,
    labelmap_index: usize,
    geometry: VolumeGeometry,
    buffer: Rc<Array3<u16>>,
    segments_visible: Vec<bool>,
}

impl LabelmapRenderObject {
    pub(crate) fn new(
        parent: &VolumeRenderObject,
        labelmap_index: usize,
        buffer: Rc<Array3<u16>>,
        segments_hidden: &[bool],
    ) -> Self {
        Self {
            identity: parent.identity.clone(),
            labelmap_index,
            geometry: parent.geometry.clone(),
            buffer,
            segments_visible: segments_hidden.iter().map(|hidden| !hidden).collect(),
        }
    }

    pub fn identity(&self) -> &DatasetIdentity {
        &self.identity
    }

    pub fn labelmap_index(&self) -> usize {
        self.labelmap_index
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn buffer(&self) -> &Array3<u16> {
        &self.buffer
    }

    /// Default visibility per segment, derived from the hidden flags.
    pub fn segments_visible(&self) -> &[bool] {
        &self.segments_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::ImageMetadata;

    fn ct_volume() -> Rc<Volume> {
        Rc::new(
            Volume::new(Array3::zeros((6, 4, 2)), (1.0, 2.0, 3.0)).with_metadata(ImageMetadata {
                window_width: Some(400.0),
                window_center: Some(40.0),
                modality: Some("CT".into()),
            }),
        )
    }

    #[test]
    fn transfer_functions_span_the_display_range() {
        let object = VolumeRenderObject::new(
            DatasetIdentity::new("s", "d"),
            ct_volume(),
            &VolumePropertyConfig::default(),
        );
        assert_eq!(object.display_range(), DisplayRange::new(-160.0, 240.0));
        let property = object.property();
        assert_eq!(property.color_points[0].value, -160.0);
        assert_eq!(property.opacity_points[1].value, 240.0);
        assert_eq!(property.opacity_points[1].output, 1.0);
        assert_eq!(property.sample_distance, 1.0);
        assert_eq!(property.max_samples_per_ray, 4000);
    }

    #[test]
    fn labelmap_inverts_hidden_flags() {
        let parent = VolumeRenderObject::new(
            DatasetIdentity::new("s", "d"),
            ct_volume(),
            &VolumePropertyConfig::default(),
        );
        let labelmap =
            LabelmapRenderObject::new(&parent, 0, Rc::new(Array3::zeros((6, 4, 2))), &[false, true]);
        assert_eq!(labelmap.segments_visible(), &[true, false]);
        assert_eq!(labelmap.geometry(), parent.geometry());
    }
}
