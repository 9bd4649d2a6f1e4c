use crate::{
    enums::SortBy,
    volume::{ImageMetadata, Volume},
};

use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use glam::{DMat3, DVec3};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{fs, path::Path};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// A decoded slice together with its sort key and placement tags.
struct DecodedSlice {
    order: Option<f32>,
    position: Option<DVec3>,
    image: Array2<u16>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// Slices are decoded in parallel, sorted, and stacked. The origin is the
    /// position of the first slice after sorting; window center/width and
    /// modality come from the first object.
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut slices: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_slices(&mut slices, sort_by);

        let images: Vec<_> = slices.iter().map(|slice| &slice.image).collect();
        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);
        let spacing = Self::get_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;

        let positions: Vec<_> = slices.iter().filter_map(|slice| slice.position).collect();
        let origin = positions.first().copied().unwrap_or(DVec3::ZERO);
        let cosines = dicom_objects.iter().find_map(Self::get_orientation);
        let direction = Self::direction_from_orientation(cosines, &positions);
        let metadata = dicom_objects
            .first()
            .map(Self::get_metadata)
            .unwrap_or_default();

        info!(
            slices = slices.len(),
            modality = metadata.modality.as_deref().unwrap_or("unknown"),
            "Volume assembled from DICOM objects"
        );

        Ok(Volume::new(volume_array, spacing)
            .with_placement(origin, direction)
            .with_metadata(metadata))
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<Volume, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        debug!(files = paths.len(), "Reading DICOM directory");
        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_slice(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<DecodedSlice> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image = Self::decode_image(dicom_object)?;
        let position = Self::get_position(dicom_object);
        Some(DecodedSlice {
            order,
            position,
            image,
        })
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<DVec3> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        (pos.len() == 3).then(|| DVec3::new(pos[0], pos[1], pos[2]))
    }

    fn get_orientation(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<[f64; 6]> {
        let cosines = dicom_object
            .element(tags::IMAGE_ORIENTATION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        cosines.try_into().ok()
    }

    fn get_metadata(dicom_object: &FileDicomObject<InMemDicomObject>) -> ImageMetadata {
        let first_float = |tag: Tag| -> Option<f64> {
            dicom_object
                .element(tag)
                .ok()?
                .to_multi_float64()
                .ok()?
                .first()
                .copied()
        };
        let modality = dicom_object
            .element(tags::MODALITY)
            .ok()
            .and_then(|element| element.to_str().ok())
            .map(|modality| modality.trim().to_string());

        ImageMetadata {
            window_width: first_float(tags::WINDOW_WIDTH),
            window_center: first_float(tags::WINDOW_CENTER),
            modality,
        }
    }

    /// Build direction cosines from Image Orientation (Patient). The slice
    /// axis follows the stacking order of the slice positions when at least
    /// two distinct positions are known.
    fn direction_from_orientation(cosines: Option<[f64; 6]>, positions: &[DVec3]) -> DMat3 {
        let Some(cosines) = cosines else {
            return DMat3::IDENTITY;
        };
        let row = DVec3::new(cosines[0], cosines[1], cosines[2]).normalize_or_zero();
        let column = DVec3::new(cosines[3], cosines[4], cosines[5]).normalize_or_zero();
        let stacked = match (positions.first(), positions.last()) {
            (Some(first), Some(last)) if first != last => (*last - *first).normalize_or_zero(),
            _ => DVec3::ZERO,
        };
        let normal = if stacked == DVec3::ZERO {
            row.cross(column)
        } else {
            stacked
        };
        DMat3::from_cols(row, column, normal)
    }

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<u16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [DecodedSlice], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            slices.reverse();
        }
    }

    fn validate_dimensions(images: &[&Array2<u16>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[&Array2<u16>]) -> Array3<u16> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<u16>::zeros((depth, height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(*image);
        }

        volume
    }

    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f32, f32, f32)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float32()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float32()
                .ok()?;

            Some((pixel_spacing[0], pixel_spacing[1], slice_thickness))
        })
    }
}
