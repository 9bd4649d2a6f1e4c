//! # MPR viewports
//!
//! This crate coordinates a set of synchronized viewports over one DICOM
//! volume: three orthogonal 2D slice views (axial, sagittal, coronal) and an
//! optional 3D volume rendering. The views share window/level, a crosshair
//! with reference lines, slab thickness and blend mode, and interaction tools.
//!
//! Rendering itself is left to a [`RenderBackend`]. The crate decides what
//! every surface shows; the backend builds the surfaces asynchronously and
//! reports each one ready through a completion token. A [`HeadlessBackend`]
//! that only records calls is included for tests and tooling.
//!
//! Volumes are loaded from DICOM files with [`VolumeLoader`], which decodes
//! slices in parallel using rayon and reads their placement, window hints and
//! modality.
//!
//! The crate assumes:
//!   - a single control thread (handles are `Rc`, futures are not `Send`)
//!   - one volume per layout, with at most one active labelmap
//!   - no multiframe images (the first frame of each file is used)
//!
//! # Examples
//!
//! ## Showing a DICOM series in an MPR layout
//!
//! ```no_run
//! # use mpr_viewports::{DatasetIdentity, HeadlessBackend, MemoryDatasetSource, MprViewer, SortBy, ViewerConfig, VolumeLoader};
//! # use std::rc::Rc;
//! # async fn run() -> mpr_viewports::Result<()> {
//! let volume = VolumeLoader::load_from_directory("dicom", SortBy::ImagePositionPatient)?;
//! let dataset = DatasetIdentity::new("1.2.840.1", "series-1");
//! let mut source = MemoryDatasetSource::new();
//! source.insert_volume(dataset.clone(), volume);
//!
//! let mut viewer = MprViewer::new(HeadlessBackend::default(), Rc::new(source), ViewerConfig::default());
//! viewer.mpr2d(&dataset).await?;
//! viewer.enable_3d_view().await?;
//! viewer.run_named("decreaseSlabThickness", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod barrier;
pub mod cache;
pub mod commands;
pub mod config;
pub mod crosshair;
pub mod dataset;
pub mod display;
pub mod enums;
pub mod error;
pub mod geometry;
pub mod headless;
pub mod interaction;
pub mod layout;
pub mod notify;
pub mod progressive;
pub mod registry;
pub mod render_object;
pub mod throttle;
pub mod viewer;
pub mod voi;
pub mod volume;
pub mod volume_loader;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{RenderBackend, RenderSurface, ViewportUid};
pub use commands::{Command, CommandName, CommandOutcome, CommandParams};
pub use config::ViewerConfig;
pub use dataset::{DatasetIdentity, DatasetSource, MemoryDatasetSource};
pub use enums::{BlendMode, InteractionTool, Orientation, SortBy, ViewportMode};
pub use error::{Result, ViewerError};
pub use headless::HeadlessBackend;
pub use layout::{GridShape, LayoutConfiguration, LayoutCoordinator};
pub use viewer::MprViewer;
pub use voi::VoiState;
pub use volume::Volume;
pub use volume_loader::VolumeLoader;
