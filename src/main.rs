use std::path::PathBuf;
use std::rc::Rc;

use mpr_viewports::{
    CommandParams, DatasetIdentity, HeadlessBackend, MemoryDatasetSource, MprViewer, Orientation,
    SortBy, ViewerConfig, VolumeLoader,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> mpr_viewports::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mpr_viewports=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let directory = args.next().map_or_else(|| PathBuf::from("dicom"), PathBuf::from);
    let config = match args.next() {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let volume = VolumeLoader::load_from_directory(&directory, SortBy::ImagePositionPatient)?;
    let (depth, height, width) = volume.dim();
    if let Some(slice) = volume.get_slice_from_axis(depth / 2, &Orientation::Axial) {
        let peak = slice.iter().copied().max().unwrap_or_default();
        info!(width, height, depth, peak, "Loaded volume");
    }

    let dataset = DatasetIdentity::new(directory.display().to_string(), "series");
    let mut source = MemoryDatasetSource::new();
    source.insert_volume(dataset.clone(), volume);

    let mut viewer = MprViewer::new(HeadlessBackend::default(), Rc::new(source), config);
    viewer.mpr2d(&dataset).await?;
    viewer.enable_3d_view().await?;

    for name in ["enableLevelTool", "setBlendModeToMaximumIntensity", "increaseSlabThickness"] {
        let outcome = viewer.run_named(name, &CommandParams::default()).await?;
        info!(command = name, ?outcome, "Command finished");
    }

    for handle in viewer.registry().iter() {
        info!(
            slot = handle.slot(),
            uid = %handle.uid(),
            mode = ?handle.mode(),
            slab = handle.planar().map(|state| state.slab_thickness),
            "Viewport"
        );
    }
    if let Some(point) = viewer.crosshair().point() {
        info!(x = point.x, y = point.y, z = point.z, "Crosshair");
    }

    viewer.end_session();
    Ok(())
}
