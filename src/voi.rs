use std::time::Duration;

use tracing::debug;
use web_time::Instant;

use crate::registry::ViewportRegistry;
use crate::throttle::Throttle;
use crate::volume::ImageMetadata;

const PET_MODALITY: &str = "PT";
/// PET volumes are shown as 0..5 SUV.
pub const PET_RANGE: DisplayRange = DisplayRange::new(0.0, 5.0);
pub const FALLBACK_RANGE: DisplayRange = DisplayRange::new(0.0, 512.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiState {
    pub window_width: f64,
    pub window_center: f64,
}

impl VoiState {
    pub fn new(window_width: f64, window_center: f64) -> Self {
        Self {
            window_width,
            window_center,
        }
    }
}

/// Scalar range mapped onto the transfer and opacity functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRange {
    pub lower: f64,
    pub upper: f64,
}

impl DisplayRange {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// Range shown for a window. PET always gets the SUV range; a NaN or infinite
/// width or center gets the fallback range.
pub fn derive_range(window_width: f64, window_center: f64, modality: Option<&str>) -> DisplayRange {
    if modality == Some(PET_MODALITY) {
        return PET_RANGE;
    }
    if !window_width.is_finite() || !window_center.is_finite() {
        return FALLBACK_RANGE;
    }
    DisplayRange::new(
        window_center - window_width / 2.0,
        window_center + window_width / 2.0,
    )
}

/// Display range for a volume from the window hints stored with its images.
pub fn range_from_metadata(metadata: &ImageMetadata) -> DisplayRange {
    derive_range(
        metadata.window_width.unwrap_or(f64::NAN),
        metadata.window_center.unwrap_or(f64::NAN),
        metadata.modality.as_deref(),
    )
}

/// Window settings currently shown by the 2D viewport a layout starts from.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceVoi {
    pub voi: VoiState,
    pub modality: Option<String>,
}

pub trait ReferenceViewport {
    fn current_voi(&self) -> Option<ReferenceVoi>;
}

/// Seed VOI for a synchronized layout. PET references and a missing
/// reference both yield `None`, leaving the volume's derived range in place.
pub fn seed_from_reference(reference: Option<&dyn ReferenceViewport>) -> Option<VoiState> {
    let Some(current) = reference.and_then(|reference| reference.current_voi()) else {
        debug!("No reference viewport to seed window/level from");
        return None;
    };
    if current.modality.as_deref() == Some(PET_MODALITY) {
        debug!("Reference viewport shows PET, keeping the fixed SUV range");
        return None;
    }
    Some(current.voi)
}

/// Owns current and default window/level and pushes them to every viewport.
pub struct VoiController {
    current: Option<VoiState>,
    default: Option<VoiState>,
    live: Throttle<VoiState>,
}

impl VoiController {
    pub fn new(throttle_interval: Duration) -> Self {
        Self {
            current: None,
            default: None,
            live: Throttle::new(throttle_interval),
        }
    }

    pub fn current(&self) -> Option<VoiState> {
        self.current
    }

    pub fn default_voi(&self) -> Option<VoiState> {
        self.default
    }

    pub fn set_default(&mut self, voi: Option<VoiState>) {
        self.default = voi;
    }

    /// Apply a VOI to every viewport, recording it as their initial VOI.
    pub fn propagate(&mut self, registry: &mut ViewportRegistry, voi: VoiState) {
        debug!(
            width = voi.window_width,
            center = voi.window_center,
            viewports = registry.len(),
            "Propagating window/level"
        );
        Self::apply(registry, voi, true);
        self.current = Some(voi);
    }

    /// Feed a value from a live window/level drag through the throttle.
    /// Returns whether the viewports were updated.
    pub fn offer_live(&mut self, registry: &mut ViewportRegistry, voi: VoiState, now: Instant) -> bool {
        self.current = Some(voi);
        match self.live.offer(voi, now) {
            Some(voi) => {
                Self::apply(registry, voi, false);
                true
            }
            None => false,
        }
    }

    /// Deliver the trailing live value if its interval has elapsed.
    pub fn poll_live(&mut self, registry: &mut ViewportRegistry, now: Instant) -> bool {
        match self.live.poll(now) {
            Some(voi) => {
                Self::apply(registry, voi, false);
                true
            }
            None => false,
        }
    }

    pub fn flush_live(&mut self, registry: &mut ViewportRegistry, now: Instant) -> bool {
        match self.live.flush(now) {
            Some(voi) => {
                Self::apply(registry, voi, false);
                true
            }
            None => false,
        }
    }

    pub fn live_deadline(&self) -> Option<Instant> {
        self.live.deadline()
    }

    fn apply(registry: &mut ViewportRegistry, voi: VoiState, record_initial: bool) {
        for handle in registry.iter_mut() {
            let range = derive_range(
                voi.window_width,
                voi.window_center,
                handle.volume().modality(),
            );
            handle.set_voi(voi, range, record_initial);
        }
    }
}
