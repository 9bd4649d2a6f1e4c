use std::fmt;

use glam::DVec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

impl Orientation {
    /// Slice normal and view-up of the standard patient planes.
    pub fn slice_orientation(self) -> SliceOrientation {
        match self {
            Orientation::Axial => SliceOrientation::new(DVec3::Z, DVec3::NEG_Y),
            Orientation::Sagittal => SliceOrientation::new(DVec3::X, DVec3::Z),
            Orientation::Coronal => SliceOrientation::new(DVec3::Y, DVec3::Z),
        }
    }
}

/// Orientation of a planar viewport's slice plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceOrientation {
    pub slice_normal: DVec3,
    pub view_up: DVec3,
}

impl SliceOrientation {
    pub fn new(slice_normal: DVec3, view_up: DVec3) -> Self {
        Self {
            slice_normal,
            view_up,
        }
    }
}

impl From<Orientation> for SliceOrientation {
    fn from(orientation: Orientation) -> Self {
        orientation.slice_orientation()
    }
}

/// Render-mode discriminant of a viewport slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewportMode {
    Planar2D,
    Volumetric3D,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Composite,
    MaximumIntensity,
    MinimumIntensity,
    AverageIntensity,
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlendMode::Composite => "Composite",
            BlendMode::MaximumIntensity => "Maximum Intensity",
            BlendMode::MinimumIntensity => "Minimum Intensity",
            BlendMode::AverageIntensity => "Average Intensity",
        };
        f.write_str(name)
    }
}

/// Interaction tool bound to the planar viewports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InteractionTool {
    Rotate,
    #[default]
    Crosshair,
    WindowLevel,
}

#[derive(Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
