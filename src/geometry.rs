use glam::{DMat3, DMat4, DVec3};

/// Voxel grid placement in patient (world) space.
///
/// `dimensions` is ordered (nx, ny, nz), i.e. (width, height, depth). The
/// columns of `direction` are the world directions of the i, j and k axes.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeGeometry {
    pub dimensions: [usize; 3],
    pub spacing: DVec3,
    pub origin: DVec3,
    pub direction: DMat3,
}

impl VolumeGeometry {
    pub fn new(dimensions: [usize; 3], spacing: DVec3, origin: DVec3, direction: DMat3) -> Self {
        Self {
            dimensions,
            spacing,
            origin,
            direction,
        }
    }

    /// Axis-aligned geometry with the origin at zero.
    pub fn axis_aligned(dimensions: [usize; 3], spacing: DVec3) -> Self {
        Self::new(dimensions, spacing, DVec3::ZERO, DMat3::IDENTITY)
    }

    pub fn voxel_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    pub fn index_to_world(&self) -> IndexToWorld {
        IndexToWorld::from_geometry(self)
    }

    /// Largest valid index along every axis, as a point.
    pub fn max_index(&self) -> DVec3 {
        let [nx, ny, nz] = self.dimensions;
        DVec3::new(
            nx.saturating_sub(1) as f64,
            ny.saturating_sub(1) as f64,
            nz.saturating_sub(1) as f64,
        )
    }

    /// World position of the grid's centre point.
    pub fn center(&self) -> DVec3 {
        self.index_to_world().to_world(self.max_index() * 0.5)
    }
}

/// Affine map from continuous voxel index coordinates to world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexToWorld {
    matrix: DMat4,
    inverse: DMat4,
}

impl IndexToWorld {
    pub fn from_geometry(geometry: &VolumeGeometry) -> Self {
        let scaled = geometry.direction * DMat3::from_diagonal(geometry.spacing);
        let matrix = DMat4::from_cols(
            scaled.x_axis.extend(0.0),
            scaled.y_axis.extend(0.0),
            scaled.z_axis.extend(0.0),
            geometry.origin.extend(1.0),
        );
        Self::from_matrix(matrix)
    }

    pub fn from_matrix(matrix: DMat4) -> Self {
        Self {
            matrix,
            inverse: matrix.inverse(),
        }
    }

    pub fn matrix(&self) -> &DMat4 {
        &self.matrix
    }

    pub fn to_world(&self, index: DVec3) -> DVec3 {
        self.matrix.transform_point3(index)
    }

    pub fn to_index(&self, world: DVec3) -> DVec3 {
        self.inverse.transform_point3(world)
    }

    pub fn vector_to_index(&self, world: DVec3) -> DVec3 {
        self.inverse.transform_vector3(world)
    }
}

/// Clip the parametric line `point + t * direction` against the box
/// `[min, max]`, returning the parameter interval inside the box.
pub fn clip_line_to_box(point: DVec3, direction: DVec3, min: DVec3, max: DVec3) -> Option<(f64, f64)> {
    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;

    for axis in 0..3 {
        let (p, d, lo, hi) = (point[axis], direction[axis], min[axis], max[axis]);
        if d.abs() < f64::EPSILON {
            if p < lo || p > hi {
                return None;
            }
            continue;
        }
        let (t0, t1) = ((lo - p) / d, (hi - p) / d);
        let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
        if t_enter > t_exit {
            return None;
        }
    }

    Some((t_enter, t_exit))
}
