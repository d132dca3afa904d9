use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::MorphError;

/// One of the six face neighbors, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    NegZ,
    NegY,
    NegX,
    PosX,
    PosY,
    PosZ,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::NegZ,
        Direction::NegY,
        Direction::NegX,
        Direction::PosX,
        Direction::PosY,
        Direction::PosZ,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::NegZ => 0,
            Direction::NegY => 1,
            Direction::NegX => 2,
            Direction::PosX => 3,
            Direction::PosY => 4,
            Direction::PosZ => 5,
        }
    }
}

/// Which axes neighbor lookups may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    pub const ALL: AxisMask = AxisMask {
        x: true,
        y: true,
        z: true,
    };

    pub const NONE: AxisMask = AxisMask {
        x: false,
        y: false,
        z: false,
    };

    pub fn allows(&self, direction: Direction) -> bool {
        match direction {
            Direction::NegX | Direction::PosX => self.x,
            Direction::NegY | Direction::PosY => self.y,
            Direction::NegZ | Direction::PosZ => self.z,
        }
    }
}

impl Default for AxisMask {
    fn default() -> Self {
        AxisMask::ALL
    }
}

/// Placement of a regular voxel grid in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageGeometry {
    pub dims: [usize; 3],
    pub origin: Vec3,
    pub spacing: Vec3,
}

impl ImageGeometry {
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            origin: Vec3::ZERO,
            spacing: Vec3::ONE,
        }
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_spacing(mut self, spacing: Vec3) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn voxel_center(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.origin + (Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5)) * self.spacing
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        let extent = Vec3::new(
            self.dims[0] as f32,
            self.dims[1] as f32,
            self.dims[2] as f32,
        ) * self.spacing;
        let corner = self.origin + extent;
        (self.origin.min(corner), self.origin.max(corner))
    }
}

/// Read-only index arithmetic over a structured grid with x varying fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelGrid {
    dims: [usize; 3],
    axes: AxisMask,
    offsets: [isize; 6],
}

impl VoxelGrid {
    pub fn new(dims: [usize; 3], axes: AxisMask) -> Result<Self, MorphError> {
        if dims.iter().any(|&dim| dim == 0) {
            return Err(MorphError::InvalidConfiguration(format!(
                "grid dimensions must be at least 1, got {:?}",
                dims
            )));
        }
        let nx = dims[0] as isize;
        let slab = (dims[0] * dims[1]) as isize;
        Ok(Self {
            dims,
            axes,
            offsets: [-slab, -nx, -1, 1, nx, slab],
        })
    }

    pub fn from_geometry(geometry: &ImageGeometry, axes: AxisMask) -> Result<Self, MorphError> {
        Self::new(geometry.dims, axes)
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn axes(&self) -> AxisMask {
        self.axes
    }

    pub fn neighbor_offsets(&self) -> [isize; 6] {
        self.offsets
    }

    pub fn voxel_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn slab_len(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.dims[0] * self.dims[1] + y * self.dims[0] + x
    }

    pub fn decompose(&self, index: usize) -> (usize, usize, usize) {
        let nx = self.dims[0];
        let ny = self.dims[1];
        (index % nx, (index / nx) % ny, index / (nx * ny))
    }

    /// True when stepping in `direction` leaves the grid or crosses a disabled axis.
    pub fn is_boundary(&self, direction: Direction, x: usize, y: usize, z: usize) -> bool {
        if !self.axes.allows(direction) {
            return true;
        }
        match direction {
            Direction::NegZ => z == 0,
            Direction::NegY => y == 0,
            Direction::NegX => x == 0,
            Direction::PosX => x + 1 == self.dims[0],
            Direction::PosY => y + 1 == self.dims[1],
            Direction::PosZ => z + 1 == self.dims[2],
        }
    }

    pub fn neighbor_at(
        &self,
        index: usize,
        direction: Direction,
        x: usize,
        y: usize,
        z: usize,
    ) -> Option<usize> {
        if self.is_boundary(direction, x, y, z) {
            return None;
        }
        Some(index.wrapping_add_signed(self.offsets[direction.index()]))
    }

    pub fn neighbor(&self, index: usize, direction: Direction) -> Option<usize> {
        let (x, y, z) = self.decompose(index);
        self.neighbor_at(index, direction, x, y, z)
    }

    /// Unblocked neighbors of the voxel at `(x, y, z)`, in `Direction::ALL` order.
    pub fn neighbors(
        &self,
        index: usize,
        x: usize,
        y: usize,
        z: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |direction| self.neighbor_at(index, direction, x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{AxisMask, Direction, ImageGeometry, VoxelGrid};

    #[test]
    fn offsets_follow_scan_order() {
        let grid = VoxelGrid::new([4, 3, 2], AxisMask::ALL).unwrap();
        assert_eq!(grid.neighbor_offsets(), [-12, -4, -1, 1, 4, 12]);
        assert_eq!(grid.voxel_count(), 24);
    }

    #[test]
    fn decompose_inverts_linear_index() {
        let grid = VoxelGrid::new([4, 3, 2], AxisMask::ALL).unwrap();
        for index in 0..grid.voxel_count() {
            let (x, y, z) = grid.decompose(index);
            assert_eq!(grid.linear_index(x, y, z), index);
        }
        assert_eq!(grid.decompose(17), (1, 1, 1));
    }

    #[test]
    fn boundary_faces_map_to_directions() {
        let grid = VoxelGrid::new([3, 3, 3], AxisMask::ALL).unwrap();
        assert!(grid.is_boundary(Direction::NegZ, 1, 1, 0));
        assert!(grid.is_boundary(Direction::PosZ, 1, 1, 2));
        assert!(grid.is_boundary(Direction::NegY, 1, 0, 1));
        assert!(grid.is_boundary(Direction::PosY, 1, 2, 1));
        assert!(grid.is_boundary(Direction::NegX, 0, 1, 1));
        assert!(grid.is_boundary(Direction::PosX, 2, 1, 1));
        for direction in Direction::ALL {
            assert!(!grid.is_boundary(direction, 1, 1, 1));
        }
    }

    #[test]
    fn disabled_axis_blocks_interior_steps() {
        let grid = VoxelGrid::new(
            [3, 3, 3],
            AxisMask {
                x: true,
                y: false,
                z: true,
            },
        )
        .unwrap();
        let center = grid.linear_index(1, 1, 1);
        let found: Vec<usize> = grid.neighbors(center, 1, 1, 1).collect();
        assert_eq!(found, vec![center - 9, center - 1, center + 1, center + 9]);
        assert_eq!(grid.neighbor(center, Direction::PosY), None);
    }

    #[test]
    fn single_slice_has_no_z_neighbors() {
        let grid = VoxelGrid::new([3, 3, 1], AxisMask::ALL).unwrap();
        let found: Vec<usize> = grid.neighbors(1, 1, 0, 0).collect();
        assert_eq!(found, vec![0, 2, 4]);
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(VoxelGrid::new([3, 0, 1], AxisMask::ALL).is_err());
    }

    #[test]
    fn geometry_bounds_and_centers() {
        let geometry = ImageGeometry::new([2, 4, 1])
            .with_origin(Vec3::new(1.0, 0.0, -1.0))
            .with_spacing(Vec3::new(0.5, 0.5, 2.0));
        let (min, max) = geometry.bounds();
        assert_eq!(min, Vec3::new(1.0, 0.0, -1.0));
        assert_eq!(max, Vec3::new(2.0, 2.0, 1.0));
        assert_eq!(geometry.voxel_center(1, 0, 0), Vec3::new(1.75, 0.25, 0.0));
        assert_eq!(geometry.voxel_count(), 8);
    }
}
