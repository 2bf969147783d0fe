//! AFNI three-letter orientation codes.
//!
//! AFNI names each voxel axis by the side it starts *from*: `RAI` means x runs
//! right-to-left, y anterior-to-posterior, z inferior-to-superior. NIfTI world
//! coordinates are RAS+, so an identity affine is `LPI` in AFNI terms.

use crate::nifti::Affine;
use std::fmt;

/// Anatomical side an axis starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Left.
    L,
    /// Right.
    R,
    /// Anterior.
    A,
    /// Posterior.
    P,
    /// Inferior.
    I,
    /// Superior.
    S,
}

impl Side {
    const fn as_char(self) -> char {
        match self {
            Self::L => 'L',
            Self::R => 'R',
            Self::A => 'A',
            Self::P => 'P',
            Self::I => 'I',
            Self::S => 'S',
        }
    }

    /// Side an axis pointing along `+world_axis` (RAS+) starts from, or the
    /// opposite side when `positive` is false.
    const fn origin(world_axis: usize, positive: bool) -> Self {
        match (world_axis, positive) {
            (0, true) => Self::L,
            (0, false) => Self::R,
            (1, true) => Self::P,
            (1, false) => Self::A,
            (_, true) => Self::I,
            (_, false) => Self::S,
        }
    }
}

/// Orientation of the three voxel axes, in AFNI convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(pub [Side; 3]);

impl Orientation {
    /// Target orientation for repaired VISTASOFT volumes.
    pub const LAI: Self = Self([Side::L, Side::A, Side::I]);

    /// Orientation of an unrotated RAS+ volume.
    pub const LPI: Self = Self([Side::L, Side::P, Side::I]);

    /// Closest axis-aligned orientation of `affine`.
    ///
    /// Each voxel axis is assigned the world axis its direction vector leans on
    /// most, taking axes with the strongest lean first. Returns `None` when a
    /// voxel axis has no direction (zero column).
    pub fn from_affine(affine: &Affine) -> Option<Self> {
        let column = |axis: usize| [affine[0][axis], affine[1][axis], affine[2][axis]];

        let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(9);
        for voxel_axis in 0..3 {
            let col = column(voxel_axis);
            let norm = col.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm == 0.0 || !norm.is_finite() {
                return None;
            }
            for (world_axis, v) in col.iter().enumerate() {
                candidates.push((v.abs() / norm, voxel_axis, world_axis));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut sides: [Option<Side>; 3] = [None; 3];
        let mut world_taken = [false; 3];
        for (_, voxel_axis, world_axis) in candidates {
            if sides[voxel_axis].is_some() || world_taken[world_axis] {
                continue;
            }
            let positive = column(voxel_axis)[world_axis] >= 0.0;
            sides[voxel_axis] = Some(Side::origin(world_axis, positive));
            world_taken[world_axis] = true;
        }

        Some(Self([sides[0]?, sides[1]?, sides[2]?]))
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for side in self.0 {
            write!(f, "{}", side.as_char())?;
        }
        Ok(())
    }
}
