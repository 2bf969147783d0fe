//! Shared fixtures: small VISTASOFT-style volumes written to disk.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use nifti_fixup::nifti::{Affine, NiftiHeader, XformCode, XyztUnits};
use std::io::Write;
use std::path::Path;

pub const MICRON_RADS: i32 = 0x03 | 0x30;
pub const MM_SEC: i32 = 0x02 | 0x08;

/// 4x4x3 volumes, 2 timepoints, float32.
pub const SHAPE: [i64; 4] = [4, 4, 3, 2];

/// Header with an identity-rotation qform and the all-ones sform VISTASOFT writes.
pub fn vista_header(qform: XformCode, sform: XformCode, units: i32, tr: f64) -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.ndim = 4;
    header.dim = [SHAPE[0], SHAPE[1], SHAPE[2], SHAPE[3], 1, 1, 1];
    header.pixdim = [1.0, 2.0, 2.0, 2.5, tr, 0.0, 0.0, 0.0];
    header.descrip = "VISTASOFT".to_string();
    header.qform_code = qform;
    header.sform_code = sform;
    header.quatern = [0.0, 0.0, 0.0];
    header.qoffset = [-90.0, -126.0, -72.0];
    header.srow_x = [1.0, 1.0, 1.0, 1.0];
    header.srow_y = [1.0, 1.0, 1.0, 1.0];
    header.srow_z = [1.0, 1.0, 1.0, 1.0];
    header.xyzt_units = XyztUnits::from_code(units);
    header
}

/// The affine `vista_header`'s quaternion fields describe.
pub fn vista_qform() -> Affine {
    [
        [2.0, 0.0, 0.0, -90.0],
        [0.0, 2.0, 0.0, -126.0],
        [0.0, 0.0, 2.5, -72.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Header, empty extension flag and a ramp of voxel values.
pub fn file_bytes(header: &NiftiHeader) -> Vec<u8> {
    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    let voxels: i64 = SHAPE.iter().product();
    for i in 0..voxels {
        bytes.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
    }
    bytes
}

/// Write `header` plus payload, gzipped when the path ends in `.gz`.
pub fn write_volume(path: &Path, header: &NiftiHeader) -> Vec<u8> {
    let bytes = file_bytes(header);
    if path.extension().is_some_and(|e| e == "gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        std::fs::write(path, encoder.finish().unwrap()).unwrap();
    } else {
        std::fs::write(path, &bytes).unwrap();
    }
    bytes
}
