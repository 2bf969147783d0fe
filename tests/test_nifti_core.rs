//! Tests for NIfTI loading and saving outside the correction rules,
//! including error conditions and the affine/sform reconciliation on save.

mod common;

use common::{file_bytes, vista_header, vista_qform, write_volume, MM_SEC};
use nifti_fixup::nifti::{self, NiftiHeader, NiftiImage, NiftiVersion, XformCode};
use nifti_fixup::Error;
use tempfile::TempDir;

fn scanner_volume() -> NiftiHeader {
    vista_header(XformCode::ScannerAnat, XformCode::ScannerAnat, MM_SEC, 2.0)
}

#[test]
fn test_load_invalid_magic_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.nii");
    let mut bytes = file_bytes(&scanner_volume());
    bytes[344..348].copy_from_slice(b"BAD!");
    std::fs::write(&path, bytes).unwrap();

    let err = nifti::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic(_)));
    assert!(err.to_string().contains("invalid NIfTI magic"));
}

#[test]
fn test_load_invalid_header_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.nii");
    let mut bytes = file_bytes(&scanner_volume());
    bytes[0..4].copy_from_slice(&1234i32.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    assert!(nifti::load(&path).is_err());
}

#[test]
fn test_load_pair_header_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pair.nii");
    let mut bytes = file_bytes(&scanner_volume());
    bytes[344..348].copy_from_slice(b"ni1\0");
    std::fs::write(&path, bytes).unwrap();

    let err = nifti::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidFileFormat(_)));
}

#[test]
fn test_load_truncated_voxels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.nii");
    let bytes = file_bytes(&scanner_volume());
    std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    let err = nifti::load(&path).unwrap_err();
    assert!(err.to_string().contains("truncated"));
}

#[test]
fn test_load_header_only_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("header.nii");
    std::fs::write(&path, scanner_volume().to_bytes()).unwrap();

    // Header alone parses; the full load needs the voxels
    assert!(nifti::load_header(&path).is_ok());
    assert!(nifti::load(&path).is_err());
}

#[test]
fn test_gzipped_matches_uncompressed() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("vol.nii");
    let packed = dir.path().join("vol.nii.gz");
    write_volume(&plain, &scanner_volume());
    write_volume(&packed, &scanner_volume());

    let a = nifti::load(&plain).unwrap();
    let b = nifti::load(&packed).unwrap();
    assert_eq!(a.header().to_bytes(), b.header().to_bytes());
    assert_eq!(a.payload(), b.payload());
    assert_eq!(a.affine(), b.affine());
}

#[test]
fn test_roundtrip_preserves_metadata() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.nii");
    let bytes = file_bytes(&scanner_volume());
    let image = NiftiImage::new(scanner_volume(), bytes[348..].to_vec()).unwrap();

    nifti::save(&image, &path).unwrap();
    let reloaded = nifti::load(&path).unwrap();
    let header = reloaded.header();

    assert_eq!(header.dim, [4, 4, 3, 2, 1, 1, 1]);
    assert_eq!(header.pixdim[1..5], [2.0, 2.0, 2.5, 2.0]);
    assert_eq!(header.descrip, "VISTASOFT");
    assert_eq!(header.xyzt_units.to_code(), MM_SEC);
    assert_eq!(header.qform_affine().unwrap(), vista_qform());
    assert_eq!(reloaded.payload(), &bytes[348..]);
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_new_image_rejects_short_payload() {
    let result = NiftiImage::new(scanner_volume(), vec![0u8; 16]);
    assert!(result.is_err());
}

#[test]
fn test_changed_affine_stored_as_sform() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.nii");
    let bytes = file_bytes(&scanner_volume());
    let mut image = NiftiImage::new(scanner_volume(), bytes[348..].to_vec()).unwrap();

    image.set_affine(vista_qform());
    nifti::save(&image, &path).unwrap();

    let header = nifti::load_header(&path).unwrap();
    assert_eq!(header.sform_affine(), vista_qform());
    assert_eq!(header.sform_code, XformCode::ScannerAnat);
}

#[test]
fn test_sform_edit_undone_by_stale_affine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.nii");
    let bytes = file_bytes(&scanner_volume());
    let mut image = NiftiImage::new(scanner_volume(), bytes[348..].to_vec()).unwrap();
    let stale = *image.affine();

    image.header_mut().set_sform(&vista_qform());
    nifti::save(&image, &path).unwrap();

    let header = nifti::load_header(&path).unwrap();
    assert_eq!(header.sform_affine(), stale);
    assert_eq!(header.srow_x, [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_nifti2_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("v2.nii");
    let mut header = NiftiHeader::new(NiftiVersion::Nifti2);
    header.ndim = 3;
    header.dim = [2, 2, 2, 1, 1, 1, 1];
    header.descrip = "wide".to_string();
    let payload: Vec<u8> = (0..36).collect();
    let image = NiftiImage::new(header, payload.clone()).unwrap();

    nifti::save(&image, &path).unwrap();
    let reloaded = nifti::load(&path).unwrap();
    assert_eq!(reloaded.header().version(), NiftiVersion::Nifti2);
    assert_eq!(reloaded.header().header_size(), 540);
    assert_eq!(reloaded.header().descrip, "wide");
    assert_eq!(reloaded.payload(), payload.as_slice());
}
