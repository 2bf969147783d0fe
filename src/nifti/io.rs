//! NIfTI file I/O.
//!
//! - Memory-mapped reading for uncompressed `.nii`
//! - Streaming gzip decode/encode for `.nii.gz`
//! - Writes go to a temporary file next to the destination and are renamed
//!   into place, so a failed save never leaves a partial file behind and the
//!   destination may be the file the image was loaded from

use super::header::NiftiHeader;
use super::image::NiftiImage;
use crate::error::{Error, Result};
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use memmap2::Mmap;
use std::fs::{File, Permissions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const GZIP_BUFFER_SIZE: usize = 256 * 1024; // 256KB buffer for streaming (de)compression

/// Load a NIfTI image from file.
///
/// Supports both `.nii` and `.nii.gz` formats; gzip is chosen by extension.
///
/// # Example
/// ```ignore
/// let img = nifti_fixup::nifti::load("bold.nii.gz")?;
/// println!("{:?}", img.header().xyzt_units);
/// ```
#[must_use = "this function returns a loaded image that should be used"]
pub fn load<P: AsRef<Path>>(path: P) -> Result<NiftiImage> {
    let path = path.as_ref();
    if is_gzipped(path) {
        load_gzipped(path)
    } else {
        load_uncompressed(path)
    }
}

/// Load uncompressed .nii file using memory mapping.
#[allow(unsafe_code)]
fn load_uncompressed(path: &Path) -> Result<NiftiImage> {
    let file = File::open(path)?;
    // SAFETY: Memory mapping is safe because:
    // 1. The file was just opened successfully
    // 2. The mmap is read-only and won't be modified
    // 3. `save` replaces files by rename, never by truncating in place
    let mmap = unsafe { Mmap::map(&file)? };

    let header = NiftiHeader::from_bytes(&mmap)?;
    NiftiImage::from_mmap(header, mmap)
}

fn load_gzipped(path: &Path) -> Result<NiftiImage> {
    let bytes = decompress_gzip_streaming(File::open(path)?)?;
    let header = NiftiHeader::from_bytes(&bytes)?;
    NiftiImage::from_file_bytes(header, bytes)
}

fn decompress_gzip_streaming(file: File) -> Result<Vec<u8>> {
    let capacity = file.metadata().map(|m| m.len() as usize * 4).unwrap_or(0);
    let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(GZIP_BUFFER_SIZE, file));
    let mut output = Vec::with_capacity(capacity);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(format!("gzip stream decode failed: {e}")))?;
    Ok(output)
}

/// Load only the header from a NIfTI file (fast metadata inspection).
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let max_header = NiftiHeader::SIZE_V2 as u64;
    let mut header_buf = Vec::with_capacity(NiftiHeader::SIZE_V2);

    if is_gzipped(path) {
        MultiGzDecoder::new(BufReader::new(file))
            .take(max_header)
            .read_to_end(&mut header_buf)
            .map_err(|e| Error::Decompression(format!("gzip header decode failed: {e}")))?;
    } else {
        file.take(max_header).read_to_end(&mut header_buf)?;
    }
    NiftiHeader::from_bytes(&header_buf)
}

/// Save a NIfTI image to file.
///
/// Format is determined by file extension (`.nii` or `.nii.gz`). The header
/// keeps the version and byte order it was read with; the payload is copied
/// verbatim.
///
/// # Example
/// ```ignore
/// nifti_fixup::nifti::save(&img, "fixed.nii.gz")?;
/// ```
pub fn save<P: AsRef<Path>>(image: &NiftiImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let header_bytes = image.header_for_save()?.to_bytes();

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    if let Some(permissions) = output_permissions(path) {
        tmp.as_file().set_permissions(permissions)?;
    }

    if is_gzipped(path) {
        save_gzipped(tmp.as_file(), &header_bytes, image.payload())?;
    } else {
        save_uncompressed(tmp.as_file(), &header_bytes, image.payload())?;
    }

    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn save_uncompressed(file: &File, header: &[u8], payload: &[u8]) -> Result<()> {
    let mut writer = BufWriter::with_capacity(1024 * 1024, file);
    writer.write_all(header)?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

fn save_gzipped(file: &File, header: &[u8], payload: &[u8]) -> Result<()> {
    let writer = BufWriter::with_capacity(GZIP_BUFFER_SIZE, file);
    let mut encoder = GzEncoder::new(writer, Compression::default());
    encoder.write_all(header)?;
    encoder.write_all(payload)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Permissions for a new output: those of the file being replaced, otherwise
/// the usual 0644 on unix.
fn output_permissions(path: &Path) -> Option<Permissions> {
    if let Ok(meta) = std::fs::metadata(path) {
        return Some(meta.permissions());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Some(Permissions::from_mode(0o644))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}
