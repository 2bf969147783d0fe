//! In-memory NIfTI volume: header, display affine and raw payload.

use super::header::{Affine, NiftiHeader};
use crate::error::{Error, Result};
use memmap2::Mmap;

/// Bytes following the header block (extension flag, extensions, voxel data).
///
/// The payload is never interpreted; it is written back verbatim.
#[derive(Debug)]
enum Payload {
    /// Memory-mapped uncompressed file.
    Mapped { map: Mmap, start: usize },
    /// Decompressed or caller-supplied buffer.
    Owned { bytes: Vec<u8>, start: usize },
}

impl Payload {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Mapped { map, start } => &map[*start..],
            Self::Owned { bytes, start } => &bytes[*start..],
        }
    }
}

/// A decoded volume.
///
/// `affine` is the transform used for spatial interpretation. It starts out as
/// the header's best affine and is kept separately, so changing the header's
/// sform alone does not change it (and vice versa).
#[derive(Debug)]
pub struct NiftiImage {
    header: NiftiHeader,
    affine: Affine,
    payload: Payload,
}

impl NiftiImage {
    /// Build an image from a header and the bytes that follow it on disk.
    ///
    /// `payload` must cover everything from the end of the header to the end of
    /// the voxel data, i.e. at least `vox_offset - header_size + data_size` bytes.
    pub fn new(header: NiftiHeader, payload: Vec<u8>) -> Result<Self> {
        Self::from_parts(header, Payload::Owned { bytes: payload, start: 0 })
    }

    /// Image backed by a full decoded file buffer; the header occupies its front.
    pub(crate) fn from_file_bytes(header: NiftiHeader, bytes: Vec<u8>) -> Result<Self> {
        let start = header.header_size();
        Self::from_parts(header, Payload::Owned { bytes, start })
    }

    /// Image backed by a memory-mapped file; the header occupies its front.
    pub(crate) fn from_mmap(header: NiftiHeader, map: Mmap) -> Result<Self> {
        let start = header.header_size();
        Self::from_parts(header, Payload::Mapped { map, start })
    }

    fn from_parts(header: NiftiHeader, payload: Payload) -> Result<Self> {
        header.validate()?;
        let available = payload.as_bytes().len();
        let needed = (header.vox_offset as usize - header.header_size())
            .checked_add(header.data_size()?)
            .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))?;
        if available < needed {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "file truncated: {} bytes after header, need {}",
                    available, needed
                ),
            )));
        }

        let affine = header.best_affine()?;
        Ok(Self {
            header,
            affine,
            payload,
        })
    }

    /// Header metadata.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Mutable header metadata.
    pub fn header_mut(&mut self) -> &mut NiftiHeader {
        &mut self.header
    }

    /// Transform used for spatial interpretation.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Replace the spatial transform. The header is reconciled on save.
    pub fn set_affine(&mut self, affine: Affine) {
        self.affine = affine;
    }

    /// Everything after the header block, byte for byte.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    /// Header as it will be written.
    ///
    /// If `affine` no longer matches what the header itself describes, the
    /// affine wins and is stored into the sform. This is why a repair has to
    /// update both the affine and the sform: updating only the header is undone
    /// here by a stale affine.
    pub fn header_for_save(&self) -> Result<NiftiHeader> {
        let mut header = self.header.clone();
        if !affines_close(&header.best_affine()?, &self.affine) {
            log::debug!("image affine differs from header; storing it as sform");
            header.set_sform(&self.affine);
        }
        header.validate()?;
        Ok(header)
    }
}

/// Element-wise closeness with the tolerances numpy's `allclose` uses.
pub fn affines_close(a: &Affine, b: &Affine) -> bool {
    const RTOL: f64 = 1e-5;
    const ATOL: f64 = 1e-8;
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(&x, &y)| (x - y).abs() <= ATOL + RTOL * y.abs())
}
