//! `NIfTI` header parsing and representation.
//!
//! Supports both NIfTI-1 (348-byte header) and NIfTI-2 (540-byte header) formats
//! with automatic version detection and endianness handling.
//!
//! The header block read from disk is retained. Writing patches the modelled
//! fields back onto that block in the file's own byte order, so every field this
//! type does not model (intent, scaling, slice timing, magic, ...) survives
//! untouched.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Row-major 4x4 voxel-to-world transform.
pub type Affine = [[f64; 4]; 4];

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// NIfTI-1 format (348-byte header, 16-bit dimensions)
    #[default]
    Nifti1,
    /// NIfTI-2 format (540-byte header, 64-bit dimensions)
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }

    /// Default vox_offset for this version (header size + extension flag).
    pub const fn default_vox_offset(self) -> i64 {
        match self {
            Self::Nifti1 => 352,
            Self::Nifti2 => 544,
        }
    }
}

/// NIfTI-1 header field byte offsets.
mod offsets_v1 {
    pub const SIZEOF_HDR: usize = 0;
    pub const DIM: usize = 40;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const XYZT_UNITS: usize = 123;
    pub const DESCRIP: usize = 148;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QOFFSET_X: usize = 268;
    pub const SROW_X: usize = 280;
    pub const SROW_Y: usize = 296;
    pub const SROW_Z: usize = 312;
    pub const MAGIC: usize = 344;
}

/// NIfTI-2 header field byte offsets.
mod offsets_v2 {
    pub const SIZEOF_HDR: usize = 0;
    pub const MAGIC: usize = 4;
    pub const DATATYPE: usize = 12;
    pub const BITPIX: usize = 14;
    pub const DIM: usize = 16;
    pub const PIXDIM: usize = 104;
    pub const VOX_OFFSET: usize = 168;
    pub const DESCRIP: usize = 240;
    pub const QFORM_CODE: usize = 344;
    pub const SFORM_CODE: usize = 348;
    pub const QUATERN_B: usize = 352;
    pub const QOFFSET_X: usize = 376;
    pub const SROW_X: usize = 400;
    pub const SROW_Y: usize = 432;
    pub const SROW_Z: usize = 464;
    pub const XYZT_UNITS: usize = 500;
}

/// Width of the `descrip` field in both versions.
const DESCRIP_LEN: usize = 80;

/// `DT_FLOAT32`, used for freshly constructed headers.
const DT_FLOAT32: i16 = 16;

/// Spatial units for voxel dimensions (bits 0-2 of `xyzt_units`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialUnits {
    #[default]
    /// Units are not specified.
    Unknown,
    /// Voxel dimensions expressed in meters.
    Meter,
    /// Voxel dimensions expressed in millimeters.
    Millimeter,
    /// Voxel dimensions expressed in micrometers.
    Micrometer,
    /// A code the standard leaves undefined (4-7), kept verbatim.
    Other(u8),
}

impl SpatialUnits {
    fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::Unknown,
            1 => Self::Meter,
            2 => Self::Millimeter,
            3 => Self::Micrometer,
            other => Self::Other(other),
        }
    }

    fn to_code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Meter => 1,
            Self::Millimeter => 2,
            Self::Micrometer => 3,
            Self::Other(code) => code & 0x07,
        }
    }
}

/// Temporal units for time dimensions (bits 3-5 of `xyzt_units`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalUnits {
    #[default]
    /// Temporal spacing unspecified.
    Unknown,
    /// Temporal spacing in seconds.
    Second,
    /// Temporal spacing in milliseconds.
    Millisecond,
    /// Temporal spacing in microseconds.
    Microsecond,
    /// Frequency in hertz.
    Hertz,
    /// Parts per million.
    Ppm,
    /// Radians per second. Never a valid TR unit.
    Radian,
    /// The undefined code 0x38, kept verbatim.
    Other(u8),
}

impl TemporalUnits {
    fn from_code(code: u8) -> Self {
        match code & 0x38 {
            0x00 => Self::Unknown,
            0x08 => Self::Second,
            0x10 => Self::Millisecond,
            0x18 => Self::Microsecond,
            0x20 => Self::Hertz,
            0x28 => Self::Ppm,
            0x30 => Self::Radian,
            other => Self::Other(other),
        }
    }

    fn to_code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Second => 0x08,
            Self::Millisecond => 0x10,
            Self::Microsecond => 0x18,
            Self::Hertz => 0x20,
            Self::Ppm => 0x28,
            Self::Radian => 0x30,
            Self::Other(code) => code & 0x38,
        }
    }
}

/// The packed `xyzt_units` field.
///
/// `from_code` and `to_code` are the only places the bit layout is known.
/// Everything above bit 5 is carried in `reserved` and written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XyztUnits {
    /// Bits 0-2.
    pub spatial: SpatialUnits,
    /// Bits 3-5.
    pub temporal: TemporalUnits,
    /// Bits 6 and up, already shifted into place.
    pub reserved: i32,
}

impl XyztUnits {
    const UNIT_BITS: i32 = 0b0011_1111;

    /// Units with no reserved bits set.
    pub const fn new(spatial: SpatialUnits, temporal: TemporalUnits) -> Self {
        Self {
            spatial,
            temporal,
            reserved: 0,
        }
    }

    /// Unpack a raw field value.
    pub fn from_code(code: i32) -> Self {
        Self {
            spatial: SpatialUnits::from_code(code as u8),
            temporal: TemporalUnits::from_code(code as u8),
            reserved: code & !Self::UNIT_BITS,
        }
    }

    /// Pack back into a raw field value.
    pub fn to_code(self) -> i32 {
        self.reserved | i32::from(self.spatial.to_code()) | i32::from(self.temporal.to_code())
    }
}

/// qform/sform interpretation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XformCode {
    /// 0: transform is not set.
    #[default]
    Unknown,
    /// 1: scanner-based anatomical coordinates.
    ScannerAnat,
    /// 2: coordinates aligned to another file or a template.
    AlignedAnat,
    /// 3: Talairach-Tournoux space.
    Talairach,
    /// 4: MNI 152 space.
    Mni152,
    /// Any other value, kept verbatim.
    Other(i32),
}

impl XformCode {
    /// Parse from the on-disk code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::ScannerAnat,
            2 => Self::AlignedAnat,
            3 => Self::Talairach,
            4 => Self::Mni152,
            other => Self::Other(other),
        }
    }

    /// On-disk code.
    pub fn to_code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::ScannerAnat => 1,
            Self::AlignedAnat => 2,
            Self::Talairach => 3,
            Self::Mni152 => 4,
            Self::Other(code) => code,
        }
    }

    /// True for every code except `Unknown`.
    pub fn is_set(self) -> bool {
        self != Self::Unknown
    }
}

/// Unified NIfTI header supporting both NIfTI-1 and NIfTI-2 formats.
///
/// Internally uses 64-bit dimensions and f64 precision to accommodate NIfTI-2.
/// NIfTI-1 values are read from f32 and written back as f32, which is exact for
/// anything that was not modified.
#[derive(Debug, Clone)]
pub struct NiftiHeader {
    version: NiftiVersion,
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension (dim[1..=7] on disk).
    pub dim: [i64; 7],
    /// Bits per voxel.
    pub bitpix: i16,
    /// qfac at index 0, voxel spacing at 1..=3, TR at 4.
    pub pixdim: [f64; 8],
    /// Data offset in file.
    pub vox_offset: i64,
    /// Packed spatial and temporal units.
    pub xyzt_units: XyztUnits,
    /// Description string, trailing NUL padding removed.
    pub descrip: String,
    /// qform transform code.
    pub qform_code: XformCode,
    /// sform transform code.
    pub sform_code: XformCode,
    /// Quaternion parameters b, c, d.
    pub quatern: [f64; 3],
    /// qform translation.
    pub qoffset: [f64; 3],
    /// First row of the sform affine matrix.
    pub srow_x: [f64; 4],
    /// Second row of the sform affine matrix.
    pub srow_y: [f64; 4],
    /// Third row of the sform affine matrix.
    pub srow_z: [f64; 4],
    pub(crate) little_endian: bool,
    raw: Vec<u8>,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self::new(NiftiVersion::Nifti1)
    }
}

impl NiftiHeader {
    /// Size of NIfTI-2 header in bytes.
    pub const SIZE_V2: usize = 540;

    /// A little-endian single-file header for a 1x1x1 float32 volume.
    pub fn new(version: NiftiVersion) -> Self {
        let mut raw = vec![0u8; version.header_size()];
        match version {
            NiftiVersion::Nifti1 => {
                use offsets_v1::{DATATYPE, MAGIC, SIZEOF_HDR};
                LittleEndian::write_i32(&mut raw[SIZEOF_HDR..SIZEOF_HDR + 4], 348);
                LittleEndian::write_i16(&mut raw[DATATYPE..DATATYPE + 2], DT_FLOAT32);
                raw[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");
            }
            NiftiVersion::Nifti2 => {
                use offsets_v2::{DATATYPE, MAGIC, SIZEOF_HDR};
                LittleEndian::write_i32(&mut raw[SIZEOF_HDR..SIZEOF_HDR + 4], 540);
                LittleEndian::write_i16(&mut raw[DATATYPE..DATATYPE + 2], DT_FLOAT32);
                raw[MAGIC..MAGIC + 8].copy_from_slice(b"n+2\0\r\n\x1a\n");
            }
        }

        Self {
            version,
            ndim: 3,
            dim: [1, 1, 1, 1, 1, 1, 1],
            bitpix: 32,
            pixdim: [1.0; 8],
            vox_offset: version.default_vox_offset(),
            xyzt_units: XyztUnits::new(SpatialUnits::Millimeter, TemporalUnits::Unknown),
            descrip: String::new(),
            qform_code: XformCode::Unknown,
            sform_code: XformCode::ScannerAnat,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            srow_x: [1.0, 0.0, 0.0, 0.0],
            srow_y: [0.0, 1.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 1.0, 0.0],
            little_endian: true,
            raw,
        }
    }

    /// Format version this header was read as.
    pub fn version(&self) -> NiftiVersion {
        self.version
    }

    /// Returns the header size for this header's version.
    pub fn header_size(&self) -> usize {
        self.version.header_size()
    }

    /// Read header from bytes with automatic version and endianness detection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "header too short to detect version",
            )));
        }

        // Version and byte order both come from sizeof_hdr
        let sizeof_hdr_le = LittleEndian::read_i32(&bytes[0..4]);
        let sizeof_hdr_be = BigEndian::read_i32(&bytes[0..4]);

        let (version, little_endian) = if sizeof_hdr_le == 348 {
            (NiftiVersion::Nifti1, true)
        } else if sizeof_hdr_be == 348 {
            (NiftiVersion::Nifti1, false)
        } else if sizeof_hdr_le == 540 {
            (NiftiVersion::Nifti2, true)
        } else if sizeof_hdr_be == 540 {
            (NiftiVersion::Nifti2, false)
        } else {
            return Err(Error::InvalidMagic([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]));
        };

        let required_size = version.header_size();
        if bytes.len() < required_size {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "header too short: got {} bytes, need {} for {:?}",
                    bytes.len(),
                    required_size,
                    version
                ),
            )));
        }

        let raw = bytes[..required_size].to_vec();
        match (version, little_endian) {
            (NiftiVersion::Nifti1, true) => Self::parse_v1::<LittleEndian>(raw, true),
            (NiftiVersion::Nifti1, false) => Self::parse_v1::<BigEndian>(raw, false),
            (NiftiVersion::Nifti2, true) => Self::parse_v2::<LittleEndian>(raw, true),
            (NiftiVersion::Nifti2, false) => Self::parse_v2::<BigEndian>(raw, false),
        }
    }

    /// Parse NIfTI-1 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v1<E: ByteOrder>(raw: Vec<u8>, little_endian: bool) -> Result<Self> {
        use offsets_v1::*;

        match &raw[MAGIC..MAGIC + 4] {
            b"n+1\0" => {}
            b"ni1\0" => {
                return Err(Error::InvalidFileFormat(
                    "NIfTI-1 pair headers (.hdr/.img) are not supported".to_string(),
                ))
            }
            magic => {
                return Err(Error::InvalidMagic([
                    magic[0], magic[1], magic[2], magic[3],
                ]))
            }
        }

        let ndim = E::read_i16(&raw[DIM..DIM + 2]);
        let mut dim = [0i64; 7];
        for (i, dim_val) in dim.iter_mut().enumerate() {
            let offset = DIM + 2 + i * 2;
            *dim_val = i64::from(E::read_i16(&raw[offset..offset + 2]));
        }

        let mut pixdim = [0.0f64; 8];
        for (i, pix_val) in pixdim.iter_mut().enumerate() {
            let offset = PIXDIM + i * 4;
            *pix_val = f64::from(E::read_f32(&raw[offset..offset + 4]));
        }

        let vox_offset_raw = E::read_f32(&raw[VOX_OFFSET..VOX_OFFSET + 4]);
        if !vox_offset_raw.is_finite() || vox_offset_raw.fract() != 0.0 {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset must be a finite integer, got {}",
                vox_offset_raw
            )));
        }

        let header = Self {
            version: NiftiVersion::Nifti1,
            ndim: checked_ndim(i64::from(ndim))?,
            dim,
            bitpix: E::read_i16(&raw[BITPIX..BITPIX + 2]),
            pixdim,
            vox_offset: vox_offset_raw as i64,
            xyzt_units: XyztUnits::from_code(i32::from(raw[XYZT_UNITS])),
            descrip: decode_text(&raw[DESCRIP..DESCRIP + DESCRIP_LEN]),
            qform_code: XformCode::from_code(i32::from(E::read_i16(
                &raw[QFORM_CODE..QFORM_CODE + 2],
            ))),
            sform_code: XformCode::from_code(i32::from(E::read_i16(
                &raw[SFORM_CODE..SFORM_CODE + 2],
            ))),
            quatern: read_f32_array::<E, 3>(&raw, QUATERN_B),
            qoffset: read_f32_array::<E, 3>(&raw, QOFFSET_X),
            srow_x: read_f32_array::<E, 4>(&raw, SROW_X),
            srow_y: read_f32_array::<E, 4>(&raw, SROW_Y),
            srow_z: read_f32_array::<E, 4>(&raw, SROW_Z),
            little_endian,
            raw,
        };

        header.validate()?;
        Ok(header)
    }

    /// Parse NIfTI-2 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v2<E: ByteOrder>(raw: Vec<u8>, little_endian: bool) -> Result<Self> {
        use offsets_v2::*;

        // Magic sits at offset 4 in NIfTI-2
        match &raw[MAGIC..MAGIC + 8] {
            b"n+2\0\r\n\x1a\n" => {}
            b"ni2\0\r\n\x1a\n" => {
                return Err(Error::InvalidFileFormat(
                    "NIfTI-2 pair headers (.hdr/.img) are not supported".to_string(),
                ))
            }
            magic => {
                return Err(Error::InvalidMagic([
                    magic[0], magic[1], magic[2], magic[3],
                ]))
            }
        }

        let ndim = E::read_i64(&raw[DIM..DIM + 8]);
        let mut dim = [0i64; 7];
        for (i, dim_val) in dim.iter_mut().enumerate() {
            let offset = DIM + 8 + i * 8;
            *dim_val = E::read_i64(&raw[offset..offset + 8]);
        }

        let mut pixdim = [0.0f64; 8];
        for (i, pix_val) in pixdim.iter_mut().enumerate() {
            let offset = PIXDIM + i * 8;
            *pix_val = E::read_f64(&raw[offset..offset + 8]);
        }

        let header = Self {
            version: NiftiVersion::Nifti2,
            ndim: checked_ndim(ndim)?,
            dim,
            bitpix: E::read_i16(&raw[BITPIX..BITPIX + 2]),
            pixdim,
            vox_offset: E::read_i64(&raw[VOX_OFFSET..VOX_OFFSET + 8]),
            xyzt_units: XyztUnits::from_code(E::read_i32(&raw[XYZT_UNITS..XYZT_UNITS + 4])),
            descrip: decode_text(&raw[DESCRIP..DESCRIP + DESCRIP_LEN]),
            qform_code: XformCode::from_code(E::read_i32(&raw[QFORM_CODE..QFORM_CODE + 4])),
            sform_code: XformCode::from_code(E::read_i32(&raw[SFORM_CODE..SFORM_CODE + 4])),
            quatern: read_f64_array::<E, 3>(&raw, QUATERN_B),
            qoffset: read_f64_array::<E, 3>(&raw, QOFFSET_X),
            srow_x: read_f64_array::<E, 4>(&raw, SROW_X),
            srow_y: read_f64_array::<E, 4>(&raw, SROW_Y),
            srow_z: read_f64_array::<E, 4>(&raw, SROW_Z),
            little_endian,
            raw,
        };

        header.validate()?;
        Ok(header)
    }

    /// Serialize the header block in the version and byte order it was read with.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.raw.clone();
        match (self.version, self.little_endian) {
            (NiftiVersion::Nifti1, true) => self.write_v1::<LittleEndian>(&mut buf),
            (NiftiVersion::Nifti1, false) => self.write_v1::<BigEndian>(&mut buf),
            (NiftiVersion::Nifti2, true) => self.write_v2::<LittleEndian>(&mut buf),
            (NiftiVersion::Nifti2, false) => self.write_v2::<BigEndian>(&mut buf),
        }
        buf
    }

    #[allow(clippy::wildcard_imports)]
    fn write_v1<E: ByteOrder>(&self, buf: &mut [u8]) {
        use offsets_v1::*;

        E::write_i16(&mut buf[DIM..DIM + 2], i16::from(self.ndim));
        for (i, &d) in self.dim.iter().enumerate() {
            let offset = DIM + 2 + i * 2;
            E::write_i16(&mut buf[offset..offset + 2], d.min(i64::from(i16::MAX)) as i16);
        }
        E::write_i16(&mut buf[BITPIX..BITPIX + 2], self.bitpix);

        // Downcast to f32: exact for values that came from disk
        for (i, &value) in self.pixdim.iter().enumerate() {
            let offset = PIXDIM + i * 4;
            E::write_f32(&mut buf[offset..offset + 4], value as f32);
        }
        E::write_f32(&mut buf[VOX_OFFSET..VOX_OFFSET + 4], self.vox_offset as f32);

        buf[XYZT_UNITS] = self.xyzt_units.to_code() as u8;
        self.write_descrip(&mut buf[DESCRIP..DESCRIP + DESCRIP_LEN]);

        E::write_i16(
            &mut buf[QFORM_CODE..QFORM_CODE + 2],
            self.qform_code.to_code() as i16,
        );
        E::write_i16(
            &mut buf[SFORM_CODE..SFORM_CODE + 2],
            self.sform_code.to_code() as i16,
        );

        write_f32_array::<E>(buf, QUATERN_B, &self.quatern);
        write_f32_array::<E>(buf, QOFFSET_X, &self.qoffset);
        write_f32_array::<E>(buf, SROW_X, &self.srow_x);
        write_f32_array::<E>(buf, SROW_Y, &self.srow_y);
        write_f32_array::<E>(buf, SROW_Z, &self.srow_z);
    }

    #[allow(clippy::wildcard_imports)]
    fn write_v2<E: ByteOrder>(&self, buf: &mut [u8]) {
        use offsets_v2::*;

        E::write_i64(&mut buf[DIM..DIM + 8], i64::from(self.ndim));
        for (i, &d) in self.dim.iter().enumerate() {
            let offset = DIM + 8 + i * 8;
            E::write_i64(&mut buf[offset..offset + 8], d);
        }
        E::write_i16(&mut buf[BITPIX..BITPIX + 2], self.bitpix);

        for (i, &value) in self.pixdim.iter().enumerate() {
            let offset = PIXDIM + i * 8;
            E::write_f64(&mut buf[offset..offset + 8], value);
        }
        E::write_i64(&mut buf[VOX_OFFSET..VOX_OFFSET + 8], self.vox_offset);

        E::write_i32(&mut buf[XYZT_UNITS..XYZT_UNITS + 4], self.xyzt_units.to_code());
        self.write_descrip(&mut buf[DESCRIP..DESCRIP + DESCRIP_LEN]);

        E::write_i32(&mut buf[QFORM_CODE..QFORM_CODE + 4], self.qform_code.to_code());
        E::write_i32(&mut buf[SFORM_CODE..SFORM_CODE + 4], self.sform_code.to_code());

        write_f64_array::<E>(buf, QUATERN_B, &self.quatern);
        write_f64_array::<E>(buf, QOFFSET_X, &self.qoffset);
        write_f64_array::<E>(buf, SROW_X, &self.srow_x);
        write_f64_array::<E>(buf, SROW_Y, &self.srow_y);
        write_f64_array::<E>(buf, SROW_Z, &self.srow_z);
    }

    /// Rewrites the slot only when `descrip` was changed, so bytes after the
    /// first NUL are not lost on a plain round trip.
    fn write_descrip(&self, slot: &mut [u8]) {
        if decode_text(slot) == self.descrip {
            return;
        }
        slot.fill(0);
        let bytes = self.descrip.as_bytes();
        let len = bytes.len().min(DESCRIP_LEN - 1);
        slot[..len].copy_from_slice(&bytes[..len]);
    }

    /// The affine stored in `srow_x/y/z`.
    pub fn sform_affine(&self) -> Affine {
        [self.srow_x, self.srow_y, self.srow_z, [0.0, 0.0, 0.0, 1.0]]
    }

    /// Store `affine` as the sform.
    ///
    /// The sform code is kept. An unset code becomes `ScannerAnat` so the
    /// stored matrix is not ignored by readers.
    pub fn set_sform(&mut self, affine: &Affine) {
        self.srow_x = affine[0];
        self.srow_y = affine[1];
        self.srow_z = affine[2];
        if !self.sform_code.is_set() {
            self.sform_code = XformCode::ScannerAnat;
        }
    }

    /// Derive the affine encoded by the quaternion, qoffset and pixdim fields.
    ///
    /// `a` is recovered as `sqrt(1 - b² - c² - d²)`; a slightly negative
    /// radicand (float32 rounding) is treated as zero. qfac is `pixdim[0]`'s sign.
    #[allow(clippy::many_single_char_names)]
    pub fn qform_affine(&self) -> Result<Affine> {
        let [b, c, d] = self.quatern;
        let w2 = 1.0 - (b * b + c * c + d * d);
        if w2 < -3.0 * f64::from(f32::EPSILON) {
            return Err(Error::InvalidTransform(format!(
                "quaternion ({b}, {c}, {d}) has norm greater than 1"
            )));
        }
        let a = w2.max(0.0).sqrt();

        let spacing = [self.pixdim[1], self.pixdim[2], self.pixdim[3]];
        if spacing.iter().any(|&s| s < 0.0) {
            return Err(Error::InvalidTransform(format!(
                "pixdim[1..=3] must not be negative, got {:?}",
                spacing
            )));
        }
        let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let [i, j, k] = [spacing[0], spacing[1], spacing[2] * qfac];

        let r = quaternion_to_rotation(a, b, c, d);
        Ok([
            [r[0][0] * i, r[0][1] * j, r[0][2] * k, self.qoffset[0]],
            [r[1][0] * i, r[1][1] * j, r[1][2] * k, self.qoffset[1]],
            [r[2][0] * i, r[2][1] * j, r[2][2] * k, self.qoffset[2]],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// The affine a reader would use: sform if set, else qform, else spacing only.
    pub fn best_affine(&self) -> Result<Affine> {
        if self.sform_code.is_set() {
            Ok(self.sform_affine())
        } else if self.qform_code.is_set() {
            self.qform_affine()
        } else {
            Ok([
                [self.pixdim[1], 0.0, 0.0, 0.0],
                [0.0, self.pixdim[2], 0.0, 0.0],
                [0.0, 0.0, self.pixdim[3], 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ])
        }
    }

    /// Size of the voxel data in bytes, rounded up to whole bytes.
    pub fn data_size(&self) -> Result<usize> {
        let mut bits: usize = self.bitpix as usize;
        for &d in &self.dim[..self.ndim as usize] {
            bits = bits
                .checked_mul(d as usize)
                .ok_or_else(|| Error::InvalidDimensions("data size overflow".into()))?;
        }
        Ok(bits.div_ceil(8))
    }

    /// Validate header fields for basic NIfTI invariants.
    pub fn validate(&self) -> Result<()> {
        checked_ndim(i64::from(self.ndim))?;

        for (i, &d) in self.dim[..self.ndim as usize].iter().enumerate() {
            if d <= 0 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {} must be positive, got {}",
                    i, d
                )));
            }
        }

        if self.bitpix <= 0 {
            return Err(Error::InvalidDimensions(format!(
                "bitpix must be positive, got {}",
                self.bitpix
            )));
        }

        let min_offset = self.version.header_size() as i64;
        if self.vox_offset < min_offset {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset {} before header end ({})",
                self.vox_offset, min_offset
            )));
        }

        self.data_size()?;
        Ok(())
    }
}

fn checked_ndim(ndim: i64) -> Result<u8> {
    if !(1..=7).contains(&ndim) {
        return Err(Error::InvalidDimensions(format!(
            "ndim must be 1..=7, got {}",
            ndim
        )));
    }
    Ok(ndim as u8)
}

/// Rotation matrix for a unit quaternion; the quaternion is normalised first.
#[allow(clippy::many_single_char_names)]
fn quaternion_to_rotation(w: f64, x: f64, y: f64, z: f64) -> [[f64; 3]; 3] {
    let n = w * w + x * x + y * y + z * z;
    if n < f64::EPSILON {
        return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    }
    let s = 2.0 / n;
    let (xs, ys, zs) = (x * s, y * s, z * s);
    let (wx, wy, wz) = (w * xs, w * ys, w * zs);
    let (xx, xy, xz) = (x * xs, x * ys, x * zs);
    let (yy, yz, zz) = (y * ys, y * zs, z * zs);
    [
        [1.0 - (yy + zz), xy - wz, xz + wy],
        [xy + wz, 1.0 - (xx + zz), yz - wx],
        [xz - wy, yz + wx, 1.0 - (xx + yy)],
    ]
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

fn read_f32_array<E: ByteOrder, const N: usize>(bytes: &[u8], start: usize) -> [f64; N] {
    std::array::from_fn(|i| f64::from(E::read_f32(&bytes[start + i * 4..start + i * 4 + 4])))
}

fn read_f64_array<E: ByteOrder, const N: usize>(bytes: &[u8], start: usize) -> [f64; N] {
    std::array::from_fn(|i| E::read_f64(&bytes[start + i * 8..start + i * 8 + 8]))
}

fn write_f32_array<E: ByteOrder>(buf: &mut [u8], start: usize, values: &[f64]) {
    for (i, &v) in values.iter().enumerate() {
        let offset = start + i * 4;
        E::write_f32(&mut buf[offset..offset + 4], v as f32);
    }
}

fn write_f64_array<E: ByteOrder>(buf: &mut [u8], start: usize, values: &[f64]) {
    for (i, &v) in values.iter().enumerate() {
        let offset = start + i * 8;
        E::write_f64(&mut buf[offset..offset + 8], v);
    }
}
