//! Raw voxel volumes.
//!
//! A volume file is headerless: dimensions and bit depth come from
//! configuration. Samples are stored row-major, one byte per voxel for
//! 8-bit data and two little-endian bytes otherwise.

use std::path::{Path, PathBuf};

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolrayError};

/// Bit depth of the samples in a raw volume file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    Eight,
    Ten,
    Twelve,
    Sixteen,
}

impl BitDepth {
    /// Number of significant bits per sample.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::Eight => 8,
            Self::Ten => 10,
            Self::Twelve => 12,
            Self::Sixteen => 16,
        }
    }

    /// Bytes per sample in the file.
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Eight => 1,
            Self::Ten | Self::Twelve | Self::Sixteen => 2,
        }
    }

    /// Left shift applied to 16-bit storage so the low `bits()` fill the full range.
    ///
    /// This assumes the data is saturated within the low bits. No rescale by
    /// the observed min/max is performed.
    #[must_use]
    pub fn shift(self) -> u32 {
        match self {
            Self::Eight => 0,
            other => 16 - other.bits(),
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = VolrayError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Eight),
            10 => Ok(Self::Ten),
            12 => Ok(Self::Twelve),
            16 => Ok(Self::Sixteen),
            other => Err(VolrayError::UnsupportedBitDepth(other)),
        }
    }
}

/// Normalized voxel storage, ready for upload as an unorm texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Voxels {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl Voxels {
    /// Number of voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
        }
    }

    /// Returns true if there are no voxels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intensity of voxel `index` mapped to [0, 1].
    #[must_use]
    pub fn normalized(&self, index: usize) -> f32 {
        match self {
            Self::U8(v) => f32::from(v[index]) / f32::from(u8::MAX),
            Self::U16(v) => f32::from(v[index]) / f32::from(u16::MAX),
        }
    }

    /// Tightly packed bytes in native order, one row of `w` samples after another.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U8(v) => v.as_slice(),
            Self::U16(v) => bytemuck::cast_slice(v),
        }
    }
}

/// A scalar 3D grid loaded from a raw file.
///
/// Immutable once built. The renderer takes ownership when the volume is
/// uploaded and drops it on reload.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeField {
    dims: UVec3,
    bit_depth: BitDepth,
    voxels: Voxels,
    scale: Vec3,
}

impl VolumeField {
    /// Loads a raw volume from disk.
    ///
    /// # Errors
    /// Returns [`VolrayError::Read`] if the file cannot be read and
    /// [`VolrayError::VolumeSizeMismatch`] if its length does not match `dims`.
    pub fn load(path: impl AsRef<Path>, dims: UVec3, bit_depth: BitDepth) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| VolrayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let field = Self::decode(path, &bytes, dims, bit_depth)?;
        log::info!(
            "loaded volume '{}' ({}x{}x{}, {}-bit)",
            path.display(),
            dims.x,
            dims.y,
            dims.z,
            bit_depth.bits()
        );
        Ok(field)
    }

    /// Builds a volume from an in-memory raw buffer.
    pub fn from_bytes(bytes: &[u8], dims: UVec3, bit_depth: BitDepth) -> Result<Self> {
        Self::decode(Path::new("<memory>"), bytes, dims, bit_depth)
    }

    /// A single black voxel, used until a real volume has been loaded.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            dims: UVec3::ONE,
            bit_depth: BitDepth::Eight,
            voxels: Voxels::U8(vec![0]),
            scale: Vec3::ONE,
        }
    }

    fn decode(path: &Path, bytes: &[u8], dims: UVec3, bit_depth: BitDepth) -> Result<Self> {
        if dims.min_element() == 0 {
            return Err(VolrayError::InvalidDimensions(dims.x, dims.y, dims.z));
        }

        let expected = (dims.x as usize)
            .checked_mul(dims.y as usize)
            .and_then(|n| n.checked_mul(dims.z as usize))
            .and_then(|n| n.checked_mul(bit_depth.bytes_per_sample()))
            .ok_or(VolrayError::InvalidDimensions(dims.x, dims.y, dims.z))?;
        if bytes.len() != expected {
            return Err(VolrayError::VolumeSizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual: bytes.len(),
            });
        }

        let voxels = match bit_depth {
            BitDepth::Eight => Voxels::U8(bytes.to_vec()),
            _ => {
                let shift = bit_depth.shift();
                Voxels::U16(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) << shift)
                        .collect(),
                )
            }
        };

        Ok(Self {
            dims,
            bit_depth,
            voxels,
            scale: Vec3::ONE,
        })
    }

    /// Returns this volume with anisotropic scale factors applied.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    #[must_use]
    pub fn voxels(&self) -> &Voxels {
        &self.voxels
    }

    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Normalized intensity of the voxel at integer coordinates.
    #[must_use]
    pub fn value_at(&self, x: u32, y: u32, z: u32) -> f32 {
        let index = (z as usize * self.dims.y as usize + y as usize) * self.dims.x as usize
            + x as usize;
        self.voxels.normalized(index)
    }

    /// Trilinear sample at local coordinate `p` in [0,1]^3, clamped to the edge.
    ///
    /// Texel centers sit at `(i + 0.5) / n`, matching GPU texture sampling.
    #[must_use]
    pub fn sample(&self, p: Vec3) -> f32 {
        let size = self.dims.as_vec3();
        let max = (self.dims - UVec3::ONE).as_vec3();
        let coord = (p.clamp(Vec3::ZERO, Vec3::ONE) * size - 0.5).clamp(Vec3::ZERO, max);
        let base = coord.floor();
        let frac = coord - base;
        let lo = base.as_uvec3();
        let hi = (lo + UVec3::ONE).min(self.dims - UVec3::ONE);

        let v = |x: u32, y: u32, z: u32| self.value_at(x, y, z);
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let c00 = lerp(v(lo.x, lo.y, lo.z), v(hi.x, lo.y, lo.z), frac.x);
        let c10 = lerp(v(lo.x, hi.y, lo.z), v(hi.x, hi.y, lo.z), frac.x);
        let c01 = lerp(v(lo.x, lo.y, hi.z), v(hi.x, lo.y, hi.z), frac.x);
        let c11 = lerp(v(lo.x, hi.y, hi.z), v(hi.x, hi.y, hi.z), frac.x);
        lerp(lerp(c00, c10, frac.y), lerp(c01, c11, frac.y), frac.z)
    }
}

/// Plain values describing which volume to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Path to the raw file.
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Bits per sample: 8, 10, 12 or 16.
    pub bit_depth: u32,
    /// Per-axis scale of the unit cube.
    pub scale: Vec3,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("datasets/head256.raw"),
            width: 256,
            height: 256,
            depth: 225,
            bit_depth: 12,
            scale: Vec3::ONE,
        }
    }
}

impl VolumeConfig {
    /// Volume dimensions.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// Checks the values before they reach the loader.
    pub fn validate(&self) -> Result<BitDepth> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(VolrayError::InvalidDimensions(
                self.width,
                self.height,
                self.depth,
            ));
        }
        if !self.scale.is_finite() || self.scale.min_element() <= 0.0 {
            return Err(VolrayError::InvalidConfig(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        BitDepth::try_from(self.bit_depth)
    }

    /// Validates and loads the configured volume.
    pub fn load(&self) -> Result<VolumeField> {
        let bit_depth = self.validate()?;
        Ok(VolumeField::load(&self.path, self.dims(), bit_depth)?.with_scale(self.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn encode_u16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_bit_depth_conversion() {
        assert_eq!(BitDepth::try_from(8).unwrap(), BitDepth::Eight);
        assert_eq!(BitDepth::try_from(12).unwrap().shift(), 4);
        assert_eq!(BitDepth::try_from(16).unwrap().shift(), 0);
        let err = BitDepth::try_from(9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_eight_bit_passthrough() {
        let bytes: Vec<u8> = (0..8).map(|i| i * 30).collect();
        let field = VolumeField::from_bytes(&bytes, UVec3::new(2, 2, 2), BitDepth::Eight).unwrap();
        assert_eq!(field.voxels(), &Voxels::U8(bytes.clone()));
        assert_eq!(field.voxels().as_bytes(), bytes.as_slice());
        assert!((field.value_at(1, 1, 1) - 210.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_twelve_bit_shift() {
        let bytes = encode_u16(&[0, 1, 0x0fff, 0x0800]);
        let field = VolumeField::from_bytes(&bytes, UVec3::new(4, 1, 1), BitDepth::Twelve).unwrap();
        assert_eq!(field.voxels(), &Voxels::U16(vec![0, 16, 0xfff0, 0x8000]));
    }

    #[test]
    fn test_size_mismatch() {
        let err = VolumeField::from_bytes(&[0; 63], UVec3::splat(4), BitDepth::Eight).unwrap_err();
        assert!(matches!(
            err,
            VolrayError::VolumeSizeMismatch {
                expected: 64,
                actual: 63,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Io);

        // 16-bit data needs two bytes per voxel
        assert!(VolumeField::from_bytes(&[0; 64], UVec3::splat(4), BitDepth::Sixteen).is_err());
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let dims = UVec3::splat(4_000_000);
        let err = VolumeField::from_bytes(&[0; 8], dims, BitDepth::Sixteen).unwrap_err();
        assert!(matches!(
            err,
            VolrayError::InvalidDimensions(4_000_000, 4_000_000, 4_000_000)
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = VolumeField::from_bytes(&[], UVec3::new(0, 4, 4), BitDepth::Eight).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_missing_file_is_recoverable() {
        let err = VolumeField::load(
            "/definitely/not/here.raw",
            UVec3::splat(4),
            BitDepth::Eight,
        )
        .unwrap_err();
        assert!(matches!(err, VolrayError::Read { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join(format!("volray_load_{}.raw", std::process::id()));
        std::fs::write(&path, encode_u16(&[1023; 8])).unwrap();

        let config = VolumeConfig {
            path: path.clone(),
            width: 2,
            height: 2,
            depth: 2,
            bit_depth: 10,
            scale: Vec3::new(1.0, 1.0, 0.5),
        };
        let field = config.load().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(field.scale(), Vec3::new(1.0, 1.0, 0.5));
        assert_eq!(field.voxels(), &Voxels::U16(vec![1023 << 6; 8]));
    }

    #[test]
    fn test_config_validation() {
        assert!(VolumeConfig::default().validate().is_ok());

        let zero = VolumeConfig {
            depth: 0,
            ..VolumeConfig::default()
        };
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::Validation);

        let bad_scale = VolumeConfig {
            scale: Vec3::new(1.0, -1.0, 1.0),
            ..VolumeConfig::default()
        };
        assert!(bad_scale.validate().is_err());

        let bad_depth = VolumeConfig {
            bit_depth: 14,
            ..VolumeConfig::default()
        };
        assert_eq!(bad_depth.validate().unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_trilinear_sample() {
        let field =
            VolumeField::from_bytes(&[0, 255], UVec3::new(2, 1, 1), BitDepth::Eight).unwrap();
        // Texel centers
        assert!(field.sample(Vec3::new(0.25, 0.5, 0.5)).abs() < 1e-6);
        assert!((field.sample(Vec3::new(0.75, 0.5, 0.5)) - 1.0).abs() < 1e-6);
        // Halfway between them
        assert!((field.sample(Vec3::splat(0.5)) - 0.5).abs() < 1e-6);
        // Clamped to edge
        assert!(field.sample(Vec3::new(-1.0, 0.5, 0.5)).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_shift_stays_in_range(bits in prop::sample::select(vec![10u32, 12, 16]), raw in any::<u16>()) {
            let depth = BitDepth::try_from(bits).unwrap();
            let max = u16::try_from((1u32 << bits) - 1).unwrap();
            let v = raw & max;
            let field = VolumeField::from_bytes(&v.to_le_bytes(), UVec3::ONE, depth).unwrap();
            let expected = u32::from(v) << depth.shift();
            prop_assert!(expected <= u32::from(u16::MAX));
            prop_assert_eq!(field.voxels(), &Voxels::U16(vec![u16::try_from(expected).unwrap()]));
        }
    }
}
