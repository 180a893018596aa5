//! GPU textures owned by the raycaster.
//!
//! Each wrapper owns its wgpu handles; replacing a wrapper releases the old
//! texture.

use half::f16;
use volray_core::{LookupTable, VolumeField, Voxels, LUT_SIZE};

use crate::error::{validation_scope, RenderError, RenderResult};

/// Format of the exit-point target written by the first pass.
pub const EXIT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Depth format of the exit-point pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Format of the transfer function lookup texture.
pub const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// The scalar field as a single-channel 3D texture.
pub struct VolumeTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl VolumeTexture {
    /// Uploads a volume.
    ///
    /// 8-bit data becomes `R8Unorm`. 16-bit data becomes `R16Unorm` when the
    /// device supports it and `R16Float` otherwise.
    ///
    /// Fails with [`RenderError::VolumeTooLarge`] when an extent exceeds the
    /// device's 3D texture limit, and with [`RenderError::TextureCreationFailed`]
    /// when the device rejects the texture.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        volume: &VolumeField,
    ) -> RenderResult<Self> {
        let dims = volume.dims();
        let max = device.limits().max_texture_dimension_3d;
        if dims.max_element() > max {
            return Err(RenderError::VolumeTooLarge {
                width: dims.x,
                height: dims.y,
                depth: dims.z,
                max,
            });
        }

        let unorm16 = device
            .features()
            .contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM);

        let (format, bytes_per_sample, converted) = match volume.voxels() {
            Voxels::U8(_) => (wgpu::TextureFormat::R8Unorm, 1, None),
            Voxels::U16(_) if unorm16 => (wgpu::TextureFormat::R16Unorm, 2, None),
            Voxels::U16(samples) => {
                log::info!("R16Unorm not supported, uploading volume as R16Float");
                let halfs = encode_volume_f16(samples);
                (
                    wgpu::TextureFormat::R16Float,
                    2,
                    Some(bytemuck::cast_slice::<u16, u8>(&halfs).to_vec()),
                )
            }
        };

        let size = wgpu::Extent3d {
            width: dims.x,
            height: dims.y,
            depth_or_array_layers: dims.z,
        };
        let data = converted
            .as_deref()
            .unwrap_or_else(|| volume.voxels().as_bytes());

        let (texture, error) = validation_scope(device, || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("volume texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D3,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            // Rows are tightly packed, no padding between them
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(dims.x * bytes_per_sample),
                    rows_per_image: Some(dims.y),
                },
                size,
            );
            texture
        });
        if let Some(e) = error {
            return Err(RenderError::TextureCreationFailed(format!(
                "{}x{}x{} volume as {format:?}: {e}",
                dims.x, dims.y, dims.z
            )));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!(
            "uploaded {}x{}x{} volume as {format:?}",
            dims.x,
            dims.y,
            dims.z
        );
        Ok(Self { texture, view })
    }

    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

/// The transfer function as a `LUT_SIZE` x 1 half-float RGBA texture.
pub struct LutTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl LutTexture {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, lut: &LookupTable) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("transfer function texture"),
            size: Self::extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LUT_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let lut_texture = Self { texture, view };
        lut_texture.update(queue, lut);
        lut_texture
    }

    fn extent() -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: LUT_SIZE as u32,
            height: 1,
            depth_or_array_layers: 1,
        }
    }

    /// Overwrites the whole table.
    pub fn update(&self, queue: &wgpu::Queue, lut: &LookupTable) {
        let data = encode_lut(lut);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(LUT_SIZE as u32 * 8),
                rows_per_image: None,
            },
            Self::extent(),
        );
    }

    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Converts a lookup table to half-float RGBA texels (raw `f16` bits),
/// padding or truncating to `LUT_SIZE`.
#[must_use]
pub fn encode_lut(lut: &LookupTable) -> Vec<u16> {
    let mut data = Vec::with_capacity(LUT_SIZE * 4);
    for i in 0..LUT_SIZE {
        let entry = lut.entries().get(i).copied().unwrap_or_default();
        data.extend(entry.to_array().map(|c| f16::from_f32(c).to_bits()));
    }
    data
}

/// Normalizes 16-bit samples to [0, 1] and encodes them as raw `f16` bits.
#[must_use]
pub fn encode_volume_f16(samples: &[u16]) -> Vec<u16> {
    samples
        .iter()
        .map(|&v| f16::from_f32(f32::from(v) / f32::from(u16::MAX)).to_bits())
        .collect()
}

/// Offscreen color and depth targets for the exit-point pass.
pub struct ExitPointTarget {
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl ExitPointTarget {
    /// Creates both targets, failing if the device rejects them.
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> RenderResult<Self> {
        let incomplete = |reason: String| RenderError::IncompleteTarget {
            width,
            height,
            reason,
        };
        if width == 0 || height == 0 {
            return Err(incomplete("zero-sized target".into()));
        }

        let (target, error) = validation_scope(device, || {
            let size = wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("exit point texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: EXIT_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let depth = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("exit point depth"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            Self {
                color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
                depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
                width,
                height,
            }
        });

        match error {
            Some(e) => Err(incomplete(e.to_string())),
            None => {
                log::debug!("created exit point target {width}x{height}");
                Ok(target)
            }
        }
    }

    #[must_use]
    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.color_view
    }

    #[must_use]
    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volray_core::TransferFunction;

    #[test]
    fn test_encode_lut_layout() {
        let tf = TransferFunction::default();
        let data = encode_lut(tf.lut());
        assert_eq!(data.len(), LUT_SIZE * 4);
        // First texel: opaque black
        assert_eq!(
            [data[0], data[1], data[2], data[3]].map(|b| f16::from_bits(b).to_f32()),
            [0.0, 0.0, 0.0, 1.0]
        );
        // Last texel: transparent white
        let last = &data[(LUT_SIZE - 1) * 4..];
        assert_eq!(
            last.iter()
                .map(|&b| f16::from_bits(b).to_f32())
                .collect::<Vec<_>>(),
            vec![1.0, 1.0, 1.0, 0.0]
        );
        assert_eq!(bytemuck::cast_slice::<u16, u8>(&data).len(), LUT_SIZE * 8);
    }

    #[test]
    fn test_encode_volume_f16() {
        let to_f32 = |bits: &[u16]| -> Vec<f32> {
            bits.iter().map(|&b| f16::from_bits(b).to_f32()).collect()
        };

        let encoded = to_f32(&encode_volume_f16(&[0, 0xfff0, u16::MAX]));
        assert_eq!(encoded[0], 0.0);
        assert!((encoded[1] - 1.0).abs() < 1e-3, "{}", encoded[1]);
        assert_eq!(encoded[2], 1.0);

        // 12-bit samples after the loader's left shift stay ordered
        let samples: Vec<u16> = (0..4096u16).map(|v| v << 4).collect();
        let encoded = to_f32(&encode_volume_f16(&samples));
        assert!(encoded.windows(2).all(|w| w[0] <= w[1]));
        assert!(encoded.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
