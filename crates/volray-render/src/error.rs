//! Rendering error types.

use thiserror::Error;
use volray_core::VolrayError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The platform refused to open a window.
    #[error("failed to create window: {0}")]
    WindowCreationFailed(String),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// The offscreen exit-point target could not be (re)created.
    #[error("incomplete render target at {width}x{height}: {reason}")]
    IncompleteTarget {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A volume extent exceeds the device's 3D texture limit.
    #[error("volume {width}x{height}x{depth} exceeds the 3D texture limit of {max}")]
    VolumeTooLarge {
        width: u32,
        height: u32,
        depth: u32,
        max: u32,
    },

    /// The device rejected a texture or its upload.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// GPU buffer mapping failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,
}

impl From<RenderError> for VolrayError {
    fn from(err: RenderError) -> Self {
        VolrayError::GpuConfig(err.to_string())
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// Runs `f` inside a validation error scope and reports the first error.
pub(crate) fn validation_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let error = pollster::block_on(device.pop_error_scope());
    (value, error)
}
