//! Rendering backend for volray.
//!
//! This crate provides the wgpu-based raycaster, including:
//! - device and surface management, with headless capture
//! - volume and transfer function textures
//! - the two-pass raycasting pipelines (WGSL)
//! - camera matrices derived from the interaction state

// Shader and pipeline code casts freely between GPU and host integer types.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod cube;
pub mod engine;
pub mod error;
pub mod raycast;
pub mod screenshot;
pub mod textures;

pub use camera::Camera;
pub use cube::CubeMesh;
pub use engine::{RenderEngine, CAPTURE_FORMAT};
pub use error::{RenderError, RenderResult};
pub use raycast::{RaycastRenderer, RaycastUniforms};
pub use screenshot::{encode_png, save_image, ScreenshotError};
pub use textures::{encode_lut, ExitPointTarget, LutTexture, VolumeTexture};
