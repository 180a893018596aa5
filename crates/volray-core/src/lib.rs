//! Core model for volray.
//!
//! This crate holds everything that does not need a GPU:
//! - [`VolumeField`] loading from raw voxel files
//! - [`TransferFunction`] curves and the lookup table derived from them
//! - [`Preset`] files, [`RenderSettings`] and the camera [`InteractionState`]
//! - the [`EventQueue`] that carries interaction intents to the renderer
//! - a CPU reference of the raycasting integral in [`compositor`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Bucket indices and sample counts are small enough to be exact in f32
#![allow(clippy::cast_precision_loss)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]

pub mod compositor;
pub mod error;
pub mod events;
pub mod interaction;
pub mod options;
pub mod preset;
pub mod transfer_function;
pub mod volume;

pub use error::{ErrorKind, Result, VolrayError};
pub use events::EventQueue;
pub use interaction::{CameraState, IdleTimer, InputEvent, Intent, InteractionState};
pub use options::{
    CompositingMode, Material, RenderSettings, ShadingMode, SAMPLES_HIGH, SAMPLES_LOW,
};
pub use preset::Preset;
pub use transfer_function::{ControlPoint, Curve, LookupTable, PointId, TransferFunction, LUT_SIZE};
pub use volume::{BitDepth, VolumeConfig, VolumeField, Voxels};

// Re-export glam types for convenience
pub use glam::{Quat, UVec2, UVec3, Vec2, Vec3, Vec4};
