//! volray: interactive GPU direct volume rendering.
//!
//! A raw scalar volume (for example a CT scan) is classified through an
//! editable transfer function and ray-marched on the GPU. The viewer rotates
//! the volume with an arcball, zooms with the wheel and drops to a low sample
//! count while the user interacts.
//!
//! # Quick Start
//!
//! ```no_run
//! use volray::*;
//!
//! fn main() -> Result<()> {
//!     let config = ViewerConfig {
//!         volume: VolumeConfig {
//!             path: "datasets/head256.raw".into(),
//!             width: 256,
//!             height: 256,
//!             depth: 225,
//!             bit_depth: 12,
//!             ..VolumeConfig::default()
//!         },
//!         ..ViewerConfig::default()
//!     };
//!
//!     // Opens the window and blocks until it is closed
//!     show(&config)
//! }
//! ```
//!
//! # Controls
//!
//! - left drag: rotate
//! - wheel: zoom
//! - `C` / `S`: cycle compositing and shading modes
//! - `F12`: save a screenshot
//! - `Esc` / `Q`: quit

// Window coordinates are converted between f64 and f32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod app;
mod config;
mod headless;
mod viewer;

pub use config::ViewerConfig;
pub use headless::{render_to_file, render_to_image};
pub use viewer::Viewer;

// Re-export core types
pub use volray_core::{
    compositor, BitDepth, CompositingMode, ControlPoint, Curve, ErrorKind, InputEvent,
    LookupTable, Material, Preset, RenderSettings, Result, ShadingMode, TransferFunction,
    VolrayError, VolumeConfig, VolumeField, LUT_SIZE,
};
pub use volray_core::{Quat, UVec3, Vec2, Vec3, Vec4};

// Re-export render types
pub use volray_render::{RaycastRenderer, RenderEngine, RenderError};

/// Opens the viewer window for a configuration.
///
/// This function blocks until the window is closed.
pub fn show(config: &ViewerConfig) -> Result<()> {
    let _ = env_logger::try_init();
    let viewer = Viewer::new(config);
    app::run_app(viewer, config)
}

/// Opens the viewer window for an already prepared viewer.
pub fn show_viewer(viewer: Viewer, config: &ViewerConfig) -> Result<()> {
    let _ = env_logger::try_init();
    app::run_app(viewer, config)
}
