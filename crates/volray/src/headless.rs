//! Headless rendering API for volray.
//!
//! Renders a [`Viewer`] to an image buffer or file without opening a window.
//! Useful for integration tests, batch processing and automated snapshots.

use std::path::Path;
use std::time::Instant;

use pollster::FutureExt;
use volray_core::{InputEvent, Result, VolrayError};
use volray_render::{RaycastRenderer, RenderEngine};

use crate::viewer::Viewer;

/// Renders the viewer to a file.
///
/// Creates a headless GPU context, renders one frame and saves it as a PNG or
/// JPEG image depending on the extension.
///
/// # Example
/// ```no_run
/// use volray::*;
///
/// let mut viewer = Viewer::new(&ViewerConfig::default());
/// render_to_file(&mut viewer, "head.png", 512, 512).unwrap();
/// ```
pub fn render_to_file(
    viewer: &mut Viewer,
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
) -> Result<()> {
    let data = render_to_image(viewer, width, height)?;
    volray_render::save_image(path, &data, width, height)
        .map_err(|e| VolrayError::InvalidConfig(format!("failed to save image: {e}")))
}

/// Renders the viewer to a raw RGBA pixel buffer.
///
/// The returned buffer holds `width * height * 4` sRGB-encoded bytes, row by
/// row from the top-left corner. The viewer's camera viewport is resized to
/// the requested dimensions. Frames are always rendered at full quality.
///
/// # Example
/// ```no_run
/// use volray::*;
///
/// let mut viewer = Viewer::default();
/// let pixels = render_to_image(&mut viewer, 320, 240).unwrap();
/// assert_eq!(pixels.len(), 320 * 240 * 4);
/// ```
pub fn render_to_image(viewer: &mut Viewer, width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(VolrayError::InvalidConfig(format!(
            "image size must be non-zero, got {width}x{height}"
        )));
    }

    let mut engine = RenderEngine::new_headless(width, height).block_on()?;
    let mut renderer =
        RaycastRenderer::new(&engine.device, &engine.queue, engine.format(), width, height)?;

    viewer.handle_input(InputEvent::Resize(width, height), Instant::now());
    viewer.attach(&mut renderer, &engine.device, &engine.queue)?;
    renderer.set_fast_rendering(false);

    let view = engine.offscreen_view();
    let mut encoder = engine
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("headless render encoder"),
        });
    renderer.render(&engine.device, &engine.queue, &mut encoder, &view);
    engine.queue.submit(std::iter::once(encoder.finish()));

    engine.capture().map_err(Into::into)
}
