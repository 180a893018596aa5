use super::{App, RenderError};

impl App {
    /// Renders a single frame to the window surface.
    ///
    /// An error means the renderer can no longer produce frames and nothing
    /// was presented.
    pub(super) fn render(&mut self) -> Result<(), RenderError> {
        if self.fatal.is_some() {
            return Ok(());
        }

        let Self {
            engine: Some(engine),
            renderer: Some(renderer),
            viewer,
            ..
        } = self
        else {
            return Ok(());
        };

        viewer.sync(renderer, &engine.device, &engine.queue)?;

        if let Some(filename) = self.screenshot_pending.take() {
            let view = engine.offscreen_view();
            let mut encoder = engine
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("screenshot encoder"),
                });
            renderer.render(&engine.device, &engine.queue, &mut encoder, &view);
            engine.queue.submit(std::iter::once(encoder.finish()));

            let (width, height) = engine.dimensions();
            match engine.capture() {
                Ok(data) => {
                    if let Err(e) = volray_render::save_image(&filename, &data, width, height) {
                        log::error!("failed to save screenshot: {e}");
                    }
                }
                Err(e) => log::error!("failed to capture screenshot: {e}"),
            }
        }

        let Some(surface) = engine.surface.as_ref() else {
            return Ok(());
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                engine.resize(engine.width, engine.height);
                self.request_redraw();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Other) => {
                log::warn!("Surface error: other");
                return Ok(());
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = engine
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render encoder"),
            });
        renderer.render(&engine.device, &engine.queue, &mut encoder, &view);
        engine.queue.submit(std::iter::once(encoder.finish()));

        if let Some(window) = &self.window {
            window.pre_present_notify();
        }
        output.present();
        Ok(())
    }
}
