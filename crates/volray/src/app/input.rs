use std::time::Instant;

use volray_core::interaction::WHEEL_THRESHOLD;
use volray_core::{InputEvent, Vec2};

use super::{
    ActiveEventLoop, App, ApplicationHandler, Arc, ControlFlow, ElementState, FutureExt, KeyCode,
    LogicalSize, MouseButton, RaycastRenderer, RenderEngine, RenderError, Window, WindowEvent,
    WindowId,
};

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.window_size.0, self.window_size.1));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, RenderError::WindowCreationFailed(e.to_string()));
                return;
            }
        };

        // Create render engine
        let engine = match RenderEngine::new_windowed(window.clone()).block_on() {
            Ok(engine) => engine,
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        };

        let (width, height) = engine.dimensions();
        let mut renderer = match RaycastRenderer::new(
            &engine.device,
            &engine.queue,
            engine.format(),
            width,
            height,
        ) {
            Ok(renderer) => renderer,
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        };

        self.viewer
            .handle_input(InputEvent::Resize(width, height), Instant::now());
        if let Err(e) = self
            .viewer
            .attach(&mut renderer, &engine.device, &engine.queue)
        {
            self.fail(event_loop, e);
            return;
        }

        self.window = Some(window);
        self.engine = Some(engine);
        self.renderer = Some(renderer);
        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let now = Instant::now();
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = &mut self.engine {
                    engine.resize(size.width, size.height);
                }
                if size.width > 0 && size.height > 0 {
                    self.viewer
                        .handle_input(InputEvent::Resize(size.width, size.height), now);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                    return;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = (position.x, position.y);
                self.viewer.handle_input(
                    InputEvent::Move(Vec2::new(position.x as f32, position.y as f32)),
                    now,
                );
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let event = match state {
                    ElementState::Pressed => InputEvent::Press(Vec2::new(
                        self.mouse_pos.0 as f32,
                        self.mouse_pos.1 as f32,
                    )),
                    ElementState::Released => InputEvent::Release,
                };
                self.viewer.handle_input(event, now);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // One notch is WHEEL_THRESHOLD units, like a classic wheel
                let scroll = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => y * WHEEL_THRESHOLD,
                    winit::event::MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if scroll != 0.0 {
                    self.viewer.handle_input(InputEvent::Wheel(scroll), now);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    if let winit::keyboard::PhysicalKey::Code(code) = event.physical_key {
                        match code {
                            KeyCode::Escape | KeyCode::KeyQ => {
                                self.close_requested = true;
                            }
                            KeyCode::KeyC => {
                                let mode = self.viewer.cycle_compositing_mode();
                                log::info!("compositing: {mode:?}");
                            }
                            KeyCode::KeyS => {
                                let mode = self.viewer.cycle_shading_mode();
                                log::info!("shading: {mode:?}");
                            }
                            KeyCode::F12 => {
                                self.request_auto_screenshot();
                                log::info!("Screenshot requested (F12)");
                                self.request_redraw();
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }

        if self.close_requested {
            event_loop.exit();
        } else if self.viewer.needs_redraw() {
            self.request_redraw();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.poll_idle(Instant::now()) {
            self.request_redraw();
        }
        match self.viewer.next_deadline() {
            Some(deadline) => event_loop.set_control_flow(ControlFlow::WaitUntil(deadline)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}
