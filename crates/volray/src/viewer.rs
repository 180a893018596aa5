//! The viewer model: volume, transfer function, settings and navigation.
//!
//! [`Viewer`] owns no GPU state. Input handling and edits only record what
//! changed; [`Viewer::sync`] pushes those changes into a [`RaycastRenderer`]
//! once per frame.

use std::time::Instant;

use volray_core::{
    CameraState, CompositingMode, EventQueue, IdleTimer, InputEvent, Intent, InteractionState,
    Preset, RenderSettings, Result, ShadingMode, TransferFunction, Vec3, Vec4, VolumeConfig,
    VolumeField,
};
use volray_render::{Camera, RaycastRenderer, RenderResult};

use crate::config::ViewerConfig;

/// Application state shared by the window loop and headless rendering.
pub struct Viewer {
    volume: VolumeField,
    volume_dirty: bool,
    // Volume still bound on the GPU while `volume` waits for upload
    bound_volume: Option<VolumeField>,
    transfer_function: TransferFunction,
    preset_name: String,
    settings: RenderSettings,
    settings_dirty: bool,
    interaction: InteractionState,
    idle_timer: IdleTimer,
    intents: EventQueue,
    redraw: bool,
}

impl Viewer {
    /// Builds the viewer from a configuration.
    ///
    /// An unreadable volume is replaced by a 1x1x1 placeholder and an
    /// unreadable preset by the default one; both are logged.
    #[must_use]
    pub fn new(config: &ViewerConfig) -> Self {
        let volume = config.volume.load().unwrap_or_else(|e| {
            log::warn!("could not load volume: {e}; starting with an empty volume");
            VolumeField::placeholder()
        });
        let preset = config
            .preset
            .as_ref()
            .map_or_else(Preset::default, Preset::load_or_default);

        let mut viewer = Self::with_volume(volume, &preset);
        viewer.settings = RenderSettings {
            background: if config.preset.is_some() {
                preset.background
            } else {
                config.settings.background
            },
            scale: viewer.volume.scale(),
            fast: false,
            ..config.settings.clone()
        };
        viewer.interaction =
            InteractionState::new(CameraState::new(config.window_width, config.window_height));
        viewer
    }

    /// Builds a viewer around an already loaded volume.
    #[must_use]
    pub fn with_volume(volume: VolumeField, preset: &Preset) -> Self {
        let settings = RenderSettings {
            background: preset.background,
            scale: volume.scale(),
            ..RenderSettings::default()
        };
        Self {
            volume,
            volume_dirty: true,
            bound_volume: None,
            transfer_function: TransferFunction::from_preset(preset),
            preset_name: preset.name.clone(),
            settings,
            settings_dirty: true,
            interaction: InteractionState::default(),
            idle_timer: IdleTimer::default(),
            intents: EventQueue::new(),
            redraw: true,
        }
    }

    #[must_use]
    pub fn volume(&self) -> &VolumeField {
        &self.volume
    }

    /// Replaces the volume and adopts its scale.
    ///
    /// If the GPU later rejects it, [`Viewer::sync`] restores the volume
    /// that was displayed before.
    pub fn set_volume(&mut self, volume: VolumeField) {
        self.settings.scale = volume.scale();
        let previous = std::mem::replace(&mut self.volume, volume);
        if !self.volume_dirty {
            self.bound_volume = Some(previous);
        }
        self.volume_dirty = true;
        self.redraw = true;
    }

    /// Loads a new volume. On failure the current volume stays in place.
    pub fn load_volume(&mut self, config: &VolumeConfig) -> Result<()> {
        match config.load() {
            Ok(volume) => {
                self.set_volume(volume);
                Ok(())
            }
            Err(e) => {
                log::warn!("keeping current volume: {e}");
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn transfer_function(&self) -> &TransferFunction {
        &self.transfer_function
    }

    /// Mutable access for curve edits; edits publish a new lookup table.
    pub fn transfer_function_mut(&mut self) -> &mut TransferFunction {
        self.redraw = true;
        &mut self.transfer_function
    }

    #[must_use]
    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    /// Replaces both curves and the background with the preset's.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.transfer_function.apply_preset(preset);
        self.preset_name.clone_from(&preset.name);
        self.set_background_color(preset.background);
    }

    /// The current curves and background as a preset.
    #[must_use]
    pub fn to_preset(&self) -> Preset {
        Preset {
            name: self.preset_name.clone(),
            color: self.transfer_function.color().clone(),
            opacity: self.transfer_function.opacity().clone(),
            background: self.settings.background,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Edits the render settings. Fast mode stays under the control of the
    /// interaction state machine.
    pub fn update_settings(&mut self, edit: impl FnOnce(&mut RenderSettings)) {
        let fast = self.settings.fast;
        edit(&mut self.settings);
        self.settings.fast = fast;
        self.settings.material = self.settings.material.clamped();
        self.settings_dirty = true;
        self.redraw = true;
    }

    pub fn set_compositing_mode(&mut self, mode: CompositingMode) {
        self.update_settings(|s| s.compositing = mode);
    }

    pub fn set_shading_mode(&mut self, mode: ShadingMode) {
        self.update_settings(|s| s.shading = mode);
    }

    pub fn set_background_color(&mut self, color: Vec4) {
        self.update_settings(|s| s.background = color);
    }

    pub fn set_light_color(&mut self, color: Vec3) {
        self.update_settings(|s| s.light_color = color);
    }

    pub fn cycle_compositing_mode(&mut self) -> CompositingMode {
        let mode = self.settings.compositing.next();
        self.set_compositing_mode(mode);
        mode
    }

    pub fn cycle_shading_mode(&mut self) -> ShadingMode {
        let mode = self.settings.shading.next();
        self.set_shading_mode(mode);
        mode
    }

    #[must_use]
    pub fn camera(&self) -> &CameraState {
        &self.interaction.camera
    }

    /// Feeds one input event through the interaction state machine.
    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        let (next, intents) = self.interaction.handle(event);
        self.interaction = next;
        for intent in intents {
            match intent {
                Intent::ArmIdleTimer => self.idle_timer.arm(now),
                Intent::Redraw => self.redraw = true,
                Intent::SetFastMode(fast) => {
                    self.settings.fast = fast;
                    self.intents.push(intent);
                }
                other => self.intents.push(other),
            }
        }
    }

    /// Leaves fast mode once the wheel has been idle long enough.
    ///
    /// Returns true when a new frame is needed.
    pub fn poll_idle(&mut self, now: Instant) -> bool {
        if self.idle_timer.poll(now) && !self.interaction.dragging {
            self.settings.fast = false;
            self.intents.push(Intent::SetFastMode(false));
            self.redraw = true;
        }
        self.redraw
    }

    /// When [`Viewer::poll_idle`] should be called next.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.idle_timer.deadline()
    }

    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.redraw || !self.intents.is_empty()
    }

    /// Pushes the complete state into a freshly created renderer.
    pub fn attach(
        &mut self,
        renderer: &mut RaycastRenderer,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> RenderResult<()> {
        // The interaction camera already includes every queued rotation and zoom
        let camera = self.interaction.camera;
        let mut pending: Vec<Intent> = self
            .intents
            .drain()
            .filter(|i| !matches!(i, Intent::Rotate(_) | Intent::Zoom(_)))
            .collect();
        pending.push(Intent::Resize(camera.viewport.x, camera.viewport.y));
        self.intents.extend(pending);

        renderer.set_camera(Camera::from_state(camera));
        renderer.set_fast_rendering(self.settings.fast);
        renderer.update_transfer_function(queue, self.transfer_function.lut());
        let _ = self.transfer_function.take_published();
        // A fresh renderer holds the placeholder volume
        self.bound_volume = None;
        self.volume_dirty = true;
        self.settings_dirty = true;
        self.sync(renderer, device, queue)
    }

    /// Applies everything that changed since the last frame.
    ///
    /// A volume the GPU rejects is logged and replaced by the one displayed
    /// before it (the placeholder right after [`Viewer::attach`]). Errors
    /// that leave the renderer unusable are returned.
    pub fn sync(
        &mut self,
        renderer: &mut RaycastRenderer,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> RenderResult<()> {
        let mut result = Ok(());
        for intent in self.intents.drain() {
            match intent {
                Intent::Rotate(q) => renderer.rotate(q),
                Intent::Zoom(delta) => renderer.zoom(delta),
                Intent::SetFastMode(fast) => renderer.set_fast_rendering(fast),
                Intent::Resize(width, height) => {
                    if let Err(e) = renderer.resize(device, width, height) {
                        result = Err(e);
                    }
                }
                Intent::ArmIdleTimer | Intent::Redraw => {}
            }
        }

        if self.volume_dirty {
            self.volume_dirty = false;
            match renderer.set_volume(device, queue, &self.volume) {
                Ok(()) => self.bound_volume = None,
                Err(e) => {
                    log::warn!("could not upload volume, keeping the previous one: {e}");
                    self.volume = self
                        .bound_volume
                        .take()
                        .unwrap_or_else(VolumeField::placeholder);
                    self.settings.scale = self.volume.scale();
                    self.settings_dirty = true;
                }
            }
        }
        if let Some(lut) = self.transfer_function.take_published() {
            renderer.update_transfer_function(queue, &lut);
        }
        if self.settings_dirty {
            renderer.set_settings(self.settings.clone());
            self.settings_dirty = false;
        }

        self.redraw = false;
        result
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::with_volume(VolumeField::placeholder(), &Preset::default())
    }
}
