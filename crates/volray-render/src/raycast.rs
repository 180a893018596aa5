//! Two-pass volume raycaster.
//!
//! Pass 1 rasterizes the back faces of the unit cube into an offscreen
//! target, storing the local-space exit point of each pixel. Pass 2
//! rasterizes the front faces into the output target and marches from the
//! interpolated entry point to the stored exit point.

use glam::{Quat, Vec3, Vec4};
use volray_core::{
    CompositingMode, LookupTable, Material, RenderSettings, ShadingMode, TransferFunction,
    VolumeField,
};
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::cube::CubeMesh;
use crate::error::{validation_scope, RenderError, RenderResult};
use crate::textures::{ExitPointTarget, LutTexture, VolumeTexture, DEPTH_FORMAT, EXIT_FORMAT};

/// GPU representation of the raycasting uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct RaycastUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub scale: [f32; 3],
    pub sample_count: f32,
    pub viewport: [f32; 2],
    pub compositing_mode: u32,
    pub shading_mode: u32,
    pub light_color: [f32; 3],
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
    pub _pad: f32,
}

impl RaycastUniforms {
    /// Packs camera and render settings.
    #[must_use]
    pub fn new(camera: &Camera, settings: &RenderSettings) -> Self {
        let material = settings.material.clamped();
        Self {
            model: camera.model_matrix(settings.scale).to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            proj: camera.projection_matrix().to_cols_array_2d(),
            scale: settings.scale.to_array(),
            sample_count: settings.sample_count() as f32,
            viewport: camera.state.viewport.as_vec2().to_array(),
            compositing_mode: settings.compositing.shader_index(),
            shading_mode: settings.shading.shader_index(),
            light_color: settings.light_color.to_array(),
            ambient: material.ambient,
            diffuse: material.diffuse,
            specular: material.specular,
            shininess: material.shininess,
            _pad: 0.0,
        }
    }
}

/// Owns the pipelines and GPU resources of the two raycasting passes.
pub struct RaycastRenderer {
    camera: Camera,
    settings: RenderSettings,
    cube: CubeMesh,
    uniform_buffer: wgpu::Buffer,
    exit_pipeline: wgpu::RenderPipeline,
    exit_bind_group: wgpu::BindGroup,
    raycast_pipeline: wgpu::RenderPipeline,
    raycast_bind_group_layout: wgpu::BindGroupLayout,
    // Rebuilt after any texture it references is replaced
    raycast_bind_group: Option<wgpu::BindGroup>,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    exit_target: ExitPointTarget,
    volume: VolumeTexture,
    lut: LutTexture,
}

impl RaycastRenderer {
    /// Creates the renderer with a placeholder volume and the default transfer function.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let camera = Camera::new(width, height);
        let settings = RenderSettings::default();

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Raycast Uniform Buffer"),
            contents: bytemuck::cast_slice(&[RaycastUniforms::new(&camera, &settings)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let exit_shader = create_shader(
            device,
            "Exit Point Shader",
            include_str!("shaders/exit_points.wgsl"),
        )?;
        let raycast_shader = create_shader(
            device,
            "Raycast Shader",
            include_str!("shaders/raycast.wgsl"),
        )?;

        let exit_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Exit Point Bind Group Layout"),
                entries: &[uniform_entry(0)],
            });
        let exit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Exit Point Bind Group"),
            layout: &exit_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let raycast_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Raycast Bind Group Layout"),
                entries: &[
                    uniform_entry(0),
                    // Exit points
                    texture_entry(1, wgpu::TextureViewDimension::D2),
                    // Volume
                    texture_entry(2, wgpu::TextureViewDimension::D3),
                    // Transfer function
                    texture_entry(3, wgpu::TextureViewDimension::D2),
                    sampler_entry(4),
                    sampler_entry(5),
                ],
            });

        let exit_pipeline = {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Exit Point Pipeline Layout"),
                bind_group_layouts: &[&exit_bind_group_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Exit Point Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &exit_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[CubeMesh::vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &exit_shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: EXIT_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Front),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let raycast_pipeline = {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Raycast Pipeline Layout"),
                bind_group_layouts: &[&raycast_bind_group_layout],
                push_constant_ranges: &[],
            });
            // Front faces of a convex cube never overlap, so no depth test
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Raycast Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &raycast_shader,
                    entry_point: Some("vs_main"),
                    buffers: &[CubeMesh::vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &raycast_shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: output_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Raycast Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Raycast Nearest Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let exit_target = ExitPointTarget::new(device, width.max(1), height.max(1))?;
        let volume = VolumeTexture::new(device, queue, &VolumeField::placeholder())?;
        let lut = LutTexture::new(device, queue, TransferFunction::default().lut());

        log::info!("raycaster ready ({width}x{height}, {output_format:?})");

        Ok(Self {
            camera,
            settings,
            cube: CubeMesh::new(device),
            uniform_buffer,
            exit_pipeline,
            exit_bind_group,
            raycast_pipeline,
            raycast_bind_group_layout,
            raycast_bind_group: None,
            linear_sampler,
            nearest_sampler,
            exit_target,
            volume,
            lut,
        })
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Replaces rotation, eye distance and viewport at once.
    ///
    /// The exit-point target is not resized; call [`Self::resize`] for that.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replaces all render settings at once.
    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = RenderSettings {
            material: settings.material.clamped(),
            ..settings
        };
    }

    /// Resizes the viewport and recreates the exit-point target.
    ///
    /// A zero-sized viewport (minimized window) is ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.camera.resize(width, height);
        if self.exit_target.size() != (width, height) {
            self.exit_target = ExitPointTarget::new(device, width, height)?;
            self.raycast_bind_group = None;
        }
        Ok(())
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.settings.scale = scale;
    }

    pub fn set_compositing_mode(&mut self, mode: CompositingMode) {
        log::debug!("compositing mode: {mode:?}");
        self.settings.compositing = mode;
    }

    pub fn set_shading_mode(&mut self, mode: ShadingMode) {
        log::debug!("shading mode: {mode:?}");
        self.settings.shading = mode;
    }

    /// Sets the material coefficients, clamped to their valid ranges.
    pub fn set_material(&mut self, ambient: f32, diffuse: f32, specular: f32) {
        self.settings.material = Material {
            shininess: self.settings.material.shininess,
            ..Material::new(ambient, diffuse, specular)
        };
    }

    pub fn set_light_color(&mut self, color: Vec3) {
        self.settings.light_color = color;
    }

    pub fn set_background_color(&mut self, color: Vec4) {
        self.settings.background = color;
    }

    /// Switches between the low and high sample counts.
    pub fn set_fast_rendering(&mut self, fast: bool) {
        self.settings.fast = fast;
    }

    /// Uploads a freshly published lookup table.
    pub fn update_transfer_function(&mut self, queue: &wgpu::Queue, lut: &LookupTable) {
        self.lut.update(queue, lut);
    }

    pub fn rotate(&mut self, incremental: Quat) {
        self.camera.rotate(incremental);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.camera.zoom(delta);
    }

    /// Uploads a new volume and adopts its physical scale.
    ///
    /// On failure the previous volume stays bound.
    pub fn set_volume(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        volume: &VolumeField,
    ) -> RenderResult<()> {
        self.volume = VolumeTexture::new(device, queue, volume)?;
        self.settings.scale = volume.scale();
        self.raycast_bind_group = None;
        Ok(())
    }

    /// Format the volume was uploaded with.
    #[must_use]
    pub fn volume_format(&self) -> wgpu::TextureFormat {
        self.volume.format()
    }

    fn create_raycast_bind_group(&self, device: &wgpu::Device) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Raycast Bind Group"),
            layout: &self.raycast_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.exit_target.color_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(self.volume.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(self.lut.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.nearest_sampler),
                },
            ],
        })
    }

    /// Records both passes into `encoder`, clearing `view` to the background color.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[RaycastUniforms::new(&self.camera, &self.settings)]),
        );

        if self.raycast_bind_group.is_none() {
            let bind_group = self.create_raycast_bind_group(device);
            self.raycast_bind_group = Some(bind_group);
        }
        let Some(raycast_bind_group) = &self.raycast_bind_group else {
            return;
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Exit Point Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.exit_target.color_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.exit_target.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.exit_pipeline);
            pass.set_bind_group(0, &self.exit_bind_group, &[]);
            self.cube.draw(&mut pass);
        }

        let bg = self.settings.background;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Raycast Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(bg.x),
                        g: f64::from(bg.y),
                        b: f64::from(bg.z),
                        a: f64::from(bg.w),
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.raycast_pipeline);
        pass.set_bind_group(0, raycast_bind_group, &[]);
        self.cube.draw(&mut pass);
    }
}

fn create_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> RenderResult<wgpu::ShaderModule> {
    let (module, error) = validation_scope(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    });
    match error {
        Some(e) => Err(RenderError::ShaderCompilationFailed(format!("{label}: {e}"))),
        None => Ok(module),
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volray_core::SAMPLES_HIGH;

    #[test]
    fn test_uniforms_size() {
        assert_eq!(std::mem::size_of::<RaycastUniforms>(), 256);
        assert_eq!(std::mem::size_of::<RaycastUniforms>() % 16, 0);
        assert_eq!(std::mem::offset_of!(RaycastUniforms, scale), 192);
        assert_eq!(std::mem::offset_of!(RaycastUniforms, viewport), 208);
        assert_eq!(std::mem::offset_of!(RaycastUniforms, light_color), 224);
    }

    #[test]
    fn test_uniforms_from_settings() {
        let camera = Camera::new(640, 480);
        let settings = RenderSettings {
            compositing: CompositingMode::DebugRayEnd,
            shading: ShadingMode::None,
            material: Material::new(9.0, 0.5, -1.0),
            ..RenderSettings::default()
        };
        let u = RaycastUniforms::new(&camera, &settings);
        assert_eq!(u.sample_count, SAMPLES_HIGH as f32);
        assert_eq!(u.viewport, [640.0, 480.0]);
        assert_eq!(u.compositing_mode, 3);
        assert_eq!(u.shading_mode, 3);
        assert_eq!(u.specular, 0.0);
        assert!(u.ambient <= volray_core::options::MATERIAL_MAX);
    }

    #[test]
    fn test_mida_shares_front_to_back_path() {
        let camera = Camera::new(8, 8);
        let mida = RenderSettings {
            compositing: CompositingMode::Mida,
            ..RenderSettings::default()
        };
        assert_eq!(RaycastUniforms::new(&camera, &mida).compositing_mode, 0);
    }
}
