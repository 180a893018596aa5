//! Unit cube proxy geometry.
//!
//! Both raycasting passes rasterize the cube [0,1]^3; the interpolated
//! vertex position doubles as the local-space ray coordinate.

use wgpu::util::DeviceExt;

/// Corner `i` has coordinates `(i >> 2 & 1, i >> 1 & 1, i & 1)`.
pub const CUBE_VERTICES: [[f32; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 1.0, 1.0],
];

/// Two counter-clockwise triangles per face, seen from outside.
pub const CUBE_INDICES: [u16; 36] = [
    1, 5, 7, 7, 3, 1, // +z
    0, 2, 6, 6, 4, 0, // -z
    0, 1, 3, 3, 2, 0, // -x
    7, 5, 4, 4, 6, 7, // +x
    2, 3, 7, 7, 6, 2, // +y
    1, 0, 4, 4, 5, 1, // -y
];

/// Vertex and index buffers for the cube, created once per device.
pub struct CubeMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
}

impl CubeMesh {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube vertices"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube indices"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
        }
    }

    /// Vertex layout: a single `vec3<f32>` position at location 0.
    #[must_use]
    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    /// Binds the buffers and issues the indexed draw.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..CUBE_INDICES.len() as u32, 0, 0..1);
    }
}
