//! Render settings shared by the viewer and the renderer.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Ray samples per pixel while the user is interacting.
pub const SAMPLES_LOW: u32 = 100;

/// Ray samples per pixel at rest.
pub const SAMPLES_HIGH: u32 = 4000;

/// Upper bound for material reflectance coefficients.
pub const MATERIAL_MAX: f32 = 5.0;

/// How samples along a ray are accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CompositingMode {
    /// Front-to-back alpha compositing with early ray termination.
    #[default]
    FrontToBack,
    /// Keeps the sample with the highest opacity.
    MaximumIntensity,
    /// Not implemented; renders as [`CompositingMode::FrontToBack`].
    Mida,
    /// Ray entry point as color.
    DebugRayStart,
    /// Ray exit point as color.
    DebugRayEnd,
    /// Absolute ray direction as color.
    DebugRayDirection,
}

impl CompositingMode {
    pub const ALL: [Self; 6] = [
        Self::FrontToBack,
        Self::MaximumIntensity,
        Self::Mida,
        Self::DebugRayStart,
        Self::DebugRayEnd,
        Self::DebugRayDirection,
    ];

    /// Mode index as understood by the raycast shader.
    #[must_use]
    pub fn shader_index(self) -> u32 {
        match self {
            Self::FrontToBack | Self::Mida => 0,
            Self::MaximumIntensity => 1,
            Self::DebugRayStart => 2,
            Self::DebugRayEnd => 3,
            Self::DebugRayDirection => 4,
        }
    }

    /// The mode after this one, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

/// Lighting model applied to classified samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShadingMode {
    #[default]
    BlinnPhong,
    /// Blinn-Phong with darkened silhouettes.
    BlinnPhongEdges,
    /// Silhouettes plus a diffuse term quantized into bands.
    BlinnPhongEdgesToon,
    /// Unlit.
    None,
}

impl ShadingMode {
    pub const ALL: [Self; 4] = [
        Self::BlinnPhong,
        Self::BlinnPhongEdges,
        Self::BlinnPhongEdgesToon,
        Self::None,
    ];

    #[must_use]
    pub fn shader_index(self) -> u32 {
        match self {
            Self::BlinnPhong => 0,
            Self::BlinnPhongEdges => 1,
            Self::BlinnPhongEdgesToon => 2,
            Self::None => 3,
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T) -> T {
    let i = all.iter().position(|m| *m == current).unwrap_or(0);
    all[(i + 1) % all.len()]
}

/// Ambient, diffuse and specular reflectance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: 0.05,
            diffuse: 0.3,
            specular: 0.45,
            shininess: 32.0,
        }
    }
}

impl Material {
    /// Creates a material, clamping each coefficient to `[0, MATERIAL_MAX]`.
    #[must_use]
    pub fn new(ambient: f32, diffuse: f32, specular: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            ..Self::default()
        }
        .clamped()
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, MATERIAL_MAX) };
        Self {
            ambient: clamp(self.ambient),
            diffuse: clamp(self.diffuse),
            specular: clamp(self.specular),
            shininess: self.shininess.max(1.0),
        }
    }
}

/// Everything the raycaster needs besides the volume, the lookup table and the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub compositing: CompositingMode,
    pub shading: ShadingMode,
    pub material: Material,
    /// Light color (RGB).
    pub light_color: Vec3,
    /// Background color (RGBA).
    pub background: Vec4,
    /// Per-axis scale of the volume cube.
    pub scale: Vec3,
    /// Whether the low sample count is in effect.
    #[serde(skip)]
    pub fast: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            compositing: CompositingMode::default(),
            shading: ShadingMode::default(),
            material: Material::default(),
            light_color: Vec3::ONE,
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
            scale: Vec3::ONE,
            fast: false,
        }
    }
}

impl RenderSettings {
    /// Samples per ray: exactly [`SAMPLES_LOW`] in fast mode, [`SAMPLES_HIGH`] otherwise.
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        if self.fast {
            SAMPLES_LOW
        } else {
            SAMPLES_HIGH
        }
    }
}
