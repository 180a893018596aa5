//! CPU reference for the per-pixel raycasting integral.
//!
//! Mirrors `raycast.wgsl` so that images can be predicted without a GPU.
//! Rays run between an entry and an exit point in local cube coordinates.

use glam::{Vec3, Vec4};

use crate::options::{CompositingMode, Material, RenderSettings, ShadingMode};
use crate::transfer_function::LookupTable;
use crate::volume::VolumeField;

/// Accumulated opacity at which a ray stops early.
pub const EARLY_EXIT_ALPHA: f32 = 0.99;

/// Gradients shorter than this leave a sample unlit.
const MIN_GRADIENT: f32 = 1e-4;

/// Number of bands for toon shading.
const TOON_BANDS: f32 = 4.0;

/// Integrates one ray and returns straight (non-premultiplied) RGBA.
#[must_use]
pub fn composite_ray(
    volume: &VolumeField,
    lut: &LookupTable,
    settings: &RenderSettings,
    entry: Vec3,
    exit: Vec3,
) -> Vec4 {
    let direction = exit - entry;
    match settings.compositing {
        CompositingMode::DebugRayStart => return entry.extend(1.0),
        CompositingMode::DebugRayEnd => return exit.extend(1.0),
        CompositingMode::DebugRayDirection => return direction.abs().extend(1.0),
        _ => {}
    }
    if direction.length_squared() == 0.0 {
        return Vec4::ZERO;
    }

    let samples = settings.sample_count();
    let step = direction / samples as f32;
    let view = -direction.normalize();
    let mip = settings.compositing == CompositingMode::MaximumIntensity;

    let mut color = Vec3::ZERO;
    let mut alpha = 0.0;
    let mut best = Vec4::ZERO;

    for i in 0..samples {
        let p = entry + step * i as f32;
        let classified = lut.sample(volume.sample(p));
        if classified.w <= 0.0 {
            continue;
        }
        let rgb = shade(
            classified.truncate(),
            gradient(volume, p, settings.scale),
            view,
            settings,
        );

        if mip {
            if classified.w > best.w {
                best = rgb.extend(classified.w);
            }
            continue;
        }

        let weight = (1.0 - alpha) * classified.w;
        color += weight * rgb;
        alpha += weight;
        if alpha >= EARLY_EXIT_ALPHA {
            break;
        }
    }

    if mip {
        best
    } else if alpha > 0.0 {
        (color / alpha).extend(alpha)
    } else {
        Vec4::ZERO
    }
}

/// Blends `src` over `dst` with `(src_alpha, 1 - src_alpha)` factors.
#[must_use]
pub fn blend_over(src: Vec4, dst: Vec4) -> Vec4 {
    let rgb = src.truncate() * src.w + dst.truncate() * (1.0 - src.w);
    rgb.extend(src.w + dst.w * (1.0 - src.w))
}

/// Central-difference gradient of the intensity field, one texel apart.
#[must_use]
pub fn gradient(volume: &VolumeField, p: Vec3, scale: Vec3) -> Vec3 {
    let h = Vec3::ONE / volume.dims().as_vec3();
    let dx = volume.sample(p + Vec3::X * h.x) - volume.sample(p - Vec3::X * h.x);
    let dy = volume.sample(p + Vec3::Y * h.y) - volume.sample(p - Vec3::Y * h.y);
    let dz = volume.sample(p + Vec3::Z * h.z) - volume.sample(p - Vec3::Z * h.z);
    Vec3::new(dx, dy, dz) / (2.0 * h * scale)
}

/// Lights a classified color with a headlight along `view`.
#[must_use]
pub fn shade(color: Vec3, gradient: Vec3, view: Vec3, settings: &RenderSettings) -> Vec3 {
    if settings.shading == ShadingMode::None || gradient.length() < MIN_GRADIENT {
        return color;
    }

    let mut normal = -gradient.normalize();
    if normal.dot(view) < 0.0 {
        normal = -normal;
    }
    let n_dot_l = normal.dot(view).max(0.0);
    let Material {
        ambient,
        diffuse,
        specular,
        shininess,
    } = settings.material;

    let diffuse_term = match settings.shading {
        ShadingMode::BlinnPhongEdgesToon => (n_dot_l * TOON_BANDS).floor() / TOON_BANDS,
        _ => n_dot_l,
    };
    // Light and view coincide, so the half vector is the view direction
    let specular_term = n_dot_l.powf(shininess);

    let mut lit = ambient * color
        + diffuse * diffuse_term * color * settings.light_color
        + specular * specular_term * settings.light_color;

    if matches!(
        settings.shading,
        ShadingMode::BlinnPhongEdges | ShadingMode::BlinnPhongEdgesToon
    ) {
        lit *= n_dot_l.sqrt();
    }
    lit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::Preset;
    use crate::transfer_function::{Curve, TransferFunction};
    use crate::volume::BitDepth;
    use glam::UVec3;

    fn zero_volume() -> VolumeField {
        VolumeField::from_bytes(&[0; 64], UVec3::splat(4), BitDepth::Eight).unwrap()
    }

    #[test]
    fn test_zero_volume_takes_lut_start_color() {
        let volume = zero_volume();
        let tf = TransferFunction::default();
        let settings = RenderSettings::default();

        let src = composite_ray(
            &volume,
            tf.lut(),
            &settings,
            Vec3::new(0.5, 0.5, 1.0),
            Vec3::new(0.5, 0.5, 0.0),
        );
        let expected = tf.lut().entries()[0];
        assert!(src.abs_diff_eq(expected, 1e-6));

        let background = Vec4::new(0.2, 0.4, 0.6, 1.0);
        let pixel = blend_over(src, background);
        assert!(pixel.abs_diff_eq(blend_over(expected, background), 1e-6));
        assert!(pixel.truncate().abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_translucent_color_saturates() {
        let preset = Preset {
            color: Curve::new(Vec3::X, Vec3::X),
            opacity: Curve::new(0.5, 0.5),
            ..Preset::default()
        };
        let tf = TransferFunction::from_preset(&preset);
        let settings = RenderSettings {
            fast: true,
            shading: ShadingMode::None,
            ..RenderSettings::default()
        };
        let src = composite_ray(&zero_volume(), tf.lut(), &settings, Vec3::ZERO, Vec3::ONE);
        assert!(src.w >= EARLY_EXIT_ALPHA);
        assert!(src.truncate().abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn test_debug_modes_bypass_volume() {
        let tf = TransferFunction::default();
        let entry = Vec3::new(0.1, 0.2, 0.9);
        let exit = Vec3::new(0.6, 0.2, 0.1);
        let mut settings = RenderSettings::default();

        settings.compositing = CompositingMode::DebugRayStart;
        assert_eq!(
            composite_ray(&zero_volume(), tf.lut(), &settings, entry, exit),
            entry.extend(1.0)
        );
        settings.compositing = CompositingMode::DebugRayEnd;
        assert_eq!(
            composite_ray(&zero_volume(), tf.lut(), &settings, entry, exit),
            exit.extend(1.0)
        );
        settings.compositing = CompositingMode::DebugRayDirection;
        let dir = composite_ray(&zero_volume(), tf.lut(), &settings, entry, exit);
        assert!(dir.abs_diff_eq(Vec4::new(0.5, 0.0, 0.8, 1.0), 1e-6));
    }

    #[test]
    fn test_maximum_intensity_keeps_most_opaque_sample() {
        // Intensity ramps along x
        let bytes: Vec<u8> = (0..64u8).map(|i| (i % 4) * 85).collect();
        let volume = VolumeField::from_bytes(&bytes, UVec3::splat(4), BitDepth::Eight).unwrap();
        let preset = Preset {
            color: Curve::new(Vec3::ZERO, Vec3::ONE),
            opacity: Curve::new(0.0, 0.8),
            ..Preset::default()
        };
        let tf = TransferFunction::from_preset(&preset);
        let settings = RenderSettings {
            compositing: CompositingMode::MaximumIntensity,
            shading: ShadingMode::None,
            fast: true,
            ..RenderSettings::default()
        };
        let src = composite_ray(
            &volume,
            tf.lut(),
            &settings,
            Vec3::new(0.0, 0.5, 0.5),
            Vec3::new(1.0, 0.5, 0.5),
        );
        assert!((src.w - 0.8).abs() < 0.02);
        assert!(src.x > 0.95);
    }

    #[test]
    fn test_shading_without_gradient_is_unlit() {
        let settings = RenderSettings::default();
        let color = Vec3::new(0.3, 0.6, 0.9);
        assert_eq!(shade(color, Vec3::ZERO, Vec3::Z, &settings), color);
    }

    #[test]
    fn test_headlight_blinn_phong() {
        let settings = RenderSettings::default();
        let m = settings.material;
        // Surface facing the viewer: gradient points into the volume
        let lit = shade(Vec3::ONE, -Vec3::Z, Vec3::Z, &settings);
        let expected = m.ambient + m.diffuse + m.specular;
        assert!(lit.abs_diff_eq(Vec3::splat(expected), 1e-5));

        // Silhouettes go dark with edge shading
        let edges = RenderSettings {
            shading: ShadingMode::BlinnPhongEdges,
            ..RenderSettings::default()
        };
        let grazing = shade(Vec3::ONE, -Vec3::X, Vec3::Z, &edges);
        assert!(grazing.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn test_blend_over() {
        let bg = Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(blend_over(Vec4::ZERO, bg), bg);
        assert_eq!(
            blend_over(Vec4::new(1.0, 0.0, 0.0, 1.0), bg),
            Vec4::new(1.0, 0.0, 0.0, 1.0)
        );
    }
}
