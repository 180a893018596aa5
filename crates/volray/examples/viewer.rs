//! Interactive viewer.
//!
//! Usage: `cargo run --example viewer [config.json]`
//!
//! Without a configuration file a synthetic volume (nested spherical shells)
//! is generated so the viewer can be tried without any dataset.

use volray::*;

fn synthetic_volume(n: u32) -> Result<VolumeField> {
    let center = Vec3::splat((n - 1) as f32 / 2.0);
    let mut bytes = Vec::with_capacity((n * n * n) as usize);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let r = (Vec3::new(x as f32, y as f32, z as f32) - center).length() / center.x;
                let shell = (r * 6.0 * std::f32::consts::PI).cos() * 0.5 + 0.5;
                let value = if r < 1.0 { shell * (1.0 - r) } else { 0.0 };
                bytes.push((value * 255.0) as u8);
            }
        }
    }
    VolumeField::from_bytes(&bytes, UVec3::splat(n), BitDepth::Eight)
}

fn main() -> Result<()> {
    env_logger::init();

    if let Some(path) = std::env::args().nth(1) {
        let config = ViewerConfig::load(path)?;
        return show(&config);
    }

    let preset = Preset {
        name: "shells".to_string(),
        color: Curve::from_points([
            (0.0, Vec3::new(0.1, 0.1, 0.4)),
            (0.5, Vec3::new(0.9, 0.5, 0.2)),
            (1.0, Vec3::ONE),
        ])?,
        opacity: Curve::from_points([(0.0, 0.0), (0.2, 0.0), (0.6, 0.3), (1.0, 0.9)])?,
        background: Vec4::new(0.05, 0.05, 0.08, 1.0),
    };
    let viewer = Viewer::with_volume(synthetic_volume(96)?, &preset);
    show_viewer(viewer, &ViewerConfig::default())
}
