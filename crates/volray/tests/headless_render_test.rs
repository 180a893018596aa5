//! Headless rendering integration tests.
//!
//! These tests need a GPU adapter (real or software fallback). Without one
//! engine creation fails and the test returns early with a note on stderr.

use std::time::Instant;

use volray::*;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * WIDTH + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

fn srgb_byte(linear: f32) -> u8 {
    let c = if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (c * 255.0).round() as u8
}

fn close(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}

fn empty_volume_viewer(background: Vec4) -> Viewer {
    let volume = VolumeField::from_bytes(&[0u8; 64], UVec3::splat(4), BitDepth::Eight)
        .expect("4x4x4 volume");
    let preset = Preset {
        background,
        ..Preset::default()
    };
    let mut viewer = Viewer::with_volume(volume, &preset);

    // Zoom all the way out so the cube leaves the corners uncovered
    let now = Instant::now();
    for _ in 0..80 {
        viewer.handle_input(InputEvent::Wheel(-120.0), now);
    }
    viewer
}

#[test]
fn headless_empty_volume_is_opaque_black_over_background() {
    let background = Vec4::new(0.2, 0.4, 0.6, 1.0);
    let mut viewer = empty_volume_viewer(background);

    let pixels = match render_to_image(&mut viewer, WIDTH, HEIGHT) {
        Ok(pixels) => pixels,
        Err(VolrayError::GpuConfig(e)) => {
            eprintln!("skipping headless test, no GPU available: {e}");
            return;
        }
        Err(e) => panic!("headless render failed: {e}"),
    };
    assert_eq!(pixels.len(), (WIDTH * HEIGHT * 4) as usize);

    // Intensity 0 maps to opaque black, so the first sample ends every ray
    let center = pixel(&pixels, WIDTH / 2, HEIGHT / 2);
    assert!(center[..3].iter().all(|&c| c <= 2), "center {center:?}");
    assert_eq!(center[3], 255);

    let corner = pixel(&pixels, 1, 1);
    let expected = [
        srgb_byte(background.x),
        srgb_byte(background.y),
        srgb_byte(background.z),
    ];
    assert!(
        corner[..3].iter().zip(expected).all(|(&a, b)| close(a, b)),
        "corner {corner:?}, expected {expected:?}"
    );
}

#[test]
fn headless_rejects_zero_size() {
    let mut viewer = Viewer::default();
    let result = render_to_image(&mut viewer, 0, 64);
    assert!(matches!(result, Err(VolrayError::InvalidConfig(_))));
}

#[test]
fn headless_ray_start_debug_mode_shows_entry_points() {
    use pollster::FutureExt;

    let mut engine = match RenderEngine::new_headless(WIDTH, HEIGHT).block_on() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("skipping headless test, no GPU available: {e}");
            return;
        }
    };
    let mut renderer =
        RaycastRenderer::new(&engine.device, &engine.queue, engine.format(), WIDTH, HEIGHT)
            .expect("raycaster");
    renderer.set_compositing_mode(CompositingMode::DebugRayStart);
    renderer.set_background_color(Vec4::new(0.0, 0.0, 0.0, 1.0));
    for _ in 0..60 {
        renderer.zoom(0.05);
    }

    let view = engine.offscreen_view();
    let mut encoder = engine
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    renderer.render(&engine.device, &engine.queue, &mut encoder, &view);
    engine.queue.submit(std::iter::once(encoder.finish()));
    let pixels = engine.capture().expect("capture");

    // The front face of the unrotated cube is local z = 1
    let center = pixel(&pixels, WIDTH / 2, HEIGHT / 2);
    let half = srgb_byte(0.5);
    assert!(center[0].abs_diff(half) <= 4, "center {center:?}");
    assert!(center[1].abs_diff(half) <= 4, "center {center:?}");
    assert_eq!(center[2], 255);

    let corner = pixel(&pixels, 1, 1);
    assert_eq!(&corner[..3], &[0, 0, 0]);
}

#[test]
fn headless_twelve_bit_volume_renders_through_half_float_path() {
    // Raw 256 on 12 bits widens to 4096 of 65535
    let bytes: Vec<u8> = std::iter::repeat(256u16.to_le_bytes())
        .take(64)
        .flatten()
        .collect();
    let volume =
        VolumeField::from_bytes(&bytes, UVec3::splat(4), BitDepth::Twelve).expect("12-bit volume");
    let mut viewer = Viewer::with_volume(volume, &Preset::default());
    let now = Instant::now();
    for _ in 0..80 {
        viewer.handle_input(InputEvent::Wheel(-120.0), now);
    }

    let pixels = match render_to_image(&mut viewer, WIDTH, HEIGHT) {
        Ok(pixels) => pixels,
        Err(VolrayError::GpuConfig(e)) => {
            eprintln!("skipping headless test, no GPU available: {e}");
            return;
        }
        Err(e) => panic!("headless render failed: {e}"),
    };

    // Constant volume has no gradient, so the first sample is unlit and opaque
    let center = pixel(&pixels, WIDTH / 2, HEIGHT / 2);
    let gray = srgb_byte(4096.0 / 65535.0);
    assert!(
        center[..3].iter().all(|&c| c.abs_diff(gray) <= 3),
        "center {center:?}, expected gray {gray}"
    );
    assert_eq!(center[3], 255);

    let corner = pixel(&pixels, 1, 1);
    assert_eq!(&corner[..3], &[0, 0, 0]);
}

#[test]
fn headless_oversized_volume_keeps_previous_one() {
    use pollster::FutureExt;

    let engine = match RenderEngine::new_headless(WIDTH, HEIGHT).block_on() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("skipping headless test, no GPU available: {e}");
            return;
        }
    };
    let mut renderer =
        RaycastRenderer::new(&engine.device, &engine.queue, engine.format(), WIDTH, HEIGHT)
            .expect("raycaster");

    let max = engine.device.limits().max_texture_dimension_3d;
    let oversized = || {
        let dims = UVec3::new(1, 1, max + 1);
        VolumeField::from_bytes(&vec![0u8; max as usize + 1], dims, BitDepth::Eight)
            .expect("oversized volume decodes on the CPU")
    };

    let err = renderer
        .set_volume(&engine.device, &engine.queue, &oversized())
        .unwrap_err();
    assert!(
        matches!(err, RenderError::VolumeTooLarge { depth, max: limit, .. } if depth == max + 1 && limit == max),
        "{err}"
    );

    let small = VolumeField::from_bytes(&[7u8; 8], UVec3::splat(2), BitDepth::Eight)
        .expect("2x2x2 volume")
        .with_scale(Vec3::new(1.0, 1.0, 0.5));
    let mut viewer = Viewer::with_volume(small, &Preset::default());
    viewer
        .attach(&mut renderer, &engine.device, &engine.queue)
        .expect("attach");

    viewer.set_volume(oversized());
    assert_eq!(viewer.volume().dims(), UVec3::new(1, 1, max + 1));
    viewer
        .sync(&mut renderer, &engine.device, &engine.queue)
        .expect("a rejected volume is not fatal");

    assert_eq!(viewer.volume().dims(), UVec3::splat(2));
    assert_eq!(viewer.settings().scale, Vec3::new(1.0, 1.0, 0.5));
    assert_eq!(renderer.volume_format(), wgpu::TextureFormat::R8Unorm);
}
