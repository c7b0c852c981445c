//! Integration tests for the resource lifecycle on the empty device
//!
//! No GPU required.
//!
//! Run with: cargo test --test lifecycle_integration_tests

use kestrel_engine::glam::UVec2;
use kestrel_engine::kestrel::render::{
    BufferDesc, BufferFlags, BufferUsage, Color, EmptyDevice, EmptyDeviceProbe, EmptyObject,
    Filter, IndexFormat, Level, PixelFormat, RenderTargetDesc, RenderTargetFlags, Renderer,
    RendererSettings, ResourceKind, ResourceState, TextureDesc, TextureFlags,
};
use kestrel_engine::kestrel::Error;

fn renderer() -> (Renderer, EmptyDeviceProbe) {
    let settings = RendererSettings::default();
    let device = EmptyDevice::new(&settings);
    let probe = device.probe();
    (Renderer::new(settings, Box::new(device)).unwrap(), probe)
}

fn texture_levels(probe: &EmptyDeviceProbe, texture: &kestrel_engine::kestrel::render::Texture) -> Vec<Vec<u8>> {
    match probe.object(texture.id()) {
        Some(EmptyObject::Texture { levels, .. }) => levels,
        other => panic!("expected a texture object, got {:?}", other),
    }
}

// ============================================================================
// TEXTURES
// ============================================================================

#[test]
fn test_integration_mip_chain_generated_and_uploaded() {
    let (renderer, probe) = renderer();
    let texture = renderer
        .create_texture_with_data(
            &TextureDesc {
                size: UVec2::new(4, 4),
                mip_levels: 0,
                ..Default::default()
            },
            vec![200; 64],
        )
        .unwrap();
    assert_eq!(texture.mip_count(), 3);

    renderer.process().unwrap();

    let levels = texture_levels(&probe, &texture);
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[1], vec![200; 16]);
    assert_eq!(levels[2], vec![200; 4]);
}

#[test]
fn test_integration_explicit_levels_keep_their_bytes() {
    let (renderer, probe) = renderer();
    let levels = vec![
        Level::with_data(UVec2::new(2, 2), PixelFormat::R8_UNORM, vec![1, 2, 3, 4]),
        Level::with_data(UVec2::new(1, 1), PixelFormat::R8_UNORM, vec![9]),
    ];
    let texture = renderer
        .create_texture_with_levels(
            &TextureDesc {
                mip_levels: 2,
                pixel_format: PixelFormat::R8_UNORM,
                ..Default::default()
            },
            levels,
        )
        .unwrap();

    renderer.process().unwrap();

    assert_eq!(texture.size(), UVec2::new(2, 2));
    assert_eq!(texture_levels(&probe, &texture), vec![vec![1, 2, 3, 4], vec![9]]);
}

#[test]
fn test_integration_set_levels_with_new_size_recreates() {
    let (renderer, probe) = renderer();
    let texture = renderer
        .create_texture(&TextureDesc {
            size: UVec2::new(2, 2),
            flags: TextureFlags::DYNAMIC,
            pixel_format: PixelFormat::R8_UNORM,
            ..Default::default()
        })
        .unwrap();
    renderer.process().unwrap();
    let first = texture.native_handle();

    texture
        .set_levels(vec![Level::with_data(UVec2::new(2, 2), PixelFormat::R8_UNORM, vec![5; 4])])
        .unwrap();
    let report = renderer.process().unwrap();
    assert_eq!(report.uploads.recreated, 0);
    assert_eq!(texture.native_handle(), first);

    texture
        .set_levels(vec![
            Level::with_data(UVec2::new(4, 2), PixelFormat::R8_UNORM, vec![7; 8]),
            Level::with_data(UVec2::new(2, 1), PixelFormat::R8_UNORM, vec![8; 2]),
        ])
        .unwrap();
    let report = renderer.process().unwrap();
    assert_eq!(report.uploads.recreated, 1);
    assert_ne!(texture.native_handle(), first);
    assert_eq!(texture_levels(&probe, &texture), vec![vec![7; 8], vec![8; 2]]);
}

#[test]
fn test_integration_immutable_texture_rejects_updates() {
    let (renderer, _) = renderer();
    let texture = renderer
        .create_texture(&TextureDesc {
            size: UVec2::new(2, 2),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(texture.set_data(vec![0; 16]), Err(Error::NotDynamic));
    assert_eq!(texture.resize(UVec2::new(4, 4)), Err(Error::NotDynamic));
}

#[test]
fn test_integration_latest_state_wins_within_one_frame() {
    let (renderer, probe) = renderer();
    let texture = renderer
        .create_texture(&TextureDesc {
            size: UVec2::new(2, 2),
            flags: TextureFlags::DYNAMIC,
            ..Default::default()
        })
        .unwrap();
    renderer.process().unwrap();
    let creates = probe.counters().texture_creates;

    texture.set_data(vec![1; 16]).unwrap();
    texture.set_filter(Filter::Linear).unwrap();
    texture.set_data(vec![2; 16]).unwrap();
    let report = renderer.process().unwrap();

    assert_eq!(report.uploads.uploaded, 1);
    assert_eq!(probe.counters().texture_creates, creates);
    assert_eq!(texture_levels(&probe, &texture)[0], vec![2; 16]);
    match probe.object(texture.id()) {
        Some(EmptyObject::Texture { sampler, .. }) => assert_eq!(sampler.filter, Filter::Linear),
        other => panic!("expected a texture object, got {:?}", other),
    }
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
fn test_integration_dynamic_buffer_grows() {
    let (renderer, probe) = renderer();
    let buffer = renderer
        .create_buffer(BufferDesc {
            usage: BufferUsage::Vertex,
            flags: BufferFlags::DYNAMIC,
            size: 8,
            data: Vec::new(),
        })
        .unwrap();
    renderer.process().unwrap();

    buffer.set_data_from(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
    renderer.process().unwrap();

    assert_eq!(buffer.size(), 16);
    assert_eq!(probe.counters().buffer_creates, 2);
    match probe.object(buffer.id()) {
        Some(EmptyObject::Buffer { capacity, contents, .. }) => {
            assert_eq!(capacity, 16);
            assert_eq!(contents.len(), 16);
        }
        other => panic!("expected a buffer object, got {:?}", other),
    }
}

// ============================================================================
// RENDER TARGETS
// ============================================================================

#[test]
fn test_integration_render_to_texture_then_sample() {
    let (renderer, probe) = renderer();
    let target = renderer
        .create_render_target(&RenderTargetDesc {
            size: UVec2::new(128, 128),
            flags: RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_COLOR_BUFFER,
            ..Default::default()
        })
        .unwrap();
    target.set_clear_color(Color::from_rgba(0x336699ff)).unwrap();
    let index = renderer
        .create_buffer(BufferDesc {
            usage: BufferUsage::Index,
            flags: BufferFlags::empty(),
            size: 0,
            data: vec![0, 0, 1, 0, 2, 0],
        })
        .unwrap();

    let mut frame = renderer.begin_frame();
    frame.set_render_target(Some(&target));
    frame.clear();
    frame.set_render_target(None);
    frame.set_textures(&[target.color_texture().unwrap()]).unwrap();
    frame.set_index_buffer(&index, IndexFormat::U16).unwrap();
    frame.draw_indexed(3, 0);
    renderer.end_frame(frame);

    let report = renderer.process().unwrap();

    assert!(report.presented);
    let color = target.color_texture().unwrap().native_handle();
    assert_eq!(probe.bound_textures(), color.into_iter().collect::<Vec<_>>());
    assert_eq!(probe.counters().clears, 1);
    assert_eq!(renderer.resource_count_of(ResourceKind::RenderTarget), 2);
}

#[test]
fn test_integration_dropping_target_releases_attachments() {
    let (renderer, probe) = renderer();
    let baseline = renderer.resource_count();
    let target = renderer
        .create_render_target(&RenderTargetDesc {
            size: UVec2::new(32, 32),
            flags: RenderTargetFlags::COLOR_BUFFER
                | RenderTargetFlags::DEPTH_BUFFER
                | RenderTargetFlags::BINDABLE_COLOR_BUFFER
                | RenderTargetFlags::BINDABLE_DEPTH_BUFFER,
            ..Default::default()
        })
        .unwrap();
    renderer.process().unwrap();
    assert_eq!(renderer.resource_count(), baseline + 3);

    drop(target);
    renderer.process().unwrap();

    assert_eq!(renderer.resource_count(), baseline);
    assert_eq!(probe.native_object_count(), baseline);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_integration_failed_upload_retried_next_process() {
    let (renderer, probe) = renderer();
    let texture = renderer
        .create_texture(&TextureDesc {
            size: UVec2::new(8, 8),
            ..Default::default()
        })
        .unwrap();
    renderer.end_frame(renderer.begin_frame());

    probe.fail_next_upload(Error::OutOfMemory);
    assert_eq!(renderer.process().unwrap_err(), Error::OutOfMemory);
    assert_eq!(renderer.stats().aborted_frames, 1);
    assert!(renderer.queued_commands() > 0);

    renderer.process().unwrap();
    assert_eq!(texture.resource_state(), ResourceState::Ready);
}

#[test]
fn test_integration_device_loss_and_recovery() {
    let (renderer, probe) = renderer();
    let buffer = renderer
        .create_buffer(BufferDesc {
            usage: BufferUsage::Vertex,
            flags: BufferFlags::empty(),
            size: 0,
            data: vec![5; 12],
        })
        .unwrap();
    renderer.process().unwrap();

    probe.lose_device();
    renderer.end_frame(renderer.begin_frame());
    assert_eq!(renderer.process().unwrap_err(), Error::DeviceLost);

    let report = renderer.process().unwrap();

    assert!(!probe.is_lost());
    assert_eq!(report.uploads.recreated, 2);
    assert!(buffer.resource_state().is_ready());
    match probe.object(buffer.id()) {
        Some(EmptyObject::Buffer { contents, .. }) => assert_eq!(contents, vec![5; 12]),
        other => panic!("expected a buffer object, got {:?}", other),
    }
}
