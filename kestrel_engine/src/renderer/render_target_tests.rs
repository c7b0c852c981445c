//! Unit tests for render_target.rs

use super::*;
use crate::renderer::command_queue::Command;
use crate::renderer::resource_table::ResourceKind;

fn desc(flags: RenderTargetFlags) -> RenderTargetDesc {
    RenderTargetDesc {
        size: UVec2::new(320, 240),
        flags,
        ..Default::default()
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

#[test]
fn test_no_attachments_is_incomplete() {
    let context = ResourceContext::new();
    let result = register(&context, &desc(RenderTargetFlags::empty()));
    assert!(matches!(result, Err(Error::IncompleteFramebuffer(_))));
    assert!(context.table.is_empty());
    assert!(context.queue.is_empty());
}

#[test]
fn test_bindable_without_buffer_rejected() {
    let context = ResourceContext::new();
    let result = register(
        &context,
        &desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_DEPTH_BUFFER),
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(context.table.is_empty());
}

#[test]
fn test_color_format_must_be_color() {
    let context = ResourceContext::new();
    let result = register(
        &context,
        &RenderTargetDesc {
            color_format: PixelFormat::D16_UNORM,
            ..desc(RenderTargetFlags::COLOR_BUFFER)
        },
    );
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));
}

#[test]
fn test_depth_format_must_be_depth() {
    let context = ResourceContext::new();
    let result = register(
        &context,
        &RenderTargetDesc {
            depth_format: PixelFormat::R32_FLOAT,
            ..desc(RenderTargetFlags::DEPTH_BUFFER)
        },
    );
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));
}

#[test]
fn test_bindable_multisampled_rejected() {
    let context = ResourceContext::new();
    let result = register(
        &context,
        &RenderTargetDesc {
            sample_count: 4,
            ..desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_COLOR_BUFFER)
        },
    );
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// ============================================================================
// ATTACHMENTS
// ============================================================================

#[test]
fn test_internal_attachments_create_no_textures() {
    let context = ResourceContext::new();
    let target = register(
        &context,
        &desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::DEPTH_BUFFER),
    )
    .unwrap();

    assert!(target.color_texture().is_none());
    assert!(target.depth_texture().is_none());
    assert_eq!(context.table.count_of(ResourceKind::Texture), 0);
    assert_eq!(context.table.count_of(ResourceKind::RenderTarget), 1);
}

#[test]
fn test_bindable_depth_creates_depth_texture() {
    let context = ResourceContext::new();
    let target = register(
        &context,
        &desc(
            RenderTargetFlags::COLOR_BUFFER
                | RenderTargetFlags::DEPTH_BUFFER
                | RenderTargetFlags::BINDABLE_DEPTH_BUFFER,
        ),
    )
    .unwrap();

    let depth = target.depth_texture().unwrap();
    assert_eq!(depth.pixel_format(), PixelFormat::D32_FLOAT);
    assert_eq!(depth.mip_count(), 1);
    assert!(depth.flags().contains(TextureFlags::RENDER_TARGET | TextureFlags::BINDABLE_DEPTH_BUFFER));
    assert!(target.color_texture().is_none());
    assert_eq!(target.state().depth_texture, Some(depth.id()));

    // Attachment uploads are queued before the target's
    assert_eq!(
        context.queue.drain(),
        vec![Command::Upload(depth.id()), Command::Upload(target.id())]
    );
}

#[test]
fn test_drop_destroys_target_before_attachments() {
    let context = ResourceContext::new();
    let target = register(
        &context,
        &desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_COLOR_BUFFER),
    )
    .unwrap();
    let target_id = target.id();
    let color_id = target.color_texture().unwrap().id();
    context.queue.drain();

    drop(target);

    assert_eq!(
        context.queue.drain(),
        vec![Command::Destroy(target_id), Command::Destroy(color_id)]
    );
}

// ============================================================================
// MUTATORS
// ============================================================================

#[test]
fn test_clear_setters_mark_clear() {
    let context = ResourceContext::new();
    let target = register(&context, &desc(RenderTargetFlags::COLOR_BUFFER)).unwrap();
    let entry = context.table.get(target.id()).unwrap();
    context.queue.drain();
    entry.lock().dirty = DirtyFlags::empty();

    target.set_clear_color(Color::from_rgba(0x336699FF)).unwrap();
    target.set_clear_depth(0.5).unwrap();

    assert_eq!(entry.lock().dirty, DirtyFlags::CLEAR);
    assert_eq!(context.queue.len(), 2);
    assert_eq!(target.clear_state().clear_depth, 0.5);
}

#[test]
fn test_resize_updates_attachments() {
    let context = ResourceContext::new();
    let target = register(
        &context,
        &desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_COLOR_BUFFER),
    )
    .unwrap();
    context.queue.drain();

    target.resize(UVec2::new(64, 32)).unwrap();

    assert_eq!(target.size(), UVec2::new(64, 32));
    assert_eq!(target.color_texture().unwrap().size(), UVec2::new(64, 32));
    let commands = context.queue.drain();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1], Command::Upload(target.id()));
}

#[test]
fn test_attachment_cannot_be_resized_directly() {
    let context = ResourceContext::new();
    let target = register(
        &context,
        &desc(RenderTargetFlags::COLOR_BUFFER | RenderTargetFlags::BINDABLE_COLOR_BUFFER),
    )
    .unwrap();
    context.queue.drain();

    let result = target.color_texture().unwrap().resize(UVec2::new(64, 64));

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert_eq!(target.color_texture().unwrap().size(), UVec2::new(320, 240));
    assert!(context.queue.is_empty());
}

#[test]
fn test_resize_to_zero_commits_nothing() {
    let context = ResourceContext::new();
    let target = register(&context, &desc(RenderTargetFlags::COLOR_BUFFER)).unwrap();
    context.queue.drain();

    assert!(target.resize(UVec2::new(0, 10)).is_err());
    assert!(context.queue.is_empty());
    assert_eq!(target.size(), UVec2::new(320, 240));
}

#[test]
fn test_backbuffer_resize_enters_reloading() {
    let context = ResourceContext::new();
    let backbuffer = register_backbuffer(&context, UVec2::new(800, 600), 1, true).unwrap();
    assert!(backbuffer.is_backbuffer());
    assert!(backbuffer.flags().contains(RenderTargetFlags::DEPTH_BUFFER));

    let entry = context.table.get(backbuffer.id()).unwrap();
    entry.lock().state = ResourceState::Ready;
    entry.lock().dirty = DirtyFlags::empty();

    backbuffer.resize(UVec2::new(1024, 768)).unwrap();

    assert_eq!(backbuffer.resource_state(), ResourceState::Reloading);
    assert_eq!(entry.lock().dirty, DirtyFlags::SIZE);
}
