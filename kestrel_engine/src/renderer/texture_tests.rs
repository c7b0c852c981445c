//! Unit tests for texture.rs
//!
//! Covers descriptor validation, level-chain construction, the mutator
//! error taxonomy, and dirty/queue bookkeeping of the facade.

use super::*;
use crate::renderer::command_queue::Command;
use crate::renderer::resource_table::ResourceContext;

fn desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc {
        size: UVec2::new(width, height),
        ..Default::default()
    }
}

fn dynamic_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc {
        flags: TextureFlags::DYNAMIC,
        ..desc(width, height)
    }
}

fn rgba(width: u32, height: u32, value: u8) -> Vec<u8> {
    vec![value; (width * height * 4) as usize]
}

// ============================================================================
// DESCRIPTOR VALIDATION
// ============================================================================

#[test]
fn test_new_single_level() {
    let state = TextureState::new(&desc(64, 32)).unwrap();
    assert_eq!(state.mip_count(), 1);
    assert_eq!(state.levels[0].size, UVec2::new(64, 32));
    assert_eq!(state.levels[0].pitch, 256);
    assert!(state.levels[0].data.is_empty());
    assert_eq!(state.pending_levels, 0);
}

#[test]
fn test_zero_mip_levels_builds_full_chain() {
    let state = TextureState::new(&TextureDesc { mip_levels: 0, ..desc(256, 256) }).unwrap();
    assert_eq!(state.mip_count(), 9);
    assert_eq!(state.levels[8].size, UVec2::ONE);
}

#[test]
fn test_mip_count_is_clamped() {
    let state = TextureState::new(&TextureDesc { mip_levels: 40, ..desc(8, 2) }).unwrap();
    assert_eq!(state.mip_count(), 4);
    assert_eq!(state.levels[1].size, UVec2::new(4, 1));
    assert_eq!(state.levels[3].size, UVec2::new(1, 1));
}

#[test]
fn test_zero_size_rejected() {
    let result = TextureState::new(&desc(0, 16));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_render_target_requires_single_level() {
    let result = TextureState::new(&TextureDesc {
        flags: TextureFlags::RENDER_TARGET,
        mip_levels: 0,
        ..desc(128, 128)
    });
    assert!(matches!(result, Err(Error::InvalidMipLevels(_))));

    let result = TextureState::new(&TextureDesc {
        flags: TextureFlags::RENDER_TARGET,
        mip_levels: 2,
        ..desc(128, 128)
    });
    assert!(matches!(result, Err(Error::InvalidMipLevels(_))));
}

#[test]
fn test_multisampling_requires_render_target() {
    let result = TextureState::new(&TextureDesc { sample_count: 4, ..desc(16, 16) });
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = TextureState::new(&TextureDesc {
        sample_count: 4,
        flags: TextureFlags::RENDER_TARGET,
        ..desc(16, 16)
    });
    assert!(result.is_ok());
}

#[test]
fn test_depth_format_requires_depth_render_target() {
    let result = TextureState::new(&TextureDesc {
        pixel_format: PixelFormat::D32_FLOAT,
        ..desc(16, 16)
    });
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));

    let result = TextureState::new(&TextureDesc {
        pixel_format: PixelFormat::D32_FLOAT,
        flags: TextureFlags::RENDER_TARGET,
        ..desc(16, 16)
    });
    assert!(matches!(result, Err(Error::InvalidPixelFormat(_))));

    let result = TextureState::new(&TextureDesc {
        pixel_format: PixelFormat::D32_FLOAT,
        flags: TextureFlags::RENDER_TARGET | TextureFlags::DEPTH_BUFFER,
        ..desc(16, 16)
    });
    assert!(result.is_ok());
}

#[test]
fn test_unsupported_dimensions_rejected() {
    let result = TextureState::new(&TextureDesc { dimensions: Dimensions::Cube, ..desc(16, 16) });
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = TextureState::new(&TextureDesc { dimensions: Dimensions::Three, ..desc(16, 16) });
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = TextureState::new(&TextureDesc { dimensions: Dimensions::One, ..desc(16, 16) });
    assert!(matches!(result, Err(Error::InvalidArgument(_))));

    let result = TextureState::new(&TextureDesc { dimensions: Dimensions::One, ..desc(16, 1) });
    assert!(result.is_ok());
}

// ============================================================================
// INITIAL DATA
// ============================================================================

#[test]
fn test_with_data_generates_mips() {
    let state = TextureState::with_data(
        &TextureDesc { mip_levels: 0, ..desc(4, 4) },
        rgba(4, 4, 200),
    )
    .unwrap();

    assert_eq!(state.mip_count(), 3);
    assert_eq!(state.levels[1].data, rgba(2, 2, 200));
    assert_eq!(state.levels[2].data, rgba(1, 1, 200));
    assert_eq!(state.pending_levels, 0b111);
}

#[test]
fn test_with_data_float_format_leaves_lower_levels_empty() {
    let format = PixelFormat::R32_FLOAT;
    let state = TextureState::with_data(
        &TextureDesc { mip_levels: 0, pixel_format: format, ..desc(2, 2) },
        vec![0; 16],
    )
    .unwrap();

    assert_eq!(state.mip_count(), 2);
    assert!(state.levels[1].data.is_empty());
    assert_eq!(state.pending_levels, 0b1);
}

#[test]
fn test_with_data_wrong_length() {
    let result = TextureState::with_data(&desc(4, 4), vec![0; 3]);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_with_data_empty() {
    let result = TextureState::with_data(&desc(4, 4), Vec::new());
    assert_eq!(result.unwrap_err(), Error::EmptyData);
}

#[test]
fn test_with_levels_takes_size_from_base() {
    let format = PixelFormat::RGBA8_UNORM;
    let levels = vec![
        Level::with_data(UVec2::new(4, 2), format, rgba(4, 2, 1)),
        Level::empty(UVec2::new(2, 1), format),
        Level::with_data(UVec2::new(1, 1), format, rgba(1, 1, 3)),
    ];

    let state = TextureState::with_levels(&desc(0, 0), levels).unwrap();
    assert_eq!(state.size, UVec2::new(4, 2));
    assert_eq!(state.mip_count(), 3);
    assert_eq!(state.pending_levels, 0b101);
}

#[test]
fn test_with_levels_rejects_bad_chain() {
    let format = PixelFormat::RGBA8_UNORM;
    let levels = vec![
        Level::with_data(UVec2::new(4, 4), format, rgba(4, 4, 1)),
        Level::empty(UVec2::new(3, 3), format),
    ];
    let result = TextureState::with_levels(&desc(0, 0), levels);
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_with_levels_rejects_empty_list() {
    let result = TextureState::with_levels(&desc(4, 4), Vec::new());
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// ============================================================================
// MUTATORS ON THE STATE
// ============================================================================

#[test]
fn test_set_data_on_immutable_is_not_dynamic() {
    let mut state = TextureState::new(&desc(4, 4)).unwrap();
    assert_eq!(state.set_data(rgba(4, 4, 0)).unwrap_err(), Error::NotDynamic);
}

#[test]
fn test_set_data_on_render_target_is_not_dynamic() {
    let mut state = TextureState::new(&TextureDesc {
        flags: TextureFlags::RENDER_TARGET | TextureFlags::DYNAMIC,
        ..desc(4, 4)
    })
    .unwrap();
    assert_eq!(state.set_data(rgba(4, 4, 0)).unwrap_err(), Error::NotDynamic);
}

#[test]
fn test_set_data_empty() {
    let mut state = TextureState::new(&dynamic_desc(4, 4)).unwrap();
    assert_eq!(state.set_data(Vec::new()).unwrap_err(), Error::EmptyData);
}

#[test]
fn test_set_level_data_marks_only_that_level() {
    let mut state = TextureState::new(&TextureDesc { mip_levels: 0, ..dynamic_desc(4, 4) }).unwrap();
    state.set_level_data(1, rgba(2, 2, 9)).unwrap();
    assert_eq!(state.pending_levels, 0b010);
    assert!(state.levels[0].data.is_empty());
}

#[test]
fn test_set_level_data_out_of_range() {
    let mut state = TextureState::new(&dynamic_desc(4, 4)).unwrap();
    let result = state.set_level_data(3, rgba(1, 1, 0));
    assert!(matches!(result, Err(Error::InvalidMipLevels(_))));
}

#[test]
fn test_set_levels_replaces_chain_and_size() {
    let mut state = TextureState::new(&dynamic_desc(4, 4)).unwrap();
    let levels = vec![
        Level::with_data(UVec2::new(8, 4), PixelFormat::RGBA8_UNORM, rgba(8, 4, 3)),
        Level::empty(UVec2::new(4, 2), PixelFormat::RGBA8_UNORM),
    ];
    state.set_levels(levels).unwrap();
    assert_eq!(state.size, UVec2::new(8, 4));
    assert_eq!(state.mip_count(), 2);
    assert_eq!(state.pending_levels, 0b01);
}

#[test]
fn test_set_levels_rejects_bad_chain() {
    let mut state = TextureState::new(&dynamic_desc(4, 4)).unwrap();
    let levels = vec![
        Level::with_data(UVec2::new(4, 4), PixelFormat::RGBA8_UNORM, rgba(4, 4, 3)),
        Level::with_data(UVec2::new(3, 2), PixelFormat::RGBA8_UNORM, rgba(3, 2, 3)),
    ];
    assert!(matches!(state.set_levels(levels), Err(Error::InvalidArgument(_))));
    assert_eq!(state.mip_count(), 1);
    assert!(matches!(state.set_levels(Vec::new()), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_set_levels_without_bytes_is_empty_data() {
    let mut state = TextureState::new(&dynamic_desc(4, 4)).unwrap();
    let levels = vec![Level::empty(UVec2::new(4, 4), PixelFormat::RGBA8_UNORM)];
    assert_eq!(state.set_levels(levels).unwrap_err(), Error::EmptyData);
}

#[test]
fn test_resize_rebuilds_chain() {
    let mut state = TextureState::with_data(
        &TextureDesc { mip_levels: 0, ..dynamic_desc(4, 4) },
        rgba(4, 4, 1),
    )
    .unwrap();

    state.resize(UVec2::new(16, 8)).unwrap();
    assert_eq!(state.size, UVec2::new(16, 8));
    assert_eq!(state.mip_count(), 5);
    assert!(state.levels.iter().all(|l| l.data.is_empty()));
    assert_eq!(state.pending_levels, 0);
}

#[test]
fn test_resize_immutable_is_not_dynamic() {
    let mut state = TextureState::new(&desc(4, 4)).unwrap();
    assert_eq!(state.resize(UVec2::new(8, 8)).unwrap_err(), Error::NotDynamic);
}

// ============================================================================
// FACADE
// ============================================================================

#[test]
fn test_register_queues_first_upload() {
    let context = ResourceContext::new();
    let texture = register(&context, TextureState::new(&desc(8, 8)).unwrap());

    assert_eq!(context.queue.drain(), vec![Command::Upload(texture.id())]);
    assert_eq!(texture.resource_state(), ResourceState::Uninitialized);
    assert!(texture.native_handle().is_none());
}

#[test]
fn test_each_mutator_queues_one_upload() {
    let context = ResourceContext::new();
    let texture = register(&context, TextureState::new(&dynamic_desc(2, 2)).unwrap());
    context.queue.drain();

    texture.set_filter(Filter::Linear).unwrap();
    texture.set_address_x(Address::Repeat).unwrap();
    texture.set_clear_color(Color::WHITE).unwrap();
    texture.set_data(rgba(2, 2, 5)).unwrap();

    let commands = context.queue.drain();
    assert_eq!(commands.len(), 4);
    assert!(commands.iter().all(|c| *c == Command::Upload(texture.id())));

    let dirty = context.table.get(texture.id()).unwrap().lock().dirty;
    assert!(dirty.contains(DirtyFlags::SAMPLER | DirtyFlags::CLEAR | DirtyFlags::DATA));
    assert_eq!(texture.sampler().filter, Filter::Linear);
    assert_eq!(texture.clear_state().clear_color, Color::WHITE);
}

#[test]
fn test_failed_mutator_commits_nothing() {
    let context = ResourceContext::new();
    let texture = register(&context, TextureState::new(&desc(2, 2)).unwrap());
    let entry = context.table.get(texture.id()).unwrap();
    context.queue.drain();
    entry.lock().dirty = DirtyFlags::empty();

    assert_eq!(texture.set_data(rgba(2, 2, 0)).unwrap_err(), Error::NotDynamic);
    assert!(context.queue.is_empty());
    assert!(entry.lock().dirty.is_empty());
    assert_eq!(texture.level_data(0), Some(Vec::new()));
}

#[test]
fn test_drop_queues_destroy() {
    let context = ResourceContext::new();
    let texture = register(&context, TextureState::new(&desc(2, 2)).unwrap());
    let id = texture.id();
    context.queue.drain();

    drop(texture);

    assert_eq!(context.queue.drain(), vec![Command::Destroy(id)]);
    assert!(context.table.get(id).unwrap().lock().pending_destroy);
}
