//! Unit tests for sampler resolution and the device registry

use super::*;
use crate::renderer::empty_device::EmptyDevice;

fn info() -> DeviceInfo {
    EmptyDevice::new(&RendererSettings::default()).info().clone()
}

// ============================================================================
// SAMPLER RESOLUTION
// ============================================================================

#[test]
fn test_default_filter_uses_renderer_setting() {
    let settings = RendererSettings {
        texture_filter: Filter::Trilinear,
        ..Default::default()
    };

    let resolved = resolve_sampler(&SamplerDesc::default(), &settings, &info());

    assert_eq!(resolved.filter, Filter::Trilinear);
}

#[test]
fn test_explicit_filter_is_kept() {
    let sampler = SamplerDesc {
        filter: Filter::Linear,
        address_x: Address::Repeat,
        address_y: Address::MirrorRepeat,
        max_anisotropy: 0,
    };

    let resolved = resolve_sampler(&sampler, &RendererSettings::default(), &info());

    assert_eq!(resolved.filter, Filter::Linear);
    assert_eq!(resolved.address_x, Address::Repeat);
    assert_eq!(resolved.address_y, Address::MirrorRepeat);
}

#[test]
fn test_zero_anisotropy_uses_renderer_setting() {
    let settings = RendererSettings {
        max_anisotropy: 4,
        ..Default::default()
    };

    let resolved = resolve_sampler(&SamplerDesc::default(), &settings, &info());

    assert_eq!(resolved.max_anisotropy, 4);
}

#[test]
fn test_anisotropy_clamped_to_device_maximum() {
    let sampler = SamplerDesc {
        max_anisotropy: 64,
        ..Default::default()
    };

    let resolved = resolve_sampler(&sampler, &RendererSettings::default(), &info());

    assert_eq!(resolved.max_anisotropy, info().max_anisotropy);
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_new_registry_has_empty_driver() {
    let registry = DeviceRegistry::new();

    assert!(registry.is_registered(Driver::Empty));
    assert!(!registry.is_registered(Driver::Vulkan));
}

#[test]
fn test_default_resolves_to_empty_without_vulkan() {
    let registry = DeviceRegistry::new();

    assert_eq!(registry.resolve(Driver::Default), Driver::Empty);
    assert_eq!(registry.resolve(Driver::OpenGl), Driver::OpenGl);
}

#[test]
fn test_default_resolves_to_vulkan_when_registered() {
    let mut registry = DeviceRegistry::new();
    registry.register(Driver::Vulkan, |settings, _| {
        Ok(Box::new(EmptyDevice::new(settings)) as Box<dyn RenderDevice>)
    });

    assert_eq!(registry.resolve(Driver::Default), Driver::Vulkan);
}

#[test]
fn test_create_default_device() {
    let registry = DeviceRegistry::new();

    let device = registry.create_device(&RendererSettings::default(), None).unwrap();

    assert_eq!(device.info().driver, Driver::Empty);
    assert_eq!(device.native_object_count(), 0);
}

#[test]
fn test_unavailable_driver_fails() {
    let registry = DeviceRegistry::new();
    let settings = RendererSettings {
        driver: Driver::Direct3D11,
        ..Default::default()
    };

    let result = registry.create_device(&settings, None);

    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_factory_error_is_propagated() {
    let mut registry = DeviceRegistry::new();
    registry.register(Driver::OpenGl, |_, _| {
        Err(Error::InitializationFailed("no context".to_string()))
    });
    let settings = RendererSettings {
        driver: Driver::OpenGl,
        ..Default::default()
    };

    let result = registry.create_device(&settings, None);

    assert_eq!(
        result.err(),
        Some(Error::InitializationFailed("no context".to_string()))
    );
}

#[test]
fn test_global_registry_lists_empty_driver() {
    let drivers = available_drivers().unwrap();

    assert!(drivers.contains(&Driver::Empty));
}
