/// Validation layer messenger
///
/// Routes validation messages into the engine logger and keeps per-severity
/// counters. Compiled only with the `vulkan-validation` feature.

use ash::vk;
use colored::*;
use kestrel_engine::{engine_debug, engine_error, engine_info, engine_warn};
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Validation messages seen since the last `reset_validation_stats()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationCounters {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

static VALIDATION_COUNTERS: ValidationCounters = ValidationCounters {
    errors: AtomicU32::new(0),
    warnings: AtomicU32::new(0),
    info: AtomicU32::new(0),
    verbose: AtomicU32::new(0),
};

pub fn validation_stats() -> ValidationStats {
    ValidationStats {
        errors: VALIDATION_COUNTERS.errors.load(Ordering::Relaxed),
        warnings: VALIDATION_COUNTERS.warnings.load(Ordering::Relaxed),
        info: VALIDATION_COUNTERS.info.load(Ordering::Relaxed),
        verbose: VALIDATION_COUNTERS.verbose.load(Ordering::Relaxed),
    }
}

pub fn reset_validation_stats() {
    VALIDATION_COUNTERS.errors.store(0, Ordering::Relaxed);
    VALIDATION_COUNTERS.warnings.store(0, Ordering::Relaxed);
    VALIDATION_COUNTERS.info.store(0, Ordering::Relaxed);
    VALIDATION_COUNTERS.verbose.store(0, Ordering::Relaxed);
}

/// Print a colored summary of the validation counters to stdout
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
}

/// Messenger create info for instance creation and the messenger itself
pub(crate) fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let kind = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        VALIDATION_COUNTERS.errors.fetch_add(1, Ordering::Relaxed);
        engine_error!("kestrel::vulkan::validation", "[{}] {}: {}", kind, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        VALIDATION_COUNTERS.warnings.fetch_add(1, Ordering::Relaxed);
        engine_warn!("kestrel::vulkan::validation", "[{}] {}: {}", kind, message_id, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        VALIDATION_COUNTERS.info.fetch_add(1, Ordering::Relaxed);
        engine_info!("kestrel::vulkan::validation", "[{}] {}: {}", kind, message_id, message);
    } else {
        VALIDATION_COUNTERS.verbose.fetch_add(1, Ordering::Relaxed);
        engine_debug!("kestrel::vulkan::validation", "[{}] {}: {}", kind, message_id, message);
    }

    vk::FALSE
}
