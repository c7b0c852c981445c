//! Unit tests for present mode selection
//!
//! No GPU required.

use super::*;

#[test]
fn test_vertical_sync_uses_fifo() {
    let available = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&available, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_no_vertical_sync_prefers_mailbox() {
    let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
    assert_eq!(choose_present_mode(&available, false), vk::PresentModeKHR::MAILBOX);

    let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&available, false), vk::PresentModeKHR::IMMEDIATE);

    assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
}
