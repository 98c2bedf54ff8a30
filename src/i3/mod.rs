//! i3/sway-specific implementations.
//!
//! This module provides the concrete [`WindowManager`](crate::traits::WindowManager)
//! backend, powered by the i3 IPC socket (sway speaks the same protocol).
//!
//! Nothing outside this module should reference the i3 wire protocol
//! directly.

pub mod ipc;
pub mod wm;
