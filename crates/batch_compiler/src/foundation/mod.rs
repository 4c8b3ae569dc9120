//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the compiler:
//! - Math types and per-object matrix helpers
//! - Stable handle types for scene resources
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
