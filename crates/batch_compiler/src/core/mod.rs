//! # Core Module
//!
//! Shared configuration used by every stage of the compiler.
//!
//! ## Organization
//!
//! - **Config**: Device capabilities and compiler settings

pub mod config;

pub use config::{CompilerConfig, DeviceCapabilities};
