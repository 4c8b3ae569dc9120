//! # Compiler Configuration
//!
//! Everything the batch compiler needs to know about the target is captured
//! here once, at initialization, and then passed by reference through the
//! pipeline. Nothing in the compiler reads process-wide state.
//!
//! ## Configuration Categories
//!
//! - **Device Capabilities**: limits and feature flags queried from the GPU API
//! - **Compiler Config**: grouping caps, texture policy, logging and diagnostics

use serde::{Serialize, Deserialize};

use crate::config::Config;
use crate::render::batching::{DrawMode, GroupLimits};
use crate::foundation::math::MAT4_SIZE;

/// # Device Capabilities
///
/// Hardware limits that bound grouping and select the draw path. These are
/// resolved once at startup by whoever owns the graphics context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCapabilities {
    /// Maximum size in bytes of one uniform block
    pub max_uniform_block_size: usize,
    /// Maximum number of layers in a 2D array texture
    pub max_array_texture_layers: usize,
    /// Number of uniform buffer binding points available
    pub max_uniform_buffer_bindings: usize,
    /// Whether indexed multi-draw-indirect is available
    pub multi_draw_indirect: bool,
}

impl DeviceCapabilities {
    /// Select the draw command mode for these capabilities
    pub fn draw_mode(&self) -> DrawMode {
        if self.multi_draw_indirect {
            DrawMode::Indirect
        } else {
            DrawMode::Direct
        }
    }

    /// Set multi-draw-indirect support
    #[must_use]
    pub fn with_multi_draw_indirect(mut self, enabled: bool) -> Self {
        self.multi_draw_indirect = enabled;
        self
    }

    /// Set the texture array layer limit
    #[must_use]
    pub fn with_max_array_texture_layers(mut self, layers: usize) -> Self {
        self.max_array_texture_layers = layers;
        self
    }

    /// Set the uniform block size limit
    #[must_use]
    pub fn with_max_uniform_block_size(mut self, bytes: usize) -> Self {
        self.max_uniform_block_size = bytes;
        self
    }

    /// Set the number of uniform binding points
    #[must_use]
    pub fn with_max_uniform_buffer_bindings(mut self, bindings: usize) -> Self {
        self.max_uniform_buffer_bindings = bindings;
        self
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        // Minimums guaranteed by desktop GL 4.3 class hardware
        Self {
            max_uniform_block_size: 16_384,
            max_array_texture_layers: 256,
            max_uniform_buffer_bindings: 36,
            multi_draw_indirect: true,
        }
    }
}

/// # Compiler Configuration
///
/// Top-level configuration for a [`BatchCompiler`](crate::render::BatchCompiler).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Log level applied by [`CompilerConfig::init_logging`]
    pub log_level: String,
    /// Global cap on objects per render group, applied after the uniform block bound
    pub max_objects_per_group_cap: usize,
    /// Allocate full mip chains for texture arrays and generate them after upload
    pub generate_mipmaps: bool,
    /// Count unknown material struct field writes in compile statistics
    pub strict_struct_fields: bool,
    /// Target device limits
    pub device: DeviceCapabilities,
}

impl CompilerConfig {
    /// Create a new compiler configuration with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            max_objects_per_group_cap: 1024,
            generate_mipmaps: true,
            strict_struct_fields: cfg!(debug_assertions),
            device: DeviceCapabilities::default(),
        }
    }

    /// Set log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the global per-group object cap
    #[must_use]
    pub fn with_max_objects_per_group_cap(mut self, cap: usize) -> Self {
        self.max_objects_per_group_cap = cap;
        self
    }

    /// Enable or disable mipmap generation
    #[must_use]
    pub fn with_mipmaps(mut self, enabled: bool) -> Self {
        self.generate_mipmaps = enabled;
        self
    }

    /// Enable or disable strict struct field accounting
    #[must_use]
    pub fn with_strict_struct_fields(mut self, enabled: bool) -> Self {
        self.strict_struct_fields = enabled;
        self
    }

    /// Set device capabilities
    #[must_use]
    pub fn with_device(mut self, device: DeviceCapabilities) -> Self {
        self.device = device;
        self
    }

    /// Grouping limits derived from the device and the global cap
    ///
    /// The object bound is how many 64-byte matrices fit in one uniform block.
    pub fn group_limits(&self) -> GroupLimits {
        let by_block = self.device.max_uniform_block_size / MAT4_SIZE;
        GroupLimits {
            max_objects_per_group: by_block.min(self.max_objects_per_group_cap).max(1),
            max_distinct_textures: self.device.max_array_texture_layers.max(1),
        }
    }

    /// Initialize logging at the configured level
    pub fn init_logging(&self) {
        crate::foundation::logging::init_with_level(&self.log_level);
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_objects_per_group_cap == 0 {
            return Err("Max objects per group cap must be at least 1".to_string());
        }

        if self.device.max_uniform_block_size < MAT4_SIZE {
            return Err(format!(
                "Uniform block size {} cannot hold a single {}-byte matrix",
                self.device.max_uniform_block_size, MAT4_SIZE
            ));
        }

        if self.device.max_array_texture_layers == 0 {
            return Err("Texture arrays must allow at least one layer".to_string());
        }

        if self.device.max_uniform_buffer_bindings == 0 {
            return Err("At least one uniform binding point is required".to_string());
        }

        if log_level_filter(&self.log_level).is_none() {
            return Err(format!("Unknown log level: {}", self.log_level));
        }

        Ok(())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for CompilerConfig {}

fn log_level_filter(level: &str) -> Option<log::LevelFilter> {
    level.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CompilerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_group_limits_from_uniform_block() {
        let config = CompilerConfig::new()
            .with_device(DeviceCapabilities::default().with_max_uniform_block_size(65_536));
        // 65536 / 64 = 1024, equal to the default cap
        assert_eq!(config.group_limits().max_objects_per_group, 1024);

        let capped = config.with_max_objects_per_group_cap(100);
        assert_eq!(capped.group_limits().max_objects_per_group, 100);
        assert_eq!(capped.group_limits().max_distinct_textures, 256);
    }

    #[test]
    fn test_draw_mode_follows_capability() {
        let device = DeviceCapabilities::default();
        assert_eq!(device.draw_mode(), DrawMode::Indirect);
        assert_eq!(device.with_multi_draw_indirect(false).draw_mode(), DrawMode::Direct);
    }

    #[test]
    fn test_validation_rejects_bad_limits() {
        let tiny = CompilerConfig::new()
            .with_device(DeviceCapabilities::default().with_max_uniform_block_size(32));
        assert!(tiny.validate().is_err());

        let no_layers = CompilerConfig::new()
            .with_device(DeviceCapabilities::default().with_max_array_texture_layers(0));
        assert!(no_layers.validate().is_err());

        let bad_level = CompilerConfig::new().with_log_level("loud");
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_with_partial_file() {
        let parsed: CompilerConfig = toml::from_str(
            "max_objects_per_group_cap = 64\n[device]\nmulti_draw_indirect = false\n",
        )
        .expect("partial config should parse");
        assert_eq!(parsed.max_objects_per_group_cap, 64);
        assert!(!parsed.device.multi_draw_indirect);
        assert_eq!(parsed.device.max_array_texture_layers, 256);
    }

    #[test]
    fn test_save_and_load_ron() {
        let path = std::env::temp_dir().join(format!("batch_compiler_cfg_{}.ron", std::process::id()));
        let config = CompilerConfig::new().with_mipmaps(false);
        config.save_to_file(&path).expect("save should succeed");
        let loaded = CompilerConfig::load_from_file(&path).expect("load should succeed");
        let _ = std::fs::remove_file(&path);
        assert!(!loaded.generate_mipmaps);
        assert_eq!(loaded.device, config.device);
    }
}
