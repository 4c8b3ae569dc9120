//! # Render Batching
//!
//! Compiles a scene's renderables into the smallest set of draw operations
//! that render them, sharing programs, vertex buffers and texture storage.
//!
//! ## Architecture
//!
//! - **signature**: classifies renderables by the program features they use
//! - **grouper**: cuts signature groups down to device capacity limits
//! - **splitter**: separates unique meshes (batched) from repeated ones (instanced)
//! - **struct_layout**: packed per-object material structs
//! - **texture_packer**: texture array layers and per-object layer records
//! - **geometry**: merged vertex and index regions
//! - **draw_commands**: indirect or direct draw synthesis
//! - **render_group**: one compiled group and its GPU objects
//! - **compiler**: the pipeline driver and its long-lived state

pub mod bindings;
pub mod compiler;
pub mod draw_commands;
pub mod error;
pub mod geometry;
pub mod grouper;
pub mod observers;
pub mod program_cache;
pub mod render_group;
pub mod signature;
pub mod splitter;
pub mod struct_layout;
pub mod texture_packer;

pub use bindings::BindingAllocator;
pub use compiler::{BatchCompiler, CompileStats};
pub use draw_commands::{DrawCommands, DrawElementsIndirectCommand, DrawMode, InstancedDraw, MultiDrawParams};
pub use error::{BuildError, BuildResult, Mismatch};
pub use grouper::GroupLimits;
pub use observers::GroupId;
pub use render_group::{
    RenderGroup, MATERIALS_PURPOSE, MODELS_PURPOSE, MVPS_PURPOSE, NORMALS_PURPOSE,
};
pub use signature::{AttributeRoles, FeatureSignature, MapSlots};
pub use struct_layout::{FieldDecl, FieldValue, StructArray, StructLayout};
