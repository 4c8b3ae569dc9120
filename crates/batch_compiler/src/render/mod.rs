//! Rendering data model and the batch compiler
//!
//! Scene resources (meshes, materials, textures) live here next to the
//! [`batching`] pipeline that compiles them into render groups.

pub mod batching;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod texture;

pub use batching::{BatchCompiler, CompileStats, FeatureSignature, RenderGroup};
pub use material::{MapSlot, Material, MaterialError, MaterialParameter, ParameterKind, ProgramKind};
pub use mesh::{AttributeData, AttributeRole, IndexType, Mesh, MeshError, Topology, VertexAttribute};
pub use scene::{Renderable, Scene};
pub use texture::TextureImage;
