//! cad-ngin
//!
//! The geometry streaming core of a sector-based CAD viewer. A model is split
//! into spatial sectors; each loaded sector becomes a reference-counted group
//! of GPU meshes that releases its buffers as soon as the last holder lets go.
//! Loading runs natively and on WASM.
//!
//! High-level modules
//! - `context`: headless GPU context owning device, queue, camera and materials
//! - `data_structures`: geometry buffers, instances, collection types, mesh
//!   grouping and the auto-disposing group
//! - `error`: the typed errors of the streaming core
//! - `pipelines`: render pipelines and per-collection material dispatch
//! - `resources`: file providers and the response cache
//! - `sector`: parsing seam, mesh manager, repository, cancellable loader and
//!   render targets
//! - `render`: drawing sector groups into a render pass
//!

pub mod context;
pub mod data_structures;
pub mod error;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod sector;

pub use context::{Context, ContextConfig, init_logging};
pub use data_structures::{
    auto_dispose::{AutoDisposeGroup, GroupRef},
    collection::GeometryCollectionType,
    geometry::{Geometry, GeometryBuffer, GeometryUploader, GpuGeometry},
    mesh_groups::{MeshGroup, group_meshes_by_number},
};
pub use error::SectorError;
pub use pipelines::materials::{Materials, ShaderMaterial, get_shader_material};
pub use render::DrawSector;
pub use sector::{
    loader::SectorLoader,
    mesh_manager::CadMeshManager,
    render_target::SectorRenderTarget,
    repository::{RepositoryConfig, SectorRepository},
    types::{ConsumedSector, LevelOfDetail, SectorParser, WantedSector},
};
