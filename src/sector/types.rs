//! Sector descriptions and the decoded data handed over by a [`SectorParser`].

use std::fmt;

use crate::data_structures::{
    auto_dispose::AutoDisposeGroup,
    collection::GeometryCollectionType,
    geometry::{Geometry, GeometryBuffer, MeshVertex},
    instance::InstanceRaw,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LevelOfDetail {
    Discarded = 0,
    Simple = 1,
    Detailed = 2,
}

impl fmt::Display for LevelOfDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Where a sector's files are and how it sits in the sector tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectorMetadata {
    pub id: u64,
    pub path: String,
    pub depth: u32,
    /// Detailed geometry.
    pub index_file: String,
    /// Low detail quads, if the sector has any.
    pub faces_file: Option<String>,
}

/// A sector the scheduler wants at a given level of detail.
#[derive(Debug, Clone, PartialEq)]
pub struct WantedSector {
    pub model_identifier: String,
    pub model_base_url: String,
    pub metadata: SectorMetadata,
    pub level_of_detail: LevelOfDetail,
}

impl WantedSector {
    /// `{model}.{sector}.{lod}`, the identity of a load.
    pub fn cache_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.model_identifier, self.metadata.id, self.level_of_detail
        )
    }
}

/// One decoded primitive collection or mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGeometry {
    pub kind: GeometryCollectionType,
    pub buffer: GeometryBuffer,
    pub instance_id: Option<String>,
}

/// Triangle meshes of a sector as parallel arrays, one entry per mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMeshRecords {
    pub file_ids: Vec<u64>,
    pub tree_indices: Vec<u32>,
    pub colors: Vec<[u8; 4]>,
    pub triangle_counts: Vec<u64>,
}

/// Instanced mesh placements as parallel arrays, one entry per placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceMeshRecords {
    pub file_ids: Vec<u64>,
    pub tree_indices: Vec<u32>,
    pub colors: Vec<[u8; 4]>,
    pub triangle_counts: Vec<u64>,
    pub triangle_offsets: Vec<u64>,
    pub instance_matrices: Vec<[f32; 16]>,
}

/// Decoded detailed sector before its mesh files are merged in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSector {
    pub primitives: Vec<ParsedGeometry>,
    pub triangle_meshes: TriangleMeshRecords,
    pub instance_meshes: InstanceMeshRecords,
}

impl ParsedSector {
    /// Ids of every mesh file this sector needs, ascending and unique.
    pub fn mesh_file_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .triangle_meshes
            .file_ids
            .iter()
            .chain(&self.instance_meshes.file_ids)
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

pub fn mesh_file_name(file_id: u64) -> String {
    format!("mesh_{file_id}.ctm")
}

/// Decoded mesh file shared by the meshes of one or more sectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshFile {
    pub positions: Vec<[f32; 3]>,
    /// Empty when the file carries no normals.
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

/// All triangle meshes of one mesh file, merged.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    pub file_id: u64,
    pub buffer: GeometryBuffer,
}

/// Placements of one triangle range of a mesh file.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedMesh {
    pub triangle_offset: u64,
    pub triangle_count: u64,
    pub instances: Vec<InstanceRaw>,
}

/// Template geometry of a mesh file and the instanced ranges cut from it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedMeshFile {
    pub file_id: u64,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub meshes: Vec<InstancedMesh>,
}

/// Everything of a sector that becomes a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorGeometry {
    pub primitives: Vec<ParsedGeometry>,
    pub triangle_meshes: Vec<TriangleMesh>,
    pub instance_meshes: Vec<InstancedMeshFile>,
}

/// Decodes sector payloads. Format decoding lives outside this crate.
pub trait SectorParser {
    fn parse_detailed(&self, bytes: &[u8]) -> anyhow::Result<ParsedSector>;

    fn parse_simple(&self, bytes: &[u8]) -> anyhow::Result<Vec<ParsedGeometry>>;

    fn parse_mesh_file(&self, bytes: &[u8]) -> anyhow::Result<MeshFile>;
}

/// A loaded sector. `group` is `None` for discarded sectors.
///
/// Cloning shares the group handle without taking a reference; holders call
/// [`AutoDisposeGroup::acquire`].
pub struct ConsumedSector<G: Geometry, M> {
    pub model_identifier: String,
    pub metadata: SectorMetadata,
    pub level_of_detail: LevelOfDetail,
    pub group: Option<AutoDisposeGroup<G, M>>,
}

impl<G: Geometry, M> ConsumedSector<G, M> {
    pub fn discarded(wanted: &WantedSector) -> Self {
        Self {
            model_identifier: wanted.model_identifier.clone(),
            metadata: wanted.metadata.clone(),
            level_of_detail: LevelOfDetail::Discarded,
            group: None,
        }
    }

    pub fn sector_id(&self) -> u64 {
        self.metadata.id
    }
}

impl<G: Geometry, M> Clone for ConsumedSector<G, M> {
    fn clone(&self) -> Self {
        Self {
            model_identifier: self.model_identifier.clone(),
            metadata: self.metadata.clone(),
            level_of_detail: self.level_of_detail,
            group: self.group.clone(),
        }
    }
}

impl<G: Geometry, M> fmt::Debug for ConsumedSector<G, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumedSector")
            .field("model_identifier", &self.model_identifier)
            .field("sector", &self.metadata.id)
            .field("level_of_detail", &self.level_of_detail)
            .field("group", &self.group)
            .finish()
    }
}
