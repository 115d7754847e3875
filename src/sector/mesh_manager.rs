//! Turns finalized sector geometry into an [`AutoDisposeGroup`] of meshes.

use crate::{
    data_structures::{
        auto_dispose::AutoDisposeGroup,
        collection::GeometryCollectionType,
        geometry::{GeometryBuffer, GeometryUploader, TreeIndexCounts},
        mesh_groups::triangle_index_range,
        scene_graph::MeshNode,
    },
    error::SectorError,
    pipelines::materials::{Materials, get_shader_material},
    sector::types::{ParsedGeometry, SectorGeometry},
};

/// Group type produced for an uploader `U` and material `M`.
pub type SectorGroup<U, M> = AutoDisposeGroup<<U as GeometryUploader>::Geometry, M>;

pub struct CadMeshManager<U, M> {
    uploader: U,
    materials: Materials<M>,
}

impl<U: GeometryUploader, M: Clone> CadMeshManager<U, M> {
    pub fn new(uploader: U, materials: Materials<M>) -> Self {
        Self { uploader, materials }
    }

    pub fn materials(&self) -> &Materials<M> {
        &self.materials
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// One group per sector: primitive collections, merged triangle meshes and
    /// one instanced mesh per triangle range.
    pub fn create_sector_group(
        &self,
        sector_id: u64,
        geometry: &SectorGeometry,
    ) -> Result<SectorGroup<U, M>, SectorError> {
        let group = AutoDisposeGroup::new(format!("sector-{sector_id}"));
        if let Err(err) = self.fill_sector_group(&group, sector_id, geometry) {
            // nobody holds the partial group yet, so one release disposes its uploads
            drop(group.acquire()?);
            return Err(err);
        }
        log::debug!(
            "Created {} meshes for sector {}",
            group.mesh_count(),
            sector_id
        );
        Ok(group)
    }

    fn fill_sector_group(
        &self,
        group: &SectorGroup<U, M>,
        sector_id: u64,
        geometry: &SectorGeometry,
    ) -> Result<(), SectorError> {
        self.create_meshes_from_parsed_geometries(group, &geometry.primitives, sector_id)?;

        for mesh in &geometry.triangle_meshes {
            self.add_mesh(
                group,
                format!("sector-{sector_id}-mesh-{}", mesh.file_id),
                GeometryCollectionType::TriangleMesh,
                &mesh.buffer,
            )?;
        }

        for file in &geometry.instance_meshes {
            for mesh in &file.meshes {
                let indices = triangle_index_range(mesh.triangle_offset, mesh.triangle_count)
                    .and_then(|range| file.indices.get(range))
                    .ok_or_else(|| {
                        SectorError::MalformedSector(format!(
                            "{} instanced triangles at offset {} outside of mesh file {}",
                            mesh.triangle_count, mesh.triangle_offset, file.file_id
                        ))
                    })?;
                let buffer = GeometryBuffer {
                    vertices: file.vertices.clone(),
                    indices: indices.to_vec(),
                    instances: mesh.instances.clone(),
                };
                self.add_mesh(
                    group,
                    format!(
                        "sector-{sector_id}-instanced-{}-{}",
                        file.file_id, mesh.triangle_offset
                    ),
                    GeometryCollectionType::InstanceMesh,
                    &buffer,
                )?;
            }
        }

        Ok(())
    }

    /// Adds one mesh per non-empty geometry to `group`.
    pub fn create_meshes_from_parsed_geometries(
        &self,
        group: &SectorGroup<U, M>,
        geometries: &[ParsedGeometry],
        sector_id: u64,
    ) -> Result<(), SectorError> {
        for (i, parsed) in geometries.iter().enumerate() {
            let name = match &parsed.instance_id {
                Some(instance_id) => format!("sector-{sector_id}-{instance_id}"),
                None => format!("sector-{sector_id}-{}-{i}", parsed.kind),
            };
            self.add_mesh(group, name, parsed.kind, &parsed.buffer)?;
        }
        Ok(())
    }

    fn add_mesh(
        &self,
        group: &SectorGroup<U, M>,
        name: String,
        kind: GeometryCollectionType,
        buffer: &GeometryBuffer,
    ) -> Result<(), SectorError> {
        if buffer.is_empty() {
            log::debug!("Skipping empty geometry {}", name);
            return Ok(());
        }
        let material = get_shader_material(kind, &self.materials).clone();
        let geometry = self.uploader.upload(&name, buffer);
        let mesh = MeshNode::new(name, kind, geometry, material)
            .with_tree_indices(TreeIndexCounts::from_geometry(buffer));
        group.add_mesh(mesh)
    }
}
