//! Merging of decoded mesh records with their mesh files.
//!
//! Triangle meshes that live in the same mesh file become one merged mesh with
//! per-vertex color and tree index. Instanced meshes are grouped by file and
//! then by triangle range, so each range becomes one instanced draw.

use std::{collections::HashMap, rc::Rc};

use crate::{
    data_structures::{
        geometry::{GeometryBuffer, MeshVertex, NO_TREE_INDEX},
        instance::InstanceRaw,
        mesh_groups::{create_offsets_array, group_meshes_by_number, triangle_index_range},
    },
    error::SectorError,
    sector::types::{
        InstanceMeshRecords, InstancedMesh, InstancedMeshFile, MeshFile, ParsedSector,
        SectorGeometry, TriangleMesh, TriangleMeshRecords, mesh_file_name,
    },
};

/// Builds the drawable geometry of a detailed sector. `mesh_files` must hold
/// every id of [`ParsedSector::mesh_file_ids`].
pub fn finalize_detailed(
    parsed: ParsedSector,
    mesh_files: &HashMap<u64, Rc<MeshFile>>,
) -> Result<SectorGeometry, SectorError> {
    let triangle_meshes = finalize_triangle_meshes(&parsed.triangle_meshes, mesh_files)?;
    let instance_meshes = finalize_instance_meshes(&parsed.instance_meshes, mesh_files)?;
    Ok(SectorGeometry {
        primitives: parsed.primitives,
        triangle_meshes,
        instance_meshes,
    })
}

fn mesh_file(mesh_files: &HashMap<u64, Rc<MeshFile>>, file_id: u64) -> Result<&MeshFile, SectorError> {
    mesh_files
        .get(&file_id)
        .map(Rc::as_ref)
        .ok_or_else(|| SectorError::MissingMeshFile(mesh_file_name(file_id)))
}

fn record<T: Copy>(values: &[T], index: usize, what: &str) -> Result<T, SectorError> {
    values.get(index).copied().ok_or_else(|| {
        SectorError::MalformedSector(format!("{what} has no entry for mesh {index}"))
    })
}

fn vertices_of(file: &MeshFile, file_id: u64) -> Result<Vec<MeshVertex>, SectorError> {
    if !file.normals.is_empty() && file.normals.len() != file.positions.len() {
        return Err(SectorError::MalformedSector(format!(
            "{} has {} normals for {} positions",
            mesh_file_name(file_id),
            file.normals.len(),
            file.positions.len()
        )));
    }
    Ok(file
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| MeshVertex {
            position,
            normal: file.normals.get(i).copied().unwrap_or([0.0; 3]),
            color: [0; 4],
            tree_index: NO_TREE_INDEX,
        })
        .collect())
}

/// Indices of triangles `offset..offset + count` of `file`.
fn triangle_range(file: &MeshFile, file_id: u64, offset: u64, count: u64) -> Result<&[u32], SectorError> {
    triangle_index_range(offset, count)
        .and_then(|range| file.indices.get(range))
        .ok_or_else(|| {
            SectorError::MalformedSector(format!(
                "{} triangles at offset {} are outside of {}",
                count,
                offset,
                mesh_file_name(file_id)
            ))
        })
}

fn finalize_triangle_meshes(
    records: &TriangleMeshRecords,
    mesh_files: &HashMap<u64, Rc<MeshFile>>,
) -> Result<Vec<TriangleMesh>, SectorError> {
    let mut meshes = Vec::new();
    for group in group_meshes_by_number(&records.file_ids) {
        let file = mesh_file(mesh_files, group.id)?;
        let triangle_counts = group
            .mesh_indices
            .iter()
            .map(|&i| record(&records.triangle_counts, i, "triangle counts"))
            .collect::<Result<Vec<_>, _>>()?;
        let offsets = create_offsets_array(&triangle_counts).ok_or_else(|| {
            SectorError::MalformedSector(format!(
                "triangle counts of {} overflow",
                mesh_file_name(group.id)
            ))
        })?;

        let mut vertices = vertices_of(file, group.id)?;
        for ((&mesh_index, &offset), &count) in group.mesh_indices.iter().zip(&offsets).zip(&triangle_counts) {
            let tree_index = record(&records.tree_indices, mesh_index, "tree indices")?;
            let color = record(&records.colors, mesh_index, "colors")?;
            for &vertex_index in triangle_range(file, group.id, offset, count)? {
                let vertex = vertices.get_mut(vertex_index as usize).ok_or_else(|| {
                    SectorError::MalformedSector(format!(
                        "vertex {} is outside of {}",
                        vertex_index,
                        mesh_file_name(group.id)
                    ))
                })?;
                vertex.tree_index = tree_index;
                vertex.color = color;
            }
        }

        meshes.push(TriangleMesh {
            file_id: group.id,
            buffer: GeometryBuffer {
                vertices,
                indices: file.indices.clone(),
                instances: Vec::new(),
            },
        });
    }
    Ok(meshes)
}

fn finalize_instance_meshes(
    records: &InstanceMeshRecords,
    mesh_files: &HashMap<u64, Rc<MeshFile>>,
) -> Result<Vec<InstancedMeshFile>, SectorError> {
    let mut files = Vec::new();
    for file_group in group_meshes_by_number(&records.file_ids) {
        let file = mesh_file(mesh_files, file_group.id)?;
        let triangle_offsets = file_group
            .mesh_indices
            .iter()
            .map(|&i| record(&records.triangle_offsets, i, "triangle offsets"))
            .collect::<Result<Vec<_>, _>>()?;

        let mut meshes = Vec::new();
        for offset_group in group_meshes_by_number(&triangle_offsets) {
            let placements: Vec<usize> = offset_group
                .mesh_indices
                .iter()
                .map(|&i| file_group.mesh_indices[i])
                .collect();
            let triangle_count = record(&records.triangle_counts, placements[0], "triangle counts")?;
            triangle_range(file, file_group.id, offset_group.id, triangle_count)?;

            let instances = placements
                .iter()
                .map(|&i| {
                    Ok(InstanceRaw::from_columns(
                        &record(&records.instance_matrices, i, "instance matrices")?,
                        record(&records.colors, i, "colors")?,
                        record(&records.tree_indices, i, "tree indices")?,
                    ))
                })
                .collect::<Result<Vec<_>, SectorError>>()?;

            meshes.push(InstancedMesh {
                triangle_offset: offset_group.id,
                triangle_count,
                instances,
            });
        }

        files.push(InstancedMeshFile {
            file_id: file_group.id,
            vertices: vertices_of(file, file_group.id)?,
            indices: file.indices.clone(),
            meshes,
        });
    }
    Ok(files)
}
