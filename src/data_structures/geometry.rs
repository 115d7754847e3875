//! Geometry buffers: CPU-side decoded data and its GPU counterpart.
//!
//! Decoded sectors produce [`GeometryBuffer`]s. A [`GeometryUploader`] turns
//! them into [`Geometry`] values (for `wgpu`, a [`GpuGeometry`]) which are then
//! owned by an [`AutoDisposeGroup`](super::auto_dispose::AutoDisposeGroup).

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::data_structures::instance::InstanceRaw;

/// Anything that can describe its own vertex buffer layout.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Releases the resources behind a geometry.
///
/// Only [`AutoDisposeGroup`](super::auto_dispose::AutoDisposeGroup) calls this;
/// every other holder goes through reference counting.
pub trait Geometry {
    fn dispose(&mut self);
}

/// Template or mesh vertex. For triangle meshes color and tree index are
/// per vertex, for instanced templates they are unused and come from the
/// instance.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [u8; 4],
    pub tree_index: u32,
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Unorm8x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 7]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Uint32,
                },
            ],
        }
    }
}

/// Decoded geometry that has not been uploaded yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffer {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Empty for plain triangle meshes.
    pub instances: Vec<InstanceRaw>,
}

impl GeometryBuffer {
    /// Nothing would be drawn from this buffer.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || (self.instances.is_empty() && self.is_instanced_template())
    }

    fn is_instanced_template(&self) -> bool {
        self.vertices.iter().all(|v| v.tree_index == NO_TREE_INDEX)
    }

    /// Tree indices of the drawn elements: per instance when instanced,
    /// per vertex otherwise.
    pub fn tree_indices(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        if self.instances.is_empty() {
            Box::new(self.vertices.iter().map(|v| v.tree_index))
        } else {
            Box::new(self.instances.iter().map(|i| i.tree_index))
        }
    }

    pub fn index_count(&self) -> u32 {
        if self.indices.is_empty() {
            self.vertices.len() as u32
        } else {
            self.indices.len() as u32
        }
    }
}

/// Template vertex marker: not owned by a CAD node.
pub const NO_TREE_INDEX: u32 = u32::MAX;

/// Number of drawn elements per tree index of one mesh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeIndexCounts(HashMap<u32, u32>);

impl TreeIndexCounts {
    pub fn from_geometry(buffer: &GeometryBuffer) -> Self {
        let mut counts = Self::default();
        buffer
            .tree_indices()
            .filter(|&tree_index| tree_index != NO_TREE_INDEX)
            .for_each(|tree_index| counts.increment_or_insert(tree_index));
        counts
    }

    pub fn increment_or_insert(&mut self, tree_index: u32) {
        *self.0.entry(tree_index).or_insert(0) += 1;
    }

    pub fn get(&self, tree_index: u32) -> Option<u32> {
        self.0.get(&tree_index).copied()
    }

    pub fn contains(&self, tree_index: u32) -> bool {
        self.0.contains_key(&tree_index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Uploaded geometry. `dispose` destroys the buffers right away instead of
/// waiting for the last handle to drop.
#[derive(Debug)]
pub struct GpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
    pub instance_buffer: Option<wgpu::Buffer>,
    pub num_elements: u32,
    pub num_instances: u32,
    disposed: bool,
}

impl GpuGeometry {
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Geometry for GpuGeometry {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.vertex_buffer.destroy();
        if let Some(buffer) = &self.index_buffer {
            buffer.destroy();
        }
        if let Some(buffer) = &self.instance_buffer {
            buffer.destroy();
        }
        self.disposed = true;
    }
}

/// Creates geometries from decoded buffers.
pub trait GeometryUploader {
    type Geometry: Geometry;

    fn upload(&self, label: &str, buffer: &GeometryBuffer) -> Self::Geometry;
}

impl GeometryUploader for wgpu::Device {
    type Geometry = GpuGeometry;

    fn upload(&self, label: &str, buffer: &GeometryBuffer) -> GpuGeometry {
        let vertex_buffer = self.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&buffer.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = (!buffer.indices.is_empty()).then(|| {
            self.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Index Buffer")),
                contents: bytemuck::cast_slice(&buffer.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        let instance_buffer = (!buffer.instances.is_empty()).then(|| {
            self.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Instance Buffer")),
                contents: bytemuck::cast_slice(&buffer.instances),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        GpuGeometry {
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_elements: buffer.index_count(),
            num_instances: (buffer.instances.len() as u32).max(1),
            disposed: false,
        }
    }
}
