//! Material dispatch per geometry collection type.
//!
//! A [`Materials`] bundle holds one material per [`GeometryCollectionType`] and
//! is created once when the renderer starts. [`get_shader_material`] is the
//! only way meshes pick their material; the `match` has no wildcard arm, so a
//! new collection type does not compile until it has a material.

use crate::{
    data_structures::collection::GeometryCollectionType, error::SectorError,
    pipelines::basic::mk_primitive_pipeline,
};

/// One material per collection type.
#[derive(Debug, Clone, PartialEq)]
pub struct Materials<M> {
    pub r#box: M,
    pub circle: M,
    pub cone: M,
    pub eccentric_cone: M,
    pub ellipsoid_segment: M,
    pub general_cylinder: M,
    pub general_ring: M,
    pub quad: M,
    pub torus_segment: M,
    pub trapezium: M,
    pub nut: M,
    pub triangle_mesh: M,
    pub instanced_mesh: M,
}

impl<M> Materials<M> {
    /// Builds every material from the collection type it belongs to.
    pub fn from_fn(mut make: impl FnMut(GeometryCollectionType) -> M) -> Self {
        use GeometryCollectionType as T;
        Self {
            r#box: make(T::BoxCollection),
            circle: make(T::CircleCollection),
            cone: make(T::ConeCollection),
            eccentric_cone: make(T::EccentricConeCollection),
            ellipsoid_segment: make(T::EllipsoidSegmentCollection),
            general_cylinder: make(T::GeneralCylinderCollection),
            general_ring: make(T::GeneralRingCollection),
            quad: make(T::QuadCollection),
            torus_segment: make(T::TorusSegmentCollection),
            trapezium: make(T::TrapeziumCollection),
            nut: make(T::NutCollection),
            triangle_mesh: make(T::TriangleMesh),
            instanced_mesh: make(T::InstanceMesh),
        }
    }
}

/// The material of `materials` that draws collections of type `kind`.
pub fn get_shader_material<M>(kind: GeometryCollectionType, materials: &Materials<M>) -> &M {
    use GeometryCollectionType as T;
    match kind {
        T::BoxCollection => &materials.r#box,
        T::CircleCollection => &materials.circle,
        T::ConeCollection => &materials.cone,
        T::EccentricConeCollection => &materials.eccentric_cone,
        T::EllipsoidSegmentCollection => &materials.ellipsoid_segment,
        T::GeneralCylinderCollection => &materials.general_cylinder,
        T::GeneralRingCollection => &materials.general_ring,
        T::QuadCollection => &materials.quad,
        T::TorusSegmentCollection => &materials.torus_segment,
        T::TrapeziumCollection => &materials.trapezium,
        T::NutCollection => &materials.nut,
        T::TriangleMesh => &materials.triangle_mesh,
        T::InstanceMesh => &materials.instanced_mesh,
    }
}

/// Same as [`get_shader_material`] for an undecoded tag. Unknown tags fail.
pub fn material_for_tag<M>(tag: u8, materials: &Materials<M>) -> Result<&M, SectorError> {
    let kind = GeometryCollectionType::try_from(tag)?;
    Ok(get_shader_material(kind, materials))
}

/// GPU material: the render pipeline for one collection type.
#[derive(Debug, Clone)]
pub struct ShaderMaterial {
    pub kind: GeometryCollectionType,
    pub pipeline: wgpu::RenderPipeline,
}

pub fn mk_shader_materials(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> Materials<ShaderMaterial> {
    Materials::from_fn(|kind| ShaderMaterial {
        kind,
        pipeline: mk_primitive_pipeline(device, kind, color_format, camera_bind_group_layout),
    })
}
