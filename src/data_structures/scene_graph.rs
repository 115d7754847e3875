//! Scene graph nodes for streamed CAD geometry.
//!
//! A sector is represented by an [`AutoDisposeGroup`] whose children are
//! either meshes (owned, disposed with the group) or nested groups (shared
//! handles, never disposed by the parent).

use crate::data_structures::{
    auto_dispose::AutoDisposeGroup,
    collection::GeometryCollectionType,
    geometry::{Geometry, TreeIndexCounts},
};

/// A drawable: one geometry with the material of its collection type.
#[derive(Debug)]
pub struct MeshNode<G, M> {
    pub name: String,
    pub kind: GeometryCollectionType,
    pub geometry: G,
    pub material: M,
    pub tree_indices: TreeIndexCounts,
}

impl<G, M> MeshNode<G, M> {
    pub fn new(name: impl Into<String>, kind: GeometryCollectionType, geometry: G, material: M) -> Self {
        Self {
            name: name.into(),
            kind,
            geometry,
            material,
            tree_indices: TreeIndexCounts::default(),
        }
    }

    pub fn with_tree_indices(mut self, tree_indices: TreeIndexCounts) -> Self {
        self.tree_indices = tree_indices;
        self
    }
}

/// Child of a group.
pub enum SceneNode<G: Geometry, M> {
    Mesh(MeshNode<G, M>),
    Group(AutoDisposeGroup<G, M>),
}

impl<G: Geometry, M> SceneNode<G, M> {
    pub fn name(&self) -> String {
        match self {
            SceneNode::Mesh(mesh) => mesh.name.clone(),
            SceneNode::Group(group) => group.name(),
        }
    }
}

impl<G: Geometry, M> From<MeshNode<G, M>> for SceneNode<G, M> {
    fn from(mesh: MeshNode<G, M>) -> Self {
        SceneNode::Mesh(mesh)
    }
}

impl<G: Geometry, M> From<AutoDisposeGroup<G, M>> for SceneNode<G, M> {
    fn from(group: AutoDisposeGroup<G, M>) -> Self {
        SceneNode::Group(group)
    }
}
