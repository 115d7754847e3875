//! Core data structures for streamed CAD geometry.
//!
//! - `collection` is the closed set of primitive kinds ([`GeometryCollectionType`](collection::GeometryCollectionType))
//! - `mesh_groups` clusters flat per-primitive ids into index runs
//! - `geometry` holds decoded buffers, the `Geometry` disposal seam and GPU uploads
//! - `instance` holds per-instance transformation, color and tree index
//! - `scene_graph` defines mesh and group children
//! - `auto_dispose` is the reference-counted group that disposes its geometries

pub mod auto_dispose;
pub mod collection;
pub mod geometry;
pub mod instance;
pub mod mesh_groups;
pub mod scene_graph;
