//! Render pipelines for streamed sector geometry.
//!
//! - `basic` builds the per-collection-type render pipelines
//! - `camera` holds the camera uniform shared by all of them
//! - `materials` maps collection types to their material

pub mod basic;
pub mod camera;
pub mod materials;
