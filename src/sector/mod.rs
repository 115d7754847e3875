//! Sector streaming: from wanted sectors to drawable, reference-counted groups.
//!
//! - `types` describes sectors and the decoded data a [`types::SectorParser`] hands over
//! - `finalize` merges mesh records with their mesh files
//! - `mesh_manager` turns finalized geometry into an auto-disposing group
//! - `repository` loads sectors and caches consumed ones
//! - `loader` cancels loads that are no longer wanted
//! - `render_target` holds the groups a render target draws

pub mod finalize;
pub mod loader;
pub mod mesh_manager;
pub mod render_target;
pub mod repository;
pub mod types;
