//! Typed errors for the sector core.
//!
//! Misuse of the reference counting and malformed decoded data surface as
//! [`SectorError`]. I/O and GPU setup failures stay in `anyhow::Result` at the
//! loader boundaries.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SectorError {
    #[error("dereference() called on group '{group}' which has no outstanding references")]
    DereferenceWithoutReference { group: String },
    #[error("group '{group}' is already disposed")]
    AlreadyDisposed { group: String },
    #[error("unknown geometry collection type tag {0}")]
    UnknownCollectionType(u8),
    #[error("mesh file '{0}' is referenced by the sector but was not loaded")]
    MissingMeshFile(String),
    #[error("malformed sector data: {0}")]
    MalformedSector(String),
}
