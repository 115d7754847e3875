//! The closed set of primitive shape kinds a sector can contain.

use std::fmt;

use crate::error::SectorError;

/// Kind of a geometry collection. Every collection carries exactly one of these
/// and every kind has its own shader material.
///
/// The discriminants are the raw tags produced by the sector decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum GeometryCollectionType {
    BoxCollection = 0,
    CircleCollection = 1,
    ConeCollection = 2,
    EccentricConeCollection = 3,
    EllipsoidSegmentCollection = 4,
    GeneralCylinderCollection = 5,
    GeneralRingCollection = 6,
    QuadCollection = 7,
    TorusSegmentCollection = 8,
    TrapeziumCollection = 9,
    NutCollection = 10,
    TriangleMesh = 11,
    InstanceMesh = 12,
}

impl GeometryCollectionType {
    pub const ALL: [GeometryCollectionType; 13] = [
        Self::BoxCollection,
        Self::CircleCollection,
        Self::ConeCollection,
        Self::EccentricConeCollection,
        Self::EllipsoidSegmentCollection,
        Self::GeneralCylinderCollection,
        Self::GeneralRingCollection,
        Self::QuadCollection,
        Self::TorusSegmentCollection,
        Self::TrapeziumCollection,
        Self::NutCollection,
        Self::TriangleMesh,
        Self::InstanceMesh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BoxCollection => "BoxCollection",
            Self::CircleCollection => "CircleCollection",
            Self::ConeCollection => "ConeCollection",
            Self::EccentricConeCollection => "EccentricConeCollection",
            Self::EllipsoidSegmentCollection => "EllipsoidSegmentCollection",
            Self::GeneralCylinderCollection => "GeneralCylinderCollection",
            Self::GeneralRingCollection => "GeneralRingCollection",
            Self::QuadCollection => "QuadCollection",
            Self::TorusSegmentCollection => "TorusSegmentCollection",
            Self::TrapeziumCollection => "TrapeziumCollection",
            Self::NutCollection => "NutCollection",
            Self::TriangleMesh => "TriangleMesh",
            Self::InstanceMesh => "InstanceMesh",
        }
    }

    /// Primitives drawn as instances of a template geometry.
    pub fn is_instanced(self) -> bool {
        !matches!(self, Self::TriangleMesh)
    }

    /// Flat primitives are visible from both sides.
    pub fn is_double_sided(self) -> bool {
        matches!(
            self,
            Self::CircleCollection
                | Self::GeneralRingCollection
                | Self::QuadCollection
                | Self::TrapeziumCollection
        )
    }
}

impl fmt::Display for GeometryCollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for GeometryCollectionType {
    type Error = SectorError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(tag))
            .copied()
            .ok_or(SectorError::UnknownCollectionType(tag))
    }
}
