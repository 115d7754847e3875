//! The consumer side: which sector groups a render target currently draws.
//!
//! A render target holds one [`GroupRef`] per visible sector. Updating the
//! visible set acquires every incoming group before any outgoing holder is
//! dropped, so a sector that stays visible is never disposed in between.

use std::collections::BTreeMap;

use crate::{
    data_structures::{
        auto_dispose::{AutoDisposeGroup, GroupRef},
        geometry::Geometry,
    },
    error::SectorError,
    sector::types::ConsumedSector,
};

pub struct SectorRenderTarget<G: Geometry, M> {
    holders: BTreeMap<u64, GroupRef<G, M>>,
}

impl<G: Geometry, M> SectorRenderTarget<G, M> {
    pub fn new() -> Self {
        Self {
            holders: BTreeMap::new(),
        }
    }

    /// Starts drawing `sector`, replacing whatever was drawn for its id.
    /// A discarded sector only removes the old group.
    pub fn add_sector(&mut self, sector: &ConsumedSector<G, M>) -> Result<(), SectorError> {
        let id = sector.sector_id();
        match &sector.group {
            Some(group) => {
                let holder = group.acquire()?;
                // the previous holder drops after the new one is in place
                let _previous = self.holders.insert(id, holder);
            }
            None => {
                self.holders.remove(&id);
            }
        }
        Ok(())
    }

    /// Stops drawing a sector. Returns whether it was drawn.
    pub fn remove_sector_mesh_group(&mut self, sector_id: u64) -> bool {
        self.holders.remove(&sector_id).is_some()
    }

    /// Replaces the visible set with `sectors`.
    pub fn update_visible(&mut self, sectors: &[ConsumedSector<G, M>]) -> Result<(), SectorError> {
        let mut next = BTreeMap::new();
        for sector in sectors {
            if let Some(group) = &sector.group {
                next.insert(sector.sector_id(), group.acquire()?);
            }
        }
        let previous = std::mem::replace(&mut self.holders, next);
        log::debug!(
            "Render target now holds {} sectors, released {}",
            self.holders.len(),
            previous.len()
        );
        drop(previous);
        Ok(())
    }

    pub fn contains(&self, sector_id: u64) -> bool {
        self.holders.contains_key(&sector_id)
    }

    pub fn sector_ids(&self) -> Vec<u64> {
        self.holders.keys().copied().collect()
    }

    pub fn groups(&self) -> impl Iterator<Item = (u64, &AutoDisposeGroup<G, M>)> {
        self.holders.iter().map(|(&id, holder)| (id, holder.group()))
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn clear(&mut self) {
        self.holders.clear();
    }
}

impl<G: Geometry, M> Default for SectorRenderTarget<G, M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        data_structures::{
            collection::GeometryCollectionType, geometry::testing::CountingGeometry,
            scene_graph::MeshNode,
        },
        sector::types::{LevelOfDetail, SectorMetadata},
    };

    type Sector = ConsumedSector<CountingGeometry, ()>;

    fn sector(id: u64) -> (Sector, Rc<Cell<u32>>) {
        let group = AutoDisposeGroup::new(format!("sector-{id}"));
        let (geometry, disposals) = CountingGeometry::new();
        group
            .add_mesh(MeshNode::new("m", GeometryCollectionType::ConeCollection, geometry, ()))
            .unwrap();
        (
            ConsumedSector {
                model_identifier: "model".to_string(),
                metadata: SectorMetadata {
                    id,
                    ..Default::default()
                },
                level_of_detail: LevelOfDetail::Detailed,
                group: Some(group),
            },
            disposals,
        )
    }

    #[test]
    fn removing_the_last_holder_disposes() {
        let mut target = SectorRenderTarget::new();
        let (s, disposals) = sector(1);
        target.add_sector(&s).unwrap();
        assert!(target.contains(1));
        assert_eq!(disposals.get(), 0);

        assert!(target.remove_sector_mesh_group(1));
        assert!(!target.remove_sector_mesh_group(1));
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    fn sector_staying_visible_survives_an_update() {
        let mut target = SectorRenderTarget::new();
        let (a, a_disposals) = sector(1);
        let (b, b_disposals) = sector(2);
        target.update_visible(&[a.clone(), b]).unwrap();

        target.update_visible(&[a.clone()]).unwrap();
        assert_eq!(target.sector_ids(), vec![1]);
        assert_eq!(a_disposals.get(), 0);
        assert_eq!(b_disposals.get(), 1);
        assert_eq!(a.group.as_ref().map(|g| g.reference_count()), Some(1));
    }

    #[test]
    fn re_adding_a_sector_keeps_it_alive() {
        let mut target = SectorRenderTarget::new();
        let (a, disposals) = sector(3);
        target.add_sector(&a).unwrap();
        target.add_sector(&a).unwrap();
        assert_eq!(disposals.get(), 0);
        assert_eq!(a.group.as_ref().map(|g| g.reference_count()), Some(1));
    }

    #[test]
    fn two_targets_share_a_group() {
        let mut main = SectorRenderTarget::new();
        let mut picking = SectorRenderTarget::new();
        let (s, disposals) = sector(4);
        main.add_sector(&s).unwrap();
        picking.add_sector(&s).unwrap();

        main.clear();
        assert_eq!(disposals.get(), 0);
        picking.clear();
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    fn discarded_sector_replaces_the_drawn_one() {
        let mut target = SectorRenderTarget::new();
        let (s, disposals) = sector(5);
        target.add_sector(&s).unwrap();
        let discarded = ConsumedSector {
            group: None,
            level_of_detail: LevelOfDetail::Discarded,
            ..s.clone()
        };
        target.add_sector(&discarded).unwrap();
        assert!(target.is_empty());
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    fn disposed_sector_cannot_be_added() {
        let mut target = SectorRenderTarget::new();
        let (s, _) = sector(6);
        let group = s.group.clone().unwrap();
        group.reference().unwrap();
        group.dereference().unwrap();
        assert!(target.add_sector(&s).is_err());
        assert!(target.is_empty());
    }
}
