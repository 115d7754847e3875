//! Loads sectors and keeps the most recently used ones alive.
//!
//! The consumed-sector cache is a holder of every group it contains: a group
//! is referenced when it enters the cache and dereferenced when it is evicted,
//! replaced or cleared. Other holders (render targets) acquire their own
//! reference, so eviction only disposes sectors nobody draws anymore.

use std::{cell::RefCell, collections::HashMap, num::NonZeroUsize, rc::Rc};

use anyhow::Context as _;
use lru::LruCache;

use crate::{
    data_structures::geometry::{Geometry, GeometryUploader},
    resources::FileProvider,
    sector::{
        finalize::finalize_detailed,
        mesh_manager::CadMeshManager,
        types::{
            ConsumedSector, LevelOfDetail, MeshFile, SectorGeometry, SectorParser, WantedSector,
            mesh_file_name,
        },
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Consumed sectors kept alive after the last render target let go.
    pub consumed_sector_capacity: NonZeroUsize,
    /// Decoded mesh files shared between sectors.
    pub mesh_file_capacity: NonZeroUsize,
}

const CONSUMED_SECTOR_CAPACITY: NonZeroUsize = NonZeroUsize::new(50).unwrap();
const MESH_FILE_CAPACITY: NonZeroUsize = NonZeroUsize::new(10).unwrap();

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            consumed_sector_capacity: CONSUMED_SECTOR_CAPACITY,
            mesh_file_capacity: MESH_FILE_CAPACITY,
        }
    }
}

type Consumed<U, M> = ConsumedSector<<U as GeometryUploader>::Geometry, M>;

pub struct SectorRepository<P, S, U: GeometryUploader, M> {
    provider: P,
    parser: S,
    mesh_manager: CadMeshManager<U, M>,
    consumed: RefCell<LruCache<String, Consumed<U, M>>>,
    mesh_files: RefCell<LruCache<String, Rc<MeshFile>>>,
}

impl<P, S, U, M> SectorRepository<P, S, U, M>
where
    P: FileProvider,
    S: SectorParser,
    U: GeometryUploader,
    M: Clone,
{
    pub fn new(provider: P, parser: S, mesh_manager: CadMeshManager<U, M>, config: RepositoryConfig) -> Self {
        Self {
            provider,
            parser,
            mesh_manager,
            consumed: RefCell::new(LruCache::new(config.consumed_sector_capacity)),
            mesh_files: RefCell::new(LruCache::new(config.mesh_file_capacity)),
        }
    }

    pub fn mesh_manager(&self) -> &CadMeshManager<U, M> {
        &self.mesh_manager
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the cached sector or loads it. A loaded sector is referenced by
    /// the cache before it is returned.
    pub async fn load_sector(&self, wanted: &WantedSector) -> anyhow::Result<Consumed<U, M>> {
        let key = wanted.cache_key();
        if let Some(cached) = self.consumed.borrow_mut().get(&key) {
            log::debug!("Sector {} served from cache", key);
            return Ok(cached.clone());
        }

        let geometry = match wanted.level_of_detail {
            LevelOfDetail::Discarded => return Ok(ConsumedSector::discarded(wanted)),
            LevelOfDetail::Simple => self.load_simple(wanted).await,
            LevelOfDetail::Detailed => self.load_detailed(wanted).await,
        };

        geometry
            .and_then(|geometry| {
                let group = self
                    .mesh_manager
                    .create_sector_group(wanted.metadata.id, &geometry)?;
                let consumed = ConsumedSector {
                    model_identifier: wanted.model_identifier.clone(),
                    metadata: wanted.metadata.clone(),
                    level_of_detail: wanted.level_of_detail,
                    group: Some(group),
                };
                self.insert(key.clone(), consumed)
            })
            .with_context(|| format!("loading sector {key}"))
    }

    async fn load_detailed(&self, wanted: &WantedSector) -> anyhow::Result<SectorGeometry> {
        log::debug!("Loading detailed sector {}", wanted.cache_key());
        let bytes = self
            .provider
            .get_binary_file(&wanted.model_base_url, &wanted.metadata.index_file)
            .await?;
        let parsed = self.parser.parse_detailed(&bytes)?;

        let file_ids = parsed.mesh_file_ids();
        let loaded = futures::future::join_all(
            file_ids
                .iter()
                .map(|&file_id| self.load_mesh_file(&wanted.model_base_url, file_id)),
        )
        .await;
        let mut mesh_files = HashMap::new();
        for (file_id, file) in file_ids.into_iter().zip(loaded) {
            mesh_files.insert(file_id, file?);
        }
        Ok(finalize_detailed(parsed, &mesh_files)?)
    }

    async fn load_simple(&self, wanted: &WantedSector) -> anyhow::Result<SectorGeometry> {
        let Some(faces_file) = &wanted.metadata.faces_file else {
            log::debug!("Sector {} has no simple geometry", wanted.cache_key());
            return Ok(SectorGeometry::default());
        };
        log::debug!("Loading simple sector {}", wanted.cache_key());
        let bytes = self
            .provider
            .get_binary_file(&wanted.model_base_url, faces_file)
            .await?;
        Ok(SectorGeometry {
            primitives: self.parser.parse_simple(&bytes)?,
            ..Default::default()
        })
    }

    async fn load_mesh_file(&self, base_url: &str, file_id: u64) -> anyhow::Result<Rc<MeshFile>> {
        let file_name = mesh_file_name(file_id);
        let key = format!("{base_url}/{file_name}");
        if let Some(file) = self.mesh_files.borrow_mut().get(&key) {
            return Ok(Rc::clone(file));
        }
        let bytes = self.provider.get_binary_file(base_url, &file_name).await?;
        let file = Rc::new(
            self.parser
                .parse_mesh_file(&bytes)
                .with_context(|| format!("parsing {file_name}"))?,
        );
        self.mesh_files.borrow_mut().put(key, Rc::clone(&file));
        Ok(file)
    }

    /// Makes the cache a holder of `consumed`. If another load of the same key
    /// finished first, the new group is disposed and the cached one returned.
    fn insert(&self, key: String, consumed: Consumed<U, M>) -> anyhow::Result<Consumed<U, M>> {
        let mut cache = self.consumed.borrow_mut();
        if let Some(existing) = cache.get(&key) {
            log::debug!("Sector {} was loaded twice, keeping the first", key);
            if let Some(group) = &consumed.group {
                group.reference()?;
                group.dereference()?;
            }
            return Ok(existing.clone());
        }
        if let Some(group) = &consumed.group {
            group.reference()?;
        }
        if let Some((evicted_key, evicted)) = cache.push(key, consumed.clone()) {
            log::debug!("Evicting sector {} from the consumed sector cache", evicted_key);
            release(evicted)?;
        }
        Ok(consumed)
    }
}

impl<P, S, U: GeometryUploader, M> SectorRepository<P, S, U, M> {
    /// Drops the cache's reference on `wanted`, if it is cached.
    pub fn remove(&self, wanted: &WantedSector) -> anyhow::Result<()> {
        let removed = self.consumed.borrow_mut().pop(&wanted.cache_key());
        if let Some(consumed) = removed {
            release(consumed)?;
        }
        Ok(())
    }

    pub fn contains(&self, wanted: &WantedSector) -> bool {
        self.consumed.borrow().contains(&wanted.cache_key())
    }

    pub fn cached_sector_count(&self) -> usize {
        self.consumed.borrow().len()
    }

    /// Drops the cache's reference on every sector.
    pub fn clear(&self) -> anyhow::Result<()> {
        let mut cache = self.consumed.borrow_mut();
        while let Some((_, consumed)) = cache.pop_lru() {
            release(consumed)?;
        }
        self.mesh_files.borrow_mut().clear();
        Ok(())
    }
}

impl<P, S, U: GeometryUploader, M> Drop for SectorRepository<P, S, U, M> {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            log::error!("Releasing cached sectors failed: {:#}", err);
        }
    }
}

fn release<G: Geometry, M>(consumed: ConsumedSector<G, M>) -> anyhow::Result<()> {
    if let Some(group) = consumed.group {
        group.dereference()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::{
            collection::GeometryCollectionType, geometry::testing::CpuUploader,
        },
        pipelines::materials::Materials,
        resources::testing::MemoryFileProvider,
        sector::testing::{ToyParser, wanted},
    };

    type Repository = SectorRepository<MemoryFileProvider, ToyParser, CpuUploader, GeometryCollectionType>;

    fn repository(capacity: usize) -> Repository {
        let mut provider = MemoryFileProvider::default();
        for id in 0..8u64 {
            provider = provider
                .with_file("model", &format!("sector_{id}.i3d"), vec![2, 1, 2])
                .with_file("model", &format!("sector_{id}.f3d"), vec![1]);
        }
        provider = provider
            .with_file("model", "mesh_1.ctm", vec![0])
            .with_file("model", "mesh_2.ctm", vec![0]);
        SectorRepository::new(
            provider,
            ToyParser,
            CadMeshManager::new(CpuUploader::default(), Materials::from_fn(|kind| kind)),
            RepositoryConfig {
                consumed_sector_capacity: NonZeroUsize::new(capacity).unwrap(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn detailed_sector_is_built_and_held_by_the_cache() {
        let repository = repository(4);
        let consumed = repository
            .load_sector(&wanted(1, LevelOfDetail::Detailed))
            .await
            .unwrap();

        let group = consumed.group.expect("detailed sector has a group");
        // one box collection and one merged mesh per mesh file
        assert_eq!(group.mesh_count(), 3);
        assert_eq!(group.reference_count(), 1);
        assert_eq!(repository.cached_sector_count(), 1);
    }

    #[tokio::test]
    async fn cached_sector_is_not_fetched_again() {
        let repository = repository(4);
        let first = repository.load_sector(&wanted(1, LevelOfDetail::Detailed)).await.unwrap();
        let fetches = repository.provider().fetches.get();
        let second = repository.load_sector(&wanted(1, LevelOfDetail::Detailed)).await.unwrap();

        assert_eq!(repository.provider().fetches.get(), fetches);
        assert!(first.group.unwrap().ptr_eq(&second.group.unwrap()));
    }

    #[tokio::test]
    async fn mesh_files_are_shared_between_sectors() {
        let repository = repository(4);
        repository.load_sector(&wanted(1, LevelOfDetail::Detailed)).await.unwrap();
        repository.load_sector(&wanted(2, LevelOfDetail::Detailed)).await.unwrap();
        // two index files plus mesh_1 and mesh_2 once
        assert_eq!(repository.provider().fetches.get(), 4);
    }

    #[tokio::test]
    async fn levels_of_detail_are_cached_separately() {
        let repository = repository(4);
        let simple = repository.load_sector(&wanted(1, LevelOfDetail::Simple)).await.unwrap();
        let detailed = repository.load_sector(&wanted(1, LevelOfDetail::Detailed)).await.unwrap();

        let simple = simple.group.unwrap();
        assert_eq!(simple.mesh_count(), 1);
        let mut kinds = Vec::new();
        simple.for_each_mesh(&mut |mesh| kinds.push(mesh.kind));
        assert_eq!(kinds, vec![GeometryCollectionType::QuadCollection]);
        assert!(!simple.ptr_eq(&detailed.group.unwrap()));
        assert_eq!(repository.cached_sector_count(), 2);
    }

    #[tokio::test]
    async fn discarded_sector_has_no_group_and_is_not_cached() {
        let repository = repository(4);
        let consumed = repository.load_sector(&wanted(1, LevelOfDetail::Discarded)).await.unwrap();
        assert!(consumed.group.is_none());
        assert_eq!(repository.cached_sector_count(), 0);
        assert_eq!(repository.provider().fetches.get(), 0);
    }

    #[tokio::test]
    async fn eviction_dereferences_the_oldest_group() {
        let repository = repository(2);
        let first = repository.load_sector(&wanted(1, LevelOfDetail::Simple)).await.unwrap();
        repository.load_sector(&wanted(2, LevelOfDetail::Simple)).await.unwrap();
        repository.load_sector(&wanted(3, LevelOfDetail::Simple)).await.unwrap();

        let first = first.group.unwrap();
        assert!(first.is_disposed());
        assert!(!repository.contains(&wanted(1, LevelOfDetail::Simple)));
        assert_eq!(repository.cached_sector_count(), 2);
    }

    #[tokio::test]
    async fn eviction_keeps_groups_other_holders_still_use() {
        let repository = repository(1);
        let first = repository.load_sector(&wanted(1, LevelOfDetail::Simple)).await.unwrap();
        let drawn = first.group.as_ref().unwrap().acquire().unwrap();
        repository.load_sector(&wanted(2, LevelOfDetail::Simple)).await.unwrap();

        assert!(!drawn.is_disposed());
        assert_eq!(drawn.reference_count(), 1);
        drop(drawn);
        assert!(first.group.unwrap().is_disposed());
    }

    #[tokio::test]
    async fn failed_load_leaves_no_cache_entry() {
        let repository = repository(4);
        let result = repository.load_sector(&wanted(42, LevelOfDetail::Detailed)).await;
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("sector_42.i3d"));
        assert_eq!(repository.cached_sector_count(), 0);
    }

    #[tokio::test]
    async fn clear_releases_every_cached_group() {
        let repository = repository(4);
        let a = repository.load_sector(&wanted(1, LevelOfDetail::Simple)).await.unwrap();
        let b = repository.load_sector(&wanted(2, LevelOfDetail::Detailed)).await.unwrap();
        repository.clear().unwrap();

        assert!(a.group.unwrap().is_disposed());
        assert!(b.group.unwrap().is_disposed());
        assert_eq!(repository.mesh_manager().uploader().total_disposals(), 4);
    }

    #[tokio::test]
    async fn removing_a_sector_keeps_other_holders_alive() {
        let repository = repository(4);
        let sector = wanted(3, LevelOfDetail::Simple);
        let consumed = repository.load_sector(&sector).await.unwrap();
        let group = consumed.group.unwrap();
        let holder = group.acquire().unwrap();

        repository.remove(&sector).unwrap();
        assert!(!repository.contains(&sector));
        assert!(!group.is_disposed());

        drop(holder);
        assert!(group.is_disposed());
    }
}
