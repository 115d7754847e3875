#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    num::NonZeroUsize,
    rc::Rc,
};

use cad_ngin::{
    CadMeshManager, GeometryCollectionType, Materials, RepositoryConfig, SectorLoader,
    SectorRepository, WantedSector,
    data_structures::{
        geometry::{Geometry, GeometryBuffer, GeometryUploader, MeshVertex, NO_TREE_INDEX},
        instance::Instance,
    },
    resources::FileProvider,
    sector::types::{
        LevelOfDetail, MeshFile, ParsedGeometry, ParsedSector, SectorMetadata, SectorParser,
        TriangleMeshRecords,
    },
};

/// Counts how often the group disposed it.
pub struct CountingGeometry {
    disposals: Rc<Cell<u32>>,
}

impl Geometry for CountingGeometry {
    fn dispose(&mut self) {
        self.disposals.set(self.disposals.get() + 1);
    }
}

/// Hands out counting geometries and remembers every counter.
#[derive(Default)]
pub struct CountingUploader {
    pub labels: RefCell<Vec<String>>,
    counters: RefCell<Vec<Rc<Cell<u32>>>>,
}

impl CountingUploader {
    pub fn uploads(&self) -> usize {
        self.counters.borrow().len()
    }

    pub fn total_disposals(&self) -> u32 {
        self.counters.borrow().iter().map(|c| c.get()).sum()
    }

    /// True if no geometry was disposed more than once.
    pub fn disposed_at_most_once(&self) -> bool {
        self.counters.borrow().iter().all(|c| c.get() <= 1)
    }
}

impl GeometryUploader for CountingUploader {
    type Geometry = CountingGeometry;

    fn upload(&self, label: &str, _buffer: &GeometryBuffer) -> CountingGeometry {
        let disposals = Rc::new(Cell::new(0));
        self.labels.borrow_mut().push(label.to_string());
        self.counters.borrow_mut().push(Rc::clone(&disposals));
        CountingGeometry { disposals }
    }
}

/// Files in memory. Every fetch suspends once before answering.
#[derive(Default)]
pub struct MemoryProvider {
    files: HashMap<String, Vec<u8>>,
    pub fetches: Cell<u32>,
}

impl MemoryProvider {
    pub fn with_file(mut self, base_url: &str, file_name: &str, payload: Vec<u8>) -> Self {
        self.files.insert(format!("{base_url}/{file_name}"), payload);
        self
    }
}

impl FileProvider for MemoryProvider {
    async fn get_binary_file(&self, base_url: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
        self.fetches.set(self.fetches.get() + 1);
        tokio::task::yield_now().await;
        self.files
            .get(&format!("{base_url}/{file_name}"))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{base_url}/{file_name} not found"))
    }
}

/// Byte 0: number of cone instances. Every further byte: a mesh file id.
pub struct FixtureParser;

impl SectorParser for FixtureParser {
    fn parse_detailed(&self, bytes: &[u8]) -> anyhow::Result<ParsedSector> {
        let (&count, files) = bytes
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("empty sector"))?;
        let file_ids: Vec<u64> = files.iter().map(|&f| u64::from(f)).collect();
        Ok(ParsedSector {
            primitives: vec![cones(count)],
            triangle_meshes: TriangleMeshRecords {
                tree_indices: file_ids.iter().map(|&f| 1000 + f as u32).collect(),
                colors: vec![[90, 90, 90, 255]; file_ids.len()],
                triangle_counts: vec![1; file_ids.len()],
                file_ids,
            },
            ..Default::default()
        })
    }

    fn parse_simple(&self, _bytes: &[u8]) -> anyhow::Result<Vec<ParsedGeometry>> {
        Ok(vec![ParsedGeometry {
            kind: GeometryCollectionType::QuadCollection,
            ..cones(1)
        }])
    }

    fn parse_mesh_file(&self, _bytes: &[u8]) -> anyhow::Result<MeshFile> {
        Ok(MeshFile {
            positions: vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            normals: vec![[0.0, 1.0, 0.0]; 3],
            indices: vec![0, 1, 2],
        })
    }
}

fn cones(count: u8) -> ParsedGeometry {
    let vertex = MeshVertex {
        position: [0.0; 3],
        normal: [0.0, 0.0, 1.0],
        color: [0; 4],
        tree_index: NO_TREE_INDEX,
    };
    ParsedGeometry {
        kind: GeometryCollectionType::ConeCollection,
        buffer: GeometryBuffer {
            vertices: vec![vertex; 3],
            indices: vec![0, 1, 2],
            instances: (0..count)
                .map(|i| Instance::new().to_raw([255, 0, 0, 255], u32::from(i)))
                .collect(),
        },
        instance_id: None,
    }
}

pub const BASE_URL: &str = "models/plant";

pub fn wanted(id: u64, level_of_detail: LevelOfDetail) -> WantedSector {
    WantedSector {
        model_identifier: "plant".to_string(),
        model_base_url: BASE_URL.to_string(),
        metadata: SectorMetadata {
            id,
            path: format!("0/{id}/"),
            depth: 1,
            index_file: format!("sector_{id}.i3d"),
            faces_file: Some(format!("sector_{id}.f3d")),
        },
        level_of_detail,
    }
}

/// A model with sectors 0..8, each holding two cones and mesh files 1 and 2.
pub fn provider() -> MemoryProvider {
    let mut provider = MemoryProvider::default()
        .with_file(BASE_URL, "mesh_1.ctm", vec![0])
        .with_file(BASE_URL, "mesh_2.ctm", vec![0]);
    for id in 0..8u64 {
        provider = provider
            .with_file(BASE_URL, &format!("sector_{id}.i3d"), vec![2, 1, 2])
            .with_file(BASE_URL, &format!("sector_{id}.f3d"), vec![1]);
    }
    provider
}

pub type TestLoader =
    SectorLoader<MemoryProvider, FixtureParser, CountingUploader, GeometryCollectionType>;

pub fn loader(consumed_sector_capacity: usize) -> TestLoader {
    let capacity = NonZeroUsize::new(consumed_sector_capacity).unwrap();
    SectorLoader::new(SectorRepository::new(
        provider(),
        FixtureParser,
        CadMeshManager::new(CountingUploader::default(), Materials::from_fn(|kind| kind)),
        RepositoryConfig {
            consumed_sector_capacity: capacity,
            ..Default::default()
        },
    ))
}
