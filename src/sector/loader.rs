//! Abandoning sector loads the scheduler no longer wants.
//!
//! Every load runs inside a [`futures::future::Abortable`]. Aborting drops the
//! in-flight fetch at its next poll, so a cancelled sector never reaches the
//! mesh manager and never enters the consumed-sector cache.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
};

use futures::future::{AbortHandle, Abortable, Aborted};

use crate::{
    data_structures::geometry::GeometryUploader,
    resources::FileProvider,
    sector::{
        repository::SectorRepository,
        types::{ConsumedSector, SectorParser, WantedSector},
    },
};

pub struct SectorLoader<P, S, U: GeometryUploader, M> {
    repository: SectorRepository<P, S, U, M>,
    next_ticket: Cell<u64>,
    in_flight: RefCell<HashMap<String, (u64, AbortHandle)>>,
}

impl<P, S, U, M> SectorLoader<P, S, U, M>
where
    P: FileProvider,
    S: SectorParser,
    U: GeometryUploader,
    M: Clone,
{
    pub fn new(repository: SectorRepository<P, S, U, M>) -> Self {
        Self {
            repository,
            next_ticket: Cell::new(0),
            in_flight: RefCell::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &SectorRepository<P, S, U, M> {
        &self.repository
    }

    /// Loads `wanted` unless it is cancelled first, in which case the result is
    /// `Ok(None)`. A second load of the same key supersedes the first.
    pub async fn load(
        &self,
        wanted: &WantedSector,
    ) -> anyhow::Result<Option<ConsumedSector<U::Geometry, M>>> {
        let key = wanted.cache_key();
        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);

        let (handle, registration) = AbortHandle::new_pair();
        let superseded = self
            .in_flight
            .borrow_mut()
            .insert(key.clone(), (ticket, handle));
        if let Some((_, previous)) = superseded {
            log::debug!("Sector {} requested again, dropping the older load", key);
            previous.abort();
        }

        let result = Abortable::new(self.repository.load_sector(wanted), registration).await;

        {
            let mut in_flight = self.in_flight.borrow_mut();
            if matches!(in_flight.get(&key), Some((current, _)) if *current == ticket) {
                in_flight.remove(&key);
            }
        }

        match result {
            Ok(loaded) => loaded.map(Some),
            Err(Aborted) => {
                log::debug!("Discarded cancelled load of sector {}", key);
                Ok(None)
            }
        }
    }

    /// Aborts the in-flight load of `key`, if any.
    pub fn cancel(&self, key: &str) -> bool {
        match self.in_flight.borrow_mut().remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every in-flight load that is not in `wanted`. Returns how many
    /// loads were cancelled.
    pub fn cancel_unwanted(&self, wanted: &[WantedSector]) -> usize {
        let keep: HashSet<String> = wanted.iter().map(WantedSector::cache_key).collect();
        let mut in_flight = self.in_flight.borrow_mut();
        let before = in_flight.len();
        in_flight.retain(|key, (_, handle)| {
            let wanted = keep.contains(key);
            if !wanted {
                handle.abort();
            }
            wanted
        });
        before - in_flight.len()
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.in_flight.borrow().keys().cloned().collect()
    }
}
