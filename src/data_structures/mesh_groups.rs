//! Grouping of flat per-primitive id arrays into runs of original indices.
//!
//! Decoded sectors store one id (file id, triangle offset, ...) per primitive.
//! [`group_meshes_by_number`] clusters those ids so every logical object can
//! be batched into a single draw without allocating per primitive.

use std::{iter::FusedIterator, ops::Range};

/// All primitives sharing `id`, by their position in the input array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshGroup<T> {
    pub id: T,
    pub mesh_indices: Vec<usize>,
}

/// Lazy iterator over [`MeshGroup`]s in ascending id order.
///
/// The iterator is not restartable; collect it if the groups are needed twice.
#[derive(Debug, Clone)]
pub struct MeshGroups<T> {
    sorted: Vec<(T, usize)>,
    cursor: usize,
}

/// Groups `ids` by value. Every index of `ids` appears in exactly one group and
/// the indices of a group are ascending.
pub fn group_meshes_by_number<T: Copy + Ord>(ids: &[T]) -> MeshGroups<T> {
    let mut sorted: Vec<(T, usize)> = ids.iter().copied().zip(0..).collect();
    // stable, so equal ids keep ascending original indices
    sorted.sort_by_key(|&(id, _)| id);
    MeshGroups { sorted, cursor: 0 }
}

impl<T: Copy + Ord> Iterator for MeshGroups<T> {
    type Item = MeshGroup<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.sorted[self.cursor..];
        let &(id, _) = rest.first()?;
        let run = run_length(rest, id);
        let mesh_indices = rest[..run].iter().map(|&(_, index)| index).collect();
        self.cursor += run;
        Some(MeshGroup { id, mesh_indices })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sorted.len() - self.cursor;
        (remaining.min(1), Some(remaining))
    }
}

impl<T: Copy + Ord> FusedIterator for MeshGroups<T> {}

/// Length of the leading run of `id` in `sorted`, which must start with `id`.
///
/// Gallops over doubling strides until the run is overshot, then binary
/// searches the last stride, so a run of length `k` costs `O(log k)`.
fn run_length<T: Ord>(sorted: &[(T, usize)], id: T) -> usize {
    let mut hi = 1;
    while hi < sorted.len() && sorted[hi].0 == id {
        hi *= 2;
    }
    // sorted[hi / 2] still belongs to the run
    let lo = hi / 2;
    let hi = hi.min(sorted.len());
    lo + sorted[lo..hi].partition_point(|(value, _)| *value == id)
}

/// Exclusive prefix sums of `counts`: where each mesh starts in a packed buffer.
/// `None` if the total does not fit in a `u64`.
pub fn create_offsets_array(counts: &[u64]) -> Option<Vec<u64>> {
    let mut offset = 0u64;
    counts
        .iter()
        .map(|&count| {
            let start = offset;
            offset = offset.checked_add(count)?;
            Some(start)
        })
        .collect()
}

/// Index-buffer range of triangles `offset..offset + count`, or `None` if it
/// does not fit in `usize`.
pub fn triangle_index_range(offset: u64, count: u64) -> Option<Range<usize>> {
    let start = offset.checked_mul(3)?;
    let end = offset.checked_add(count)?.checked_mul(3)?;
    Some(usize::try_from(start).ok()?..usize::try_from(end).ok()?)
}
