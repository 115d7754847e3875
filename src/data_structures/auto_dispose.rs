//! Reference-counted ownership of a group's GPU geometries.
//!
//! Several consumers (the consumed-sector cache, render targets, picking) may
//! hold the same sector group. Each holder calls [`AutoDisposeGroup::reference`]
//! when it starts using the group and [`AutoDisposeGroup::dereference`] when it
//! stops. The geometries of the direct-child meshes are disposed exactly once,
//! when the count drops to zero. Nested groups are left alone: their lifetime
//! belongs to whoever else holds them.
//!
//! Holders that should not count by hand use [`GroupRef`], which references on
//! creation and dereferences on drop. A hand-off between two holders is
//! `let next = current.try_clone()?; drop(current);`, which always references
//! before it dereferences.
//!
//! Everything here is single-threaded (`Rc`), matching the render loop.

use std::{cell::RefCell, fmt, ops::Deref, rc::Rc};

use crate::{
    data_structures::{
        geometry::Geometry,
        scene_graph::{MeshNode, SceneNode},
    },
    error::SectorError,
};

struct GroupState<G: Geometry, M> {
    name: String,
    children: Vec<SceneNode<G, M>>,
    reference_count: usize,
    disposed: bool,
}

impl<G: Geometry, M> GroupState<G, M> {
    fn already_disposed(&self) -> SectorError {
        SectorError::AlreadyDisposed {
            group: self.name.clone(),
        }
    }

    fn dispose(&mut self) {
        let mut meshes = 0;
        for child in self.children.drain(..) {
            if let SceneNode::Mesh(mut mesh) = child {
                mesh.geometry.dispose();
                meshes += 1;
            }
        }
        self.disposed = true;
        log::debug!("Disposed {} mesh geometries of group '{}'", meshes, self.name);
    }
}

impl<G: Geometry, M> Drop for GroupState<G, M> {
    fn drop(&mut self) {
        if !self.disposed && self.reference_count > 0 {
            log::warn!(
                "Group '{}' dropped with {} outstanding references; its geometries were never disposed",
                self.name,
                self.reference_count
            );
        }
    }
}

/// Shared handle to a group of meshes whose geometries are disposed when the
/// last holder dereferences it.
///
/// Cloning the handle does not take a reference.
pub struct AutoDisposeGroup<G: Geometry, M> {
    inner: Rc<RefCell<GroupState<G, M>>>,
}

impl<G: Geometry, M> AutoDisposeGroup<G, M> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(GroupState {
                name: name.into(),
                children: Vec::new(),
                reference_count: 0,
                disposed: false,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Attaches a mesh (disposed with this group) or a nested group (not disposed).
    pub fn add(&self, child: impl Into<SceneNode<G, M>>) -> Result<(), SectorError> {
        let child = child.into();
        if let SceneNode::Group(group) = &child {
            if group.ptr_eq(self) || group.contains_group(self) {
                return Err(SectorError::MalformedSector(format!(
                    "adding group '{}' to '{}' would create a cycle",
                    group.name(),
                    self.name()
                )));
            }
        }
        let mut state = self.inner.borrow_mut();
        if state.disposed {
            return Err(state.already_disposed());
        }
        state.children.push(child);
        Ok(())
    }

    pub fn add_mesh(&self, mesh: MeshNode<G, M>) -> Result<(), SectorError> {
        self.add(mesh)
    }

    /// Registers one more holder.
    pub fn reference(&self) -> Result<(), SectorError> {
        let mut state = self.inner.borrow_mut();
        if state.disposed {
            return Err(state.already_disposed());
        }
        state.reference_count += 1;
        Ok(())
    }

    /// Releases one holder. The last release disposes the geometries of all
    /// direct-child meshes and leaves the group empty and disposed.
    ///
    /// Fails when there is nothing to release or the group is already disposed;
    /// both mean some holder was counted wrong.
    pub fn dereference(&self) -> Result<(), SectorError> {
        let mut state = self.inner.borrow_mut();
        if state.disposed {
            return Err(state.already_disposed());
        }
        if state.reference_count == 0 {
            return Err(SectorError::DereferenceWithoutReference {
                group: state.name.clone(),
            });
        }
        state.reference_count -= 1;
        if state.reference_count == 0 {
            state.dispose();
        }
        Ok(())
    }

    /// References the group and returns a holder that dereferences on drop.
    pub fn acquire(&self) -> Result<GroupRef<G, M>, SectorError> {
        self.reference()?;
        Ok(GroupRef {
            group: self.clone(),
        })
    }

    pub fn reference_count(&self) -> usize {
        self.inner.borrow().reference_count
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Number of direct-child meshes.
    pub fn mesh_count(&self) -> usize {
        self.inner
            .borrow()
            .children
            .iter()
            .filter(|child| matches!(child, SceneNode::Mesh(_)))
            .count()
    }

    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    /// Visits every mesh, including those of nested groups.
    pub fn for_each_mesh(&self, f: &mut dyn FnMut(&MeshNode<G, M>)) {
        let state = self.inner.borrow();
        for child in &state.children {
            match child {
                SceneNode::Mesh(mesh) => f(mesh),
                SceneNode::Group(group) => group.for_each_mesh(f),
            }
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `other` is nested anywhere below this group.
    pub fn contains_group(&self, other: &Self) -> bool {
        self.inner.borrow().children.iter().any(|child| match child {
            SceneNode::Group(group) => group.ptr_eq(other) || group.contains_group(other),
            SceneNode::Mesh(_) => false,
        })
    }
}

impl<G: Geometry, M> Clone for AutoDisposeGroup<G, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<G: Geometry, M> fmt::Debug for AutoDisposeGroup<G, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("AutoDisposeGroup")
            .field("name", &state.name)
            .field("children", &state.children.len())
            .field("reference_count", &state.reference_count)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// One counted holder of a group. Dropping it dereferences the group.
pub struct GroupRef<G: Geometry, M> {
    group: AutoDisposeGroup<G, M>,
}

impl<G: Geometry, M> GroupRef<G, M> {
    /// A second holder of the same group, referenced before it is returned.
    pub fn try_clone(&self) -> Result<Self, SectorError> {
        self.group.acquire()
    }

    pub fn group(&self) -> &AutoDisposeGroup<G, M> {
        &self.group
    }
}

impl<G: Geometry, M> Deref for GroupRef<G, M> {
    type Target = AutoDisposeGroup<G, M>;

    fn deref(&self) -> &Self::Target {
        &self.group
    }
}

impl<G: Geometry, M> Drop for GroupRef<G, M> {
    /// Panics if the group was released behind this holder's back, unless the
    /// thread is already unwinding.
    fn drop(&mut self) {
        if let Err(err) = self.group.dereference() {
            log::error!("Releasing a group holder failed: {}", err);
            if !std::thread::panicking() {
                panic!("group holder released a group it no longer held: {err}");
            }
        }
    }
}

impl<G: Geometry, M> fmt::Debug for GroupRef<G, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GroupRef").field(&self.group).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::{
        collection::GeometryCollectionType, geometry::testing::CountingGeometry,
    };

    type Group = AutoDisposeGroup<CountingGeometry, &'static str>;

    fn mesh(name: &str) -> (MeshNode<CountingGeometry, &'static str>, std::rc::Rc<std::cell::Cell<u32>>) {
        let (geometry, disposals) = CountingGeometry::new();
        (
            MeshNode::new(name, GeometryCollectionType::BoxCollection, geometry, "box"),
            disposals,
        )
    }

    #[test]
    fn reference_then_dereference_disposes_once() {
        let group = Group::new("sector-1");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();

        group.reference().unwrap();
        assert_eq!(disposals.get(), 0);
        group.dereference().unwrap();

        assert_eq!(disposals.get(), 1);
        assert!(group.is_disposed());
        assert_eq!(group.child_count(), 0);
    }

    #[test]
    fn disposal_waits_for_the_last_holder() {
        let group = Group::new("sector-2");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();

        group.reference().unwrap();
        group.reference().unwrap();
        group.dereference().unwrap();
        assert_eq!(disposals.get(), 0);
        assert!(!group.is_disposed());
        assert_eq!(group.mesh_count(), 1);

        group.dereference().unwrap();
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    fn every_direct_mesh_is_disposed() {
        let group = Group::new("sector-3");
        let counters: Vec<_> = (0..4)
            .map(|i| {
                let (m, disposals) = mesh(&format!("m{i}"));
                group.add_mesh(m).unwrap();
                disposals
            })
            .collect();
        group.reference().unwrap();
        group.dereference().unwrap();
        assert!(counters.iter().all(|d| d.get() == 1));
    }

    #[test]
    fn dereference_without_reference_fails() {
        let group = Group::new("sector-4");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();

        assert_eq!(
            group.dereference(),
            Err(SectorError::DereferenceWithoutReference {
                group: "sector-4".to_string()
            })
        );
        assert_eq!(disposals.get(), 0);
        assert!(!group.is_disposed());
    }

    #[test]
    fn dereference_after_disposal_fails() {
        let group = Group::new("sector-5");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();
        group.reference().unwrap();
        group.dereference().unwrap();

        assert_eq!(
            group.dereference(),
            Err(SectorError::AlreadyDisposed {
                group: "sector-5".to_string()
            })
        );
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    fn disposed_group_rejects_new_holders_and_children() {
        let group = Group::new("sector-6");
        group.reference().unwrap();
        group.dereference().unwrap();

        assert!(group.reference().is_err());
        assert!(group.acquire().is_err());
        let (m, _) = mesh("late");
        assert!(group.add_mesh(m).is_err());
    }

    #[test]
    fn nested_group_meshes_are_not_disposed() {
        let outer = Group::new("outer");
        let inner = Group::new("inner");
        let (nested, nested_disposals) = mesh("nested");
        inner.add_mesh(nested).unwrap();
        let (direct, direct_disposals) = mesh("direct");
        outer.add_mesh(direct).unwrap();
        outer.add(inner.clone()).unwrap();

        outer.reference().unwrap();
        outer.dereference().unwrap();

        assert_eq!(direct_disposals.get(), 1);
        assert_eq!(nested_disposals.get(), 0);
        assert!(!inner.is_disposed());
        assert_eq!(inner.mesh_count(), 1);
    }

    #[test]
    fn group_cannot_contain_itself() {
        let group = Group::new("loop");
        assert!(group.add(group.clone()).is_err());
    }

    #[test]
    fn indirect_cycles_are_rejected() {
        let a = Group::new("a");
        let b = Group::new("b");
        let c = Group::new("c");
        a.add(b.clone()).unwrap();
        b.add(c.clone()).unwrap();

        assert!(matches!(b.add(a.clone()), Err(SectorError::MalformedSector(_))));
        assert!(matches!(c.add(a.clone()), Err(SectorError::MalformedSector(_))));
        assert_eq!(b.child_count(), 1);
        assert_eq!(c.child_count(), 0);
        assert!(a.contains_group(&c));
        assert!(!c.contains_group(&a));

        // the same group twice in different branches is not a cycle
        let d = Group::new("d");
        d.add(c.clone()).unwrap();
        a.add(d).unwrap();
        let mut visited = 0;
        a.for_each_mesh(&mut |_| visited += 1);
        assert_eq!(visited, 0);
    }

    #[test]
    fn for_each_mesh_visits_nested_groups() {
        let outer = Group::new("outer");
        let inner = Group::new("inner");
        inner.add_mesh(mesh("b").0).unwrap();
        outer.add_mesh(mesh("a").0).unwrap();
        outer.add(inner).unwrap();

        let mut names = Vec::new();
        outer.for_each_mesh(&mut |m| names.push(m.name.clone()));
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn group_ref_releases_on_drop() {
        let group = Group::new("guarded");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();

        let holder = group.acquire().unwrap();
        assert_eq!(group.reference_count(), 1);
        drop(holder);

        assert_eq!(disposals.get(), 1);
        assert!(group.is_disposed());
    }

    #[test]
    fn hand_off_never_reaches_zero() {
        let group = Group::new("handed-off");
        let (m, disposals) = mesh("a");
        group.add_mesh(m).unwrap();

        let old_holder = group.acquire().unwrap();
        let new_holder = old_holder.try_clone().unwrap();
        assert_eq!(group.reference_count(), 2);
        drop(old_holder);
        assert_eq!(disposals.get(), 0);
        assert_eq!(new_holder.reference_count(), 1);

        drop(new_holder);
        assert_eq!(disposals.get(), 1);
    }

    #[test]
    #[should_panic(expected = "no longer held")]
    fn holder_of_an_over_released_group_panics() {
        let group = Group::new("over-released");
        let (m, _) = mesh("a");
        group.add_mesh(m).unwrap();

        let holder = group.acquire().unwrap();
        group.dereference().unwrap();
        drop(holder);
    }

    #[test]
    fn failed_release_while_unwinding_does_not_abort() {
        let group = Group::new("unwinding");
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _holder = group.acquire().unwrap();
            group.dereference().unwrap();
            panic!("render loop failed");
        }));
        let message = outcome.unwrap_err();
        assert_eq!(message.downcast_ref::<&str>(), Some(&"render loop failed"));
        assert!(group.is_disposed());
    }
}
