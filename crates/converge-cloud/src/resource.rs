//! Generic resource collections
//!
//! Disks, network devices and firewall rules are all handled as sets of
//! immutable values keyed by a device-scoped identity. Two members with the
//! same identity but different attributes are *not* the same value: the
//! reconciler turns such a change into remove-old + add-new.

use crate::error::{CloudError, Result};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

/// A value that can live in a [`ResourceCollection`]
pub trait Resource: Clone + PartialEq + Debug + Display + Send + Sync + 'static {
    /// Identity of the slot the resource occupies (device name, ...)
    type Id: Ord + Clone + Debug + Display + Send + Sync;

    fn id(&self) -> Self::Id;
}

/// Set of resources of one kind, unique by identity, order irrelevant.
///
/// Iteration follows identity order so that logs and plans are stable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection<R: Resource> {
    members: BTreeMap<R::Id, R>,
}

impl<R: Resource> Default for ResourceCollection<R> {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }
}

impl<R: Resource> ResourceCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, rejecting duplicated identities
    pub fn try_from_iter(iter: impl IntoIterator<Item = R>) -> Result<Self> {
        let mut collection = Self::new();
        for resource in iter {
            collection.insert(resource)?;
        }
        Ok(collection)
    }

    /// Add a member. Fails if another member already holds the same identity.
    pub fn insert(&mut self, resource: R) -> Result<()> {
        let id = resource.id();
        if self.members.contains_key(&id) {
            return Err(CloudError::DuplicateResource(id.to_string()));
        }
        self.members.insert(id, resource);
        Ok(())
    }

    pub fn remove(&mut self, id: &R::Id) -> Option<R> {
        self.members.remove(id)
    }

    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.members.get(id)
    }

    /// `true` if an equal member (by full value) is present
    pub fn contains(&self, resource: &R) -> bool {
        self.members.get(&resource.id()) == Some(resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members of `self` absent from `other`, compared by full equality
    pub fn delta(&self, other: &Self) -> Self {
        Self {
            members: self
                .members
                .iter()
                .filter(|(_, r)| !other.contains(r))
                .map(|(id, r)| (id.clone(), r.clone()))
                .collect(),
        }
    }
}

impl<R: Resource> IntoIterator for ResourceCollection<R> {
    type Item = R;
    type IntoIter = std::collections::btree_map::IntoValues<R::Id, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_values()
    }
}

impl<'a, R: Resource> IntoIterator for &'a ResourceCollection<R> {
    type Item = &'a R;
    type IntoIter = std::collections::btree_map::Values<'a, R::Id, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.values()
    }
}

impl<R: Resource> Display for ResourceCollection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, r) in self.members.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, "]")
    }
}
