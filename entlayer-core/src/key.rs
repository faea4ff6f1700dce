//! Entity keys.
//!
//! A [`Key`] identifies an entity by a path of `(kind, id)` elements inside a
//! [`PartitionId`]. Every element but the last names an ancestor; the last
//! element names the entity itself. A key whose last element has no id is
//! *incomplete*: the datastore allocates the id when the entity is inserted.

use std::fmt;

/// The identifier of one path element: a datastore-allocated integer or a
/// caller-chosen name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyId {
    /// Numeric id, usually allocated by the datastore.
    Id(i64),
    /// String name chosen by the application.
    Name(String),
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// The project and namespace an entity lives in.
///
/// The default partition has an empty project id and no namespace; stores
/// replace it with their configured partition before committing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartitionId {
    /// The project owning the entity.
    pub project_id: String,
    /// Optional namespace within the project.
    pub namespace_id: Option<String>,
}

impl PartitionId {
    /// Creates a partition for the given project and optional namespace.
    pub fn new(project_id: impl Into<String>, namespace_id: Option<String>) -> Self {
        Self {
            project_id: project_id.into(),
            namespace_id,
        }
    }

    /// Returns `true` if no project has been assigned yet.
    pub fn is_unset(&self) -> bool {
        self.project_id.is_empty() && self.namespace_id.is_none()
    }
}

/// One `(kind, id)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathElement {
    /// The entity kind.
    pub kind: String,
    /// The id, or `None` while the key is incomplete.
    pub id: Option<KeyId>,
}

impl PathElement {
    /// Creates a path element.
    pub fn new(kind: impl Into<String>, id: Option<KeyId>) -> Self {
        Self { kind: kind.into(), id }
    }
}

/// A datastore key: a partition plus a non-empty ancestor path.
///
/// # Example
///
/// ```ignore
/// use entlayer::key::{Key, KeyId};
///
/// let owner = Key::new("Person", Some(KeyId::Id(7)));
/// let pet = Key::with_parent(&owner, "Pet", Some("rex".into()));
///
/// assert_eq!(pet.kind(), "Pet");
/// assert_eq!(pet.parent(), Some(owner));
/// assert_eq!(pet.to_string(), "Person(7)/Pet(\"rex\")");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    partition: PartitionId,
    path: Vec<PathElement>,
}

impl Key {
    /// Creates a root key in the default partition.
    pub fn new(kind: impl Into<String>, id: Option<KeyId>) -> Self {
        Self {
            partition: PartitionId::default(),
            path: vec![PathElement::new(kind, id)],
        }
    }

    /// Creates a key below `parent`, inheriting its partition.
    pub fn with_parent(parent: &Key, kind: impl Into<String>, id: Option<KeyId>) -> Self {
        let mut path = parent.path.clone();
        path.push(PathElement::new(kind, id));

        Self {
            partition: parent.partition.clone(),
            path,
        }
    }

    /// Builds a key from an explicit partition and path.
    ///
    /// Returns `None` if `path` is empty.
    pub fn from_path(partition: PartitionId, path: Vec<PathElement>) -> Option<Self> {
        if path.is_empty() {
            return None;
        }

        Some(Self { partition, path })
    }

    /// The partition this key lives in.
    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// The path from the root ancestor down to this key.
    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    fn last(&self) -> &PathElement {
        // `path` is non-empty by construction.
        &self.path[self.path.len() - 1]
    }

    /// The kind of the entity this key names.
    pub fn kind(&self) -> &str {
        &self.last().kind
    }

    /// The id of the entity this key names, if allocated.
    pub fn id(&self) -> Option<&KeyId> {
        self.last().id.as_ref()
    }

    /// Returns the key of the immediate ancestor, if any.
    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }

        Some(Self {
            partition: self.partition.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// Returns `true` once every path element carries an id.
    pub fn is_complete(&self) -> bool {
        self.path.iter().all(|element| element.id.is_some())
    }

    /// Returns `true` if `ancestor` is this key or one of its ancestors.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.partition == ancestor.partition
            && ancestor.path.len() <= self.path.len()
            && self.path[..ancestor.path.len()] == ancestor.path[..]
    }

    /// Returns a copy of this key whose last element carries `id`.
    pub fn completed(&self, id: KeyId) -> Key {
        let mut key = self.clone();
        let last = key.path.len() - 1;
        key.path[last].id = Some(id);
        key
    }

    /// Moves this key into `partition`.
    pub fn in_partition(mut self, partition: PartitionId) -> Key {
        self.partition = partition;
        self
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, element) in self.path.iter().enumerate() {
            if index > 0 {
                f.write_str("/")?;
            }
            match &element.id {
                Some(id) => write!(f, "{}({})", element.kind, id)?,
                None => write!(f, "{}(?)", element.kind)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_keys_keep_the_ancestor_path() {
        let owner = Key::new("Person", Some(KeyId::Id(7))).in_partition(PartitionId::new("demo", None));
        let pet = Key::with_parent(&owner, "Pet", Some("rex".into()));

        assert_eq!(pet.kind(), "Pet");
        assert_eq!(pet.id(), Some(&KeyId::Name("rex".to_string())));
        assert_eq!(pet.parent(), Some(owner.clone()));
        assert_eq!(pet.partition().project_id, "demo");
        assert!(pet.has_ancestor(&owner));
        assert!(!owner.has_ancestor(&pet));
        assert_eq!(pet.to_string(), "Person(7)/Pet(\"rex\")");
    }

    #[test]
    fn incomplete_keys_complete_in_place() {
        let key = Key::new("Person", None);
        assert!(!key.is_complete());
        assert_eq!(key.to_string(), "Person(?)");

        let done = key.completed(KeyId::Id(42));
        assert!(done.is_complete());
        assert_eq!(done.id(), Some(&KeyId::Id(42)));
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert!(Key::from_path(PartitionId::default(), vec![]).is_none());
    }
}
