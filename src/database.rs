//! In-memory destination database
//!
//! Collections live in an arena ([`CollectionStore`]) and refer to each other
//! by [`CollectionId`], so parent and child links never form reference cycles.
//! The store keeps a `ShortPath` index and is the only place hierarchy links
//! are changed.

use std::collections::HashMap;

use crate::codec::{check_array_bounds, ValueCodec};
use crate::error::{InterchangeError, Result};
use crate::schema::{Class, DatabaseKind, Field, FieldKey, SchemaRegistry};
use crate::types::TypeRegistry;
use crate::value::Value;

/// Field that receives the collection's own name on copy, when the class declares it
pub const COLLECTION_NAME_FIELD: &str = "CollectionName";

/// A data partition; one per vault directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub name: String,
    pub is_primary: bool,
}

impl Vault {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_primary: false,
        }
    }

    pub fn primary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_primary: true,
        }
    }
}

/// Stable handle of a collection inside a [`CollectionStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(usize);

/// A named record of one class, overriding some of its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub class: String,
    pub name: String,
    pub vault: String,
    pub data: HashMap<FieldKey, Value>,
    parent: Option<CollectionId>,
    children: Vec<CollectionId>,
}

impl Collection {
    pub fn new(
        class: impl Into<String>,
        name: impl Into<String>,
        vault: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            vault: vault.into(),
            data: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// `<class>/<name>`, unique within a database
    pub fn short_path(&self) -> String {
        short_path(&self.class, &self.name)
    }

    pub fn parent(&self) -> Option<CollectionId> {
        self.parent
    }

    pub fn children(&self) -> &[CollectionId] {
        &self.children
    }
}

pub fn short_path(class: &str, name: &str) -> String {
    format!("{}/{}", class, name)
}

/// Arena of collections plus the root list and path index
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    slots: Vec<Option<Collection>>,
    roots: Vec<CollectionId>,
    by_path: HashMap<String, CollectionId>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Insert a collection as a root (`parent == None`) or as the last child of `parent`
    pub fn insert(
        &mut self,
        mut collection: Collection,
        parent: Option<CollectionId>,
    ) -> Result<CollectionId> {
        let path = collection.short_path();
        if self.by_path.contains_key(&path) {
            return Err(InterchangeError::DuplicateCollectionPath(path));
        }
        if let Some(parent_id) = parent {
            let parent = self.get(parent_id)?;
            if parent.class != collection.class {
                return Err(InterchangeError::InvalidHierarchy(format!(
                    "{} cannot be a child of {}",
                    path,
                    parent.short_path()
                )));
            }
        }

        let id = CollectionId(self.slots.len());
        collection.parent = None;
        collection.children.clear();
        self.slots.push(Some(collection));
        self.by_path.insert(path, id);
        self.link(id, parent);
        Ok(id)
    }

    pub fn find(&self, id: CollectionId) -> Option<&Collection> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn find_mut(&mut self, id: CollectionId) -> Option<&mut Collection> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn get(&self, id: CollectionId) -> Result<&Collection> {
        self.find(id)
            .ok_or_else(|| InterchangeError::CollectionNotFound(format!("#{}", id.0)))
    }

    pub fn get_mut(&mut self, id: CollectionId) -> Result<&mut Collection> {
        self.find_mut(id)
            .ok_or_else(|| InterchangeError::CollectionNotFound(format!("#{}", id.0)))
    }

    pub fn find_by_path(&self, path: &str) -> Option<CollectionId> {
        self.by_path.get(path).copied()
    }

    pub fn roots(&self) -> &[CollectionId] {
        &self.roots
    }

    pub fn children(&self, id: CollectionId) -> &[CollectionId] {
        self.find(id).map(Collection::children).unwrap_or_default()
    }

    pub fn parent(&self, id: CollectionId) -> Option<CollectionId> {
        self.find(id).and_then(Collection::parent)
    }

    /// Collections of a vault, in insertion order (parents precede their children)
    pub fn in_vault<'a>(
        &'a self,
        vault: &'a str,
    ) -> impl Iterator<Item = (CollectionId, &'a Collection)> + 'a {
        self.iter().filter(move |(_, c)| c.vault == vault)
    }

    /// Every live collection in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (CollectionId, &Collection)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (CollectionId(i), c)))
    }

    /// Remove a collection and its whole subtree; returns the number removed
    pub fn remove(&mut self, id: CollectionId) -> Result<usize> {
        self.get(id)?;
        self.unlink(id);

        let mut pending = vec![id];
        let mut removed = 0;
        while let Some(next) = pending.pop() {
            if let Some(collection) = self.slots.get_mut(next.0).and_then(Option::take) {
                self.by_path.remove(&collection.short_path());
                pending.extend(collection.children);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Reparent `id` under `new_parent`, or make it a root
    pub fn move_to(&mut self, id: CollectionId, new_parent: Option<CollectionId>) -> Result<()> {
        let class = self.get(id)?.class.clone();
        if let Some(target) = new_parent {
            let parent = self.get(target)?;
            if parent.class != class {
                return Err(InterchangeError::InvalidHierarchy(format!(
                    "cannot move {} under {}: classes differ",
                    self.get(id)?.short_path(),
                    parent.short_path()
                )));
            }
            if self.is_ancestor_or_self(id, target) {
                return Err(InterchangeError::InvalidHierarchy(format!(
                    "cannot move {} under its own descendant {}",
                    self.get(id)?.short_path(),
                    parent.short_path()
                )));
            }
        }
        self.unlink(id);
        self.link(id, new_parent);
        Ok(())
    }

    /// Change a collection's name; the new path must be free
    pub fn rename(&mut self, id: CollectionId, new_name: &str) -> Result<()> {
        let old_path = self.get(id)?.short_path();
        let collection = self.get(id)?;
        let new_path = short_path(&collection.class, new_name);
        if new_path == old_path {
            return Ok(());
        }
        if self.by_path.contains_key(&new_path) {
            return Err(InterchangeError::DuplicateCollectionPath(new_path));
        }
        self.by_path.remove(&old_path);
        self.by_path.insert(new_path, id);
        self.get_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    fn is_ancestor_or_self(&self, ancestor: CollectionId, node: CollectionId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn link(&mut self, id: CollectionId, parent: Option<CollectionId>) {
        match parent.and_then(|p| self.find_mut(p)) {
            Some(parent_collection) => parent_collection.children.push(id),
            None => self.roots.push(id),
        }
        if let Some(collection) = self.find_mut(id) {
            collection.parent = parent;
        }
    }

    fn unlink(&mut self, id: CollectionId) {
        let parent = self.parent(id);
        match parent.and_then(|p| self.find_mut(p)) {
            Some(parent_collection) => parent_collection.children.retain(|&c| c != id),
            None => self.roots.retain(|&c| c != id),
        }
        if let Some(collection) = self.find_mut(id) {
            collection.parent = None;
        }
    }
}

/// Destination of a load and source of a save
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub kind: DatabaseKind,
    pub game_id: String,
    pub schema: SchemaRegistry,
    pub types: TypeRegistry,
    pub vaults: Vec<Vault>,
    pub collections: CollectionStore,
}

impl Database {
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_game_id(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = game_id.into();
        self
    }

    pub fn add_vault(&mut self, vault: Vault) -> Result<()> {
        if self.find_vault(&vault.name).is_some() {
            return Err(InterchangeError::Manifest(format!(
                "vault '{}' is declared more than once",
                vault.name
            )));
        }
        self.vaults.push(vault);
        Ok(())
    }

    pub fn find_vault(&self, name: &str) -> Option<&Vault> {
        self.vaults.iter().find(|v| v.name == name)
    }

    pub fn primary_vault(&self) -> Option<&Vault> {
        self.vaults.iter().find(|v| v.is_primary)
    }

    pub fn find_collection(&self, class: &str, name: &str) -> Option<CollectionId> {
        self.collections.find_by_path(&short_path(class, name))
    }

    fn class_of(&self, id: CollectionId) -> Result<(&Collection, &Class)> {
        let collection = self.collections.get(id)?;
        let class = self
            .schema
            .find_class(&collection.class)
            .ok_or_else(|| InterchangeError::UndefinedClass {
                collection: collection.short_path(),
                class: collection.class.clone(),
            })?;
        Ok((collection, class))
    }

    fn field_of(&self, id: CollectionId, field: &str) -> Result<(&Collection, &Field)> {
        let (collection, class) = self.class_of(id)?;
        let field = class.field(field).ok_or_else(|| InterchangeError::UnknownField {
            class: class.name.clone(),
            field: field.to_string(),
        })?;
        Ok((collection, field))
    }

    pub fn get_value(&self, id: CollectionId, field: &str) -> Result<Option<&Value>> {
        let (collection, field) = self.field_of(id, field)?;
        Ok(collection.data.get(&field.key))
    }

    /// Set a field override. Array values must respect the field's bounds, and
    /// read-only struct properties are reset to their defaults.
    pub fn set_value(&mut self, id: CollectionId, field: &str, mut value: Value) -> Result<()> {
        let (collection, field) = self.field_of(id, field)?;
        if field.is_array() {
            let array = value.as_array().ok_or_else(|| InterchangeError::UnexpectedShape {
                collection: collection.short_path(),
                field: field.name.clone(),
                expected: "array value",
            })?;
            check_array_bounds(field, &collection.short_path(), array.capacity, array.items.len())?;
        }
        let key = field.key;
        value.clear_read_only();
        self.collections.get_mut(id)?.data.insert(key, value);
        Ok(())
    }

    pub fn remove_value(&mut self, id: CollectionId, field: &str) -> Result<Option<Value>> {
        let key = self.field_of(id, field)?.1.key;
        Ok(self.collections.get_mut(id)?.data.remove(&key))
    }

    /// Add a default-valued override for `field`; arrays get `capacity` default items.
    /// Base (in-layout) fields always exist on a collection and cannot be added.
    pub fn add_field(&mut self, id: CollectionId, field: &str, capacity: u16) -> Result<()> {
        let (collection, field) = self.field_of(id, field)?;
        if field.flags.is_in_layout() {
            return Err(InterchangeError::BaseField {
                collection: collection.short_path(),
                field: field.name.clone(),
            });
        }
        if collection.data.contains_key(&field.key) {
            return Err(InterchangeError::FieldAlreadyPresent {
                collection: collection.short_path(),
                field: field.name.clone(),
            });
        }
        if field.is_array() {
            check_array_bounds(field, &collection.short_path(), capacity, usize::from(capacity))?;
        }
        let value = ValueCodec::new(&self.types).default_value(field, capacity);
        let key = field.key;
        self.collections.get_mut(id)?.data.insert(key, value);
        Ok(())
    }

    /// Clone `source`'s data into a new collection named `new_name`
    pub fn copy_collection(
        &mut self,
        source: CollectionId,
        new_name: &str,
        parent: Option<CollectionId>,
    ) -> Result<CollectionId> {
        let (original, class) = self.class_of(source)?;
        let mut copy = Collection::new(&original.class, new_name, &original.vault);
        copy.data = original.data.clone();
        if let Some(field) = class.field(COLLECTION_NAME_FIELD) {
            copy.data.insert(field.key, Value::Text(new_name.to_string()));
        }
        self.collections.insert(copy, parent)
    }

    pub fn remove_collection(&mut self, id: CollectionId) -> Result<usize> {
        self.collections.remove(id)
    }

    pub fn move_collection(
        &mut self,
        id: CollectionId,
        new_parent: Option<CollectionId>,
    ) -> Result<()> {
        self.collections.move_to(id, new_parent)
    }

    pub fn rename_collection(&mut self, id: CollectionId, new_name: &str) -> Result<()> {
        self.collections.rename(id, new_name)?;
        let key = self
            .class_of(id)?
            .1
            .field(COLLECTION_NAME_FIELD)
            .map(|field| field.key);
        if let Some(key) = key {
            let collection = self.collections.get_mut(id)?;
            if collection.data.contains_key(&key) {
                collection.data.insert(key, Value::Text(new_name.to_string()));
            }
        }
        Ok(())
    }
}
