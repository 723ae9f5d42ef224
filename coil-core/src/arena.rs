//! The struct arena and the [`Tree`] that walks it.
//!
//! Structs are allocated once and never moved: a [`StructId`] is a stable
//! index for the lifetime of the tree, both in the Prototype stage (where
//! `@extends`/`@file`/`@package` are still unresolved) and after expansion
//! has converted it to the Final stage in place. This sidesteps the
//! `Rc<RefCell<_>>` parent-cycle problem a struct's own `container` link
//! would otherwise create: a value can point at the struct that holds it
//! without either of them owning the other.
//!
//! A struct's entries are split into `primary` (written literally in this
//! struct's own body) and `secondary` (inherited via `@extends`/`@file`/
//! `@package`), mirroring the reference parser's `StructPrototype`. The
//! split survives past expansion — it costs nothing to keep and `keys()`
//! already presents the two as one ordered sequence — rather than
//! converting to a second, simpler struct representation.

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};

use crate::error::{CoilError, Result};
use crate::location::Location;
use crate::path;
use crate::value::Value;

/// An index into a [`Tree`]'s arena. Only meaningful paired with the `Tree`
/// that produced it.
pub type StructId = usize;

pub(crate) struct StructData {
    container: Option<StructId>,
    name: String,
    location: Location,
    primary_values: HashMap<String, Value>,
    primary_order: Vec<String>,
    secondary_values: HashMap<String, Value>,
    secondary_order: Vec<String>,
    /// Keys removed by `~key` in this struct's own body. Consulted so a
    /// later `@extends`/`@file` in the same body doesn't resurrect them.
    deleted: HashSet<String>,
    /// The raw `@map` template list, present from parse time until the
    /// expander consumes it and replaces this struct's siblings.
    map_list: Option<Vec<Value>>,
}

pub(crate) struct Arena {
    nodes: Vec<RefCell<StructData>>,
}

impl Arena {
    fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    fn alloc(&mut self, container: Option<StructId>, name: String, location: Location) -> StructId {
        let id = self.nodes.len();
        self.nodes.push(RefCell::new(StructData {
            container,
            name,
            location,
            primary_values: HashMap::new(),
            primary_order: Vec::new(),
            secondary_values: HashMap::new(),
            secondary_order: Vec::new(),
            deleted: HashSet::new(),
            map_list: None,
        }));
        id
    }

    fn data(&self, id: StructId) -> Ref<'_, StructData> {
        self.nodes[id].borrow()
    }
}

/// A coil document: an arena of structs plus the id of its root.
///
/// `root`'s `container` is always `None`; every other struct's container
/// chain terminates at it. A `Tree` is self-contained — it owns every struct
/// reachable from its root, including ones copied in from other documents by
/// `@file`/`@package`.
pub struct Tree {
    pub(crate) arena: Arena,
    pub(crate) root: StructId,
}

impl Tree {
    /// Creates a tree containing only an empty root struct.
    pub(crate) fn new(location: Location) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(None, String::new(), location);
        Tree { arena, root }
    }

    pub fn root(&self) -> StructId {
        self.root
    }

    pub(crate) fn container(&self, id: StructId) -> Option<StructId> {
        self.arena.data(id).container
    }

    pub fn name(&self, id: StructId) -> String {
        self.arena.data(id).name.clone()
    }

    pub fn location(&self, id: StructId) -> Location {
        self.arena.data(id).location.clone()
    }

    pub(crate) fn set_location(&self, id: StructId, location: Location) {
        self.arena.nodes[id].borrow_mut().location = location;
    }

    /// Keys in iteration order: inherited (secondary) keys in the order
    /// they were merged in, then primary keys in the order written. A
    /// primary key that overrides an already-inherited one keeps its
    /// inherited position and is skipped from the primary list (see
    /// [`Self::set_primary`]).
    pub fn keys(&self, id: StructId) -> Vec<String> {
        let data = self.arena.data(id);
        data.secondary_order
            .iter()
            .chain(data.primary_order.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self, id: StructId) -> usize {
        let data = self.arena.data(id);
        data.primary_values.len() + data.secondary_values.len()
    }

    pub fn is_empty(&self, id: StructId) -> bool {
        self.len(id) == 0
    }

    pub fn contains_key(&self, id: StructId, key: &str) -> bool {
        let data = self.arena.data(id);
        data.primary_values.contains_key(key) || data.secondary_values.contains_key(key)
    }

    pub(crate) fn is_deleted(&self, id: StructId, key: &str) -> bool {
        self.arena.data(id).deleted.contains(key)
    }

    /// Raw, non-recursive lookup of a single key on this struct. Primary
    /// shadows secondary.
    pub fn get(&self, id: StructId, key: &str) -> Option<Value> {
        let data = self.arena.data(id);
        data.primary_values
            .get(key)
            .or_else(|| data.secondary_values.get(key))
            .cloned()
    }

    fn adopt(&mut self, value: &Value, container: StructId, key: &str) {
        if let Value::Struct(child) = value {
            let mut data = self.arena.nodes[*child].borrow_mut();
            data.container = Some(container);
            data.name = key.to_owned();
        }
    }

    /// Sets `key` as a primary (literally-written) entry, validating that it
    /// has not already been set or deleted primary-side in this struct's
    /// body (unless `permissive`). Used by the parser for plain attribute
    /// assignment.
    pub(crate) fn set_primary(
        &mut self,
        id: StructId,
        key: impl Into<String>,
        value: Value,
        location: &Location,
        permissive: bool,
    ) -> Result<()> {
        let key = key.into();
        if !permissive {
            let data = self.arena.data(id);
            let clash = data.deleted.contains(&key) || data.primary_values.contains_key(&key);
            drop(data);
            if clash {
                return Err(CoilError::data(
                    location.clone(),
                    self.path_string(id),
                    format!("'{key}' set or deleted twice in the same struct"),
                ));
            }
        }
        self.adopt(&value, id, &key);
        let mut data = self.arena.nodes[id].borrow_mut();
        let promoted = data.secondary_values.remove(&key).is_some();
        data.primary_values.insert(key.clone(), value);
        if !promoted && !data.primary_order.contains(&key) {
            data.primary_order.push(key);
        }
        Ok(())
    }

    /// Deletes `key` (primary or secondary), recording it as deleted so a
    /// later inheriting directive in the same body can't bring it back.
    pub(crate) fn delete_key(
        &mut self,
        id: StructId,
        key: &str,
        location: &Location,
        permissive: bool,
    ) -> Result<Value> {
        let mut data = self.arena.nodes[id].borrow_mut();
        if !permissive && data.deleted.contains(key) {
            drop(data);
            return Err(CoilError::data(
                location.clone(),
                self.path_string(id),
                format!("'{key}' set or deleted twice in the same struct"),
            ));
        }
        let removed = if let Some(value) = data.primary_values.remove(key) {
            data.primary_order.retain(|k| k != key);
            data.secondary_order.retain(|k| k != key);
            Some(value)
        } else if let Some(value) = data.secondary_values.remove(key) {
            data.secondary_order.retain(|k| k != key);
            Some(value)
        } else {
            None
        };
        match removed {
            Some(value) => {
                data.deleted.insert(key.to_owned());
                Ok(value)
            }
            None => {
                drop(data);
                Err(CoilError::key_missing(location.clone(), key))
            }
        }
    }

    /// Merges one inherited entry in (from `@extends`/`@file`/`@package`).
    /// The caller is responsible for skipping keys that are already present
    /// or deleted (matching the reference behaviour of silently preferring
    /// whatever this struct already has).
    pub(crate) fn set_secondary(&mut self, id: StructId, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.adopt(&value, id, &key);
        let mut data = self.arena.nodes[id].borrow_mut();
        data.secondary_values.insert(key.clone(), value);
        data.secondary_order.push(key);
    }

    /// Overwrites an existing entry's value in place without touching
    /// ordering or double-set bookkeeping. Used by the expander, which only
    /// ever replaces values that are already there (or, for `@map`-created
    /// siblings, adds a brand new primary-shaped entry).
    pub(crate) fn overwrite(&mut self, id: StructId, key: &str, value: Value) {
        self.adopt(&value, id, key);
        let mut data = self.arena.nodes[id].borrow_mut();
        if data.primary_values.contains_key(key) {
            data.primary_values.insert(key.to_owned(), value);
        } else if data.secondary_values.contains_key(key) {
            data.secondary_values.insert(key.to_owned(), value);
        } else {
            data.primary_values.insert(key.to_owned(), value);
            data.primary_order.push(key.to_owned());
        }
    }

    pub(crate) fn map_list(&self, id: StructId) -> Option<Vec<Value>> {
        self.arena.data(id).map_list.clone()
    }

    pub(crate) fn set_map_list(&self, id: StructId, list: Option<Vec<Value>>) {
        self.arena.nodes[id].borrow_mut().map_list = list;
    }

    /// Allocates a new, empty struct as a primary child of `container` under
    /// `key`.
    pub(crate) fn new_child(&mut self, container: StructId, key: &str, location: Location) -> StructId {
        let id = self.arena.alloc(Some(container), key.to_owned(), location);
        let mut data = self.arena.nodes[container].borrow_mut();
        data.primary_values
            .insert(key.to_owned(), Value::Struct(id));
        if !data.primary_order.contains(&key.to_owned()) {
            data.primary_order.push(key.to_owned());
        }
        id
    }

    /// Allocates a standalone struct (no container yet); used when copying a
    /// struct wholesale from another tree before it is attached anywhere.
    pub(crate) fn new_detached(&mut self, name: String, location: Location) -> StructId {
        self.arena.alloc(None, name, location)
    }

    pub(crate) fn set_container(&mut self, id: StructId, container: StructId, name: String) {
        let mut data = self.arena.nodes[id].borrow_mut();
        data.container = Some(container);
        data.name = name;
    }

    /// The absolute path segments of `id`, from the root.
    pub fn absolute_segments(&self, id: StructId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.container(cur) {
            segments.push(self.name(cur));
            cur = parent;
        }
        segments.reverse();
        segments
    }

    /// The `@root.a.b` textual form of `id`'s location in the tree, for
    /// diagnostics.
    pub fn path_string(&self, id: StructId) -> String {
        path::absolute_string(&self.absolute_segments(id))
    }

    /// Ports `Struct._get_next_parent`: walks `path` one ascend/descend step
    /// at a time starting from `current`, returning the struct that should
    /// handle the final bare key and that key. When `add_parents` is set,
    /// missing intermediate structs on a descending dotted path are created
    /// (used for assignment, where `a.b.c: 1` must create `a` and `a.b` if
    /// they don't already exist).
    pub(crate) fn next_parent(
        &mut self,
        current: StructId,
        path: &str,
        add_parents: bool,
        location: &Location,
    ) -> Result<(StructId, String)> {
        let (parent, rest): (StructId, String);

        if path == "@root" || path.starts_with("@root.") {
            if let Some(container) = self.container(current) {
                parent = container;
                rest = path.to_owned();
            } else {
                parent = current;
                rest = path["@root".len()..].to_owned();
            }
        } else if !path.contains('.') {
            return Ok((current, path.to_owned()));
        } else if let Some(stripped) = path.strip_prefix("..") {
            match self.container(current) {
                Some(container) => {
                    parent = container;
                    rest = format!(".{stripped}");
                }
                None => {
                    return Err(CoilError::data(
                        location.clone(),
                        self.path_string(current),
                        format!("relative reference past root: {path}"),
                    ));
                }
            }
        } else if let Some(stripped) = path.strip_prefix('.') {
            parent = current;
            rest = stripped.to_owned();
        } else {
            if path.contains("..") {
                return Err(CoilError::key_value(location.clone(), path));
            }
            let mut split = path.splitn(2, '.');
            let key = split.next().unwrap().to_owned();
            rest = split.next().unwrap_or("").to_owned();
            match self.get(current, &key) {
                Some(Value::Struct(id)) => parent = id,
                Some(other) => {
                    return Err(CoilError::value_type(
                        location.clone(),
                        self.path_string(current),
                        "struct",
                        other.type_name(),
                    ));
                }
                None => {
                    if add_parents {
                        parent = self.new_child(current, &key, location.clone());
                    } else {
                        return Err(CoilError::key_missing(location.clone(), key));
                    }
                }
            }
        }

        if parent == current && rest.contains('.') {
            return self.next_parent(parent, &rest, add_parents, location);
        }
        Ok((parent, rest))
    }

    /// Gets a value anywhere in the tree by path relative to `from`.
    pub fn get_from(&mut self, from: StructId, path: &str, location: &Location) -> Result<Value> {
        let (parent, key) = self.next_parent(from, path, false, location)?;
        if key.is_empty() {
            Ok(Value::Struct(parent))
        } else if parent == from {
            self.get(parent, &key)
                .ok_or_else(|| CoilError::key_missing(location.clone(), key))
        } else {
            self.get_from(parent, &key, location)
        }
    }

    /// Sets a primary value anywhere in the tree by path relative to `from`,
    /// creating intermediate structs as needed. Used for flattened
    /// dotted-key attributes (`a.b.c: 1`).
    pub(crate) fn set_primary_from(
        &mut self,
        from: StructId,
        path: &str,
        value: Value,
        location: &Location,
        permissive: bool,
    ) -> Result<()> {
        let (parent, key) = self.next_parent(from, path, true, location)?;
        if key.is_empty() || !crate::tokenizer::is_valid_key(&key) {
            return Err(CoilError::key_value(location.clone(), &key));
        }
        self.set_primary(parent, key, value, location, permissive)
    }

    /// Deletes a value anywhere in the tree by path relative to `from`.
    pub(crate) fn delete_from(
        &mut self,
        from: StructId,
        path: &str,
        location: &Location,
        permissive: bool,
    ) -> Result<Value> {
        let (parent, key) = self.next_parent(from, path, false, location)?;
        if key.is_empty() {
            return Err(CoilError::key_value(location.clone(), path));
        }
        self.delete_key(parent, &key, location, permissive)
    }
}
