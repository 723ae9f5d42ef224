//! The expansion engine: walks a freshly parsed [`Tree`] top-down,
//! resolving `@extends` inheritance (already merged in by the parser into
//! primary/secondary entries), `${...}` string interpolation, `Link`
//! references, and `@map` broadcasting, turning it into its final,
//! side-effect-free form in place.
//!
//! The walk order matters: a `Link` to a struct that hasn't been visited yet
//! captures whatever state that struct happens to be in at the moment, then
//! is independently expanded afterwards (via the normal recursive descent
//! into the copy). This mirrors the reference implementation rather than
//! requiring a dependency-ordered topological walk.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::arena::{StructId, Tree};
use crate::error::{CoilError, Result};
use crate::location::Location;
use crate::value::{Leaf, Value};

const KEY: &str = r"-?[A-Za-z_][A-Za-z0-9_-]*";

static INTERP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\$\{{((?:@|\.+)?{key}(?:\.{key})*)\}}",
        key = KEY
    ))
    .unwrap()
});

static BRACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\{([^}]+)\}(.*)$").unwrap());
static RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(0*(\d+))\.\.(\d+)$").unwrap());

/// Which undefined references are tolerated rather than treated as errors.
#[derive(Debug, Clone, Default)]
pub enum IgnoreMissing {
    #[default]
    None,
    All,
    Keys(HashSet<String>),
}

impl IgnoreMissing {
    fn allows(&self, key: &str) -> bool {
        match self {
            IgnoreMissing::None => false,
            IgnoreMissing::All => true,
            IgnoreMissing::Keys(keys) => keys.contains(key),
        }
    }
}

/// Value kinds the expander is told to leave untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreType {
    Links,
    Strings,
}

/// Options controlling a single expansion pass. Mirrors the reference
/// parser's `expand`/`expanditem`/`expandvalue` parameters.
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Fallback values keyed by bare (non-path) attribute name, substituted
    /// when a lookup by that name fails anywhere in the tree.
    pub defaults: HashMap<String, Value>,
    pub ignore_missing: IgnoreMissing,
    pub ignore_types: HashSet<IgnoreType>,
    /// Whether to descend into child structs. `false` expands only this
    /// struct's own immediate attributes.
    pub recursive: bool,
}

impl ExpandOptions {
    pub fn new() -> Self {
        ExpandOptions {
            recursive: true,
            ..Default::default()
        }
    }
}

type Block = Vec<Vec<String>>;

/// Expands the whole tree in place, starting at its root.
pub fn expand_tree(tree: &mut Tree, options: &ExpandOptions) -> Result<()> {
    let root = tree.root();
    expand_struct(tree, root, options, &[])
}

fn blocked(block: &[Vec<String>], path: &[String]) -> bool {
    block.iter().any(|p| p == path)
}

fn extend(block: &[Vec<String>], path: Vec<String>) -> Block {
    let mut next = block.to_vec();
    next.push(path);
    next
}

/// Expands every attribute of struct `id`, handling `@map` broadcasting if
/// present. Recurses into child structs when `options.recursive`.
fn expand_struct(tree: &mut Tree, id: StructId, options: &ExpandOptions, block: &[Vec<String>]) -> Result<()> {
    let abspath = tree.absolute_segments(id);
    if blocked(block, &abspath) {
        return Err(CoilError::circular(
            tree.location(id),
            crate::path::absolute_string(&abspath),
        ));
    }
    let block = extend(block, abspath);

    match tree.map_list(id) {
        Some(raw_map) => expand_map_struct(tree, id, &raw_map, options, &block),
        None => {
            for key in tree.keys(id) {
                let loc = tree.location(id);
                let value = expand_item(tree, id, &key, options, &block, &loc)?;
                let recurse_into = value.as_struct();
                tree.overwrite(id, &key, value);
                if options.recursive {
                    if let Some(child) = recurse_into {
                        expand_struct(tree, child, options, &block)?;
                    }
                }
            }
            Ok(())
        }
    }
}

fn expand_map_struct(
    tree: &mut Tree,
    id: StructId,
    raw_map: &[Value],
    options: &ExpandOptions,
    block: &[Vec<String>],
) -> Result<()> {
    tree.set_map_list(id, None);
    let map = expand_map_suffixes(raw_map, &tree.location(id))?;

    let mut structs = Vec::new();
    let mut lists = Vec::new();

    for key in tree.keys(id) {
        let loc = tree.location(id);
        let value = expand_item(tree, id, &key, options, block, &loc)?;
        match value {
            Value::Struct(child) => {
                structs.push((key.clone(), child));
                tree.delete_key(id, &key, &loc, true)?;
            }
            Value::List(items) => {
                let expanded = expand_broadcast_list(&items);
                if expanded.len() != map.len() {
                    return Err(CoilError::data(
                        loc,
                        tree.path_string(id),
                        format!(
                            "invalid @map list: expected length {}, '{}' has length {}",
                            map.len(),
                            key,
                            expanded.len()
                        ),
                    ));
                }
                lists.push((key.clone(), expanded));
                tree.delete_key(id, &key, &loc, true)?;
            }
            other => tree.overwrite(id, &key, other),
        }
    }

    for (key, orig) in structs {
        for (i, suffix) in map.iter().enumerate() {
            let name = format!("{key}{suffix}");
            let loc = tree.location(id);
            if !crate::tokenizer::is_valid_key(&name) {
                return Err(CoilError::data(
                    loc,
                    tree.path_string(id),
                    format!("invalid @map list: key contains invalid characters: {suffix:?}"),
                ));
            }
            let copy = deep_copy_struct(tree, orig);
            tree.overwrite(id, &name, Value::Struct(copy));
            for (item_key, item_values) in &lists {
                tree.overwrite(copy, item_key, item_values[i].clone());
            }
            if options.recursive {
                expand_struct(tree, copy, options, block)?;
            }
        }
    }

    Ok(())
}

/// Recursively allocates a detached copy of struct `source`, preserving its
/// current iteration order. Used when a `Link` resolves to a struct or a
/// `@map` suffix is broadcast; both require an independently mutable copy
/// rather than aliasing the same [`StructId`].
fn deep_copy_struct(tree: &mut Tree, source: StructId) -> StructId {
    let location = tree.location(source);
    let new_id = tree.new_detached(tree.name(source), location);
    for key in tree.keys(source) {
        let value = tree.get(source, &key).expect("key came from keys()");
        let copied = match value {
            Value::Struct(child) => Value::Struct(deep_copy_struct(tree, child)),
            other => other,
        };
        tree.overwrite(new_id, &key, copied);
    }
    tree.set_map_list(new_id, tree.map_list(source));
    new_id
}

/// Fetches and expands the value at `path` relative to `from`. No-op for
/// struct values (recursion into them is the caller's job via
/// [`expand_struct`]).
fn expand_item(
    tree: &mut Tree,
    from: StructId,
    path: &str,
    options: &ExpandOptions,
    block: &[Vec<String>],
    location: &Location,
) -> Result<Value> {
    let (parent, key) = tree.next_parent(from, path, false, location)?;
    if parent == from {
        let mut item_path = tree.absolute_segments(from);
        item_path.push(key.clone());
        if blocked(block, &item_path) {
            return Err(CoilError::circular(
                location.clone(),
                crate::path::absolute_string(&item_path),
            ));
        }
        let block = extend(block, item_path);

        let value = match tree.get(from, &key) {
            Some(value) => value,
            None => {
                if let Some(default) = options.defaults.get(&key) {
                    return Ok(default.clone());
                }
                return Err(CoilError::key_missing(location.clone(), key));
            }
        };
        expand_value(tree, from, value, options, &block, location)
    } else {
        expand_item(tree, parent, &key, options, block, location)
    }
}

/// Expands a single already-fetched value: substitutes `${...}` in strings,
/// resolves `Link`s, and recurses into list elements. Structs pass through
/// untouched — only [`expand_struct`] descends into them.
fn expand_value(
    tree: &mut Tree,
    in_struct: StructId,
    value: Value,
    options: &ExpandOptions,
    block: &[Vec<String>],
    location: &Location,
) -> Result<Value> {
    match value {
        Value::Struct(_) => Ok(value),
        Value::Leaf(Leaf::Str(s)) => {
            if options.ignore_types.contains(&IgnoreType::Strings) {
                Ok(Value::Leaf(Leaf::Str(s)))
            } else {
                Ok(Value::Leaf(Leaf::Str(substitute_string(
                    tree, in_struct, &s, options, block, location,
                )?)))
            }
        }
        Value::Link(link) => {
            if options.ignore_types.contains(&IgnoreType::Links) {
                Ok(Value::Link(link))
            } else {
                expand_link(tree, in_struct, &link, options, block)
            }
        }
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_value(tree, in_struct, item, options, block, location)?);
            }
            Ok(Value::List(out))
        }
        Value::Leaf(other) => Ok(Value::Leaf(other)),
    }
}

/// Runs only string interpolation (no defaults/ignore_missing/ignore_types)
/// against the current tree state, used by the parser to resolve `@file`/
/// `@package` path expressions before the rest of expansion has run.
pub(crate) fn expand_string_now(
    tree: &mut Tree,
    in_struct: StructId,
    s: &str,
    location: &Location,
) -> Result<String> {
    let options = ExpandOptions::default();
    substitute_string(tree, in_struct, s, &options, &[], location)
}

pub(crate) fn substitute_string(
    tree: &mut Tree,
    in_struct: StructId,
    s: &str,
    options: &ExpandOptions,
    block: &[Vec<String>],
    location: &Location,
) -> Result<String> {
    // Collect replacements first: the regex crate's replace helpers don't
    // allow a fallible closure, and substitution may itself mutate `tree`.
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in INTERP_RE.captures_iter(s) {
        let whole = caps.get(0).unwrap();
        let subkey = caps.get(1).unwrap().as_str();
        out.push_str(&s[last..whole.start()]);
        last = whole.end();

        match expand_item(tree, in_struct, subkey, options, block, location) {
            Ok(value) => out.push_str(&display_value(&value)),
            Err(CoilError::KeyMissing { key, .. }) if options.ignore_missing.allows(&key) => {
                out.push_str(whole.as_str());
            }
            Err(other) => return Err(other),
        }
    }
    out.push_str(&s[last..]);
    Ok(out)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Leaf(leaf) => leaf.to_string(),
        Value::List(_) => "[...]".to_owned(),
        Value::Struct(_) => "{...}".to_owned(),
        Value::Link(link) => link.path.clone(),
    }
}

fn expand_link(
    tree: &mut Tree,
    in_struct: StructId,
    link: &crate::value::Link,
    options: &ExpandOptions,
    block: &[Vec<String>],
) -> Result<Value> {
    match expand_item(tree, in_struct, &link.path, options, block, &link.location) {
        Ok(Value::Struct(id)) => Ok(Value::Struct(deep_copy_struct(tree, id))),
        Ok(other) => Ok(other),
        Err(CoilError::KeyMissing { key, .. }) if options.ignore_missing.allows(&key) => {
            Ok(Value::Link(link.clone()))
        }
        Err(other) => Err(other),
    }
}

/// Expands `{1..3}`/`{a,b}` constructs in a `@map` directive's own list into
/// the flat list of key suffixes. Non-string items pass through as their
/// display form; only strings are brace-expanded.
fn expand_map_suffixes(items: &[Value], location: &Location) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Leaf(Leaf::Str(s)) => out.extend(expand_braces(s)),
            Value::Leaf(leaf) => out.push(leaf.to_string()),
            other => {
                return Err(CoilError::value_type(
                    location.clone(),
                    String::new(),
                    "string",
                    other.type_name(),
                ));
            }
        }
    }
    Ok(out)
}

/// Expands `{...}` constructs in each string item of a per-key list being
/// broadcast across `@map` suffixes; non-string items pass through
/// unchanged and uncounted as a single slot.
fn expand_broadcast_list(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Leaf(Leaf::Str(s)) => {
                out.extend(expand_braces(s).into_iter().map(|s| Value::Leaf(Leaf::Str(s))));
            }
            other => out.push(other.clone()),
        }
    }
    out
}

fn expand_braces(s: &str) -> Vec<String> {
    let Some(caps) = BRACES_RE.captures(s) else {
        return vec![s.to_owned()];
    };
    let prefix = caps.get(1).unwrap().as_str();
    let body = caps.get(2).unwrap().as_str();
    let postfix = caps.get(3).unwrap().as_str();

    let mut out = Vec::new();
    for item in body.split(',') {
        if let Some(range) = RANGE_RE.captures(item) {
            let width = range.get(1).unwrap().as_str().len();
            let start: i64 = range[2].parse().unwrap();
            let end: i64 = range[3].parse().unwrap();
            for i in start..=end {
                out.extend(expand_braces(&format!("{prefix}{i:0width$}{postfix}")));
            }
        } else {
            out.extend(expand_braces(&format!("{prefix}{item}{postfix}")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brace_range_preserves_zero_padding() {
        assert_eq!(expand_braces("a{01..03}b"), vec!["a01b", "a02b", "a03b"]);
    }

    #[test]
    fn brace_list_expands_each_item() {
        assert_eq!(expand_braces("x{a,b}y"), vec!["xay", "xby"]);
    }

    #[test]
    fn brace_expands_rightmost_group_first() {
        // Two groups: the function recurses to resolve both, left to right
        // in the final output since the rightmost is substituted per
        // iteration of the leftmost's alternatives.
        assert_eq!(expand_braces("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn no_braces_is_identity() {
        assert_eq!(expand_braces("plain"), vec!["plain"]);
    }
}
