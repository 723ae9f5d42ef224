//! Tokenizer, parser, path algebra, value model and expansion engine for the
//! coil configuration language.
//!
//! The crate root exposes two entry points, [`parse`] and [`parse_file`],
//! which run the tokenizer, the recursive-descent parser and the expansion
//! engine in one call and hand back a [`Tree`] in its final, immutable form.
//! Everything upstream of that (line sourcing, package-root search,
//! directory listing) lives behind the [`source::FileSource`] trait so the
//! core never touches `std::fs` itself.

mod arena;
mod error;
mod expand;
mod location;
mod parser;
mod path;
mod serialize;
mod source;
mod token;
mod tokenizer;
mod value;

pub use arena::{StructId, Tree};
pub use error::{CoilError, Result};
pub use expand::{ExpandOptions, IgnoreMissing, IgnoreType};
pub use location::Location;
pub use parser::ParseOptions;
pub use serialize::{serialize_flat, serialize_nested};
pub use source::{FileSource, LineSource, StrLines};
pub use value::{Leaf, Link, Value};

use std::collections::HashMap;

/// Options for a full [`parse`]/[`parse_file`] call: parsing behavior plus
/// the expansion pass that follows it.
#[derive(Default)]
pub struct Options<'f> {
    pub permissive: bool,
    pub file_source: Option<&'f dyn FileSource>,
    pub package_roots: &'f [String],
    pub package_marker: &'f str,
    pub defaults: HashMap<String, Value>,
    pub ignore_missing: IgnoreMissing,
    pub ignore_types: std::collections::HashSet<IgnoreType>,
}

impl<'f> Options<'f> {
    pub fn new() -> Self {
        Options {
            package_marker: "__init__",
            ..Default::default()
        }
    }

    fn parse_options(&self, path: Option<String>) -> ParseOptions<'f> {
        ParseOptions {
            path,
            permissive: self.permissive,
            file_source: self.file_source,
            package_roots: self.package_roots,
            package_marker: self.package_marker,
        }
    }

    fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            defaults: self.defaults.clone(),
            ignore_missing: self.ignore_missing.clone(),
            ignore_types: self.ignore_types.clone(),
            recursive: true,
        }
    }
}

/// Tokenizes, parses and expands `source` into a final [`Tree`].
pub fn parse(source: &mut dyn LineSource, options: &Options<'_>) -> Result<Tree> {
    let parse_opts = options.parse_options(None);
    let mut tree = parser::parse_prototype(source, &parse_opts)?;
    expand::expand_tree(&mut tree, &options.expand_options())?;
    Ok(tree)
}

/// As [`parse`], but opens `path` via `options.file_source` and uses its
/// directory as the base for relative `@file` lookups.
pub fn parse_file(path: &str, options: &Options<'_>) -> Result<Tree> {
    let fs = options.file_source.ok_or_else(|| CoilError::Io {
        location: Location::unknown(),
        reason: "no file source configured".to_owned(),
    })?;
    let mut source = fs.open_for_read(path).map_err(|e| CoilError::Io {
        location: Location::unknown(),
        reason: format!("{path}: {e}"),
    })?;
    let parse_opts = options.parse_options(Some(path.to_owned()));
    let mut tree = parser::parse_prototype(&mut *source, &parse_opts)?;
    expand::expand_tree(&mut tree, &options.expand_options())?;
    Ok(tree)
}

impl Tree {
    /// Looks up `path` (relative to the root) and returns its value.
    pub fn lookup(&mut self, path: &str) -> Result<Value> {
        let root = self.root();
        self.get_from(root, path, &Location::unknown())
    }

    /// As [`Tree::lookup`], but returns `default` instead of a `KeyMissing`
    /// error.
    pub fn lookup_or(&mut self, path: &str, default: Value) -> Value {
        self.lookup(path).unwrap_or(default)
    }
}

impl PartialEq for Tree {
    /// Structural equality: key sets and values must match recursively.
    /// Struct key order is not part of equality; list element order is.
    fn eq(&self, other: &Self) -> bool {
        structs_equal(self, self.root(), other, other.root())
    }
}

fn structs_equal(a: &Tree, a_id: StructId, b: &Tree, b_id: StructId) -> bool {
    if a.len(a_id) != b.len(b_id) {
        return false;
    }
    for key in a.keys(a_id) {
        let Some(av) = a.get(a_id, &key) else { return false };
        let Some(bv) = b.get(b_id, &key) else { return false };
        if !values_equal(a, &av, b, &bv) {
            return false;
        }
    }
    true
}

fn values_equal(a: &Tree, av: &Value, b: &Tree, bv: &Value) -> bool {
    match (av, bv) {
        (Value::Struct(ai), Value::Struct(bi)) => structs_equal(a, *ai, b, *bi),
        (Value::List(ai), Value::List(bi)) => {
            ai.len() == bi.len()
                && ai
                    .iter()
                    .zip(bi.iter())
                    .all(|(x, y)| values_equal(a, x, b, y))
        }
        (Value::Leaf(x), Value::Leaf(y)) => x == y,
        (Value::Link(x), Value::Link(y)) => x.path == y.path,
        _ => false,
    }
}
