//! Recursive-descent parser: turns a token stream into a Prototype tree.
//!
//! "Prototype" isn't a separate type here — it's just a [`Tree`] whose
//! structs still have unresolved secondary entries, a live `deleted` set and
//! a pending `@map` list. [`crate::expand`] walks the same tree afterwards
//! and settles it into its final form in place.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::arena::{StructId, Tree};
use crate::error::{CoilError, Result};
use crate::expand;
use crate::location::Location;
use crate::source::{FileSource, LineSource};
use crate::token::{Spanned, Token};
use crate::tokenizer::{is_valid_key, Tokenizer};
use crate::value::{Leaf, Link, Value};

const KEY: &str = r"-?[A-Za-z_][A-Za-z0-9_-]*";

static INTERP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\$\{{((?:@|\.+)?{key}(?:\.{key})*)\}}", key = KEY)).unwrap()
});

const VALUE_KINDS: &[&str] = &["FLOAT", "INTEGER", "STRING", "BOOLEAN", "NULL"];

/// Options governing a single parse. `package_roots`/`package_marker` back
/// `@package`; `file_source` is consulted for both `@file` and `@package`
/// and may be omitted for documents that use neither.
pub struct ParseOptions<'f> {
    pub path: Option<String>,
    pub permissive: bool,
    pub file_source: Option<&'f dyn FileSource>,
    pub package_roots: &'f [String],
    pub package_marker: &'f str,
}

impl<'f> Default for ParseOptions<'f> {
    fn default() -> Self {
        ParseOptions {
            path: None,
            permissive: false,
            file_source: None,
            package_roots: &[],
            package_marker: "__init__",
        }
    }
}

/// Parses `source` into an unexpanded Prototype [`Tree`].
pub fn parse_prototype(source: &mut dyn LineSource, options: &ParseOptions<'_>) -> Result<Tree> {
    let path_rc: Option<Rc<str>> = options.path.as_deref().map(Rc::from);
    let base_dir = match (&options.path, options.file_source) {
        (Some(p), Some(fs)) => fs.dirname(p),
        _ => String::new(),
    };
    let tokenizer = Tokenizer::new(source, path_rc.clone());
    let mut parser = Parser {
        tokenizer,
        base_dir,
        permissive: options.permissive,
        file_source: options.file_source,
        package_roots: options.package_roots,
        package_marker: options.package_marker,
        tree: Tree::new(Location::unknown()),
    };
    parser.parse_document()?;
    Ok(parser.tree)
}

struct Parser<'s, 'f> {
    tokenizer: Tokenizer<'s>,
    base_dir: String,
    permissive: bool,
    file_source: Option<&'f dyn FileSource>,
    package_roots: &'f [String],
    package_marker: &'f str,
    tree: Tree,
}

impl<'s, 'f> Parser<'s, 'f> {
    fn parse_document(&mut self) -> Result<()> {
        loop {
            let tok = self.tokenizer.peek()?;
            if matches!(tok.token, Token::Eof) {
                break;
            }
            let root = self.tree.root();
            self.parse_attribute(root)?;
        }
        self.tokenizer.next(&["EOF"])?;
        Ok(())
    }

    /// `name: value` or `~name`.
    fn parse_attribute(&mut self, container: StructId) -> Result<()> {
        let tok = self.tokenizer.next(&["'~'", "PATH"])?;

        if matches!(tok.token, Token::Tilde) {
            let key_tok = self.tokenizer.next(&["PATH"])?;
            let path = path_text(&key_tok)?;
            self.tree
                .delete_from(container, &path, &key_tok.location, self.permissive)?;
            return Ok(());
        }

        let path = path_text(&tok)?;

        if let Some(special) = path.strip_prefix('@') {
            self.tokenizer.next(&["':'"])?;
            match special {
                "extends" => self.special_extends(container),
                "file" => self.special_file(container, &tok.location),
                "package" => self.special_package(container),
                "map" => self.special_map(container, &tok.location),
                other => Err(CoilError::syntax(
                    tok.location.clone(),
                    format!("unknown special attribute: @{other}"),
                )),
            }
        } else {
            self.tokenizer.next(&["':'"])?;
            let (dest, key) = self.tree.next_parent(container, &path, true, &tok.location)?;
            if key.is_empty() || !is_valid_key(&key) {
                return Err(CoilError::key_value(tok.location.clone(), key));
            }
            self.parse_value(dest, &key)
        }
    }

    /// struct, list, link, or plain scalar.
    fn parse_value(&mut self, container: StructId, name: &str) -> Result<()> {
        let tok = self.tokenizer.peek()?;
        match &tok.token {
            Token::LBrace => self.parse_struct(container, name),
            Token::LBracket => {
                let items = self.parse_list_values()?;
                self.tree.set_primary(
                    container,
                    name.to_owned(),
                    Value::List(items),
                    &tok.location,
                    self.permissive,
                )
            }
            Token::Equals => {
                self.tokenizer.next(&["'='"])?;
                self.parse_link(container, name)
            }
            Token::Path(_) => self.parse_link(container, name),
            _ => self.parse_plain(container, name),
        }
    }

    fn parse_struct(&mut self, container: StructId, name: &str) -> Result<()> {
        let open = self.tokenizer.next(&["'{'"])?;
        let new_id = self.tree.new_detached(name.to_owned(), open.location.clone());
        self.tree.set_primary(
            container,
            name.to_owned(),
            Value::Struct(new_id),
            &open.location,
            self.permissive,
        )?;

        loop {
            let tok = self.tokenizer.peek()?;
            if matches!(tok.token, Token::RBrace) {
                break;
            }
            self.parse_attribute(new_id)?;
        }
        self.tokenizer.next(&["'}'"])?;
        Ok(())
    }

    fn parse_list_values(&mut self) -> Result<Vec<Value>> {
        self.tokenizer.next(&["'['"])?;
        let mut out = Vec::new();
        loop {
            let tok = self.tokenizer.peek()?;
            match &tok.token {
                Token::RBracket => {
                    self.tokenizer.next(&["']'"])?;
                    break;
                }
                Token::LBracket => out.push(Value::List(self.parse_list_values()?)),
                Token::LBrace => {
                    return Err(CoilError::syntax(
                        tok.location.clone(),
                        "structs cannot appear inside a list",
                    ))
                }
                _ => out.push(self.parse_literal()?),
            }
        }
        Ok(out)
    }

    fn parse_literal(&mut self) -> Result<Value> {
        let tok = self.tokenizer.next(VALUE_KINDS)?;
        token_to_value(&tok)
    }

    fn parse_link(&mut self, container: StructId, name: &str) -> Result<()> {
        let tok = self.tokenizer.next(&["PATH"])?;
        let path = path_text(&tok)?;
        let value = Value::Link(Link {
            path,
            location: tok.location.clone(),
        });
        self.tree
            .set_primary(container, name.to_owned(), value, &tok.location, self.permissive)
    }

    fn parse_plain(&mut self, container: StructId, name: &str) -> Result<()> {
        let tok = self.tokenizer.next(VALUE_KINDS)?;
        let value = token_to_value(&tok)?;
        self.tree
            .set_primary(container, name.to_owned(), value, &tok.location, self.permissive)
    }

    /// `@extends: path` or `@extends = path`.
    fn special_extends(&mut self, container: StructId) -> Result<()> {
        let mut tok = self.tokenizer.next(&["'='", "PATH"])?;
        if matches!(tok.token, Token::Equals) {
            tok = self.tokenizer.next(&["PATH"])?;
        }
        let path = path_text(&tok)?;

        if self.tree.container(container).is_none() {
            return Err(CoilError::data(
                tok.location.clone(),
                self.tree.path_string(container),
                "@root cannot extend other structs",
            ));
        }

        let target = self.tree.get_from(container, &path, &tok.location)?;
        let target_id = match target {
            Value::Struct(id) => id,
            other => {
                return Err(CoilError::value_type(
                    tok.location.clone(),
                    self.tree.path_string(container),
                    "struct",
                    other.type_name(),
                ))
            }
        };
        if target_id == container {
            return Err(CoilError::data(
                tok.location.clone(),
                self.tree.path_string(container),
                "@extends target cannot be self",
            ));
        }
        if !(path.starts_with('@') || path.starts_with("..")) {
            return Err(CoilError::data(
                tok.location.clone(),
                self.tree.path_string(container),
                "@extends target cannot be a child of container",
            ));
        }
        let mut cur = Some(container);
        while let Some(c) = cur {
            if c == target_id {
                return Err(CoilError::data(
                    tok.location.clone(),
                    self.tree.path_string(container),
                    "@extends target cannot be a parent of container",
                ));
            }
            cur = self.tree.container(c);
        }
        if self.contains_descendant(container, target_id) {
            return Err(CoilError::data(
                tok.location.clone(),
                self.tree.path_string(container),
                "@extends target cannot be a child of container",
            ));
        }

        self.extends(container, target_id, None)
    }

    /// True if `target` is reachable from `root` by following struct-valued
    /// entries downward (i.e. `target` is a descendant of `root`).
    fn contains_descendant(&self, root: StructId, target: StructId) -> bool {
        for key in self.tree.keys(root) {
            if let Some(Value::Struct(child)) = self.tree.get(root, &key) {
                if child == target || self.contains_descendant(child, target) {
                    return true;
                }
            }
        }
        false
    }

    /// Merges `base`'s entries into `container`, skipping any key that
    /// `container` already has (primary, secondary, or deleted). When
    /// `relative_depth` is set (cross-document `@file`/`@package`
    /// inheritance), `@root`-rooted links and interpolations in copied
    /// values are translated using that depth, so they keep resolving
    /// correctly once reattached under `container`. The caller must supply
    /// `base`'s true depth in its *source* tree: once a struct is copied
    /// into this tree via [`import_struct`] it is detached (no container),
    /// so it can no longer be recovered from `base` itself. Each recursive
    /// descent into a struct-valued child increments the depth by one,
    /// since that child sat one level deeper in the source document.
    fn extends(&mut self, container: StructId, base: StructId, relative_depth: Option<usize>) -> Result<()> {
        if base == container {
            return Err(CoilError::data(
                self.tree.location(container),
                self.tree.path_string(container),
                "struct cannot extend itself",
            ));
        }
        if let (None, Some(base_map)) = (self.tree.map_list(container), self.tree.map_list(base)) {
            self.tree.set_map_list(container, Some(base_map));
        }

        for key in self.tree.keys(base) {
            if self.tree.contains_key(container, &key) || self.tree.is_deleted(container, &key) {
                continue;
            }
            let value = self.tree.get(base, &key).expect("key came from keys()");
            let value = match value {
                Value::Struct(child) => {
                    let location = self.tree.location(child);
                    let new_id = self.tree.new_detached(key.clone(), location);
                    self.extends(new_id, child, relative_depth.map(|depth| depth + 1))?;
                    Value::Struct(new_id)
                }
                other => match relative_depth {
                    Some(depth) => relativeize_value(other, depth),
                    None => other,
                },
            };
            self.tree.set_secondary(container, key, value);
        }
        Ok(())
    }

    /// `@file: "path"` or `@file: ["path" "sub.struct"]`.
    fn special_file(&mut self, container: StructId, location: &Location) -> Result<()> {
        let tok = self.tokenizer.next(&["'['", "FLOAT", "INTEGER", "STRING", "BOOLEAN", "NULL"])?;
        let (file_path, struct_path) = if matches!(tok.token, Token::LBracket) {
            let file_tok = self.tokenizer.next(VALUE_KINDS)?;
            let struct_tok = self.tokenizer.next(VALUE_KINDS)?;
            self.tokenizer.next(&["']'"])?;
            (
                self.expand_token_as_string(container, &file_tok)?,
                self.expand_token_as_string(container, &struct_tok)?,
            )
        } else {
            (self.expand_token_as_string(container, &tok)?, String::new())
        };

        let full_path = self.resolve_file_path(&file_path, location)?;
        self.extend_with_file(container, &full_path, &struct_path, location.clone())
    }

    /// `@package: "pkg.sub:relative/path.ext"`.
    fn special_package(&mut self, container: StructId) -> Result<()> {
        let tok = self.tokenizer.next(VALUE_KINDS)?;
        let value = self.expand_token_as_string(container, &tok)?;
        let (package, rel_path) = value.split_once(':').ok_or_else(|| {
            CoilError::syntax(tok.location.clone(), "@package value must be \"package:path\"")
        })?;

        let fs = self
            .file_source
            .ok_or_else(|| CoilError::io(tok.location.clone(), "no file source configured for @package"))?;

        let parts: Vec<&str> = package.split('.').collect();
        let package_dir = parts.join("/");
        let mut fullpath = None;
        for root in self.package_roots {
            let marker = fs.join(&fs.join(root, &package_dir), self.package_marker);
            if fs.is_file(&marker) {
                fullpath = Some(fs.join(&fs.join(root, &package_dir), rel_path));
                break;
            }
        }
        let fullpath = fullpath.ok_or_else(|| {
            CoilError::syntax(tok.location.clone(), format!("unable to find package: {package}"))
        })?;

        self.extend_with_file(container, &fullpath, "", tok.location.clone())
    }

    /// `@map: [...]`.
    fn special_map(&mut self, container: StructId, location: &Location) -> Result<()> {
        if self.tree.map_list(container).is_some() {
            return Err(CoilError::syntax(
                location.clone(),
                "found multiple @map lists, only one is allowed",
            ));
        }
        let items = self.parse_list_values()?;
        self.tree.set_map_list(container, Some(items));
        Ok(())
    }

    fn expand_token_as_string(&mut self, container: StructId, tok: &Spanned) -> Result<String> {
        let value = token_to_value(tok)?;
        let value = match value {
            Value::Leaf(Leaf::Str(s)) => Value::Leaf(Leaf::Str(expand::expand_string_now(
                &mut self.tree,
                container,
                &s,
                &tok.location,
            )?)),
            other => other,
        };
        match value {
            Value::Leaf(Leaf::Str(s)) => Ok(s),
            _ => Err(CoilError::syntax(
                tok.location.clone(),
                "@file/@package value must be a string",
            )),
        }
    }

    fn resolve_file_path(&self, file_path: &str, location: &Location) -> Result<String> {
        let fs = self
            .file_source
            .ok_or_else(|| CoilError::io(location.clone(), "no file source configured for @file"))?;
        let mut full_path = file_path.to_owned();
        if !self.base_dir.is_empty() && !fs.is_absolute(&full_path) {
            full_path = fs.join(&self.base_dir, &full_path);
        }
        if !fs.is_absolute(&full_path) {
            return Err(CoilError::syntax(
                location.clone(),
                format!("unable to find absolute path: {full_path}"),
            ));
        }
        Ok(full_path)
    }

    fn extend_with_file(
        &mut self,
        container: StructId,
        full_path: &str,
        struct_path: &str,
        location: Location,
    ) -> Result<()> {
        let fs = self
            .file_source
            .ok_or_else(|| CoilError::io(location.clone(), "no file source configured for @file"))?;
        let mut line_source = fs
            .open_for_read(full_path)
            .map_err(|e| CoilError::io(location.clone(), format!("{full_path}: {e}")))?;

        let sub_options = ParseOptions {
            path: Some(full_path.to_owned()),
            permissive: self.permissive,
            file_source: self.file_source,
            package_roots: self.package_roots,
            package_marker: self.package_marker,
        };
        let mut sub_tree = parse_prototype(&mut *line_source, &sub_options)?;

        let mut source_id = sub_tree.root();
        if !struct_path.is_empty() {
            match sub_tree.get_from(source_id, struct_path, &location)? {
                Value::Struct(id) => source_id = id,
                other => {
                    return Err(CoilError::value_type(
                        location,
                        struct_path.to_owned(),
                        "struct",
                        other.type_name(),
                    ))
                }
            }
        }

        let base_depth = sub_tree.absolute_segments(source_id).len();
        let imported = import_struct(&mut self.tree, &sub_tree, source_id);
        self.extends(container, imported, Some(base_depth))
    }
}

/// Copies a struct (and everything under it) from one tree's arena into
/// another, used to bring an `@file`/`@package` document's prototype into
/// this one before extending from it.
fn import_struct(dest: &mut Tree, source: &Tree, id: StructId) -> StructId {
    let new_id = dest.new_detached(source.name(id), source.location(id));
    for key in source.keys(id) {
        let value = source.get(id, &key).expect("key came from keys()");
        let copied = match value {
            Value::Struct(child) => Value::Struct(import_struct(dest, source, child)),
            other => other,
        };
        dest.overwrite(new_id, &key, copied);
    }
    dest.set_map_list(new_id, source.map_list(id));
    new_id
}

fn relativeize_path(path: &str, base_depth: usize) -> String {
    match path.strip_prefix("@root") {
        Some(rest) => format!("{}{}", ".".repeat(base_depth), rest),
        None => path.to_owned(),
    }
}

fn relativeize_in_string(s: &str, base_depth: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in INTERP_RE.captures_iter(s) {
        let whole = caps.get(0).unwrap();
        let path = caps.get(1).unwrap().as_str();
        out.push_str(&s[last..whole.start()]);
        out.push_str("${");
        out.push_str(&relativeize_path(path, base_depth));
        out.push('}');
        last = whole.end();
    }
    out.push_str(&s[last..]);
    out
}

fn relativeize_value(value: Value, base_depth: usize) -> Value {
    match value {
        Value::Link(mut link) => {
            link.path = relativeize_path(&link.path, base_depth);
            Value::Link(link)
        }
        Value::Leaf(Leaf::Str(s)) => Value::Leaf(Leaf::Str(relativeize_in_string(&s, base_depth))),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Leaf(Leaf::Str(s)) => {
                        Value::Leaf(Leaf::Str(relativeize_in_string(&s, base_depth)))
                    }
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

fn path_text(tok: &Spanned) -> Result<String> {
    match &tok.token {
        Token::Path(p) => Ok(p.clone()),
        other => Err(CoilError::syntax(
            tok.location.clone(),
            format!("unexpected {}, looking for a path", other.kind_name()),
        )),
    }
}

fn token_to_value(tok: &Spanned) -> Result<Value> {
    Ok(match &tok.token {
        Token::Float(f) => Value::Leaf(Leaf::Float(*f)),
        Token::Integer(i) => Value::Leaf(Leaf::Int(*i)),
        Token::Str(s) => Value::Leaf(Leaf::Str(s.clone())),
        Token::Bool(b) => Value::Leaf(Leaf::Bool(*b)),
        Token::Null => Value::Leaf(Leaf::Null),
        other => {
            return Err(CoilError::syntax(
                tok.location.clone(),
                format!("unexpected {}, looking for a value", other.kind_name()),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::CoilError;
    use crate::expand::{expand_tree, ExpandOptions, IgnoreMissing};
    use crate::source::StrLines;

    /// An in-memory [`FileSource`] for exercising `@file`/`@package` without
    /// a real filesystem.
    #[derive(Default)]
    struct TestFiles(HashMap<String, String>);

    impl TestFiles {
        fn with(files: &[(&str, &str)]) -> Self {
            TestFiles(
                files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl FileSource for TestFiles {
        fn open_for_read(&self, absolute_path: &str) -> std::io::Result<Box<dyn LineSource>> {
            match self.0.get(absolute_path) {
                Some(text) => Ok(Box::new(StrLinesOwned(
                    text.lines().map(str::to_owned).collect(),
                ))),
                None => Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    absolute_path.to_owned(),
                )),
            }
        }

        fn is_file(&self, absolute_path: &str) -> bool {
            self.0.contains_key(absolute_path)
        }
    }

    struct StrLinesOwned(Vec<String>);

    impl LineSource for StrLinesOwned {
        fn next_line(&mut self) -> Option<String> {
            if self.0.is_empty() {
                None
            } else {
                Some(self.0.remove(0))
            }
        }
    }

    fn parse_and_expand(source: &str) -> Tree {
        let mut lines = StrLines::new(source);
        let mut tree = parse_prototype(&mut lines, &ParseOptions::default()).unwrap();
        expand_tree(&mut tree, &ExpandOptions::new()).unwrap();
        tree
    }

    #[test]
    fn basic_inheritance_and_deletion() {
        let tree = parse_and_expand(
            r#"
            A: { a: "a" b: "b" c: "c" }
            B: { @extends: ..A  e: [ "one" 2 "omg three" ]  ~c }
            "#,
        );
        let root = tree.root();
        let b = match tree.get(root, "B").unwrap() {
            Value::Struct(id) => id,
            _ => panic!("B is not a struct"),
        };
        assert_eq!(
            tree.get(b, "a"),
            Some(Value::Leaf(Leaf::Str("a".to_owned())))
        );
        assert_eq!(
            tree.get(b, "b"),
            Some(Value::Leaf(Leaf::Str("b".to_owned())))
        );
        assert!(!tree.contains_key(b, "c"));
        assert_eq!(
            tree.get(b, "e"),
            Some(Value::List(vec![
                Value::Leaf(Leaf::Str("one".to_owned())),
                Value::Leaf(Leaf::Int(2)),
                Value::Leaf(Leaf::Str("omg three".to_owned())),
            ]))
        );
        assert_eq!(tree.len(b), 4);
    }

    #[test]
    fn flattened_keys_and_late_parent_mutation() {
        let tree = parse_and_expand(
            r#"
            base: { x: 1 }
            sub: { @extends: ..base }
            base.y: 2
            "#,
        );
        let root = tree.root();
        let base = match tree.get(root, "base").unwrap() {
            Value::Struct(id) => id,
            _ => panic!("base is not a struct"),
        };
        let sub = match tree.get(root, "sub").unwrap() {
            Value::Struct(id) => id,
            _ => panic!("sub is not a struct"),
        };
        assert_eq!(tree.get(base, "y"), Some(Value::Leaf(Leaf::Int(2))));
        assert_eq!(tree.get(sub, "x"), Some(Value::Leaf(Leaf::Int(1))));
        assert!(!tree.contains_key(sub, "y"));
    }

    #[test]
    fn root_relative_link_rewrites_across_file_inclusion() {
        let files = TestFiles::with(&[(
            "/proj/external.ext",
            "root: 7\ninner: { ref: @root.root }\n",
        )]);
        let mut lines = StrLines::new(r#"mine: { @file: ["external.ext" "inner"] }"#);
        let opts = ParseOptions {
            path: Some("/proj/main.coil".to_owned()),
            permissive: false,
            file_source: Some(&files),
            package_roots: &[],
            package_marker: "__init__",
        };
        let mut tree = parse_prototype(&mut lines, &opts).unwrap();
        expand_tree(&mut tree, &ExpandOptions::new()).unwrap();
        let root = tree.root();
        let mine = match tree.get(root, "mine").unwrap() {
            Value::Struct(id) => id,
            _ => panic!("mine is not a struct"),
        };
        assert_eq!(tree.get(mine, "ref"), Some(Value::Leaf(Leaf::Int(7))));
    }

    #[test]
    fn string_interpolation_with_defaults() {
        let mut lines = StrLines::new(r#"bar: "omgwtf${foo}${baz}""#);
        let mut tree = parse_prototype(&mut lines, &ParseOptions::default()).unwrap();
        let mut defaults = HashMap::new();
        defaults.insert("foo".to_owned(), Value::Leaf(Leaf::Str("123".to_owned())));
        defaults.insert("baz".to_owned(), Value::Leaf(Leaf::Str("456".to_owned())));
        expand_tree(
            &mut tree,
            &ExpandOptions {
                defaults,
                ..ExpandOptions::new()
            },
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(
            tree.get(root, "bar"),
            Some(Value::Leaf(Leaf::Str("omgwtf123456".to_owned())))
        );
    }

    #[test]
    fn map_broadcasts_templates_and_parallel_lists() {
        let tree = parse_and_expand(
            r#"
            m: {
                @map: [1 2 3]
                x: [1 2 3]
                y: [1 3 5]
                a: { z: 1 }
                b: { z: 2 }
            }
            "#,
        );
        let root = tree.root();
        let m = match tree.get(root, "m").unwrap() {
            Value::Struct(id) => id,
            _ => panic!("m is not a struct"),
        };
        for (key, z, x, y) in [
            ("a1", 1, 1, 1),
            ("a2", 1, 2, 3),
            ("a3", 1, 3, 5),
            ("b1", 2, 1, 1),
            ("b2", 2, 2, 3),
            ("b3", 2, 3, 5),
        ] {
            let child = match tree.get(m, key).unwrap_or_else(|| panic!("missing {key}")) {
                Value::Struct(id) => id,
                _ => panic!("{key} is not a struct"),
            };
            assert_eq!(tree.get(child, "z"), Some(Value::Leaf(Leaf::Int(z))));
            assert_eq!(tree.get(child, "x"), Some(Value::Leaf(Leaf::Int(x))));
            assert_eq!(tree.get(child, "y"), Some(Value::Leaf(Leaf::Int(y))));
        }
        assert!(!tree.contains_key(m, "a"));
        assert!(!tree.contains_key(m, "x"));
    }

    #[test]
    fn circular_reference_is_an_error_not_a_stack_overflow() {
        let mut lines = StrLines::new("a: \"${b}\"\nb: \"${a}\"\n");
        let mut tree = parse_prototype(&mut lines, &ParseOptions::default()).unwrap();
        let err = expand_tree(&mut tree, &ExpandOptions::new()).unwrap_err();
        assert!(matches!(err, CoilError::Circular { .. }));
    }

    #[test]
    fn ignore_missing_preserves_unresolved_interpolation() {
        let mut lines = StrLines::new(r#"bar: "omgwtf${foo}${baz}""#);
        let mut tree = parse_prototype(&mut lines, &ParseOptions::default()).unwrap();
        expand_tree(
            &mut tree,
            &ExpandOptions {
                ignore_missing: IgnoreMissing::All,
                ..ExpandOptions::new()
            },
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(
            tree.get(root, "bar"),
            Some(Value::Leaf(Leaf::Str("omgwtf${foo}${baz}".to_owned())))
        );
    }

    #[test]
    fn extends_self_is_rejected() {
        let mut lines = StrLines::new("a: { @extends: . }");
        let err = parse_prototype(&mut lines, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, CoilError::Data { .. }));
    }
}
