//! Renders an expanded [`Tree`] back to coil source text.
//!
//! Two forms are produced, both valid input to [`crate::parse`]:
//! [`serialize_nested`] (brace syntax, one key-value pair per line, four
//! spaces per level) and [`serialize_flat`] (dotted key paths at the top
//! level, e.g. `a.b.c: 1`).

use crate::arena::{StructId, Tree};
use crate::value::{Leaf, Value};

/// Renders `tree` in nested brace form.
pub fn serialize_nested(tree: &Tree) -> String {
    let mut out = String::new();
    write_struct_body(tree, tree.root(), 0, &mut out);
    out
}

/// Renders `tree` with every leaf/list/link emitted as a dotted top-level
/// key rather than nested braces; struct boundaries become `.` in the key.
pub fn serialize_flat(tree: &Tree) -> String {
    let mut out = String::new();
    write_flat(tree, tree.root(), &[], &mut out);
    out
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn write_struct_body(tree: &Tree, id: StructId, depth: usize, out: &mut String) {
    for key in tree.keys(id) {
        let value = tree.get(id, &key).expect("key came from keys()");
        out.push_str(&indent(depth));
        out.push_str(&key);
        match value {
            Value::Struct(child) => {
                if tree.is_empty(child) {
                    out.push_str(": {}\n");
                } else {
                    out.push_str(": {\n");
                    write_struct_body(tree, child, depth + 1, out);
                    out.push_str(&indent(depth));
                    out.push_str("}\n");
                }
            }
            other => {
                out.push_str(": ");
                out.push_str(&serialize_value(&other));
                out.push('\n');
            }
        }
    }
}

fn write_flat(tree: &Tree, id: StructId, prefix: &[String], out: &mut String) {
    for key in tree.keys(id) {
        let value = tree.get(id, &key).expect("key came from keys()");
        let mut path = prefix.to_vec();
        path.push(key);
        match value {
            Value::Struct(child) => write_flat(tree, child, &path, out),
            other => {
                out.push_str(&path.join("."));
                out.push_str(": ");
                out.push_str(&serialize_value(&other));
                out.push('\n');
            }
        }
    }
}

fn serialize_value(value: &Value) -> String {
    match value {
        Value::Leaf(leaf) => serialize_leaf(leaf),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_value).collect();
            format!("[{}]", rendered.join(" "))
        }
        Value::Link(link) => link.path.clone(),
        Value::Struct(_) => unreachable!("structs are written via write_struct_body"),
    }
}

fn serialize_leaf(leaf: &Leaf) -> String {
    match leaf {
        Leaf::Int(v) => v.to_string(),
        Leaf::Float(v) => v.to_string(),
        Leaf::Bool(true) => "True".to_owned(),
        Leaf::Bool(false) => "False".to_owned(),
        Leaf::Null => "None".to_owned(),
        Leaf::Str(s) => format!("\"{}\"", escape_string(s)),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_prototype, ParseOptions};
    use crate::source::StrLines;

    fn parse(src: &str) -> Tree {
        let mut lines = StrLines::new(src);
        parse_prototype(&mut lines, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn nested_round_trips_through_the_parser() {
        let tree = parse("a: 1\nb: { c: \"x\" }\n");
        let text = serialize_nested(&tree);
        let reparsed = parse(&text);
        assert_eq!(tree.get(tree.root(), "a"), reparsed.get(reparsed.root(), "a"));
    }

    #[test]
    fn flat_emits_dotted_paths() {
        let tree = parse("a: { b: { c: 1 } }\n");
        let text = serialize_flat(&tree);
        assert_eq!(text, "a.b.c: 1\n");
    }

    #[test]
    fn strings_escape_quotes_and_backslashes() {
        assert_eq!(escape_string("a\"b\\c"), "a\\\"b\\\\c");
    }
}
