//! Path algebra: parsing, validation and translation between absolute and
//! relative path forms.
//!
//! An absolute path is represented internally as a (possibly empty) list of
//! key segments read from the root — `@root` itself is the empty list. This
//! avoids re-parsing the `@root` sentinel at every step; [`absolute_string`]
//! converts back to the textual form used in diagnostics and `${...}`
//! rewriting.

use crate::error::{CoilError, Result};
use crate::location::Location;

/// Returns true if `path` begins with the absolute-path sentinel.
pub fn is_absolute(path: &str) -> bool {
    path == "@root" || path.starts_with("@root.")
}

/// Renders a sequence of key segments as the `@root.a.b` textual form.
pub fn absolute_string(segments: &[String]) -> String {
    if segments.is_empty() {
        "@root".to_owned()
    } else {
        format!("@root.{}", segments.join("."))
    }
}

/// Splits a textual path into validated, non-empty key segments, returning
/// the number of leading ascend levels implied by any relative prefix.
///
/// `dots == 0` and `dots == 1` are equivalent (both mean "relative to the
/// struct the path was written in"); each further dot ascends one level.
fn split_relative(path: &str, location: &Location) -> Result<(usize, Vec<String>)> {
    let dots = path.chars().take_while(|&c| c == '.').count();
    let names = &path[dots..];
    let segments = if names.is_empty() {
        Vec::new()
    } else {
        for part in names.split('.') {
            if part.is_empty() {
                return Err(CoilError::key_value(location.clone(), path));
            }
        }
        names.split('.').map(str::to_owned).collect()
    };
    Ok((dots, segments))
}

/// Translates `path` into its absolute form, given the absolute segments of
/// the struct it is relative to (`ref_segments`). An already-absolute path
/// is returned unchanged (after validating it has no mid-path `..`).
pub fn absolute_path(
    ref_segments: &[String],
    path: &str,
    location: &Location,
) -> Result<Vec<String>> {
    if path == "@root" {
        return Ok(Vec::new());
    }
    if let Some(rest) = path.strip_prefix("@root.") {
        for part in rest.split('.') {
            if part.is_empty() {
                return Err(CoilError::key_value(location.clone(), path));
            }
        }
        return Ok(rest.split('.').map(str::to_owned).collect());
    }

    let (dots, names) = split_relative(path, location)?;
    let ascend = dots.saturating_sub(1);
    if ascend > ref_segments.len() {
        return Err(CoilError::data(
            location.clone(),
            absolute_string(ref_segments),
            format!("relative reference past root: {path}"),
        ));
    }
    let mut result = ref_segments[..ref_segments.len() - ascend].to_vec();
    result.extend(names);
    Ok(result)
}

/// Computes the shortest relative path from `ref_segments` to the absolute
/// path `target_segments`. Mirrors the reference implementation's
/// common-prefix/dot-counting algorithm exactly, including the `ref == path`
/// tie-break (which yields `"."`).
pub fn relative_path(ref_segments: &[String], target_segments: &[String]) -> String {
    // Work with "@root" included as an explicit leading element so the
    // common-prefix math matches the reference implementation's indices.
    let mut full_ref = vec!["@root".to_owned()];
    full_ref.extend(ref_segments.iter().cloned());
    let mut full_target = vec!["@root".to_owned()];
    full_target.extend(target_segments.iter().cloned());

    let mut common = 0usize;
    for i in 0..full_ref.len().min(full_target.len()) {
        if full_ref[i] == full_target[i] {
            common = i;
        } else {
            break;
        }
    }

    let dots = full_ref.len() - common;
    let names = full_target[common + 1..].join(".");

    if dots == 1 && !names.is_empty() {
        names
    } else {
        format!("{}{}", ".".repeat(dots), names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::unknown()
    }

    #[test]
    fn absolute_path_from_root() {
        let segs = absolute_path(&[], "@root.a.b", &loc()).unwrap();
        assert_eq!(segs, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn absolute_path_bare_is_current() {
        let ref_segs = vec!["x".to_owned(), "y".to_owned()];
        let segs = absolute_path(&ref_segs, "z", &loc()).unwrap();
        assert_eq!(segs, vec!["x".to_owned(), "y".to_owned(), "z".to_owned()]);
    }

    #[test]
    fn absolute_path_single_dot_same_as_bare() {
        let ref_segs = vec!["x".to_owned()];
        let a = absolute_path(&ref_segs, "z", &loc()).unwrap();
        let b = absolute_path(&ref_segs, ".z", &loc()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn absolute_path_ascends_with_extra_dots() {
        let ref_segs = vec!["x".to_owned(), "y".to_owned()];
        let segs = absolute_path(&ref_segs, "..z", &loc()).unwrap();
        assert_eq!(segs, vec!["x".to_owned(), "z".to_owned()]);
    }

    #[test]
    fn absolute_path_past_root_errors() {
        let ref_segs = vec!["x".to_owned()];
        assert!(absolute_path(&ref_segs, "...z", &loc()).is_err());
    }

    #[test]
    fn relative_path_duality() {
        let ref_segs = vec!["a".to_owned(), "b".to_owned()];
        let target = vec!["a".to_owned(), "c".to_owned(), "d".to_owned()];
        let rel = relative_path(&ref_segs, &target);
        let back = absolute_path(&ref_segs, &rel, &loc()).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn relative_path_same_is_dot() {
        let ref_segs = vec!["a".to_owned()];
        assert_eq!(relative_path(&ref_segs, &ref_segs), ".");
    }
}
