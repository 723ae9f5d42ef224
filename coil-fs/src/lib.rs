//! Filesystem and package-root collaborator used by `@file` and `@package`
//! includes.
//!
//! The core never touches `std::fs` itself (see [`coil_core::FileSource`]);
//! this crate supplies two implementations: [`DiskFileSource`], backed by
//! real files, and [`MemoryFileSource`], an in-memory tree useful for tests
//! and embedded configuration bundles.

use std::collections::HashMap;
use std::fs;
use std::io;

use anyhow::{bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use coil_core::{FileSource, LineSource};
use log::debug;

/// Reads `@file`/`@package` targets straight off the real filesystem.
pub struct DiskFileSource;

impl FileSource for DiskFileSource {
    fn open_for_read(&self, absolute_path: &str) -> io::Result<Box<dyn LineSource>> {
        debug!("opening {absolute_path} for read");
        let text = fs::read_to_string(absolute_path)?;
        Ok(Box::new(OwnedLines::new(text)))
    }

    fn is_file(&self, absolute_path: &str) -> bool {
        fs::metadata(absolute_path)
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn is_absolute(&self, path: &str) -> bool {
        Utf8Path::new(path).is_absolute()
    }

    fn join(&self, base: &str, relative: &str) -> String {
        if relative.is_empty() {
            base.to_owned()
        } else if self.is_absolute(relative) || base.is_empty() {
            relative.to_owned()
        } else {
            Utf8PathBuf::from(base).join(relative).into_string()
        }
    }

    fn dirname(&self, path: &str) -> String {
        Utf8Path::new(path)
            .parent()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_default()
    }
}

/// A purely in-memory set of named documents, addressed by absolute path.
/// Useful for tests that exercise `@file`/`@package` without touching disk.
#[derive(Default)]
pub struct MemoryFileSource {
    files: HashMap<String, String>,
}

impl MemoryFileSource {
    pub fn new() -> Self {
        MemoryFileSource::default()
    }

    /// Registers `contents` under `absolute_path`, overwriting any existing
    /// entry there.
    pub fn add(&mut self, absolute_path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(absolute_path.into(), contents.into());
    }
}

impl FileSource for MemoryFileSource {
    fn open_for_read(&self, absolute_path: &str) -> io::Result<Box<dyn LineSource>> {
        match self.files.get(absolute_path) {
            Some(text) => Ok(Box::new(OwnedLines::new(text.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such in-memory file: {absolute_path}"),
            )),
        }
    }

    fn is_file(&self, absolute_path: &str) -> bool {
        self.files.contains_key(absolute_path)
    }
}

/// Finds the on-disk root directory that contains `package` (a dotted
/// package name), by probing `roots` in order for a subdirectory holding
/// `marker`. Mirrors the search a Python-style `@package` import performs
/// against `sys.path`.
pub fn find_package_root(roots: &[String], package: &str, marker: &str) -> Result<Utf8PathBuf> {
    for root in roots {
        let mut candidate = Utf8PathBuf::from(root);
        for part in package.split('.') {
            candidate.push(part);
        }
        if candidate.join(marker).is_file() {
            return Ok(candidate);
        }
    }
    bail!("unable to find package '{package}' under any of {roots:?}")
}

/// A [`LineSource`] over an owned string, used by both [`DiskFileSource`]
/// (a file read fully up front) and [`MemoryFileSource`].
struct OwnedLines {
    lines: std::vec::IntoIter<String>,
}

impl OwnedLines {
    fn new(text: String) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        OwnedLines {
            lines: lines.into_iter(),
        }
    }
}

impl LineSource for OwnedLines {
    fn next_line(&mut self) -> Option<String> {
        self.lines.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_round_trips_added_file() {
        let mut fs = MemoryFileSource::new();
        fs.add("/a/b.coil", "x: 1\n");
        assert!(fs.is_file("/a/b.coil"));
        assert!(!fs.is_file("/a/missing.coil"));
        let mut lines = fs.open_for_read("/a/b.coil").unwrap();
        assert_eq!(lines.next_line().as_deref(), Some("x: 1"));
        assert_eq!(lines.next_line(), None);
    }

    #[test]
    fn disk_source_joins_relative_paths() {
        let fs = DiskFileSource;
        assert_eq!(fs.join("/a/b", "c.coil"), "/a/b/c.coil");
        assert_eq!(fs.join("/a/b", "/c.coil"), "/c.coil");
        assert_eq!(fs.dirname("/a/b/c.coil"), "/a/b");
    }
}
