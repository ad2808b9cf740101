/*
    deb-builder - Rust library for assembling and signing Deb packages
    Copyright (C) 2023  NotSludgeBomb

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Bookkeeping of the directory entries already present in `data.tar.gz`.
//!
//! Paths are kept in their normalized form: cleaned of `.`, `..` and repeated
//! separators, always `/`-separated, rooted at `/` and without a trailing slash.
//! The root itself is never an entry.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DirectoryIndex {
    dirs: Vec<String>, // In insertion order
    seen: HashSet<String>,
}

impl DirectoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `path`, returning `None` when it refers to the root (`/`, `.`, or empty).
    pub fn normalize(path: &str) -> Option<String> {
        let components = components(path);
        if components.is_empty() {
            None
        } else {
            Some(format!("/{}", components.join("/")))
        }
    }

    /// Returns `dir` and every ancestor of it, from the root downwards.
    pub fn ancestry(dir: &str) -> Vec<String> {
        let mut current = String::new();
        components(dir)
            .into_iter()
            .map(|component| {
                current.push('/');
                current.push_str(&component);
                current.clone()
            })
            .collect()
    }

    /// Returns the ancestors of the file at `path`, from the root down to its parent.
    pub fn parents(path: &str) -> Vec<String> {
        let mut chain = Self::ancestry(path);
        chain.pop();
        chain
    }

    /// Directories of `dir`'s ancestry (itself included) that have no entry yet.
    pub fn missing(&self, dir: &str) -> Vec<String> {
        Self::ancestry(dir)
            .into_iter()
            .filter(|d| !self.seen.contains(d))
            .collect()
    }

    /// Directories above the file at `path` that have no entry yet.
    pub fn missing_parents(&self, path: &str) -> Vec<String> {
        Self::parents(path)
            .into_iter()
            .filter(|d| !self.seen.contains(d))
            .collect()
    }

    pub fn contains(&self, dir: &str) -> bool {
        match Self::normalize(dir) {
            Some(dir) => self.seen.contains(&dir),
            None => true,
        }
    }

    /// Records `dir`. Returns false if it was already present or is the root.
    pub fn insert(&mut self, dir: &str) -> bool {
        let dir = match Self::normalize(dir) {
            Some(dir) => dir,
            None => return false,
        };
        if !self.seen.insert(dir.clone()) {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

// Splits a path into cleaned components, resolving "." and ".." lexically
fn components(path: &str) -> Vec<String> {
    let path = if std::path::MAIN_SEPARATOR != '/' {
        path.replace(std::path::MAIN_SEPARATOR, "/")
    } else {
        path.to_string()
    };
    let mut out: Vec<String> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            name => out.push(name.to_string()),
        }
    }
    out
}
