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

use std::fmt;

use crate::error::ValidationError;
use crate::shared::*;

/// A package version, either a full Debian version string or `major.minor.patch`.
///
/// When the full string is set the numeric parts are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebVersion {
    full: String,
    major: u32,
    minor: u32,
    patch: u32,
    parts_set: bool, // Whether any numeric part was set explicitly
}

impl DebVersion {
    /// Returns true when neither a full string nor any numeric part was set.
    pub fn is_empty(&self) -> bool {
        self.full.is_empty() && !self.parts_set
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.full.is_empty() {
            f.write_str(&self.full)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

// Stores a package's metadata
// More about these fields in section 5.3 of the Debian policy:
// https://www.debian.org/doc/debian-policy/ch-controlfields.html
#[derive(Debug, Clone, Default)]
pub struct DebControl {
    name: String,
    version: DebVersion,
    architecture: String,
    maintainer: String,
    maintainer_email: String,
    homepage: String,
    section: String,
    priority: DebPriority,
    short_description: String,
    description: String, // Already folded, every line starts with a space
    vcs_type: VcsType,
    vcs_url: String,
    vcs_browser: String,
    built_using: String,
    depends: Vec<String>,
    recommends: Vec<String>,
    suggests: Vec<String>,
    conflicts: Vec<String>,
    provides: Vec<String>,
    replaces: Vec<String>,
}

impl DebControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that the mandatory fields are present.
    pub fn verify(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.architecture.trim().is_empty() {
            return Err(ValidationError::EmptyArchitecture);
        }
        if self.version.is_empty() {
            return Err(ValidationError::EmptyVersion);
        }
        Ok(())
    }

    /// Renders the `control` file, with `installed_size` given in bytes.
    pub fn serialize(&self, installed_size: u64) -> String {
        // Binding temporary values to longer living variables
        let version = self.version.to_string();
        let maintainer = format!("{} <{}>", self.maintainer, self.maintainer_email);
        let installed_size = installed_size_kib(installed_size).to_string();
        let vcs_field = format!("Vcs-{}", self.vcs_type.as_str());
        let vcs_url = match self.vcs_type {
            VcsType::Unset => "",
            _ => self.vcs_url.as_str(),
        };
        let depends = self.depends.join(", ");
        let recommends = self.recommends.join(", ");
        let suggests = self.suggests.join(", ");
        let conflicts = self.conflicts.join(", ");
        let provides = self.provides.join(", ");
        let replaces = self.replaces.join(", ");

        let mandatory = [
            ["Package", self.name.as_str()],
            ["Version", version.as_str()],
            ["Architecture", self.architecture.as_str()],
            ["Maintainer", maintainer.as_str()],
            ["Installed-Size", installed_size.as_str()],
        ];
        let optional = [
            ["Section", self.section.as_str()],
            ["Priority", self.priority.as_str()],
            ["Homepage", self.homepage.as_str()],
            [vcs_field.as_str(), vcs_url],
            ["Vcs-Browser", self.vcs_browser.as_str()],
            ["Built-Using", self.built_using.as_str()],
            ["Depends", depends.as_str()],
            ["Recommends", recommends.as_str()],
            ["Suggests", suggests.as_str()],
            ["Conflicts", conflicts.as_str()],
            ["Provides", provides.as_str()],
            ["Replaces", replaces.as_str()],
        ];

        let mut write_out = String::new();
        for field in mandatory {
            write_out.push_str(&format!("{}: {}\n", field[0], field[1]));
        }
        for field in optional {
            if !field[1].is_empty() {
                write_out.push_str(&format!("{}: {}\n", field[0], field[1]));
            }
        }
        write_out.push_str(&format!("Description: {}\n", self.short_description));
        if !self.description.is_empty() {
            write_out.push_str(&self.description);
            write_out.push('\n');
        }
        write_out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &DebVersion {
        &self.version
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    pub fn maintainer(&self) -> &str {
        &self.maintainer
    }

    pub fn maintainer_email(&self) -> &str {
        &self.maintainer_email
    }

    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn priority(&self) -> DebPriority {
        self.priority
    }

    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    /// The long description in its folded form.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn vcs_type(&self) -> VcsType {
        self.vcs_type
    }

    pub fn vcs_url(&self) -> &str {
        &self.vcs_url
    }

    pub fn vcs_browser(&self) -> &str {
        &self.vcs_browser
    }

    pub fn built_using(&self) -> &str {
        &self.built_using
    }

    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn recommends(&self) -> &[String] {
        &self.recommends
    }

    pub fn suggests(&self) -> &[String] {
        &self.suggests
    }

    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    pub fn provides(&self) -> &[String] {
        &self.provides
    }

    pub fn replaces(&self) -> &[String] {
        &self.replaces
    }

    // Mutators used by DebPackage's builder methods

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn set_version(&mut self, version: &str) {
        self.version.full = version.to_string();
    }

    pub(crate) fn set_version_major(&mut self, major: u32) {
        self.version.major = major;
        self.version.parts_set = true;
    }

    pub(crate) fn set_version_minor(&mut self, minor: u32) {
        self.version.minor = minor;
        self.version.parts_set = true;
    }

    pub(crate) fn set_version_patch(&mut self, patch: u32) {
        self.version.patch = patch;
        self.version.parts_set = true;
    }

    pub(crate) fn set_architecture(&mut self, architecture: &str) {
        self.architecture = architecture.to_string();
    }

    pub(crate) fn set_maintainer(&mut self, maintainer: &str) {
        self.maintainer = maintainer.to_string();
    }

    pub(crate) fn set_maintainer_email(&mut self, email: &str) {
        self.maintainer_email = email.to_string();
    }

    pub(crate) fn set_homepage(&mut self, homepage: &str) {
        self.homepage = homepage.to_string();
    }

    pub(crate) fn set_section(&mut self, section: &str) {
        self.section = section.to_string();
    }

    pub(crate) fn set_priority(&mut self, priority: DebPriority) {
        self.priority = priority;
    }

    pub(crate) fn set_short_description(&mut self, description: &str) {
        self.short_description = description.to_string();
    }

    pub(crate) fn set_description(&mut self, description: &str) {
        self.description = fold_description(description);
    }

    pub(crate) fn set_vcs_type(&mut self, vcs: VcsType) {
        self.vcs_type = vcs;
    }

    pub(crate) fn set_vcs_url(&mut self, url: &str) {
        self.vcs_url = url.to_string();
    }

    pub(crate) fn set_vcs_browser(&mut self, url: &str) {
        self.vcs_browser = url.to_string();
    }

    pub(crate) fn set_built_using(&mut self, info: &str) {
        self.built_using = info.to_string();
    }

    pub(crate) fn relation_mut(&mut self, relation: Relation) -> &mut Vec<String> {
        match relation {
            Relation::Depends => &mut self.depends,
            Relation::Recommends => &mut self.recommends,
            Relation::Suggests => &mut self.suggests,
            Relation::Conflicts => &mut self.conflicts,
            Relation::Provides => &mut self.provides,
            Relation::Replaces => &mut self.replaces,
        }
    }
}

// Relationship fields, see
// https://www.debian.org/doc/debian-policy/ch-relationships.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    Depends,
    Recommends,
    Suggests,
    Conflicts,
    Provides,
    Replaces,
}

// Installed-Size is in KiB, rounded up
fn installed_size_kib(bytes: u64) -> u64 {
    bytes.div_ceil(1024)
}

// Continuation lines of a multi-line field start with a space
fn fold_description(description: &str) -> String {
    let description = description.trim_end_matches(['\r', '\n']).replace("\r\n", "\n");
    if description.is_empty() {
        return String::new();
    }
    format!(" {}", description.replace('\n', "\n "))
}
