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

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::control::DebControl;
use crate::data::DataArchive;
use crate::directory::DirectoryIndex;
use crate::error::{DebError, Result};
use crate::options::BuildOptions;
use crate::targz::{TarGzWriter, EXEC_MODE, FILE_MODE};

// Scripts dpkg runs, which it requires to be executable
// https://www.debian.org/doc/debian-policy/ch-maintainerscripts.html
const MAINTAINER_SCRIPTS: [&str; 5] = ["preinst", "postinst", "prerm", "postrm", "config"];

// Members generated at finalize time, which can't be supplied as extras
const RESERVED: [&str; 2] = ["control", "md5sums"];

const CONFFILES: &str = "conffiles";

// Everything that ends up in control.tar.gz besides the control file itself.
// Kept in memory until the package is written.
#[derive(Debug, Default)]
pub(crate) struct ControlArchive {
    // Maintainer scripts and other members, by name
    extras: Vec<(String, Vec<u8>)>,
    conffiles: Vec<String>, // Absolute paths
}

impl ControlArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member such as a maintainer script, with CRLF line endings
    /// normalized to LF. A later member with the same name replaces the earlier one.
    pub fn add_extra(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        let reserved = RESERVED.contains(&name);
        if name.is_empty() || name.contains('/') || name == "." || name == ".." || reserved {
            return Err(DebError::InvalidValue {
                field: "control member name",
                value: name.to_string(),
            });
        }
        let contents = unix_line_endings(contents);
        match self.extras.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = contents,
            None => self.extras.push((name.to_string(), contents)),
        }
        debug!(name, "added control member");
        Ok(())
    }

    /// Marks the file at `path` in the data archive as a configuration file.
    pub fn mark_config_file(&mut self, path: &str) -> Result<()> {
        let path = DirectoryIndex::normalize(path).ok_or_else(|| DebError::InvalidValue {
            field: "configuration file",
            value: path.to_string(),
        })?;
        if !self.conffiles.contains(&path) {
            self.conffiles.push(path);
        }
        Ok(())
    }

    pub fn conffiles(&self) -> &[String] {
        &self.conffiles
    }

    /// Writes control.tar.gz from `control` and the manifest of `data`, then
    /// closes both archives, control first.
    ///
    /// Members are written in the order conffiles, control, md5sums, extras.
    pub fn finalize(
        &self,
        control: &DebControl,
        data: DataArchive,
        options: &BuildOptions,
        mtime: u64,
    ) -> Result<(NamedTempFile, NamedTempFile)> {
        let mut tgz = TarGzWriter::new(options, mtime)?;

        if let Some((_, custom)) = self.extras.iter().find(|(name, _)| name == CONFFILES) {
            if !self.conffiles.is_empty() {
                warn!(
                    marked = self.conffiles.len(),
                    "custom conffiles member replaces the marked configuration files"
                );
            }
            tgz.add_bytes(CONFFILES, custom, FILE_MODE)?;
        } else if !self.conffiles.is_empty() {
            let mut listing = self.conffiles.join("\n");
            listing.push('\n');
            tgz.add_bytes(CONFFILES, listing.as_bytes(), FILE_MODE)?;
        }

        let control_file = control.serialize(data.written());
        tgz.add_bytes("control", control_file.as_bytes(), FILE_MODE)?;
        tgz.add_bytes("md5sums", data.manifest().md5sums().as_bytes(), FILE_MODE)?;

        for (name, contents) in self.extras.iter().filter(|(name, _)| name != CONFFILES) {
            let mode = if MAINTAINER_SCRIPTS.contains(&name.as_str()) {
                EXEC_MODE
            } else {
                FILE_MODE
            };
            tgz.add_bytes(name, contents, mode)?;
        }

        let control_tgz = tgz.finish()?;
        let data_tgz = data.finish()?;
        Ok((control_tgz, data_tgz))
    }
}

// Replaces every CRLF with LF, leaving any other bytes alone
fn unix_line_endings(contents: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(contents.len());
    let mut bytes = contents.iter().peekable();
    while let Some(&byte) = bytes.next() {
        if byte == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}
