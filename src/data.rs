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

use std::fs;
use std::io::{Error, ErrorKind, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::directory::DirectoryIndex;
use crate::error::{DebError, IoContext, Result};
use crate::options::BuildOptions;
use crate::targz::{TarGzWriter, EXEC_MODE, FILE_MODE};

/// One line of the md5sums ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    // Archive member name, without leading "/"
    path: String,
    md5: String, // Lowercase hex
    size: u64,
}

impl ManifestEntry {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn md5(&self) -> &str {
        &self.md5
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Every file added to the data archive, in the order it was added.
#[derive(Debug, Clone, Default)]
pub struct FileManifest {
    entries: Vec<ManifestEntry>,
}

impl FileManifest {
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the contents of the `md5sums` control member.
    pub fn md5sums(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}  {}\n", entry.md5, entry.path))
            .collect()
    }

    fn push(&mut self, path: &str, md5: md5::Digest, size: u64) {
        self.entries.push(ManifestEntry {
            path: path.trim_start_matches('/').to_string(),
            md5: format!("{:x}", md5),
            size,
        });
    }
}

// Hashes everything read through it
struct Md5Reader<R> {
    inner: R,
    context: md5::Context,
    count: u64,
}

impl<R: Read> Md5Reader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            context: md5::Context::new(),
            count: 0,
        }
    }

    fn finish(self) -> (md5::Digest, u64) {
        (self.context.compute(), self.count)
    }
}

impl<R: Read> Read for Md5Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.context.consume(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

// The payload of the package, data.tar.gz
pub(crate) struct DataArchive {
    tgz: TarGzWriter,
    dirs: DirectoryIndex,
    manifest: FileManifest,
    mtime: u64,
    pinned: bool, // Source mtimes are replaced by `mtime`
}

impl DataArchive {
    pub fn new(options: &BuildOptions, mtime: u64) -> Result<Self> {
        Ok(Self {
            tgz: TarGzWriter::new(options, mtime)?,
            dirs: DirectoryIndex::new(),
            manifest: FileManifest::default(),
            mtime,
            pinned: options.timestamp().is_some(),
        })
    }

    /// Adds `dir` and every missing ancestor as directory entries.
    pub fn add_directory(&mut self, dir: &str) -> Result<()> {
        for missing in self.dirs.missing(dir) {
            self.emit_directory(&missing)?;
        }
        Ok(())
    }

    // Adds the directories above `dest`, root first
    fn add_parent_directories(&mut self, dest: &str) -> Result<()> {
        for missing in self.dirs.missing_parents(dest) {
            self.emit_directory(&missing)?;
        }
        Ok(())
    }

    fn emit_directory(&mut self, dir: &str) -> Result<()> {
        self.tgz.add_directory(dir)?;
        self.dirs.insert(dir);
        debug!(dir, "added directory");
        Ok(())
    }

    /// Streams the file at `src` into the archive as `dest`, or as `src` itself
    /// when no destination is given.
    pub fn add_file(&mut self, src: &Path, dest: Option<&str>) -> Result<()> {
        let dest = match dest {
            Some(dest) if !dest.is_empty() => dest.to_string(),
            _ => src.to_string_lossy().into_owned(),
        };

        // Everything that can fail on the source is checked before the
        // archive is touched
        let file = fs::File::open(src).io_context(|| format!("cannot open {}", src.display()))?;
        let metadata = file
            .metadata()
            .io_context(|| format!("cannot stat {}", src.display()))?;
        if metadata.is_dir() {
            return Err(DebError::io(
                format!("cannot add {}", src.display()),
                Error::new(ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        let path = DirectoryIndex::normalize(&dest).ok_or_else(|| DebError::InvalidValue {
            field: "destination",
            value: dest.clone(),
        })?;

        let mtime = if self.pinned {
            self.mtime
        } else {
            metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(self.mtime)
        };
        let size = metadata.len();

        self.add_parent_directories(&path)?;

        let mut reader = Md5Reader::new(file);
        self.tgz
            .add_reader(&path, size, file_mode(&metadata), mtime, &mut reader)?;
        let (md5, count) = reader.finish();
        if count != size {
            return Err(DebError::io(
                format!("cannot add {}", src.display()),
                Error::new(ErrorKind::UnexpectedEof, "file changed while it was being archived"),
            ));
        }
        self.manifest.push(&path, md5, size);
        debug!(src = %src.display(), dest = %path, size, "added file");
        Ok(())
    }

    /// Adds a file with in-memory contents as `dest`.
    pub fn add_bytes(&mut self, contents: &[u8], dest: &str) -> Result<()> {
        let path = DirectoryIndex::normalize(dest).ok_or_else(|| DebError::InvalidValue {
            field: "destination",
            value: dest.to_string(),
        })?;
        self.add_parent_directories(&path)?;
        self.tgz.add_bytes(&path, contents, FILE_MODE)?;
        self.manifest.push(&path, md5::compute(contents), contents.len() as u64);
        debug!(dest = %path, size = contents.len(), "added file from memory");
        Ok(())
    }

    pub fn manifest(&self) -> &FileManifest {
        &self.manifest
    }

    pub fn directories(&self) -> &DirectoryIndex {
        &self.dirs
    }

    /// Uncompressed size of every file in the archive, for Installed-Size.
    pub fn written(&self) -> u64 {
        self.tgz.written()
    }

    pub fn finish(self) -> Result<NamedTempFile> {
        self.tgz.finish()
    }
}

// Regular files are 0644, or 0755 when the source has any execute bit set
#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        EXEC_MODE
    } else {
        FILE_MODE
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    FILE_MODE
}
