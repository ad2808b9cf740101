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

use std::io::{Error, ErrorKind, Read, Write};

use flate2::write::GzEncoder;
use tempfile::NamedTempFile;

use crate::error::{IoContext, Result};
use crate::options::BuildOptions;

pub(crate) const FILE_MODE: u32 = 0o644;
pub(crate) const EXEC_MODE: u32 = 0o755;
pub(crate) const DIR_MODE: u32 = 0o755;

// A tar archive streamed through gzip into a temporary file.
// The file is deleted when the writer, or the file returned by finish(), is dropped.
pub(crate) struct TarGzWriter {
    builder: tar::Builder<GzEncoder<NamedTempFile>>,
    // Uncompressed bytes of file contents
    written: u64,
    mtime: u64,
}

impl TarGzWriter {
    pub fn new(options: &BuildOptions, mtime: u64) -> Result<Self> {
        options.prepare_temp_dir()?;
        let file = tempfile::Builder::new()
            .prefix("deb-builder")
            .suffix(".tar.gz")
            .tempfile_in(options.temp_dir())
            .io_context(|| {
                format!("cannot create temp file in {}", options.temp_dir().display())
            })?;
        Ok(Self {
            builder: tar::Builder::new(GzEncoder::new(file, options.compression())),
            written: 0,
            mtime,
        })
    }

    // Every entry is owned by root
    fn header(entry_type: tar::EntryType, mode: u32, size: u64, mtime: u64) -> Result<tar::Header> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode);
        header.set_size(size);
        header.set_mtime(mtime);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root")?;
        header.set_groupname("root")?;
        Ok(header)
    }

    // Archive member names never start with "/"
    fn member_name(name: &str) -> Result<&str> {
        let trimmed = name.trim_matches('/');
        if trimmed.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty destination filename").into());
        }
        Ok(trimmed)
    }

    /// Adds a directory entry.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let name = Self::member_name(name)?;
        let mut header = Self::header(tar::EntryType::Directory, DIR_MODE, 0, self.mtime)?;
        self.builder
            .append_data(&mut header, name, std::io::empty())
            .io_context(|| format!("cannot write directory entry {}", name))
    }

    /// Adds a regular file of exactly `size` bytes read from `reader`.
    pub fn add_reader<R: Read>(
        &mut self,
        name: &str,
        size: u64,
        mode: u32,
        mtime: u64,
        reader: R,
    ) -> Result<()> {
        let name = Self::member_name(name)?;
        let mut header = Self::header(tar::EntryType::Regular, mode, size, mtime)?;
        self.builder
            .append_data(&mut header, name, reader.take(size))
            .io_context(|| format!("cannot write file entry {}", name))?;
        self.written += size;
        Ok(())
    }

    /// Adds a regular file with in-memory contents.
    pub fn add_bytes(&mut self, name: &str, contents: &[u8], mode: u32) -> Result<()> {
        let mtime = self.mtime;
        self.add_reader(name, contents.len() as u64, mode, mtime, contents)
    }

    /// Returns the uncompressed size of all file contents written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes the tar trailer, closes the gzip stream and hands back the file.
    pub fn finish(self) -> Result<NamedTempFile> {
        let encoder = self
            .builder
            .into_inner()
            .io_context(|| "cannot finish tar stream")?;
        let mut file = encoder.finish().io_context(|| "cannot finish gzip stream")?;
        file.flush().io_context(|| "cannot flush archive")?;
        Ok(file)
    }
}
