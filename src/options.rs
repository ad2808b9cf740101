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
use std::path::{Path, PathBuf};

use flate2::Compression;
use tracing::debug;

use crate::error::{IoContext, Result};

/// Settings that control how a package is assembled, independent of its contents.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    // Where intermediate archives are buffered
    temp_dir: PathBuf,
    compression: Compression,
    // Fixed mtime for every entry, None means "now"
    timestamp: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            compression: Compression::default(),
            timestamp: None,
        }
    }
}

impl BuildOptions {
    /// Creates options with the system temporary directory, default compression
    /// and the current time for timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Same as `new()`, but honours `SOURCE_DATE_EPOCH` for reproducible timestamps.
    ///
    /// See <https://reproducible-builds.org/specs/source-date-epoch/>
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
            match epoch.trim().parse::<u64>() {
                Ok(secs) => options.timestamp = Some(secs),
                Err(_) => debug!(value = %epoch, "ignoring malformed SOURCE_DATE_EPOCH"),
            }
        }
        options
    }

    /// Sets the directory for intermediate files. It is created (mode 0700)
    /// when the first archive is opened, but never removed.
    pub fn set_temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the gzip compression level, clamped to 0..=9.
    pub fn set_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Pins every timestamp in the package to `secs` since the Unix epoch.
    pub fn set_timestamp(mut self, secs: u64) -> Self {
        self.timestamp = Some(secs);
        self
    }

    /// Returns the directory for intermediate files.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Returns the gzip compression level.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the pinned timestamp, if any.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    // The pinned timestamp or the current time
    pub(crate) fn mtime(&self) -> u64 {
        match self.timestamp {
            Some(secs) => secs,
            None => chrono::Utc::now().timestamp().max(0) as u64,
        }
    }

    pub(crate) fn prepare_temp_dir(&self) -> Result<()> {
        if self.temp_dir.is_dir() {
            return Ok(());
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.temp_dir)
            .io_context(|| format!("cannot create temp dir {}", self.temp_dir.display()))
    }
}
