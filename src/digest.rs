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

//! The `digests.asc` member of signed packages.
//!
//! The digest lists the MD5, SHA1 and size of every other member of the
//! package in the format dpkg-sig reads, and is clear-signed as a whole.
//! An example of the plaintext:
//!
//! ```text
//! Version: 4
//! Signer: Foo Bar <foo@bar.com>
//! Date: Mon Jan  2 15:04:05 2006
//! Role: builder
//! Files:
//! 	3cf918272ffa5de195752d73f3da3e5e 7959c969e092f2a5a8604e2287807ac5b1b384ad 4 debian-binary
//! 	79bb73dbb522dc1a2dd1b9c2ec89fc79 26d29d15aad5c0e051d07571e28da2bc0009707e 366 control.tar.gz
//! 	e1a6e48c95a760170029ef7872cec994 e02ed99e5c4fd847bde12b4c2c30dd814b26ec27 136 data.tar.gz
//! ```

use std::fmt;
use std::io::{self, Read};

use chrono::{DateTime, Local, TimeZone, Utc};
use sha1::{Digest as _, Sha1};

use crate::error::Result;

/// Digest format understood by dpkg-sig 0.13.1+nmu2 and later.
pub const DIGEST_VERSION: u32 = 4;

/// The role of the signature; the package builder signs it.
pub const DIGEST_ROLE: &str = "builder";

/// Produces the clear-signed form of a digest.
pub trait DigestSigner {
    /// The identity written to the `Signer:` line, usually `Name <email>`.
    fn identity(&self) -> Result<String>;

    /// Clear-signs `plaintext`, returning the ASCII-armored result.
    fn clear_sign(&self, plaintext: &str) -> Result<String>;
}

/// Checksums of one package member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub name: String,
    pub md5: String,
    pub sha1: String,
    pub size: u64,
}

impl DigestEntry {
    /// Hashes everything `reader` yields.
    pub fn from_reader<R: Read>(name: &str, mut reader: R) -> io::Result<Self> {
        let mut md5 = md5::Context::new();
        let mut sha1 = Sha1::new();
        let mut size = 0u64;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            md5.consume(&buf[..n]);
            sha1.update(&buf[..n]);
            size += n as u64;
        }
        Ok(Self {
            name: name.to_string(),
            md5: format!("{:x}", md5.compute()),
            sha1: format!("{:x}", sha1.finalize()),
            size,
        })
    }

    pub fn from_bytes(name: &str, contents: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            md5: format!("{:x}", md5::compute(contents)),
            sha1: format!("{:x}", Sha1::digest(contents)),
            size: contents.len() as u64,
        }
    }
}

/// The plaintext digest of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    signer: String,
    date: String,
    entries: Vec<DigestEntry>,
}

impl Digest {
    pub fn new(signer: &str, date: &str) -> Self {
        Self {
            signer: signer.to_string(),
            date: date.to_string(),
            entries: Vec::new(),
        }
    }

    /// Appends a member; members are listed in the order they are pushed.
    pub fn push(&mut self, entry: DigestEntry) {
        self.entries.push(entry);
    }

    pub fn signer(&self) -> &str {
        &self.signer
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn entries(&self) -> &[DigestEntry] {
        &self.entries
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version: {}", DIGEST_VERSION)?;
        writeln!(f, "Signer: {}", self.signer)?;
        writeln!(f, "Date: {}", self.date)?;
        writeln!(f, "Role: {}", DIGEST_ROLE)?;
        // The trailing space after "Files:" is part of the format
        writeln!(f, "Files: ")?;
        for entry in &self.entries {
            writeln!(f, "\t{} {} {} {}", entry.md5, entry.sha1, entry.size, entry.name)?;
        }
        Ok(())
    }
}

/// Formats a timestamp the way the `Date:` line expects, e.g. `Mon Jan  2 15:04:05 2006`.
///
/// Pinned timestamps are rendered in UTC, the current time in local time.
/// Timestamps past the last representable date are clamped to it.
pub fn digest_date(timestamp: Option<u64>) -> String {
    const FORMAT: &str = "%a %b %e %H:%M:%S %Y";
    match timestamp {
        Some(secs) => {
            let secs = i64::try_from(secs).unwrap_or(i64::MAX);
            let pinned = Utc
                .timestamp_opt(secs, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            pinned.format(FORMAT).to_string()
        }
        None => {
            let now: DateTime<Local> = Local::now();
            now.format(FORMAT).to_string()
        }
    }
}
