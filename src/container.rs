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
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{IoContext, Result};
use crate::shared::DEBIAN_BINARY;

// dpkg writes its members as regular files with mode 0644
const MEMBER_MODE: u32 = 0o100644;

pub(crate) const CONTROL_MEMBER: &str = "control.tar.gz";
pub(crate) const DATA_MEMBER: &str = "data.tar.gz";
pub(crate) const DIGEST_MEMBER: &str = "digests.asc";

// Opens a finished intermediate archive for reading from the start
pub(crate) fn reopen(archive: &NamedTempFile) -> Result<(fs::File, u64)> {
    let file = archive.reopen().io_context(|| "cannot reopen intermediate archive")?;
    let size = file
        .metadata()
        .io_context(|| "cannot stat intermediate archive")?
        .len();
    Ok((file, size))
}

fn append<W: Write, R: Read>(
    archive: &mut ar::Builder<W>,
    name: &str,
    size: u64,
    mtime: u64,
    contents: R,
) -> Result<()> {
    let mut header = ar::Header::new(name.as_bytes().to_vec(), size);
    header.set_mode(MEMBER_MODE);
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    archive
        .append(&header, contents)
        .io_context(|| format!("cannot add {} to deb", name))
}

/// Writes the final `.deb` to `path`: debian-binary, control.tar.gz,
/// data.tar.gz and, when present, digests.asc, in that order.
///
/// The package is assembled next to `path` and renamed into place, so either
/// the complete package exists afterwards or nothing does.
pub(crate) fn write_container(
    path: &Path,
    mtime: u64,
    control: &NamedTempFile,
    data: &NamedTempFile,
    digest: Option<&str>,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = tempfile::Builder::new()
        .prefix(".deb-builder")
        .suffix(".deb")
        .tempfile_in(dir)
        .io_context(|| format!("unable to create: {}", path.display()))?;

    let mut archive = ar::Builder::new(BufWriter::new(staging));
    append(
        &mut archive,
        "debian-binary",
        DEBIAN_BINARY.len() as u64,
        mtime,
        DEBIAN_BINARY.as_bytes(),
    )?;
    let (control_file, control_size) = reopen(control)?;
    append(&mut archive, CONTROL_MEMBER, control_size, mtime, control_file)?;
    let (data_file, data_size) = reopen(data)?;
    append(&mut archive, DATA_MEMBER, data_size, mtime, data_file)?;
    if let Some(digest) = digest {
        append(
            &mut archive,
            DIGEST_MEMBER,
            digest.len() as u64,
            mtime,
            digest.as_bytes(),
        )?;
    }

    let staging = archive
        .into_inner()
        .io_context(|| format!("cannot finish {}", path.display()))?
        .into_inner()
        .map_err(|e| e.into_error())
        .io_context(|| format!("cannot flush {}", path.display()))?;
    staging
        .as_file()
        .sync_all()
        .io_context(|| format!("cannot sync {}", path.display()))?;
    staging
        .persist(path)
        .map_err(|e| e.error)
        .io_context(|| format!("cannot move package into {}", path.display()))?;
    Ok(())
}
