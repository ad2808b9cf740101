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

//! A pure Rust library for assembling Deb packages.
//!
//! Packages are built with [`DebPackage`]: set the metadata, add files and
//! maintainer scripts, then write the `.deb`, optionally with a clear-signed
//! digest that dpkg-sig can verify. Contents are streamed through temporary
//! archives, see [`BuildOptions`] for where they go.

pub mod binary;
mod container;
mod control;
mod control_tar;
mod data;
pub mod digest;
mod directory;
mod error;
mod options;
mod shared;
pub mod sign;
mod targz;
#[cfg(test)]
mod test;

pub use binary::DebPackage;
pub use control::{DebControl, DebVersion};
pub use data::{FileManifest, ManifestEntry};
pub use digest::{Digest, DigestEntry, DigestSigner};
pub use directory::DirectoryIndex;
pub use error::{DebError, Result, ValidationError};
pub use options::BuildOptions;
pub use shared::*;
pub use sign::GpgSigner;
