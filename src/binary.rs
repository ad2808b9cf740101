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

//! Build binary Deb packages.
//!
//! Binary packages contain executable programs, documentation for said executables,
//! configuration files, libraries, etc. Basically, anything that's not source code.
//!
//! Files are streamed into the package as they are added, so a package never
//! holds its contents in memory.
//!
//! # Example
//!
//! ```no_run
//! use deb_builder::*;
//!
//! fn main() -> deb_builder::Result<()> {
//!     let mut package = DebPackage::new()
//!         .set_name("example")
//!         .set_version("0.1.0")
//!         .set_architecture(DebArchitecture::Amd64)
//!         .set_maintainer("Foo Bar")
//!         .set_maintainer_email("foo@bar.com")
//!         .set_short_description("deb-builder example")
//!         .with_depend("bash");
//!
//!     package.add_file_to("target/release/example", "/usr/bin/example")?;
//!     package.add_file_string("# example configuration\n", "/etc/example.conf")?;
//!     package.mark_config_file("/etc/example.conf")?;
//!
//!     // Writes example_0.1.0_amd64.deb
//!     package.write("")?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::container::{self, CONTROL_MEMBER, DATA_MEMBER};
use crate::control::{DebControl, DebVersion, Relation};
use crate::control_tar::ControlArchive;
use crate::data::{DataArchive, ManifestEntry};
use crate::digest::{digest_date, Digest, DigestEntry, DigestSigner};
use crate::error::{DebError, IoContext, Result};
use crate::options::BuildOptions;
use crate::shared::*;

#[derive(Debug)]
enum PackageState {
    Open,
    Closed,
    Errored(DebError), // The first terminal error, returned by every later call
}

/// A Deb package being assembled.
///
/// Metadata is set with the consuming `set_*` and `with_*` methods. Files,
/// directories and control members are added with the `add_*` methods, which
/// write straight into the package's archives in call order.
///
/// A package is written once. After [`write`](DebPackage::write) or
/// [`close`](DebPackage::close) every operation fails with [`DebError::Closed`],
/// and after an I/O or signing failure every operation returns that same error.
/// Validation errors and invalid arguments leave the package usable. Metadata
/// changes on a package that is no longer open are ignored with a warning.
///
/// For binary package's, it may be helpful to read
/// [Debian's documentation on binary packages' metadata][1].
///
/// [1]: https://www.debian.org/doc/debian-policy/ch-controlfields.html
pub struct DebPackage {
    control: DebControl,
    // Maintainer scripts and configuration files
    control_archive: ControlArchive,
    // Opened on first use
    data: Option<DataArchive>,
    options: BuildOptions,
    mtime: u64, // Generated entries and ar headers
    state: PackageState,
}

impl Default for DebPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DebPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebPackage")
            .field("control", &self.control)
            .field("control_archive", &self.control_archive)
            .field("files", &self.files().len())
            .field("options", &self.options)
            .field("state", &self.state)
            .finish()
    }
}

impl DebPackage {
    /// Creates an empty package with default [`BuildOptions`].
    pub fn new() -> Self {
        Self::with_options(BuildOptions::default())
    }

    /// Creates an empty package that is assembled according to `options`.
    pub fn with_options(options: BuildOptions) -> Self {
        Self {
            control: DebControl::new(),
            control_archive: ControlArchive::new(),
            data: None,
            mtime: options.mtime(),
            options,
            state: PackageState::Open,
        }
    }

    /// Sets the package's name.
    pub fn set_name(self, name: &str) -> Self {
        self.edit(|control| control.set_name(name))
    }

    /// Sets the package's full version, e.g. `1.2.3-1`.
    ///
    /// A full version takes precedence over the numeric parts.
    pub fn set_version(self, version: &str) -> Self {
        self.edit(|control| control.set_version(version))
    }

    /// Sets the major part of a `major.minor.patch` version.
    pub fn set_version_major(self, major: u32) -> Self {
        self.edit(|control| control.set_version_major(major))
    }

    /// Sets the minor part of a `major.minor.patch` version.
    pub fn set_version_minor(self, minor: u32) -> Self {
        self.edit(|control| control.set_version_minor(minor))
    }

    /// Sets the patch part of a `major.minor.patch` version.
    pub fn set_version_patch(self, patch: u32) -> Self {
        self.edit(|control| control.set_version_patch(patch))
    }

    /// Sets the package's architecture, either a [`DebArchitecture`] or any
    /// architecture name.
    pub fn set_architecture<A: AsRef<str>>(self, architecture: A) -> Self {
        self.edit(|control| control.set_architecture(architecture.as_ref()))
    }

    /// Sets the maintainer's name.
    pub fn set_maintainer(self, maintainer: &str) -> Self {
        self.edit(|control| control.set_maintainer(maintainer))
    }

    /// Sets the maintainer's email address.
    pub fn set_maintainer_email(self, email: &str) -> Self {
        self.edit(|control| control.set_maintainer_email(email))
    }

    /// Sets the package's homepage.
    pub fn set_homepage(self, homepage: &str) -> Self {
        self.edit(|control| control.set_homepage(homepage))
    }

    /// Sets the package's section, e.g. `utils`.
    pub fn set_section(self, section: &str) -> Self {
        self.edit(|control| control.set_section(section))
    }

    /// Sets the package's priority.
    pub fn set_priority(self, priority: DebPriority) -> Self {
        self.edit(|control| control.set_priority(priority))
    }

    /// Sets the one-line synopsis of the package.
    pub fn set_short_description(self, description: &str) -> Self {
        self.edit(|control| control.set_short_description(description))
    }

    /// Sets the extended description. Every line is indented by a space in
    /// the control file.
    pub fn set_description(self, description: &str) -> Self {
        self.edit(|control| control.set_description(description))
    }

    /// Sets the version control system the package is maintained in.
    pub fn set_vcs_type(self, vcs: VcsType) -> Self {
        self.edit(|control| control.set_vcs_type(vcs))
    }

    /// Sets the repository URL, written as `Vcs-<Type>` once a type is set.
    pub fn set_vcs_url(self, url: &str) -> Self {
        self.edit(|control| control.set_vcs_url(url))
    }

    /// Sets the URL of a web view of the repository.
    pub fn set_vcs_browser(self, url: &str) -> Self {
        self.edit(|control| control.set_vcs_browser(url))
    }

    /// Sets the Built-Using field verbatim.
    pub fn set_built_using(self, info: &str) -> Self {
        self.edit(|control| control.set_built_using(info))
    }

    // Metadata can only change while the package is open
    fn edit<F: FnOnce(&mut DebControl)>(mut self, edit: F) -> Self {
        match &self.state {
            PackageState::Open => edit(&mut self.control),
            _ => warn!(
                package = %self.control.name(),
                "ignoring metadata change on a package that is no longer open"
            ),
        }
        self
    }

    fn set_relation(self, relation: Relation, value: &str) -> Self {
        self.edit(|control| {
            let list = control.relation_mut(relation);
            list.clear();
            if !value.trim().is_empty() {
                list.push(value.to_string());
            }
        })
    }

    fn with_relation(self, relation: Relation, values: &[&str]) -> Self {
        self.edit(|control| {
            control
                .relation_mut(relation)
                .extend(values.iter().map(|value| value.to_string()))
        })
    }

    /// Sets the dependencies verbatim, e.g. `"libc6 (>= 2.31), bash"`.
    pub fn set_depends(self, depends: &str) -> Self {
        self.set_relation(Relation::Depends, depends)
    }

    /// Adds a single dependency.
    pub fn with_depend(self, depend: &str) -> Self {
        self.with_relation(Relation::Depends, &[depend])
    }

    /// Adds a number of dependencies.
    pub fn with_depends(self, depends: Vec<&str>) -> Self {
        self.with_relation(Relation::Depends, &depends)
    }

    /// Resets dependencies.
    pub fn no_depends(self) -> Self {
        self.set_relation(Relation::Depends, "")
    }

    /// Sets the recommended packages verbatim.
    pub fn set_recommends(self, recommends: &str) -> Self {
        self.set_relation(Relation::Recommends, recommends)
    }

    /// Adds a single recommended package.
    pub fn with_recommend(self, recommend: &str) -> Self {
        self.with_relation(Relation::Recommends, &[recommend])
    }

    /// Adds a number of recommended packages.
    pub fn with_recommends(self, recommends: Vec<&str>) -> Self {
        self.with_relation(Relation::Recommends, &recommends)
    }

    /// Resets recommended packages.
    pub fn no_recommends(self) -> Self {
        self.set_relation(Relation::Recommends, "")
    }

    /// Sets the suggested packages verbatim.
    pub fn set_suggests(self, suggests: &str) -> Self {
        self.set_relation(Relation::Suggests, suggests)
    }

    /// Adds a single suggested package.
    pub fn with_suggest(self, suggest: &str) -> Self {
        self.with_relation(Relation::Suggests, &[suggest])
    }

    /// Adds a number of suggested packages.
    pub fn with_suggests(self, suggests: Vec<&str>) -> Self {
        self.with_relation(Relation::Suggests, &suggests)
    }

    /// Resets suggested packages.
    pub fn no_suggests(self) -> Self {
        self.set_relation(Relation::Suggests, "")
    }

    /// Sets the conflicting packages verbatim.
    pub fn set_conflicts(self, conflicts: &str) -> Self {
        self.set_relation(Relation::Conflicts, conflicts)
    }

    /// Adds a single conflicting package.
    pub fn with_conflict(self, conflict: &str) -> Self {
        self.with_relation(Relation::Conflicts, &[conflict])
    }

    /// Adds a number of conflicting packages.
    pub fn with_conflicts(self, conflicts: Vec<&str>) -> Self {
        self.with_relation(Relation::Conflicts, &conflicts)
    }

    /// Resets conflicting packages.
    pub fn no_conflicts(self) -> Self {
        self.set_relation(Relation::Conflicts, "")
    }

    /// Sets the provided virtual packages verbatim.
    pub fn set_provides(self, provides: &str) -> Self {
        self.set_relation(Relation::Provides, provides)
    }

    /// Adds a single provided virtual package.
    pub fn with_provide(self, provide: &str) -> Self {
        self.with_relation(Relation::Provides, &[provide])
    }

    /// Adds a number of provided virtual packages.
    pub fn with_provides(self, provides: Vec<&str>) -> Self {
        self.with_relation(Relation::Provides, &provides)
    }

    /// Resets provided virtual packages.
    pub fn no_provides(self) -> Self {
        self.set_relation(Relation::Provides, "")
    }

    /// Sets the replaced packages verbatim.
    pub fn set_replaces(self, replaces: &str) -> Self {
        self.set_relation(Relation::Replaces, replaces)
    }

    /// Adds a single replaced package.
    pub fn with_replace(self, replace: &str) -> Self {
        self.with_relation(Relation::Replaces, &[replace])
    }

    /// Adds a number of replaced packages.
    pub fn with_replaces(self, replaces: Vec<&str>) -> Self {
        self.with_relation(Relation::Replaces, &replaces)
    }

    /// Resets replaced packages.
    pub fn no_replaces(self) -> Self {
        self.set_relation(Relation::Replaces, "")
    }

    /// Returns the package's metadata.
    pub fn control(&self) -> &DebControl {
        &self.control
    }

    /// Returns the package's name.
    pub fn name(&self) -> &str {
        self.control.name()
    }

    /// Returns the package's version.
    pub fn version(&self) -> &DebVersion {
        self.control.version()
    }

    /// Returns the options the package is assembled with.
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Returns the files added so far, in the order they were added.
    pub fn files(&self) -> &[ManifestEntry] {
        match &self.data {
            Some(data) => data.manifest().entries(),
            None => &[],
        }
    }

    /// Returns the directories added so far, in the order they were added.
    pub fn directories(&self) -> &[String] {
        match &self.data {
            Some(data) => data.directories().dirs(),
            None => &[],
        }
    }

    /// Returns the paths marked as configuration files.
    pub fn conffiles(&self) -> &[String] {
        self.control_archive.conffiles()
    }

    /// Returns whether files can still be added and the package written.
    pub fn is_open(&self) -> bool {
        matches!(self.state, PackageState::Open)
    }

    /// The conventional file name of the package,
    /// `<name>_<version>_<architecture>.deb`.
    pub fn filename(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.control.name(),
            self.control.version(),
            self.control.architecture(),
            DEB_EXTENSION
        )
    }

    // Fails unless the package is open
    fn guard(&self) -> Result<()> {
        match &self.state {
            PackageState::Open => Ok(()),
            PackageState::Closed => Err(DebError::Closed),
            PackageState::Errored(cause) => Err(cause.clone()),
        }
    }

    // Remembers terminal errors
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if !e.is_recoverable() {
                self.state = PackageState::Errored(e.clone());
            }
        }
        result
    }

    fn data_mut(&mut self) -> Result<&mut DataArchive> {
        let data = match self.data.take() {
            Some(data) => data,
            None => DataArchive::new(&self.options, self.mtime)?,
        };
        Ok(self.data.insert(data))
    }

    /// Adds the file at `src` to the package under the same path.
    ///
    /// # Errors
    ///
    /// Fails if `src` can't be read or is a directory.
    pub fn add_file<P: AsRef<Path>>(&mut self, src: P) -> Result<()> {
        self.guard()?;
        let result = self
            .data_mut()
            .and_then(|data| data.add_file(src.as_ref(), None));
        self.record(result)
    }

    /// Adds the file at `src` to the package as `dest`.
    ///
    /// Missing parent directories of `dest` are added first. The file keeps
    /// its executable bit.
    pub fn add_file_to<P: AsRef<Path>>(&mut self, src: P, dest: &str) -> Result<()> {
        self.guard()?;
        let result = self
            .data_mut()
            .and_then(|data| data.add_file(src.as_ref(), Some(dest)));
        self.record(result)
    }

    /// Adds a file with the given contents to the package as `dest`.
    pub fn add_file_string(&mut self, contents: &str, dest: &str) -> Result<()> {
        self.guard()?;
        let result = self
            .data_mut()
            .and_then(|data| data.add_bytes(contents.as_bytes(), dest));
        self.record(result)
    }

    /// Adds the file at `src` as `dest` and marks it as a configuration file.
    pub fn add_config_file<P: AsRef<Path>>(&mut self, src: P, dest: &str) -> Result<()> {
        self.add_file_to(src, dest)?;
        self.mark_config_file(dest)
    }

    /// Marks `dest` as a configuration file, which dpkg won't overwrite on
    /// upgrade when the user changed it.
    pub fn mark_config_file(&mut self, dest: &str) -> Result<()> {
        self.guard()?;
        let result = self.control_archive.mark_config_file(dest);
        self.record(result)
    }

    /// Adds `dir` and its missing parents as empty directories.
    pub fn add_empty_directory(&mut self, dir: &str) -> Result<()> {
        self.guard()?;
        let result = self.data_mut().and_then(|data| data.add_directory(dir));
        self.record(result)
    }

    /// Recursively adds the directory `src` with everything in it, under the
    /// same paths.
    pub fn add_directory<P: AsRef<Path>>(&mut self, src: P) -> Result<()> {
        let dest = src.as_ref().to_string_lossy().into_owned();
        self.add_directory_to(src, &dest)
    }

    /// Recursively adds the directory `src` as `dest`.
    ///
    /// For example, if you had a directory `test` containing the files `foo`
    /// and `bar`, then you can add those files as `/usr/bin/foo` and
    /// `/usr/bin/bar` with `add_directory_to("test", "/usr/bin")`. Entries
    /// are added in file name order, each directory before its contents.
    pub fn add_directory_to<P: AsRef<Path>>(&mut self, src: P, dest: &str) -> Result<()> {
        self.guard()?;
        let result = self.walk_directory(src.as_ref(), Path::new(dest));
        self.record(result)
    }

    fn walk_directory(&mut self, src: &Path, dest: &Path) -> Result<()> {
        let data = self.data_mut()?;
        for entry in WalkDir::new(src).sort_by_file_name() {
            let entry = entry
                .map_err(std::io::Error::from)
                .io_context(|| format!("cannot read directory {}", src.display()))?;
            // Cutting the `src` directory out of the path
            let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
            let target = dest.join(relative).to_string_lossy().into_owned();
            if entry.file_type().is_dir() {
                data.add_directory(&target)?;
            } else {
                data.add_file(entry.path(), Some(&target))?;
            }
        }
        Ok(())
    }

    /// Adds the contents of the file `filename` to control.tar.gz as `name`,
    /// typically a maintainer script such as `postinst`. The bytes are kept
    /// as they are apart from CRLF line endings, which become LF.
    ///
    /// See [Debian's documentation on maintainer scripts][1].
    ///
    /// [1]: https://www.debian.org/doc/debian-policy/ch-maintainerscripts.html
    pub fn add_control_extra<P: AsRef<Path>>(&mut self, name: &str, filename: P) -> Result<()> {
        self.guard()?;
        let filename = filename.as_ref();
        let contents =
            fs::read(filename).io_context(|| format!("cannot read {}", filename.display()));
        let result = contents.and_then(|contents| self.control_archive.add_extra(name, &contents));
        self.record(result)
    }

    /// Adds `contents` to control.tar.gz as `name`.
    ///
    /// CRLF line endings are converted to LF. `preinst`, `postinst`, `prerm`,
    /// `postrm` and `config` are stored as executables.
    pub fn add_control_extra_string(&mut self, name: &str, contents: &str) -> Result<()> {
        self.guard()?;
        let result = self.control_archive.add_extra(name, contents.as_bytes());
        self.record(result)
    }

    /// Writes the package to `path`, or to [`filename`](DebPackage::filename)
    /// in the working directory when `path` is empty, and closes the package.
    ///
    /// # Errors
    ///
    /// A [`ValidationError`](crate::ValidationError) is returned before
    /// anything is written when the name, architecture or version is missing,
    /// and the package stays open. On any other failure no file is left at
    /// `path`.
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.finish(path.as_ref(), None)
    }

    /// Same as [`write`](DebPackage::write), with a `digests.asc` member
    /// clear-signed by `signer`.
    pub fn write_signed<P: AsRef<Path>>(
        &mut self,
        path: P,
        signer: &dyn DigestSigner,
    ) -> Result<()> {
        self.finish(path.as_ref(), Some(signer))
    }

    /// Discards everything added to the package.
    ///
    /// Fails if it was already closed. A package that failed earlier keeps
    /// returning that failure, from this call too.
    pub fn close(&mut self) -> Result<()> {
        self.data = None;
        match &self.state {
            PackageState::Open => {
                self.state = PackageState::Closed;
                Ok(())
            }
            PackageState::Closed => Err(DebError::Closed),
            PackageState::Errored(cause) => Err(cause.clone()),
        }
    }

    fn finish(&mut self, path: &Path, signer: Option<&dyn DigestSigner>) -> Result<()> {
        self.guard()?;
        self.control.verify()?;

        let path = if path.as_os_str().is_empty() {
            PathBuf::from(self.filename())
        } else {
            path.to_path_buf()
        };
        match self.assemble(&path, signer) {
            Ok(()) => {
                self.state = PackageState::Closed;
                Ok(())
            }
            Err(e) => {
                self.state = PackageState::Errored(e.clone());
                Err(e)
            }
        }
    }

    fn assemble(&mut self, path: &Path, signer: Option<&dyn DigestSigner>) -> Result<()> {
        let data = match self.data.take() {
            Some(data) => data,
            None => DataArchive::new(&self.options, self.mtime)?,
        };
        let files = data.manifest().len();
        let installed_size = data.written();

        let (control_tgz, data_tgz) =
            self.control_archive.finalize(&self.control, data, &self.options, self.mtime)?;
        let digest = match signer {
            Some(signer) => Some(self.digest(signer, &control_tgz, &data_tgz)?),
            None => None,
        };
        container::write_container(path, self.mtime, &control_tgz, &data_tgz, digest.as_deref())?;

        info!(
            path = %path.display(),
            package = %self.control.name(),
            files,
            installed_size,
            signed = digest.is_some(),
            "wrote package"
        );
        Ok(())
    }

    // Hashes the members as they will appear in the package and clear-signs the result
    fn digest(
        &self,
        signer: &dyn DigestSigner,
        control_tgz: &NamedTempFile,
        data_tgz: &NamedTempFile,
    ) -> Result<String> {
        let mut digest = Digest::new(&signer.identity()?, &digest_date(self.options.timestamp()));
        digest.push(DigestEntry::from_bytes("debian-binary", DEBIAN_BINARY.as_bytes()));
        for (name, archive) in [(CONTROL_MEMBER, control_tgz), (DATA_MEMBER, data_tgz)] {
            let (file, _) = container::reopen(archive)?;
            let entry = DigestEntry::from_reader(name, file)
                .io_context(|| format!("cannot hash {}", name))?;
            digest.push(entry);
        }
        signer.clear_sign(&digest.to_string())
    }
}
