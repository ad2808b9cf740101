/*
    deb-builder - Rust library for assembling and signing Deb packages
    Copyright (C) 2022  NotSludgeBomb

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
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use sha1::{Digest as _, Sha1};
use tempfile::TempDir;

use crate::digest::digest_date;
use crate::*;

const TIMESTAMP: u64 = 1_600_000_000;

struct TarMember {
    name: String,
    kind: tar::EntryType,
    mode: u32,
    uid: u64,
    gid: u64,
    mtime: u64,
    contents: Vec<u8>,
}

fn options(scratch: &TempDir) -> BuildOptions {
    BuildOptions::new()
        .set_temp_dir(scratch.path().join("tmp"))
        .set_timestamp(TIMESTAMP)
}

fn foobar(scratch: &TempDir) -> DebPackage {
    DebPackage::with_options(options(scratch))
        .set_name("foobar")
        .set_version("1.2.3")
        .set_architecture(DebArchitecture::Amd64)
        .set_maintainer("Foo Bar")
        .set_maintainer_email("foo@bar.com")
        .set_short_description("This is a test package")
}

// (name, header mode, header mtime, contents) of every ar member
fn read_members(path: &Path) -> Vec<(String, u32, u64, Vec<u8>)> {
    let mut archive = ::ar::Archive::new(fs::File::open(path).unwrap());
    let mut members = Vec::new();
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.unwrap();
        let name = String::from_utf8(entry.header().identifier().to_vec()).unwrap();
        let mode = entry.header().mode();
        let mtime = entry.header().mtime();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        members.push((name, mode, mtime, contents));
    }
    members
}

fn member(path: &Path, name: &str) -> Vec<u8> {
    read_members(path)
        .into_iter()
        .find(|(member, ..)| member == name)
        .map(|(.., contents)| contents)
        .unwrap_or_else(|| panic!("no member {}", name))
}

fn untar(compressed: &[u8]) -> Vec<TarMember> {
    let mut archive = tar::Archive::new(GzDecoder::new(compressed));
    let mut members = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry
            .path()
            .unwrap()
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();
        let header = entry.header();
        let kind = header.entry_type();
        let mode = header.mode().unwrap();
        let uid = header.uid().unwrap();
        let gid = header.gid().unwrap();
        let mtime = header.mtime().unwrap();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        members.push(TarMember {
            name,
            kind,
            mode,
            uid,
            gid,
            mtime,
            contents,
        });
    }
    members
}

fn tar_member<'a>(members: &'a [TarMember], name: &str) -> &'a TarMember {
    members
        .iter()
        .find(|member| member.name == name)
        .unwrap_or_else(|| panic!("no tar member {}", name))
}

fn names(members: &[TarMember]) -> Vec<&str> {
    members.iter().map(|member| member.name.as_str()).collect()
}

fn text(contents: &[u8]) -> String {
    String::from_utf8(contents.to_vec()).unwrap()
}

struct FakeSigner {
    fail: bool,
}

impl DigestSigner for FakeSigner {
    fn identity(&self) -> Result<String> {
        Ok("Foo Bar <foo@bar.com>".to_string())
    }

    fn clear_sign(&self, plaintext: &str) -> Result<String> {
        if self.fail {
            return Err(DebError::Signing("no secret key".to_string()));
        }
        Ok(format!(
            "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\n{}\
             -----BEGIN PGP SIGNATURE-----\n\nfake\n-----END PGP SIGNATURE-----\n",
            plaintext
        ))
    }
}

#[test]
fn control_file_with_mandatory_fields() {
    let scratch = TempDir::new().unwrap();
    let package = foobar(&scratch);
    assert_eq!(
        package.control().serialize(0),
        "Package: foobar\n\
         Version: 1.2.3\n\
         Architecture: amd64\n\
         Maintainer: Foo Bar <foo@bar.com>\n\
         Installed-Size: 0\n\
         Description: This is a test package\n"
    );
}

#[test]
fn control_file_without_maintainer_or_description() {
    let package = DebPackage::new()
        .set_name("foobar")
        .set_version("1.2.3")
        .set_architecture("amd64");
    assert_eq!(
        package.control().serialize(0),
        "Package: foobar\nVersion: 1.2.3\nArchitecture: amd64\nMaintainer:  <>\n\
         Installed-Size: 0\nDescription: \n"
    );
}

#[test]
fn control_file_with_every_field() {
    let scratch = TempDir::new().unwrap();
    let package = foobar(&scratch)
        .set_section("utils")
        .set_priority(DebPriority::Optional)
        .set_homepage("https://example.com")
        .set_vcs_type(VcsType::Git)
        .set_vcs_url("https://example.com/foobar.git")
        .set_vcs_browser("https://example.com/foobar")
        .set_built_using("gcc-12 (= 12.2.0-14)")
        .with_depends(vec!["libc6 (>= 2.31)", "bash"])
        .set_recommends("curl")
        .with_suggest("vim")
        .with_conflict("foobar-legacy")
        .with_provide("foo")
        .with_replace("foobar-legacy")
        .set_description("First line\nSecond line");
    assert_eq!(
        package.control().serialize(4096),
        "Package: foobar\n\
         Version: 1.2.3\n\
         Architecture: amd64\n\
         Maintainer: Foo Bar <foo@bar.com>\n\
         Installed-Size: 4\n\
         Section: utils\n\
         Priority: optional\n\
         Homepage: https://example.com\n\
         Vcs-Git: https://example.com/foobar.git\n\
         Vcs-Browser: https://example.com/foobar\n\
         Built-Using: gcc-12 (= 12.2.0-14)\n\
         Depends: libc6 (>= 2.31), bash\n\
         Recommends: curl\n\
         Suggests: vim\n\
         Conflicts: foobar-legacy\n\
         Provides: foo\n\
         Replaces: foobar-legacy\n\
         Description: This is a test package\n \
         First line\n \
         Second line\n"
    );
}

#[test]
fn relations_can_be_reset() {
    let scratch = TempDir::new().unwrap();
    let package = foobar(&scratch)
        .with_depend("bash")
        .no_depends()
        .set_suggests("vim")
        .set_suggests("");
    assert!(package.control().depends().is_empty());
    assert!(package.control().suggests().is_empty());
    assert!(!package.control().serialize(0).contains("Depends"));
}

#[test]
fn vcs_url_needs_a_type() {
    let scratch = TempDir::new().unwrap();
    let package = foobar(&scratch).set_vcs_url("https://example.com/foobar.git");
    assert!(!package.control().serialize(0).contains("Vcs-"));
}

#[test]
fn version_from_parts() {
    let package = DebPackage::new()
        .set_version_major(1)
        .set_version_minor(2)
        .set_version_patch(3);
    assert_eq!(package.version().to_string(), "1.2.3");
    assert_eq!(package.version().minor(), 2);
}

#[test]
fn filename_from_metadata() {
    let scratch = TempDir::new().unwrap();
    assert_eq!(foobar(&scratch).filename(), "foobar_1.2.3_amd64.deb");
}

#[test]
fn missing_fields_fail_validation() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("out.deb");

    let mut package = DebPackage::with_options(options(&scratch))
        .set_architecture("amd64")
        .set_version("1.0");
    let err = package.write(&out).unwrap_err();
    assert!(matches!(err, DebError::Validation(ValidationError::EmptyName)));
    assert_eq!(err.to_string(), "empty package name");

    let mut package = DebPackage::with_options(options(&scratch))
        .set_name("foobar")
        .set_version("1.0");
    let err = package.write(&out).unwrap_err();
    assert!(matches!(err, DebError::Validation(ValidationError::EmptyArchitecture)));

    let mut package = DebPackage::with_options(options(&scratch))
        .set_name("foobar")
        .set_architecture("amd64");
    let err = package.write(&out).unwrap_err();
    assert!(matches!(err, DebError::Validation(ValidationError::EmptyVersion)));

    assert!(!out.exists());
}

#[test]
fn package_can_be_fixed_after_validation_error() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("out.deb");

    let mut package = DebPackage::with_options(options(&scratch))
        .set_architecture("amd64")
        .set_version("1.0");
    package.add_file_string("hello\n", "/usr/share/foobar/hello").unwrap();
    assert!(package.write(&out).is_err());
    assert!(!out.exists());
    assert!(package.is_open());

    let mut package = package.set_name("foobar");
    package.write(&out).unwrap();
    assert!(out.exists());
    assert!(!package.is_open());
}

#[test]
fn members_in_order() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("hello\n", "/usr/share/foobar/hello").unwrap();
    package.write(&out).unwrap();

    let members = read_members(&out);
    let names: Vec<&str> = members.iter().map(|(name, ..)| name.as_str()).collect();
    assert_eq!(names, ["debian-binary", "control.tar.gz", "data.tar.gz"]);
    assert_eq!(members[0].3, b"2.0\n");
    for (_, mode, mtime, _) in &members {
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(*mtime, TIMESTAMP);
    }
}

#[test]
fn md5sums_in_call_order() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("test", "/foo").unwrap();
    package
        .add_file_string("hello\n", "/usr/share/doc/foobar/README")
        .unwrap();
    assert_eq!(package.files().len(), 2);
    assert_eq!(package.files()[0].md5(), "098f6bcd4621d373cade4e832627b4f6");
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    assert_eq!(names(&control), ["control", "md5sums"]);
    assert_eq!(
        text(&tar_member(&control, "md5sums").contents),
        format!(
            "098f6bcd4621d373cade4e832627b4f6  foo\n{:x}  usr/share/doc/foobar/README\n",
            md5::compute(b"hello\n")
        )
    );
}

#[test]
fn directories_precede_contents() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("1", "/a/b/c/one").unwrap();
    package.add_file_string("2", "/a/b/two").unwrap();
    package.add_empty_directory("/a/b/c").unwrap();
    package.write(&out).unwrap();

    let data = untar(&member(&out, "data.tar.gz"));
    assert_eq!(names(&data), ["a", "a/b", "a/b/c", "a/b/c/one", "a/b/two"]);
    for dir in &data[..3] {
        assert_eq!(dir.kind, tar::EntryType::Directory);
        assert_eq!(dir.mode, 0o755);
    }
    for file in &data[3..] {
        assert_eq!(file.kind, tar::EntryType::Regular);
        assert_eq!(file.mode, 0o644);
    }
    for entry in &data {
        assert_eq!((entry.uid, entry.gid), (0, 0));
        assert_eq!(entry.mtime, TIMESTAMP);
    }
    assert_eq!(tar_member(&data, "a/b/two").contents, b"2");
}

#[test]
fn empty_directory_with_ancestors() {
    let scratch = TempDir::new().unwrap();
    let mut package = foobar(&scratch);
    package.add_empty_directory("/my/foo/directory/").unwrap();
    package.add_empty_directory("my/foo").unwrap();
    assert_eq!(package.directories(), ["/my", "/my/foo", "/my/foo/directory"]);
}

#[test]
fn installed_size_rounds_up_to_kib() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string(&"x".repeat(1025), "/usr/share/foobar/blob").unwrap();
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    let control_file = text(&tar_member(&control, "control").contents);
    assert!(control_file.contains("\nInstalled-Size: 2\n"));
}

#[test]
fn description_is_folded() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch).set_description("A\r\nB\n");
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    let control_file = text(&tar_member(&control, "control").contents);
    assert!(control_file.ends_with("Description: This is a test package\n A\n B\n"));
}

#[test]
fn source_files_are_streamed() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let src = scratch.path().join("hello.txt");
    fs::write(&src, "hello world\n").unwrap();

    let mut package = foobar(&scratch);
    package.add_file_to(&src, "/usr/share/foobar/hello.txt").unwrap();
    package.write(&out).unwrap();

    let data = untar(&member(&out, "data.tar.gz"));
    assert_eq!(
        names(&data),
        ["usr", "usr/share", "usr/share/foobar", "usr/share/foobar/hello.txt"]
    );
    let file = tar_member(&data, "usr/share/foobar/hello.txt");
    assert_eq!(file.contents, b"hello world\n");
    assert_eq!(file.mtime, TIMESTAMP);
}

#[cfg(unix)]
#[test]
fn executables_keep_their_mode() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let src = scratch.path().join("tool");
    fs::write(&src, "#!/bin/sh\necho hello\n").unwrap();
    fs::set_permissions(&src, fs::Permissions::from_mode(0o700)).unwrap();

    let mut package = foobar(&scratch);
    package.add_file_to(&src, "/usr/bin/tool").unwrap();
    package.write(&out).unwrap();

    let data = untar(&member(&out, "data.tar.gz"));
    assert_eq!(tar_member(&data, "usr/bin/tool").mode, 0o755);
}

#[test]
fn add_file_without_destination_uses_source_path() {
    let scratch = TempDir::new().unwrap();
    let src = scratch.path().join("plain.txt");
    fs::write(&src, "plain").unwrap();

    let mut package = foobar(&scratch);
    package.add_file(&src).unwrap();
    let expected = src.to_string_lossy().trim_start_matches('/').to_string();
    assert_eq!(package.files()[0].path(), expected);
    assert_eq!(package.files()[0].size(), 5);
}

#[test]
fn directory_tree_is_added_recursively() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let tree = scratch.path().join("tree");
    fs::create_dir_all(tree.join("share/doc")).unwrap();
    fs::create_dir_all(tree.join("bin")).unwrap();
    fs::write(tree.join("bin/tool"), "tool").unwrap();
    fs::write(tree.join("share/doc/readme"), "readme").unwrap();

    let mut package = foobar(&scratch);
    package.add_directory_to(&tree, "/opt/tool").unwrap();
    assert_eq!(
        package.directories(),
        [
            "/opt",
            "/opt/tool",
            "/opt/tool/bin",
            "/opt/tool/share",
            "/opt/tool/share/doc"
        ]
    );
    package.write(&out).unwrap();

    let data = untar(&member(&out, "data.tar.gz"));
    assert_eq!(
        names(&data),
        [
            "opt",
            "opt/tool",
            "opt/tool/bin",
            "opt/tool/bin/tool",
            "opt/tool/share",
            "opt/tool/share/doc",
            "opt/tool/share/doc/readme"
        ]
    );
}

#[test]
fn directory_tree_under_its_own_path() {
    let scratch = TempDir::new().unwrap();
    let tree = scratch.path().join("tree");
    fs::create_dir_all(&tree).unwrap();
    fs::write(tree.join("file"), "file").unwrap();

    let mut package = foobar(&scratch);
    package.add_directory(&tree).unwrap();
    let expected = format!("{}/file", tree.to_string_lossy().trim_start_matches('/'));
    assert_eq!(package.files()[0].path(), expected);
}

#[test]
fn conffiles_from_marked_files() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let src = scratch.path().join("foobar.conf");
    fs::write(&src, "verbose = true\n").unwrap();

    let mut package = foobar(&scratch);
    package.add_config_file(&src, "/etc/foobar.conf").unwrap();
    package.add_file_string("", "/etc/foobar.d/empty.conf").unwrap();
    package.mark_config_file("etc/foobar.d/empty.conf").unwrap();
    package.mark_config_file("/etc/foobar.conf").unwrap();
    assert_eq!(package.conffiles(), ["/etc/foobar.conf", "/etc/foobar.d/empty.conf"]);
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    assert_eq!(names(&control), ["conffiles", "control", "md5sums"]);
    assert_eq!(
        text(&tar_member(&control, "conffiles").contents),
        "/etc/foobar.conf\n/etc/foobar.d/empty.conf\n"
    );
}

#[test]
fn custom_conffiles_replace_marked_files() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("a", "/etc/a.conf").unwrap();
    package.mark_config_file("/etc/a.conf").unwrap();
    package
        .add_control_extra_string("conffiles", "/etc/b.conf\r\n")
        .unwrap();
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    assert_eq!(names(&control), ["conffiles", "control", "md5sums"]);
    assert_eq!(text(&tar_member(&control, "conffiles").contents), "/etc/b.conf\n");
}

#[test]
fn maintainer_scripts_are_executable() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let script = scratch.path().join("prerm");
    fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

    let mut package = foobar(&scratch);
    package
        .add_control_extra_string("postinst", "#!/bin/sh\r\necho installed\r\n")
        .unwrap();
    package.add_control_extra("prerm", &script).unwrap();
    package.add_control_extra_string("triggers", "activate foo\n").unwrap();
    package
        .add_control_extra_string("postinst", "#!/bin/sh\necho replaced\n")
        .unwrap();
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    assert_eq!(names(&control), ["control", "md5sums", "postinst", "prerm", "triggers"]);
    let postinst = tar_member(&control, "postinst");
    assert_eq!(text(&postinst.contents), "#!/bin/sh\necho replaced\n");
    assert_eq!(postinst.mode, 0o755);
    assert_eq!(tar_member(&control, "prerm").mode, 0o755);
    assert_eq!(tar_member(&control, "triggers").mode, 0o644);
    assert_eq!(tar_member(&control, "control").mode, 0o644);
}

#[test]
fn control_extra_line_endings_are_normalized() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package
        .add_control_extra_string("postrm", "#!/bin/sh\r\necho removed\r\n")
        .unwrap();
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    assert_eq!(
        text(&tar_member(&control, "postrm").contents),
        "#!/bin/sh\necho removed\n"
    );
}

#[test]
fn control_extra_is_not_required_to_be_utf8() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let script = scratch.path().join("postinst");
    fs::write(&script, b"#!/bin/sh\r\n# caf\xe9\nexit 0\n").unwrap();

    let mut package = foobar(&scratch);
    package.add_control_extra("postinst", &script).unwrap();
    assert!(package.is_open());
    package.write(&out).unwrap();

    let control = untar(&member(&out, "control.tar.gz"));
    let postinst = tar_member(&control, "postinst");
    assert_eq!(postinst.contents, b"#!/bin/sh\n# caf\xe9\nexit 0\n");
    assert_eq!(postinst.mode, 0o755);
}

#[test]
fn invalid_arguments_leave_package_open() {
    let scratch = TempDir::new().unwrap();
    let mut package = foobar(&scratch);

    for name in ["control", "md5sums", "scripts/postinst", ""] {
        let err = package.add_control_extra_string(name, "x").unwrap_err();
        assert!(matches!(err, DebError::InvalidValue { .. }));
    }
    let err = package.add_file_string("x", "/").unwrap_err();
    assert!(matches!(err, DebError::InvalidValue { field: "destination", .. }));
    assert!(package.mark_config_file("/").is_err());

    assert!(package.is_open());
    package.add_file_string("x", "/x").unwrap();
}

#[test]
fn io_errors_are_sticky() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let missing = scratch.path().join("missing");

    let mut package = foobar(&scratch);
    let first = package.add_file_to(&missing, "/usr/bin/missing").unwrap_err();
    assert!(matches!(first, DebError::Io { .. }));
    assert!(!package.is_open());

    let again = package.add_file_string("x", "/x").unwrap_err();
    assert_eq!(again.to_string(), first.to_string());
    let write = package.write(&out).unwrap_err();
    assert_eq!(write.to_string(), first.to_string());
    assert!(!out.exists());
}

#[test]
fn close_keeps_the_first_error() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    let first = package
        .add_file_to(scratch.path().join("missing"), "/usr/bin/missing")
        .unwrap_err();

    let close = package.close().unwrap_err();
    assert_eq!(close.to_string(), first.to_string());
    let write = package.write(&out).unwrap_err();
    assert!(!matches!(write, DebError::Closed));
    assert_eq!(write.to_string(), first.to_string());
    assert!(fs::read_dir(scratch.path().join("tmp")).unwrap().next().is_none());
}

#[test]
fn directory_source_is_rejected() {
    let scratch = TempDir::new().unwrap();
    let mut package = foobar(&scratch);
    let err = package.add_file_to(scratch.path(), "/dir").unwrap_err();
    assert!(matches!(err, DebError::Io { .. }));
}

#[test]
fn written_package_is_closed() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.write(&out).unwrap();

    assert!(matches!(package.add_file_string("x", "/x"), Err(DebError::Closed)));
    assert!(matches!(package.add_empty_directory("/x"), Err(DebError::Closed)));
    assert!(matches!(package.write(&out), Err(DebError::Closed)));
    assert!(matches!(package.close(), Err(DebError::Closed)));
}

#[test]
fn close_happens_once() {
    let scratch = TempDir::new().unwrap();
    let mut package = foobar(&scratch);
    package.add_file_string("x", "/x").unwrap();
    package.close().unwrap();
    assert!(matches!(package.close(), Err(DebError::Closed)));
    assert!(matches!(
        package.add_control_extra_string("postinst", "#!/bin/sh\n"),
        Err(DebError::Closed)
    ));
    assert!(fs::read_dir(scratch.path().join("tmp")).unwrap().next().is_none());
}

#[test]
fn metadata_is_frozen_once_written() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.write(&out).unwrap();

    let package = package
        .set_name("renamed")
        .set_version("9.9.9")
        .with_depend("libc6");
    assert_eq!(package.control().name(), "foobar");
    assert_eq!(package.control().version().to_string(), "1.2.3");
    assert!(package.control().depends().is_empty());
    assert_eq!(package.filename(), "foobar_1.2.3_amd64.deb");
}

#[test]
fn metadata_is_frozen_once_closed() {
    let scratch = TempDir::new().unwrap();
    let mut package = foobar(&scratch);
    package.close().unwrap();

    let package = package
        .set_maintainer("Someone Else")
        .set_architecture(DebArchitecture::Arm64);
    assert_eq!(
        package.control().serialize(0),
        "Package: foobar\n\
         Version: 1.2.3\n\
         Architecture: amd64\n\
         Maintainer: Foo Bar <foo@bar.com>\n\
         Installed-Size: 0\n\
         Description: This is a test package\n"
    );
}

#[test]
fn intermediate_files_are_removed() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("x", "/x").unwrap();
    package.write(&out).unwrap();

    assert!(fs::read_dir(scratch.path().join("tmp")).unwrap().next().is_none());
    let leftovers: Vec<PathBuf> = fs::read_dir(scratch.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_file() && *path != out)
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[cfg(unix)]
#[test]
fn temp_dir_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = TempDir::new().unwrap();
    let tmp = scratch.path().join("nested/tmp");
    let mut package = DebPackage::with_options(options(&scratch).set_temp_dir(&tmp));
    package.add_file_string("x", "/x").unwrap();

    let mode = fs::metadata(&tmp).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
fn signed_package_carries_digest() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    package.add_file_string("hello\n", "/usr/share/foobar/hello").unwrap();
    package.write_signed(&out, &FakeSigner { fail: false }).unwrap();

    let members = read_members(&out);
    let names: Vec<&str> = members.iter().map(|(name, ..)| name.as_str()).collect();
    assert_eq!(names, ["debian-binary", "control.tar.gz", "data.tar.gz", "digests.asc"]);

    let mut expected = format!(
        "Version: 4\nSigner: Foo Bar <foo@bar.com>\nDate: {}\nRole: builder\nFiles: \n\
         \t3cf918272ffa5de195752d73f3da3e5e \
         7959c969e092f2a5a8604e2287807ac5b1b384ad 4 debian-binary\n",
        digest_date(Some(TIMESTAMP))
    );
    for (name, _, _, contents) in &members[1..3] {
        expected.push_str(&format!(
            "\t{:x} {:x} {} {}\n",
            md5::compute(contents),
            Sha1::digest(contents),
            contents.len(),
            name
        ));
    }
    let digest = text(&members[3].3);
    assert!(digest.starts_with("-----BEGIN PGP SIGNED MESSAGE-----\n"));
    assert!(digest.contains(&expected), "digest was:\n{}", digest);
}

#[test]
fn signing_failure_leaves_no_file() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch);
    let err = package
        .write_signed(&out, &FakeSigner { fail: true })
        .unwrap_err();
    assert!(matches!(err, DebError::Signing(_)));
    assert!(!out.exists());
    assert!(matches!(package.write(&out), Err(DebError::Signing(_))));
}

#[test]
fn missing_gpg_fails_signing() {
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let signer = GpgSigner::with_program(scratch.path().join("no-such-gpg"), "0xDEADBEEF");
    let mut package = foobar(&scratch);
    assert!(package.write_signed(&out, &signer).is_err());
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn gpg_signer_buffers_in_its_temp_dir() {
    use std::os::unix::fs::PermissionsExt;

    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let tmp = scratch.path().join("signing");

    // Stands in for gpg and records where the plaintext was buffered
    let gpg = scratch.path().join("gpg");
    fs::write(
        &gpg,
        "#!/bin/sh\n\
         for arg; do last=\"$arg\"; done\n\
         case \"$*\" in\n\
         *--list-secret-keys*)\n\
           echo 'sec:u:255:22:ABCDEF:1600000000:::u:::scSC::::::23::0:'\n\
           echo 'uid:u::::1600000000::HASH::Foo Bar <foo@bar.com>::::::::::0:' ;;\n\
         *--clearsign*)\n\
           dirname \"$last\" > \"$0.dir\"\n\
           printf -- '-----BEGIN PGP SIGNED MESSAGE-----\\n\\n'\n\
           cat \"$last\" ;;\n\
         esac\n",
    )
    .unwrap();
    fs::set_permissions(&gpg, fs::Permissions::from_mode(0o755)).unwrap();

    let signer = GpgSigner::with_program(&gpg, "ABCDEF").set_temp_dir(&tmp);
    let mut package = foobar(&scratch);
    package.add_file_string("hello\n", "/usr/share/foobar/hello").unwrap();
    package.write_signed(&out, &signer).unwrap();

    let digest = text(&member(&out, "digests.asc"));
    assert!(digest.starts_with("-----BEGIN PGP SIGNED MESSAGE-----\n\n"));
    assert!(digest.contains("Signer: Foo Bar <foo@bar.com>\n"));
    let used = fs::read_to_string(scratch.path().join("gpg.dir")).unwrap();
    assert_eq!(Path::new(used.trim_end()), tmp.as_path());
    assert!(fs::read_dir(&tmp).unwrap().next().is_none());
}

#[test]
fn digest_date_format() {
    assert_eq!(digest_date(Some(TIMESTAMP)), "Sun Sep 13 12:26:40 2020");
    assert_eq!(digest_date(Some(0)), "Thu Jan  1 00:00:00 1970");
}

#[test]
fn digest_date_clamps_far_future() {
    let last = digest_date(Some(i64::MAX as u64));
    assert_eq!(digest_date(Some(u64::MAX)), last);
    assert_ne!(digest_date(None), last);
}

#[test]
fn architecture_names() {
    assert_eq!("arm64".parse::<DebArchitecture>().unwrap(), DebArchitecture::Arm64);
    assert_eq!(DebArchitecture::Ppc64el.as_str(), "ppc64el");
    assert!("z80".parse::<DebArchitecture>().is_err());
    assert_eq!("Mercurial".parse::<VcsType>().unwrap(), VcsType::Hg);
    assert_eq!("standard".parse::<DebPriority>().unwrap(), DebPriority::Standard);
}

#[test]
fn host_architecture_respects_endianness() {
    let host = DebArchitecture::host();
    if cfg!(target_arch = "x86_64") {
        assert_eq!(host, Some(DebArchitecture::Amd64));
    }
    if cfg!(all(target_arch = "powerpc64", target_endian = "big")) {
        assert_eq!(host, Some(DebArchitecture::Ppc64));
    }
    if cfg!(all(target_arch = "mips64", target_endian = "big")) {
        assert_eq!(host, None);
    }
    if cfg!(target_endian = "big") {
        assert!(!host.is_some_and(|arch| arch.as_str().ends_with("el")));
    }
}

#[test]
fn source_date_epoch_pins_timestamps() {
    std::env::set_var("SOURCE_DATE_EPOCH", "1234567890");
    let options = BuildOptions::from_env();
    std::env::remove_var("SOURCE_DATE_EPOCH");
    assert_eq!(options.timestamp(), Some(1_234_567_890));
}

// Runs only where dpkg-deb is installed
#[test]
fn dpkg_deb_accepts_package() {
    let dpkg_deb = match which::which("dpkg-deb") {
        Ok(path) => path,
        Err(_) => return,
    };
    let scratch = TempDir::new().unwrap();
    let out = scratch.path().join("foobar.deb");
    let mut package = foobar(&scratch).set_description("Long\ndescription");
    package.add_file_string("hello\n", "/usr/share/foobar/hello").unwrap();
    package
        .add_control_extra_string("postinst", "#!/bin/sh\nexit 0\n")
        .unwrap();
    package.write(&out).unwrap();

    let info = Command::new(&dpkg_deb).arg("--info").arg(&out).output().unwrap();
    assert!(info.status.success(), "{}", String::from_utf8_lossy(&info.stderr));
    assert!(String::from_utf8_lossy(&info.stdout).contains("Package: foobar"));

    let contents = Command::new(&dpkg_deb)
        .arg("--contents")
        .arg(&out)
        .output()
        .unwrap();
    assert!(contents.status.success());
    assert!(String::from_utf8_lossy(&contents.stdout).contains("usr/share/foobar/hello"));
}
