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

//! Clear-signing through GnuPG.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::digest::DigestSigner;
use crate::error::{DebError, IoContext, Result};

/// Signs digests with a secret key from a GnuPG keyring.
///
/// # Example
///
/// ```no_run
/// use deb_builder::*;
///
/// fn main() -> deb_builder::Result<()> {
///     let mut package = DebPackage::new()
///         .set_name("example")
///         .set_version("0.1.0")
///         .set_architecture(DebArchitecture::All);
///     let signer = GpgSigner::new("0xDEADBEEF")?.set_homedir("/home/builder/.gnupg");
///     package.write_signed("example.deb", &signer)?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct GpgSigner {
    program: PathBuf,
    key_id: String,
    homedir: Option<PathBuf>,
    passphrase: Option<String>,
    digest_algo: String,
    temp_dir: Option<PathBuf>, // Where the plaintext is buffered for gpg
}

impl GpgSigner {
    /// Creates a signer for `key_id`, locating `gpg` on the PATH.
    pub fn new(key_id: &str) -> Result<Self> {
        let program = which::which("gpg")
            .or_else(|_| which::which("gpg2"))
            .map_err(|e| DebError::Signing(format!("cannot find gpg: {}", e)))?;
        Ok(Self::with_program(program, key_id))
    }

    /// Creates a signer that runs the given gpg executable.
    pub fn with_program<P: AsRef<Path>>(program: P, key_id: &str) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            key_id: key_id.to_string(),
            homedir: None,
            passphrase: None,
            digest_algo: "SHA256".to_string(),
            temp_dir: None,
        }
    }

    /// Uses the keyring in `dir` instead of the default one.
    pub fn set_homedir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.homedir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Unlocks the secret key with `passphrase`.
    pub fn set_passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = Some(passphrase.to_string());
        self
    }

    /// Sets the hash algorithm of the signature, e.g. "SHA1" for old dpkg-sig.
    pub fn set_digest_algo(mut self, algo: &str) -> Self {
        self.digest_algo = algo.to_string();
        self
    }

    /// Buffers the digest in `dir` instead of the system temporary directory,
    /// usually the same directory as [`BuildOptions::temp_dir`](crate::BuildOptions::temp_dir).
    pub fn set_temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--batch").arg("--no-tty");
        if let Some(homedir) = &self.homedir {
            command.arg("--homedir").arg(homedir);
        }
        command
    }

    fn check(&self, action: &str, output: Output) -> Result<Output> {
        if output.status.success() {
            Ok(output)
        } else {
            Err(DebError::Signing(format!(
                "gpg {} for key {} exited with {}: {}",
                action,
                self.key_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

impl DigestSigner for GpgSigner {
    // The first user id of the key
    fn identity(&self) -> Result<String> {
        let output = self
            .command()
            .args(["--with-colons", "--list-secret-keys", self.key_id.as_str()])
            .stdin(Stdio::null())
            .output()
            .io_context(|| format!("cannot run {}", self.program.display()))?;
        let output = self.check("--list-secret-keys", output)?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.split(':').collect::<Vec<&str>>())
            .find(|fields| fields.first() == Some(&"uid") && fields.len() > 9)
            .map(|fields| fields[9].to_string())
            .ok_or_else(|| DebError::Signing(format!("key {} has no user id", self.key_id)))
    }

    fn clear_sign(&self, plaintext: &str) -> Result<String> {
        // The plaintext goes through a file so stdin stays free for the passphrase
        let temp_dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&temp_dir)
            .io_context(|| format!("cannot create temp dir {}", temp_dir.display()))?;
        let mut input = tempfile::Builder::new()
            .prefix("deb-builder")
            .suffix(".digest")
            .tempfile_in(&temp_dir)
            .io_context(|| "cannot buffer digest")?;
        input
            .write_all(plaintext.as_bytes())
            .and_then(|_| input.flush())
            .io_context(|| "cannot buffer digest")?;

        let mut command = self.command();
        command
            .args(["--yes", "--armor", "--clearsign"])
            .args(["--digest-algo", self.digest_algo.as_str()])
            .args(["--local-user", self.key_id.as_str()])
            .args(["--output", "-"]);
        if self.passphrase.is_some() {
            command.args(["--pinentry-mode", "loopback", "--passphrase-fd", "0"]);
        }
        command
            .arg(input.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(key = %self.key_id, "clear-signing digest");
        let mut child = command
            .spawn()
            .io_context(|| format!("cannot run {}", self.program.display()))?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(passphrase) = &self.passphrase {
                stdin
                    .write_all(passphrase.as_bytes())
                    .and_then(|_| stdin.write_all(b"\n"))
                    .io_context(|| "cannot pass passphrase to gpg")?;
            }
        }
        let output = child
            .wait_with_output()
            .io_context(|| format!("cannot run {}", self.program.display()))?;
        let output = self.check("--clearsign", output)?;

        String::from_utf8(output.stdout)
            .map_err(|e| DebError::Signing(format!("gpg produced invalid UTF-8: {}", e)))
    }
}
