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

use std::fmt;
use std::str::FromStr;

use crate::error::DebError;

/// Contents of the `debian-binary` member, the format version of the package.
pub const DEBIAN_BINARY: &str = "2.0\n";

/// File extension of binary packages.
pub const DEB_EXTENSION: &str = "deb";

// Represents the architectures Debian ships, according to
// https://wiki.debian.org/SupportedArchitectures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebArchitecture {
    All,
    Any,
    Alpha,
    Amd64,
    Arm64,
    Armel,
    Armhf,
    Hppa,
    I386,
    Ia64,
    Loong64,
    M68k,
    Mips64el,
    Mipsel,
    PowerPC,
    Ppc64,
    Ppc64el,
    Riscv64,
    S390x,
    Sh4,
    Sparc64,
    X32,
    HurdI386,
    KFreebsdAmd64,
    KFreebsdI386,
}

impl DebArchitecture {
    // Converts DebArchitecture to &str
    pub fn as_str(&self) -> &'static str {
        match self {
            DebArchitecture::All => "all",
            DebArchitecture::Any => "any",
            DebArchitecture::Alpha => "alpha",
            DebArchitecture::Amd64 => "amd64",
            DebArchitecture::Arm64 => "arm64",
            DebArchitecture::Armel => "armel",
            DebArchitecture::Armhf => "armhf",
            DebArchitecture::Hppa => "hppa",
            DebArchitecture::I386 => "i386",
            DebArchitecture::Ia64 => "ia64",
            DebArchitecture::Loong64 => "loong64",
            DebArchitecture::M68k => "m68k",
            DebArchitecture::Mips64el => "mips64el",
            DebArchitecture::Mipsel => "mipsel",
            DebArchitecture::PowerPC => "powerpc",
            DebArchitecture::Ppc64 => "ppc64",
            DebArchitecture::Ppc64el => "ppc64el",
            DebArchitecture::Riscv64 => "riscv64",
            DebArchitecture::S390x => "s390x",
            DebArchitecture::Sh4 => "sh4",
            DebArchitecture::Sparc64 => "sparc64",
            DebArchitecture::X32 => "x32",
            DebArchitecture::HurdI386 => "hurd-i386",
            DebArchitecture::KFreebsdAmd64 => "kfreebsd-amd64",
            DebArchitecture::KFreebsdI386 => "kfreebsd-i386",
        }
    }

    /// Returns the Debian name of the architecture this library was compiled for,
    /// if Debian has one.
    pub fn host() -> Option<Self> {
        // mips64el, mipsel and ppc64el are the little-endian ports
        let little_endian = cfg!(target_endian = "little");
        match (std::env::consts::ARCH, std::env::consts::OS) {
            ("x86_64", _) => Some(DebArchitecture::Amd64),
            ("x86", "hurd") => Some(DebArchitecture::HurdI386),
            ("x86", _) => Some(DebArchitecture::I386),
            ("aarch64", _) => Some(DebArchitecture::Arm64),
            // armhf is the only 32-bit arm port with a hard float ABI
            ("arm", _) => Some(DebArchitecture::Armhf),
            ("loongarch64", _) => Some(DebArchitecture::Loong64),
            ("m68k", _) => Some(DebArchitecture::M68k),
            ("mips64", _) if little_endian => Some(DebArchitecture::Mips64el),
            ("mips", _) if little_endian => Some(DebArchitecture::Mipsel),
            ("powerpc", _) => Some(DebArchitecture::PowerPC),
            ("powerpc64", _) if little_endian => Some(DebArchitecture::Ppc64el),
            ("powerpc64", _) => Some(DebArchitecture::Ppc64),
            ("riscv64", _) => Some(DebArchitecture::Riscv64),
            ("s390x", _) => Some(DebArchitecture::S390x),
            ("sparc64", _) => Some(DebArchitecture::Sparc64),
            _ => None,
        }
    }
}

impl FromStr for DebArchitecture {
    type Err = DebError;

    // Converts &str to DebArchitecture
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "all" => Ok(DebArchitecture::All),
            "any" => Ok(DebArchitecture::Any),
            "alpha" => Ok(DebArchitecture::Alpha),
            "amd64" => Ok(DebArchitecture::Amd64),
            "arm64" => Ok(DebArchitecture::Arm64),
            "armel" => Ok(DebArchitecture::Armel),
            "armhf" => Ok(DebArchitecture::Armhf),
            "hppa" => Ok(DebArchitecture::Hppa),
            "i386" => Ok(DebArchitecture::I386),
            "ia64" => Ok(DebArchitecture::Ia64),
            "loong64" => Ok(DebArchitecture::Loong64),
            "m68k" => Ok(DebArchitecture::M68k),
            "mips64el" => Ok(DebArchitecture::Mips64el),
            "mipsel" => Ok(DebArchitecture::Mipsel),
            "powerpc" => Ok(DebArchitecture::PowerPC),
            "ppc64" => Ok(DebArchitecture::Ppc64),
            "ppc64el" => Ok(DebArchitecture::Ppc64el),
            "riscv64" => Ok(DebArchitecture::Riscv64),
            "s390x" => Ok(DebArchitecture::S390x),
            "sh4" => Ok(DebArchitecture::Sh4),
            "sparc64" => Ok(DebArchitecture::Sparc64),
            "x32" => Ok(DebArchitecture::X32),
            "hurd-i386" => Ok(DebArchitecture::HurdI386),
            "kfreebsd-amd64" => Ok(DebArchitecture::KFreebsdAmd64),
            "kfreebsd-i386" => Ok(DebArchitecture::KFreebsdI386),
            &_ => Err(DebError::InvalidValue {
                field: "architecture",
                value: input.to_string(),
            }),
        }
    }
}

impl AsRef<str> for DebArchitecture {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DebArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Used for Deb's Priority field
// This is described in Debian's official documentation here:
// https://www.debian.org/doc/debian-policy/ch-archive.html#priorities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebPriority {
    /// The Priority field is left out of the control file.
    #[default]
    Unset,
    Required,
    Important,
    Standard,
    Optional,
}

impl DebPriority {
    // Converts DebPriority to &str, Unset is the empty string
    pub fn as_str(&self) -> &'static str {
        match self {
            DebPriority::Unset => "",
            DebPriority::Required => "required",
            DebPriority::Important => "important",
            DebPriority::Standard => "standard",
            DebPriority::Optional => "optional",
        }
    }
}

impl FromStr for DebPriority {
    type Err = DebError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "" => Ok(DebPriority::Unset),
            "required" => Ok(DebPriority::Required),
            "important" => Ok(DebPriority::Important),
            "standard" => Ok(DebPriority::Standard),
            "optional" => Ok(DebPriority::Optional),
            &_ => Err(DebError::InvalidValue {
                field: "priority",
                value: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for DebPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Version control systems a package can point at through the Vcs-* fields
// https://www.debian.org/doc/manuals/developers-reference/best-pkging-practices.html#bpp-vcs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VcsType {
    /// No Vcs-<Type> field is written.
    #[default]
    Unset,
    Arch,
    Bzr,
    Darcs,
    Git,
    Hg,
    Mtn,
    Svn,
}

impl VcsType {
    // The part after "Vcs-" in the field name
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsType::Unset => "",
            VcsType::Arch => "Arch",
            VcsType::Bzr => "Bzr",
            VcsType::Darcs => "Darcs",
            VcsType::Git => "Git",
            VcsType::Hg => "Hg",
            VcsType::Mtn => "Mtn",
            VcsType::Svn => "Svn",
        }
    }
}

impl FromStr for VcsType {
    type Err = DebError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "" => Ok(VcsType::Unset),
            "arch" => Ok(VcsType::Arch),
            "bzr" | "bazaar" => Ok(VcsType::Bzr),
            "darcs" => Ok(VcsType::Darcs),
            "git" => Ok(VcsType::Git),
            "hg" | "mercurial" => Ok(VcsType::Hg),
            "mtn" | "monotone" => Ok(VcsType::Mtn),
            "svn" | "subversion" => Ok(VcsType::Svn),
            _ => Err(DebError::InvalidValue {
                field: "vcs type",
                value: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for VcsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
