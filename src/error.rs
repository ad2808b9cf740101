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

use std::io;
use std::sync::Arc;

use thiserror::Error;

pub type Result<T, E = DebError> = std::result::Result<T, E>;

/// A mandatory control field is missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty package name")]
    EmptyName,
    #[error("empty architecture")]
    EmptyArchitecture,
    #[error("empty package version")]
    EmptyVersion,
}

/// Errors returned while assembling a package.
///
/// The type is `Clone` so a package that failed can hand the same cause back
/// on every later call.
#[derive(Debug, Clone, Error)]
pub enum DebError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("package is closed")]
    Closed,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("invalid {field} `{value}`")]
    InvalidValue { field: &'static str, value: String },
}

impl DebError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        DebError::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Argument and metadata errors leave the package usable, everything else
    /// is terminal.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(self, DebError::Validation(_) | DebError::InvalidValue { .. })
    }
}

impl From<io::Error> for DebError {
    fn from(source: io::Error) -> Self {
        DebError::io("I/O failed", source)
    }
}

// Attaches a description of what was being done to an io::Error
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, S>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| DebError::io(context(), e))
    }
}
