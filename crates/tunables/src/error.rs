//! Error types for registry operations.
//!
//! Only the file-facing fronts surface these; line-level problems during a
//! load (unknown keys, rejected values) are skip-and-continue and reported
//! through boolean results plus the registry's diagnostic lists.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or storing property files.
#[derive(Debug, Error)]
pub enum PropError {
	/// Error reading or writing a property file.
	#[error("I/O error on {path}: {error}")]
	Io {
		/// Path to the file that failed.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// File contents are not printable text.
	#[error("{path} does not contain printable text")]
	NotPrintable {
		/// Path to the offending file.
		path: PathBuf,
	},

	/// A load was aborted by the unknown-field or duplicate-section policy.
	#[error("load aborted: {0}")]
	Aborted(String),
}

/// Result type for registry file operations.
pub type Result<T> = std::result::Result<T, PropError>;
