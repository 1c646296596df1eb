// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacted secret values and the `VAR` / `VAR_FILE` environment convention.

use std::path::PathBuf;
use std::{env, fmt, fs};

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

pub const REDACTED: &str = "[REDACTED]";

/// A string that never appears in `Debug` or `Display` output and is wiped on
/// drop. Call [`SecretString::expose`] to read it.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
	inner: String,
}

impl SecretString {
	pub fn new(inner: impl Into<String>) -> Self {
		Self {
			inner: inner.into(),
		}
	}

	pub fn expose(&self) -> &str {
		&self.inner
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

/// Load a secret from `VAR_FILE` (preferred) or `VAR`.
///
/// One trailing newline is stripped from file contents. Returns `Ok(None)`
/// when neither variable is set.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(ConfigError::Secret(format!("secret file path in {file_var} is empty")));
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(secret)));
	}

	if let Ok(value) = env::var(var) {
		return Ok(Some(SecretString::new(value)));
	}

	Ok(None)
}
