// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key service section.
//!
//! The secret key is only ever taken from the environment
//! (`STRONGROOM_KEY_SERVICE_SECRET_KEY` or its `_FILE` variant); a
//! `secret_key` entry in a TOML file is ignored.

use serde::{Deserialize, Serialize};
use strongroom_crypto::SecretKeyEncoding;

use crate::error::ConfigError;
use crate::secret::SecretString;

fn default_algorithm() -> String {
	"aes-256-gcm".to_string()
}

/// Which key service wraps data keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyServiceProvider {
	#[default]
	LocalSymmetric,
}

impl std::fmt::Display for KeyServiceProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			KeyServiceProvider::LocalSymmetric => write!(f, "local-symmetric"),
		}
	}
}

impl std::str::FromStr for KeyServiceProvider {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"local-symmetric" => Ok(KeyServiceProvider::LocalSymmetric),
			_ => Err(ConfigError::UnsupportedProvider {
				section: "key_service",
				value: s.to_string(),
			}),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyServiceConfigLayer {
	pub provider: Option<KeyServiceProvider>,
	/// Algorithm of the master key.
	pub algorithm: Option<String>,
	#[serde(skip)]
	pub secret_key: Option<SecretString>,
	/// `base64` or `hex`.
	pub secret_key_encoding: Option<String>,
}

impl KeyServiceConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.provider.is_some() {
			self.provider = other.provider;
		}
		if other.algorithm.is_some() {
			self.algorithm = other.algorithm;
		}
		if other.secret_key.is_some() {
			self.secret_key = other.secret_key;
		}
		if other.secret_key_encoding.is_some() {
			self.secret_key_encoding = other.secret_key_encoding;
		}
	}

	pub fn finalize(self) -> Result<KeyServiceConfig, ConfigError> {
		let secret_key_encoding = match self.secret_key_encoding {
			Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
				key: "key_service.secret_key_encoding".to_string(),
				message: format!("expected 'base64' or 'hex', got '{value}'"),
			})?,
			None => SecretKeyEncoding::default(),
		};

		Ok(KeyServiceConfig {
			provider: self.provider.unwrap_or_default(),
			algorithm: self
				.algorithm
				.map(|a| a.to_ascii_lowercase())
				.unwrap_or_else(default_algorithm),
			secret_key: self.secret_key,
			secret_key_encoding,
		})
	}
}

#[derive(Debug, Clone)]
pub struct KeyServiceConfig {
	pub provider: KeyServiceProvider,
	pub algorithm: String,
	pub secret_key: Option<SecretString>,
	pub secret_key_encoding: SecretKeyEncoding,
}

impl Default for KeyServiceConfig {
	fn default() -> Self {
		Self {
			provider: KeyServiceProvider::default(),
			algorithm: default_algorithm(),
			secret_key: None,
			secret_key_encoding: SecretKeyEncoding::default(),
		}
	}
}
