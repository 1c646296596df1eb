// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage backend section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_root_directory() -> PathBuf {
	PathBuf::from("./strongroom-data")
}

/// Where item envelopes are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageProvider {
	#[default]
	FileSystem,
	Memory,
}

impl std::fmt::Display for StorageProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StorageProvider::FileSystem => write!(f, "file-system"),
			StorageProvider::Memory => write!(f, "memory"),
		}
	}
}

impl std::str::FromStr for StorageProvider {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"file-system" => Ok(StorageProvider::FileSystem),
			"memory" => Ok(StorageProvider::Memory),
			_ => Err(ConfigError::UnsupportedProvider {
				section: "storage",
				value: s.to_string(),
			}),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfigLayer {
	pub provider: Option<StorageProvider>,
	pub root_directory: Option<PathBuf>,
}

impl StorageConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.provider.is_some() {
			self.provider = other.provider;
		}
		if other.root_directory.is_some() {
			self.root_directory = other.root_directory;
		}
	}

	pub fn finalize(self) -> StorageConfig {
		StorageConfig {
			provider: self.provider.unwrap_or_default(),
			root_directory: self.root_directory.unwrap_or_else(default_root_directory),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
	pub provider: StorageProvider,
	/// Root of the `files/` and `users/` trees for the file-system provider.
	pub root_directory: PathBuf,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			provider: StorageProvider::default(),
			root_directory: default_root_directory(),
		}
	}
}
