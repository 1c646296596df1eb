// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Item encryption section: which master key and which algorithm new
//! envelopes are written with.

use serde::{Deserialize, Serialize};

fn default_key_id() -> String {
	"default".to_string()
}

fn default_algorithm() -> String {
	"aes-256-gcm".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EncryptionConfigLayer {
	pub key_id: Option<String>,
	pub algorithm: Option<String>,
}

impl EncryptionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.key_id.is_some() {
			self.key_id = other.key_id;
		}
		if other.algorithm.is_some() {
			self.algorithm = other.algorithm;
		}
	}

	pub fn finalize(self) -> EncryptionConfig {
		EncryptionConfig {
			key_id: self.key_id.unwrap_or_else(default_key_id),
			algorithm: self
				.algorithm
				.map(|a| a.to_ascii_lowercase())
				.unwrap_or_else(default_algorithm),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncryptionConfig {
	/// Master key id passed to the key service for every new data key.
	pub key_id: String,
	/// Algorithm for item payloads.
	pub algorithm: String,
}

impl Default for EncryptionConfig {
	fn default() -> Self {
		Self {
			key_id: default_key_id(),
			algorithm: default_algorithm(),
		}
	}
}
