// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	EncryptionConfigLayer, KeyServiceConfigLayer, LoggingConfigLayer, StorageConfigLayer,
};

/// Strongroom configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrongroomConfigLayer {
	#[serde(default)]
	pub encryption: Option<EncryptionConfigLayer>,
	#[serde(default)]
	pub key_service: Option<KeyServiceConfigLayer>,
	#[serde(default)]
	pub storage: Option<StorageConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl StrongroomConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: StrongroomConfigLayer) {
		merge_option(
			&mut self.encryption,
			other.encryption,
			EncryptionConfigLayer::merge,
		);
		merge_option(
			&mut self.key_service,
			other.key_service,
			KeyServiceConfigLayer::merge,
		);
		merge_option(&mut self.storage, other.storage, StorageConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
