// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pieces shared by both item kinds.

use std::fmt;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use md5::{Digest, Md5};
use strongroom_crypto::AssociatedData;

use crate::error::{StoreError, StoreResult};
use crate::groups::GroupSet;

/// Schema version written for new records.
pub const SCHEMA_VERSION: u32 = 2;

/// The two kinds of item the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemKind {
	File,
	User,
}

impl ItemKind {
	pub const ALL: [ItemKind; 2] = [ItemKind::File, ItemKind::User];

	pub fn as_str(self) -> &'static str {
		match self {
			ItemKind::File => "file",
			ItemKind::User => "user",
		}
	}

	/// Directory name used by storage backends.
	pub fn dir_name(self) -> &'static str {
		match self {
			ItemKind::File => "files",
			ItemKind::User => "users",
		}
	}
}

impl fmt::Display for ItemKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The two envelopes persisted for an item.
#[derive(Clone, Default)]
pub struct Sealed {
	main: Vec<u8>,
	groups: Vec<u8>,
	etag: OnceLock<String>,
}

impl Sealed {
	pub fn new(main: Vec<u8>, groups: Vec<u8>) -> Self {
		Self {
			main,
			groups,
			etag: OnceLock::new(),
		}
	}

	pub fn main(&self) -> &[u8] {
		&self.main
	}

	pub fn groups(&self) -> &[u8] {
		&self.groups
	}

	/// Base64 MD5 of the main envelope, computed on first use.
	pub fn fingerprint(&self) -> &str {
		self.etag.get_or_init(|| md5_base64(&self.main))
	}

	pub(crate) fn with_groups(&self, groups: Vec<u8>) -> Self {
		Self {
			main: self.main.clone(),
			groups,
			etag: self.etag.clone(),
		}
	}

	pub(crate) fn with_main(&self, main: Vec<u8>) -> Self {
		Self::new(main, self.groups.clone())
	}
}

impl fmt::Debug for Sealed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Sealed")
			.field("main_len", &self.main.len())
			.field("groups_len", &self.groups.len())
			.finish()
	}
}

/// Behaviour common to files and users.
pub trait SecretItem {
	const KIND: ItemKind;

	fn id(&self) -> &str;

	fn version(&self) -> u32;

	fn groups(&self) -> &GroupSet;

	fn sealed(&self) -> &Sealed;

	/// Change marker derived from the ciphertext, not a security property.
	fn content_fingerprint(&self) -> &str {
		self.sealed().fingerprint()
	}
}

pub(crate) fn md5_base64(bytes: &[u8]) -> String {
	STANDARD.encode(Md5::digest(bytes))
}

pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
	time.timestamp_millis().to_string()
}

pub(crate) fn decode_time(aad: &AssociatedData, key: &str) -> StoreResult<DateTime<Utc>> {
	let millis: i64 = decode_number(aad, key)?;
	Utc.timestamp_millis_opt(millis)
		.single()
		.ok_or_else(|| StoreError::corrupt(format!("'{key}' is out of range")))
}

pub(crate) fn decode_number<T: std::str::FromStr>(aad: &AssociatedData, key: &str) -> StoreResult<T> {
	aad.require(key)?
		.parse()
		.map_err(|_| StoreError::corrupt(format!("'{key}' is not a number")))
}

/// Read the schema version, accepting only versions this build understands.
pub(crate) fn decode_version(aad: &AssociatedData) -> StoreResult<u32> {
	match decode_number(aad, "v")? {
		v @ (1 | 2) => Ok(v),
		v => Err(StoreError::corrupt(format!("unknown item schema version {v}"))),
	}
}

/// Ensure the authenticated id matches the id storage filed the item under.
pub(crate) fn check_stored_id(kind: ItemKind, stored: &str, authenticated: &str) -> StoreResult<()> {
	if !stored.eq_ignore_ascii_case(authenticated) {
		return Err(StoreError::corrupt(format!(
			"{kind} stored as '{stored}' authenticates as '{authenticated}'"
		)));
	}
	Ok(())
}
