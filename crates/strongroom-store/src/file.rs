// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File items. The payload is the file content; the metadata rides along as
//! embedded associated data so it can be listed without decrypting.

use chrono::{DateTime, Utc};
use strongroom_crypto::AssociatedData;
use zeroize::Zeroizing;

use crate::error::StoreResult;
use crate::groups::GroupSet;
use crate::item::{
	decode_number, decode_time, decode_version, encode_time, ItemKind, Sealed, SecretItem,
	SCHEMA_VERSION,
};
use crate::validate::{validate_content_type, validate_file_name, validate_file_size};

/// Content type assumed for records written before it was stored.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
	pub version: u32,
	pub id: String,
	pub content_length: u64,
	pub created_at: DateTime<Utc>,
	pub modified_at: DateTime<Utc>,
	pub content_type: String,
}

impl FileMetadata {
	pub fn to_aad(&self) -> AssociatedData {
		let mut aad = AssociatedData::new()
			.with("v", self.version.to_string())
			.with("id", self.id.as_str())
			.with("contentLength", self.content_length.to_string())
			.with("createdAt", encode_time(&self.created_at))
			.with("modifiedAt", encode_time(&self.modified_at));
		if self.version >= 2 {
			aad.insert("contentType", self.content_type.as_str());
		}
		aad
	}

	pub fn from_aad(aad: &AssociatedData) -> StoreResult<Self> {
		let version = decode_version(aad)?;
		let content_type = match version {
			1 => DEFAULT_CONTENT_TYPE.to_string(),
			_ => aad.require("contentType")?.to_string(),
		};
		Ok(Self {
			version,
			id: aad.require("id")?.to_string(),
			content_length: decode_number(aad, "contentLength")?,
			created_at: decode_time(aad, "createdAt")?,
			modified_at: decode_time(aad, "modifiedAt")?,
			content_type,
		})
	}

	pub fn validate(&self) -> StoreResult<()> {
		validate_file_name(&self.id)?;
		validate_content_type(&self.content_type)
	}
}

/// A file to be added to the store.
pub struct NewFile {
	id: String,
	content: Zeroizing<Vec<u8>>,
	content_type: Option<String>,
	created_at: Option<DateTime<Utc>>,
	modified_at: Option<DateTime<Utc>>,
	groups: GroupSet,
}

impl NewFile {
	pub fn new(id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
		Self {
			id: id.into(),
			content: Zeroizing::new(content.into()),
			content_type: None,
			created_at: None,
			modified_at: None,
			groups: GroupSet::new(),
		}
	}

	pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());
		self
	}

	pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
		self.created_at = Some(created_at);
		self
	}

	pub fn modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
		self.modified_at = Some(modified_at);
		self
	}

	pub fn groups(mut self, groups: GroupSet) -> Self {
		self.groups = groups;
		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	/// Apply defaults and validate the file fields, yielding the metadata,
	/// payload and the still unchecked groups.
	pub(crate) fn prepare(
		self,
		now: DateTime<Utc>,
	) -> StoreResult<(FileMetadata, Zeroizing<Vec<u8>>, GroupSet)> {
		validate_file_size(self.content.len())?;
		let created_at = self.created_at.unwrap_or(now);
		let meta = FileMetadata {
			version: SCHEMA_VERSION,
			id: self.id,
			content_length: self.content.len() as u64,
			created_at,
			modified_at: self.modified_at.unwrap_or(created_at),
			content_type: self
				.content_type
				.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
		};
		meta.validate()?;
		Ok((meta, self.content, self.groups))
	}
}

impl std::fmt::Debug for NewFile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NewFile")
			.field("id", &self.id)
			.field("content_len", &self.content.len())
			.field("content_type", &self.content_type)
			.field("groups", &self.groups)
			.finish()
	}
}

/// A loaded file: decrypted metadata, groups and its sealed envelopes.
#[derive(Debug, Clone)]
pub struct SecretFile {
	meta: FileMetadata,
	groups: GroupSet,
	sealed: Sealed,
}

impl SecretFile {
	pub(crate) fn new(meta: FileMetadata, groups: GroupSet, sealed: Sealed) -> Self {
		Self {
			meta,
			groups,
			sealed,
		}
	}

	pub fn metadata(&self) -> &FileMetadata {
		&self.meta
	}

	pub fn path(&self) -> String {
		format!("/{}", self.meta.id)
	}

	pub fn content_length(&self) -> u64 {
		self.meta.content_length
	}

	pub fn content_type(&self) -> &str {
		&self.meta.content_type
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.meta.created_at
	}

	pub fn modified_at(&self) -> DateTime<Utc> {
		self.meta.modified_at
	}

	pub(crate) fn regrouped(&self, groups: GroupSet, encrypted_groups: Vec<u8>) -> Self {
		Self {
			meta: self.meta.clone(),
			groups,
			sealed: self.sealed.with_groups(encrypted_groups),
		}
	}
}

impl SecretItem for SecretFile {
	const KIND: ItemKind = ItemKind::File;

	fn id(&self) -> &str {
		&self.meta.id
	}

	fn version(&self) -> u32 {
		self.meta.version
	}

	fn groups(&self) -> &GroupSet {
		&self.groups
	}

	fn sealed(&self) -> &Sealed {
		&self.sealed
	}
}
