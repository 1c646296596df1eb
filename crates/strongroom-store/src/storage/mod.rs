// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Opaque blob persistence for item envelopes.

mod fs;
mod memory;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::item::ItemKind;

/// Both envelopes of one persisted item, as storage filed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
	pub id: String,
	pub main: Vec<u8>,
	pub groups: Vec<u8>,
}

/// Everything a backend holds, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecords {
	pub files: Vec<StoredItem>,
	pub users: Vec<StoredItem>,
}

impl StoredRecords {
	pub fn of_kind(&self, kind: ItemKind) -> &[StoredItem] {
		match kind {
			ItemKind::File => &self.files,
			ItemKind::User => &self.users,
		}
	}

	pub fn len(&self) -> usize {
		self.files.len() + self.users.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Trait for storage backends. Implementations must be safe for concurrent
/// use and give no atomicity across the two blobs of an item.
#[async_trait]
pub trait StorageBackend: Send + Sync {
	/// Read every stored item. Fails if any item lacks one of its blobs.
	async fn load_all(&self) -> StoreResult<StoredRecords>;

	/// Persist a new item. Fails with [`StoreError::AlreadyStored`] if the
	/// backend already holds this kind and id.
	async fn add_item(&self, kind: ItemKind, id: &str, main: &[u8], groups: &[u8]) -> StoreResult<()>;

	async fn update_main(&self, kind: ItemKind, id: &str, main: &[u8]) -> StoreResult<()>;

	async fn update_groups(&self, kind: ItemKind, id: &str, groups: &[u8]) -> StoreResult<()>;

	/// Remove every stored item.
	async fn erase_all(&self) -> StoreResult<()>;
}

/// Reject ids that could name anything other than a single directory entry.
pub(crate) fn check_storage_id(kind: ItemKind, id: &str) -> StoreResult<()> {
	let unsafe_id = id.is_empty()
		|| id.starts_with('.')
		|| id.contains(['/', '\\', '\0'])
		|| id.len() > crate::validate::MAX_ID_LENGTH;
	if unsafe_id {
		return Err(StoreError::Storage(format!(
			"refusing to store {kind} under id '{}'",
			id.escape_default()
		)));
	}
	Ok(())
}
