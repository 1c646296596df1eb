// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{check_storage_id, StorageBackend, StoredItem, StoredRecords};
use crate::error::{StoreError, StoreResult};
use crate::item::ItemKind;

#[derive(Debug, Clone, Default)]
struct Blobs {
	main: Option<Vec<u8>>,
	groups: Option<Vec<u8>>,
}

/// In-process storage. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	items: Mutex<BTreeMap<(ItemKind, String), Blobs>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Place blobs directly, bypassing the add protocol. `None` leaves that
	/// blob missing, as after a partial write.
	pub fn insert_raw(&self, kind: ItemKind, id: &str, main: Option<Vec<u8>>, groups: Option<Vec<u8>>) {
		self.items
			.lock()
			.insert((kind, id.to_string()), Blobs { main, groups });
	}

	/// Copy of the main blob, if present.
	pub fn main_blob(&self, kind: ItemKind, id: &str) -> Option<Vec<u8>> {
		self.items
			.lock()
			.get(&(kind, id.to_string()))
			.and_then(|b| b.main.clone())
	}

	pub fn contains(&self, kind: ItemKind, id: &str) -> bool {
		self.items.lock().contains_key(&(kind, id.to_string()))
	}

	fn update(&self, kind: ItemKind, id: &str, apply: impl FnOnce(&mut Blobs)) -> StoreResult<()> {
		let mut items = self.items.lock();
		let blobs = items
			.get_mut(&(kind, id.to_string()))
			.ok_or_else(|| StoreError::Storage(format!("{kind} '{id}' is not stored")))?;
		apply(blobs);
		Ok(())
	}
}

#[async_trait]
impl StorageBackend for MemoryStorage {
	async fn load_all(&self) -> StoreResult<StoredRecords> {
		let items = self.items.lock();
		let mut records = StoredRecords::default();
		for ((kind, id), blobs) in items.iter() {
			let incomplete = |missing| StoreError::IncompleteItem {
				kind: *kind,
				id: id.clone(),
				missing,
			};
			let item = StoredItem {
				id: id.clone(),
				main: blobs.main.clone().ok_or_else(|| incomplete("main"))?,
				groups: blobs.groups.clone().ok_or_else(|| incomplete("groups"))?,
			};
			match kind {
				ItemKind::File => records.files.push(item),
				ItemKind::User => records.users.push(item),
			}
		}
		Ok(records)
	}

	async fn add_item(&self, kind: ItemKind, id: &str, main: &[u8], groups: &[u8]) -> StoreResult<()> {
		check_storage_id(kind, id)?;
		let mut items = self.items.lock();
		let key = (kind, id.to_string());
		if items.contains_key(&key) {
			return Err(StoreError::AlreadyStored {
				kind,
				id: id.to_string(),
			});
		}
		items.insert(
			key,
			Blobs {
				main: Some(main.to_vec()),
				groups: Some(groups.to_vec()),
			},
		);
		debug!(%kind, id, "stored item in memory");
		Ok(())
	}

	async fn update_main(&self, kind: ItemKind, id: &str, main: &[u8]) -> StoreResult<()> {
		self.update(kind, id, |b| b.main = Some(main.to_vec()))
	}

	async fn update_groups(&self, kind: ItemKind, id: &str, groups: &[u8]) -> StoreResult<()> {
		self.update(kind, id, |b| b.groups = Some(groups.to_vec()))
	}

	async fn erase_all(&self) -> StoreResult<()> {
		self.items.lock().clear();
		Ok(())
	}
}
