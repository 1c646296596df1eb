// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local filesystem storage.
//!
//! Layout: `<root>/{files,users}/<id>/{main,groups}`. Directories are created
//! `0700` and blobs `0600` on unix.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{check_storage_id, StorageBackend, StoredItem, StoredRecords};
use crate::error::{StoreError, StoreResult};
use crate::item::ItemKind;

const MAIN_BLOB: &str = "main";
const GROUPS_BLOB: &str = "groups";

#[derive(Debug, Clone)]
pub struct FsStorage {
	root: PathBuf,
}

impl FsStorage {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn kind_dir(&self, kind: ItemKind) -> PathBuf {
		self.root.join(kind.dir_name())
	}

	fn item_dir(&self, kind: ItemKind, id: &str) -> StoreResult<PathBuf> {
		check_storage_id(kind, id)?;
		Ok(self.kind_dir(kind).join(id))
	}

	async fn ensure_kind_dirs(&self) -> StoreResult<()> {
		for kind in ItemKind::ALL {
			create_private_dir(&self.kind_dir(kind), true).await?;
		}
		Ok(())
	}

	async fn load_kind(&self, kind: ItemKind) -> StoreResult<Vec<StoredItem>> {
		let mut entries = tokio::fs::read_dir(self.kind_dir(kind)).await?;
		let mut items = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			let Some(id) = entry.file_name().to_str().map(str::to_string) else {
				warn!(%kind, path = %entry.path().display(), "skipping entry with non UTF-8 name");
				continue;
			};
			if id.starts_with('.') {
				continue;
			}

			let dir = entry.path();
			let main = read_blob(&dir.join(MAIN_BLOB), kind, &id, MAIN_BLOB).await?;
			let groups = read_blob(&dir.join(GROUPS_BLOB), kind, &id, GROUPS_BLOB).await?;
			items.push(StoredItem { id, main, groups });
		}

		Ok(items)
	}

	/// Replace one blob of an existing item via a temporary sibling and rename.
	async fn replace_blob(&self, kind: ItemKind, id: &str, blob: &str, bytes: &[u8]) -> StoreResult<()> {
		let dir = self.item_dir(kind, id)?;
		if !tokio::fs::try_exists(&dir).await? {
			return Err(StoreError::Storage(format!("{kind} '{id}' is not stored")));
		}

		let path = dir.join(blob);
		let tmp_path = dir.join(format!(".{blob}.tmp"));
		write_private_file(&tmp_path, bytes).await?;
		tokio::fs::rename(&tmp_path, &path).await?;

		debug!(%kind, id, blob, path = %path.display(), "replaced blob on disk");
		Ok(())
	}
}

#[async_trait]
impl StorageBackend for FsStorage {
	async fn load_all(&self) -> StoreResult<StoredRecords> {
		self.ensure_kind_dirs().await?;
		let records = StoredRecords {
			files: self.load_kind(ItemKind::File).await?,
			users: self.load_kind(ItemKind::User).await?,
		};
		info!(
			root = %self.root.display(),
			files = records.files.len(),
			users = records.users.len(),
			"loaded items from disk"
		);
		Ok(records)
	}

	async fn add_item(&self, kind: ItemKind, id: &str, main: &[u8], groups: &[u8]) -> StoreResult<()> {
		let dir = self.item_dir(kind, id)?;
		self.ensure_kind_dirs().await?;

		match create_private_dir(&dir, false).await {
			Ok(()) => {}
			Err(e) if e.kind() == ErrorKind::AlreadyExists => {
				return Err(StoreError::AlreadyStored {
					kind,
					id: id.to_string(),
				});
			}
			Err(e) => return Err(e.into()),
		}

		write_private_file(&dir.join(MAIN_BLOB), main).await?;
		write_private_file(&dir.join(GROUPS_BLOB), groups).await?;

		debug!(%kind, id, path = %dir.display(), "stored item on disk");
		Ok(())
	}

	async fn update_main(&self, kind: ItemKind, id: &str, main: &[u8]) -> StoreResult<()> {
		self.replace_blob(kind, id, MAIN_BLOB, main).await
	}

	async fn update_groups(&self, kind: ItemKind, id: &str, groups: &[u8]) -> StoreResult<()> {
		self.replace_blob(kind, id, GROUPS_BLOB, groups).await
	}

	async fn erase_all(&self) -> StoreResult<()> {
		for kind in ItemKind::ALL {
			match tokio::fs::remove_dir_all(self.kind_dir(kind)).await {
				Ok(()) => {}
				Err(e) if e.kind() == ErrorKind::NotFound => {}
				Err(e) => return Err(e.into()),
			}
		}
		self.ensure_kind_dirs().await?;
		warn!(root = %self.root.display(), "erased all stored items");
		Ok(())
	}
}

async fn read_blob(path: &Path, kind: ItemKind, id: &str, missing: &'static str) -> StoreResult<Vec<u8>> {
	match tokio::fs::read(path).await {
		Ok(bytes) => Ok(bytes),
		Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::IncompleteItem {
			kind,
			id: id.to_string(),
			missing,
		}),
		Err(e) => Err(e.into()),
	}
}

async fn create_private_dir(path: &Path, recursive: bool) -> std::io::Result<()> {
	let mut builder = tokio::fs::DirBuilder::new();
	builder.recursive(recursive);
	#[cfg(unix)]
	builder.mode(0o700);
	builder.create(path).await
}

async fn write_private_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
	let mut options = tokio::fs::OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	options.mode(0o600);

	let mut file = options.open(path).await?;
	file.write_all(bytes).await?;
	file.sync_all().await
}
