// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The access-controlled in-memory index over stored files and users.
//!
//! Every mutation follows the same order: validate, encrypt, persist, and
//! only then touch the in-memory maps. A failure at any step leaves the maps
//! as they were. Mutations are serialized by a single async mutex; readers
//! only take short synchronous locks and never wait on I/O.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use zeroize::Zeroizing;

use crate::cert::CertificateInfo;
use crate::error::{StoreError, StoreResult};
use crate::file::{FileMetadata, NewFile, SecretFile};
use crate::groups::{sets_intersect, validate_groups, GroupSet};
use crate::item::{check_stored_id, ItemKind, Sealed, SecretItem};
use crate::node::{FileNode, VirtualRoot, ROOT_PATH};
use crate::sealer::ItemSealer;
use crate::storage::{StorageBackend, StoredItem};
use crate::user::{NewUser, Role, SecretUser, UserProfile, UserUpdate};

type ItemMap<T> = RwLock<HashMap<String, Arc<T>>>;

pub struct SecretIndex {
	sealer: ItemSealer,
	storage: Arc<dyn StorageBackend>,
	root: Arc<VirtualRoot>,
	files: ItemMap<SecretFile>,
	users: ItemMap<SecretUser>,
	write_lock: Mutex<()>,
}

impl std::fmt::Debug for SecretIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretIndex")
			.field("sealer", &self.sealer)
			.field("files", &self.file_count())
			.field("users", &self.user_count())
			.finish_non_exhaustive()
	}
}

impl SecretIndex {
	// =========================================================================
	// Loading
	// =========================================================================

	/// Load and decrypt every stored item.
	///
	/// Fails closed: any unreadable item or duplicate id aborts the whole load
	/// with [`StoreError::LoadFailed`] and no index is returned.
	#[instrument(skip_all)]
	pub async fn load(sealer: ItemSealer, storage: Arc<dyn StorageBackend>) -> StoreResult<Self> {
		match Self::try_load(&sealer, storage.as_ref()).await {
			Ok((files, users)) => {
				info!(files = files.len(), users = users.len(), "secret index loaded");
				Ok(Self {
					sealer,
					storage,
					root: Arc::new(VirtualRoot::new(Utc::now())),
					files: RwLock::new(files),
					users: RwLock::new(users),
					write_lock: Mutex::new(()),
				})
			}
			Err(e) => {
				error!(error = %e, "refusing to serve a partially loaded store");
				Err(StoreError::LoadFailed(Box::new(e)))
			}
		}
	}

	async fn try_load(
		sealer: &ItemSealer,
		storage: &dyn StorageBackend,
	) -> StoreResult<(HashMap<String, Arc<SecretFile>>, HashMap<String, Arc<SecretUser>>)> {
		let records = storage.load_all().await?;

		let (files, users) = futures::try_join!(
			try_join_all(records.files.into_iter().map(|item| load_file(sealer, item))),
			try_join_all(records.users.into_iter().map(|item| load_user(sealer, item))),
		)?;

		Ok((into_map(files)?, into_map(users)?))
	}

	// =========================================================================
	// Adding
	// =========================================================================

	#[instrument(skip(self, new), fields(id = %new.id()))]
	pub async fn add_file(&self, new: NewFile) -> StoreResult<Arc<SecretFile>> {
		let (meta, content, groups) = new.prepare(Utc::now())?;
		let key = meta.id.to_lowercase();
		ensure_absent(&self.files, &key, &meta.id)?;
		validate_groups(&groups)?;

		let _guard = self.write_lock.lock().await;
		ensure_absent(&self.files, &key, &meta.id)?;

		let main = self.sealer.seal(&content, &meta.to_aad(), true).await?;
		let sealed_groups = self.sealer.seal_groups(&meta.id, &groups).await?;
		self.storage
			.add_item(ItemKind::File, &meta.id, &main, &sealed_groups)
			.await?;

		let meta = FileMetadata::from_aad(&self.sealer.peek_aad(&main)?)?;
		let file = Arc::new(SecretFile::new(meta, groups, Sealed::new(main, sealed_groups)));
		self.files.write().insert(key, Arc::clone(&file));

		info!(
			content_length = file.content_length(),
			groups = file.groups().len(),
			"added file"
		);
		Ok(file)
	}

	#[instrument(skip(self, new), fields(id = %new.id))]
	pub async fn add_user(&self, new: NewUser) -> StoreResult<Arc<SecretUser>> {
		let (profile, fingerprint, groups) = new.prepare()?;
		let key = profile.id.to_lowercase();
		ensure_absent(&self.users, &key, &profile.id)?;
		validate_groups(&groups)?;

		let _guard = self.write_lock.lock().await;
		ensure_absent(&self.users, &key, &profile.id)?;

		let main = self
			.sealer
			.seal(fingerprint.as_bytes(), &profile.to_aad(), true)
			.await?;
		let sealed_groups = self.sealer.seal_groups(&profile.id, &groups).await?;
		self.storage
			.add_item(ItemKind::User, &profile.id, &main, &sealed_groups)
			.await?;

		let profile = UserProfile::from_aad(&self.sealer.peek_aad(&main)?)?;
		let user = Arc::new(SecretUser::new(
			profile,
			fingerprint,
			groups,
			Sealed::new(main, sealed_groups),
		));
		self.users.write().insert(key, Arc::clone(&user));

		info!(role = %user.role(), groups = user.groups().len(), "added user");
		Ok(user)
	}

	// =========================================================================
	// Updating
	// =========================================================================

	#[instrument(skip(self, groups))]
	pub async fn update_file_groups(&self, id: &str, groups: GroupSet) -> StoreResult<Arc<SecretFile>> {
		self.regroup(&self.files, id, groups, SecretFile::regrouped).await
	}

	#[instrument(skip(self, groups))]
	pub async fn update_user_groups(&self, id: &str, groups: GroupSet) -> StoreResult<Arc<SecretUser>> {
		self.regroup(&self.users, id, groups, SecretUser::regrouped).await
	}

	/// Apply `update` to a user's profile or certificate fingerprint.
	#[instrument(skip(self, update))]
	pub async fn update_user_data(&self, id: &str, update: UserUpdate) -> StoreResult<Arc<SecretUser>> {
		let key = id.to_lowercase();
		require(&self.users, &key, id)?;

		let _guard = self.write_lock.lock().await;
		let current = require(&self.users, &key, id)?;
		let (profile, fingerprint) = current.merged(update)?;

		let main = self
			.sealer
			.seal(fingerprint.as_bytes(), &profile.to_aad(), true)
			.await?;
		self.storage
			.update_main(ItemKind::User, current.id(), &main)
			.await?;

		let profile = UserProfile::from_aad(&self.sealer.peek_aad(&main)?)?;
		let user = Arc::new(current.rewritten(profile, fingerprint, main));
		self.users.write().insert(key, Arc::clone(&user));

		info!(role = %user.role(), "updated user");
		Ok(user)
	}

	async fn regroup<T: SecretItem>(
		&self,
		map: &ItemMap<T>,
		id: &str,
		groups: GroupSet,
		rebuild: fn(&T, GroupSet, Vec<u8>) -> T,
	) -> StoreResult<Arc<T>> {
		let key = id.to_lowercase();
		require(map, &key, id)?;
		validate_groups(&groups)?;

		let _guard = self.write_lock.lock().await;
		let current = require(map, &key, id)?;

		let sealed_groups = self.sealer.seal_groups(current.id(), &groups).await?;
		self.storage
			.update_groups(T::KIND, current.id(), &sealed_groups)
			.await?;

		let updated = Arc::new(rebuild(current.as_ref(), groups, sealed_groups));
		map.write().insert(key, Arc::clone(&updated));

		let kind = T::KIND;
		info!(%kind, groups = updated.groups().len(), "updated groups");
		Ok(updated)
	}

	/// Remove every stored item, then empty the index.
	#[instrument(skip(self))]
	pub async fn erase_all(&self) -> StoreResult<()> {
		let _guard = self.write_lock.lock().await;
		self.storage.erase_all().await?;
		self.files.write().clear();
		self.users.write().clear();
		warn!("erased all files and users");
		Ok(())
	}

	// =========================================================================
	// Files
	// =========================================================================

	pub fn root(&self) -> FileNode {
		FileNode::Root(Arc::clone(&self.root))
	}

	/// Resolve a path, ignoring case and a leading `/`. The empty path and `/`
	/// resolve to the root.
	pub fn get_file(&self, path: &str) -> Option<FileNode> {
		match normalize_path(path) {
			None => Some(self.root()),
			Some(key) => self.files.read().get(&key).cloned().map(FileNode::File),
		}
	}

	pub fn has_file(&self, path: &str) -> bool {
		self.get_file(path).is_some()
	}

	/// Resolve a path on behalf of `user`.
	///
	/// Returns `None` both when the file does not exist and when it shares no
	/// group with the user. The root resolves even without a user.
	pub fn user_get_file(&self, user: Option<&SecretUser>, path: &str) -> Option<FileNode> {
		let Some(key) = normalize_path(path) else {
			return Some(self.root());
		};
		let user = user?;
		let file = self.files.read().get(&key).cloned()?;
		if !sets_intersect(file.groups(), user.groups()) {
			debug!(user = user.id(), file = file.id(), "file not visible to user");
			return None;
		}
		Some(FileNode::File(file))
	}

	pub fn user_has_file(&self, user: Option<&SecretUser>, path: &str) -> bool {
		self.user_get_file(user, path).is_some()
	}

	/// Files visible to `user`, ordered by id. Does not include the root.
	pub fn user_files(&self, user: &SecretUser) -> Vec<Arc<SecretFile>> {
		snapshot_where(&self.files, |file| sets_intersect(file.groups(), user.groups()))
	}

	/// Visit the files visible to `user`, ordered by id. The visitor runs
	/// outside the index locks and may query the index.
	pub fn user_for_each_file(&self, user: &SecretUser, mut visit: impl FnMut(&Arc<SecretFile>)) {
		for file in self.user_files(user) {
			visit(&file);
		}
	}

	/// Visit every file, ordered by id, regardless of groups.
	pub fn for_each_file(&self, mut visit: impl FnMut(&Arc<SecretFile>)) {
		for file in snapshot(&self.files) {
			visit(&file);
		}
	}

	/// Decrypt a file's content, authenticating its metadata again.
	#[instrument(skip(self, node), fields(path = %node.path()))]
	pub async fn read_file(&self, node: &FileNode) -> StoreResult<Zeroizing<Vec<u8>>> {
		match node {
			FileNode::Root(root) => Ok(Zeroizing::new(root.content().to_vec())),
			FileNode::File(file) => {
				let aad = file.metadata().to_aad();
				let opened = self.sealer.open(file.sealed().main(), Some(&aad)).await?;
				Ok(opened.plaintext)
			}
		}
	}

	pub fn file_count(&self) -> usize {
		self.files.read().len()
	}

	// =========================================================================
	// Users
	// =========================================================================

	pub fn get_user(&self, id: &str) -> Option<Arc<SecretUser>> {
		self.users.read().get(&id.to_lowercase()).cloned()
	}

	pub fn has_user(&self, id: &str) -> bool {
		self.users.read().contains_key(&id.to_lowercase())
	}

	/// Visit every user, ordered by id.
	pub fn for_each_user(&self, mut visit: impl FnMut(&Arc<SecretUser>)) {
		for user in snapshot(&self.users) {
			visit(&user);
		}
	}

	/// Resolve a client certificate to a user.
	///
	/// The certificate's email selects the user; its common name and
	/// fingerprint must then match the stored name and fingerprint, ignoring
	/// case. Validity dates are not checked here.
	pub fn get_user_for_cert(&self, cert: &CertificateInfo) -> Option<Arc<SecretUser>> {
		let (fingerprint, common_name, email) = cert.identity()?;
		let user = self.get_user(email)?;

		let name_matches = user.name().to_lowercase() == common_name.to_lowercase();
		let fingerprint_matches = user.cert_fingerprint().eq_ignore_ascii_case(fingerprint);
		if !(name_matches && fingerprint_matches) {
			warn!(
				user = user.id(),
				name_matches, fingerprint_matches, "certificate does not match stored user"
			);
			return None;
		}
		Some(user)
	}

	pub fn user_count(&self) -> usize {
		self.users.read().len()
	}

	pub fn admin_user_count(&self) -> usize {
		self.users
			.read()
			.values()
			.filter(|user| user.role() == Role::Admin)
			.count()
	}

	// =========================================================================
	// Groups
	// =========================================================================

	/// Union of every group used by a file or user.
	pub fn groups(&self) -> GroupSet {
		let mut groups = GroupSet::new();
		for file in self.files.read().values() {
			groups.extend(file.groups().iter().cloned());
		}
		for user in self.users.read().values() {
			groups.extend(user.groups().iter().cloned());
		}
		groups
	}
}

/// `None` for the root, otherwise the lower-cased file id.
fn normalize_path(path: &str) -> Option<String> {
	if path.is_empty() || path == ROOT_PATH {
		return None;
	}
	Some(path.strip_prefix('/').unwrap_or(path).to_lowercase())
}

fn ensure_absent<T: SecretItem>(map: &ItemMap<T>, key: &str, id: &str) -> StoreResult<()> {
	if map.read().contains_key(key) {
		return Err(StoreError::DuplicateId {
			kind: T::KIND,
			id: id.to_string(),
		});
	}
	Ok(())
}

fn require<T: SecretItem>(map: &ItemMap<T>, key: &str, id: &str) -> StoreResult<Arc<T>> {
	map.read().get(key).cloned().ok_or_else(|| StoreError::NotFound {
		kind: T::KIND,
		id: id.to_string(),
	})
}

fn snapshot<T: SecretItem>(map: &ItemMap<T>) -> Vec<Arc<T>> {
	snapshot_where(map, |_| true)
}

fn snapshot_where<T: SecretItem>(map: &ItemMap<T>, keep: impl Fn(&T) -> bool) -> Vec<Arc<T>> {
	let mut items: Vec<Arc<T>> = map
		.read()
		.values()
		.filter(|item| keep(item))
		.cloned()
		.collect();
	items.sort_by(|a, b| a.id().cmp(b.id()));
	items
}

fn into_map<T: SecretItem>(items: Vec<T>) -> StoreResult<HashMap<String, Arc<T>>> {
	let mut map = HashMap::with_capacity(items.len());
	for item in items {
		let key = item.id().to_lowercase();
		if map.contains_key(&key) {
			return Err(StoreError::DuplicateId {
				kind: T::KIND,
				id: item.id().to_string(),
			});
		}
		map.insert(key, Arc::new(item));
	}
	Ok(map)
}

/// Files only need their embedded metadata at load; content is decrypted on
/// read.
async fn load_file(sealer: &ItemSealer, stored: StoredItem) -> StoreResult<SecretFile> {
	let meta = FileMetadata::from_aad(&sealer.peek_aad(&stored.main)?)?;
	check_stored_id(ItemKind::File, &stored.id, &meta.id)?;
	let groups = sealer.open_groups(&meta.id, &stored.groups).await?;
	Ok(SecretFile::new(meta, groups, Sealed::new(stored.main, stored.groups)))
}

async fn load_user(sealer: &ItemSealer, stored: StoredItem) -> StoreResult<SecretUser> {
	let opened = sealer.open(&stored.main, None).await?;
	let profile = UserProfile::from_aad(&opened.aad)?;
	check_stored_id(ItemKind::User, &stored.id, &profile.id)?;
	let fingerprint = std::str::from_utf8(&opened.plaintext)
		.map_err(|_| StoreError::corrupt("certificate fingerprint is not UTF-8"))?
		.to_string();
	let groups = sealer.open_groups(&profile.id, &stored.groups).await?;
	Ok(SecretUser::new(
		profile,
		fingerprint,
		groups,
		Sealed::new(stored.main, stored.groups),
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sealer::tests::test_sealer;
	use crate::storage::MemoryStorage;

	async fn empty_index() -> SecretIndex {
		SecretIndex::load(test_sealer(), Arc::new(MemoryStorage::new()))
			.await
			.unwrap()
	}

	fn groups(names: &[&str]) -> GroupSet {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn paths_normalize() {
		assert_eq!(normalize_path(""), None);
		assert_eq!(normalize_path("/"), None);
		assert_eq!(normalize_path("/Secret.TXT").as_deref(), Some("secret.txt"));
		assert_eq!(normalize_path("secret.txt").as_deref(), Some("secret.txt"));
	}

	#[tokio::test]
	async fn root_always_resolves() {
		let index = empty_index().await;
		assert!(index.get_file("").unwrap().is_directory());
		assert!(index.get_file("/").unwrap().is_directory());
		assert!(index.user_get_file(None, "/").unwrap().is_directory());
		assert!(index.user_get_file(None, "secret.txt").is_none());
	}

	#[tokio::test]
	async fn file_lookup_ignores_case_and_slash() {
		let index = empty_index().await;
		index
			.add_file(NewFile::new("secret.txt", "hello").groups(groups(&["ops"])))
			.await
			.unwrap();

		assert!(index.has_file("secret.txt"));
		assert!(index.has_file("/SECRET.txt"));
		assert!(!index.has_file("other.txt"));
		assert_eq!(index.get_file("secret.txt").unwrap().path(), "/secret.txt");
	}

	#[tokio::test]
	async fn invalid_groups_are_rejected_before_storage() {
		let storage = Arc::new(MemoryStorage::new());
		let index = SecretIndex::load(test_sealer(), storage.clone()).await.unwrap();
		let result = index
			.add_file(NewFile::new("a.txt", "x").groups(groups(&["Not Valid"])))
			.await;
		assert!(matches!(result, Err(StoreError::InvalidGroupSet(_))));
		assert!(!storage.contains(ItemKind::File, "a.txt"));
	}

	#[tokio::test]
	async fn unknown_item_updates_are_not_found() {
		let index = empty_index().await;
		assert!(matches!(
			index.update_file_groups("nope", GroupSet::new()).await,
			Err(StoreError::NotFound { kind: ItemKind::File, .. })
		));
		assert!(matches!(
			index.update_user_data("nope@example.com", UserUpdate::default()).await,
			Err(StoreError::NotFound { kind: ItemKind::User, .. })
		));
	}

	#[tokio::test]
	async fn user_visitor_may_query_the_index() {
		let index = empty_index().await;
		for (id, group) in [("b.txt", "ops"), ("a.txt", "ops"), ("c.txt", "dev")] {
			index
				.add_file(NewFile::new(id, "x").groups(groups(&[group])))
				.await
				.unwrap();
		}
		let start = Utc::now();
		let user = index
			.add_user(NewUser {
				id: "ops@example.com".into(),
				name: "Ops".into(),
				role: Role::User,
				valid_start: start,
				valid_end: start + chrono::Duration::days(1),
				cert_fingerprint: vec!["AB"; 20].join(":"),
				groups: groups(&["ops"]),
			})
			.await
			.unwrap();

		let mut seen = Vec::new();
		index.user_for_each_file(&user, |file| {
			assert!(index.has_file(file.id()));
			seen.push(file.id().to_string());
		});
		assert_eq!(seen, ["a.txt", "b.txt"]);
	}

	#[tokio::test]
	async fn root_reads_its_fixed_text() {
		let index = empty_index().await;
		let content = index.read_file(&index.root()).await.unwrap();
		assert_eq!(content.as_slice(), b"Secret server root directory");
	}
}
