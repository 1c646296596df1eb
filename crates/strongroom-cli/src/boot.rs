// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds the key service, storage backend and index from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use strongroom_config::{KeyServiceProvider, StorageProvider, StrongroomConfig};
use strongroom_crypto::{AlgorithmRegistry, Codec, KeyService, LocalKeyService};
use strongroom_store::{FsStorage, ItemSealer, MemoryStorage, SecretIndex, StorageBackend};
use tracing::info;

fn key_service(codec: &Codec, config: &StrongroomConfig) -> Result<Arc<dyn KeyService>> {
	match config.key_service.provider {
		KeyServiceProvider::LocalSymmetric => {
			let secret = config
				.key_service
				.secret_key
				.as_ref()
				.context("local-symmetric key service has no secret key")?;
			let keys = LocalKeyService::from_encoded(
				codec.clone(),
				config.encryption.key_id.as_str(),
				&config.key_service.algorithm,
				secret.expose(),
				config.key_service.secret_key_encoding,
			)
			.context("invalid key service secret key")?;
			Ok(Arc::new(keys))
		}
	}
}

fn storage(config: &StrongroomConfig) -> Arc<dyn StorageBackend> {
	match config.storage.provider {
		StorageProvider::FileSystem => Arc::new(FsStorage::new(&config.storage.root_directory)),
		StorageProvider::Memory => Arc::new(MemoryStorage::new()),
	}
}

/// Load the index, refusing to continue if any stored item is unreadable.
pub async fn open_index(config: &StrongroomConfig) -> Result<SecretIndex> {
	let codec = Codec::new(Arc::new(AlgorithmRegistry::standard()));
	let keys = key_service(&codec, config)?;
	let sealer = ItemSealer::new(
		codec,
		keys,
		config.encryption.key_id.as_str(),
		config.encryption.algorithm.as_str(),
	)?;

	let index = SecretIndex::load(sealer, storage(config))
		.await
		.context("store failed to load; refusing to continue")?;
	info!(
		files = index.file_count(),
		users = index.user_count(),
		"store ready"
	);
	Ok(index)
}
