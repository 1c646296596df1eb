// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Binds the codec, key service and configured key to item envelopes.

use std::fmt;
use std::sync::Arc;

use strongroom_crypto::{envelope, AssociatedData, Codec, KeyService, Opened};

use crate::error::StoreResult;
use crate::groups::{groups_aad, groups_from_bytes, groups_to_bytes, GroupSet};

/// Seals and opens item envelopes under one master key id and algorithm.
#[derive(Clone)]
pub struct ItemSealer {
	codec: Codec,
	keys: Arc<dyn KeyService>,
	key_id: String,
	algorithm: String,
}

impl ItemSealer {
	/// Fails if `algorithm` is not in the codec's registry.
	pub fn new(
		codec: Codec,
		keys: Arc<dyn KeyService>,
		key_id: impl Into<String>,
		algorithm: impl Into<String>,
	) -> StoreResult<Self> {
		let algorithm = algorithm.into();
		codec.registry().lookup(&algorithm)?;
		Ok(Self {
			codec,
			keys,
			key_id: key_id.into(),
			algorithm,
		})
	}

	pub fn key_id(&self) -> &str {
		&self.key_id
	}

	pub fn algorithm(&self) -> &str {
		&self.algorithm
	}

	pub async fn seal(
		&self,
		plaintext: &[u8],
		aad: &AssociatedData,
		embed_aad: bool,
	) -> StoreResult<Vec<u8>> {
		Ok(envelope::encrypt(
			&self.codec,
			self.keys.as_ref(),
			&self.key_id,
			&self.algorithm,
			plaintext,
			aad,
			embed_aad,
		)
		.await?)
	}

	pub async fn open(
		&self,
		sealed: &[u8],
		aad_override: Option<&AssociatedData>,
	) -> StoreResult<Opened> {
		Ok(envelope::decrypt(&self.codec, self.keys.as_ref(), sealed, aad_override).await?)
	}

	/// Read embedded associated data without unwrapping the data key.
	pub fn peek_aad(&self, sealed: &[u8]) -> StoreResult<AssociatedData> {
		Ok(envelope::extract_aad(sealed)?)
	}

	pub async fn seal_groups(&self, id: &str, groups: &GroupSet) -> StoreResult<Vec<u8>> {
		self.seal(&groups_to_bytes(groups), &groups_aad(id), false).await
	}

	pub async fn open_groups(&self, id: &str, sealed: &[u8]) -> StoreResult<GroupSet> {
		let opened = self.open(sealed, Some(&groups_aad(id))).await?;
		groups_from_bytes(&opened.plaintext)
	}
}

impl fmt::Debug for ItemSealer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ItemSealer")
			.field("key_id", &self.key_id)
			.field("algorithm", &self.algorithm)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use strongroom_crypto::{AlgorithmRegistry, CryptoError, LocalKeyService};
	use zeroize::Zeroizing;

	use crate::error::StoreError;

	pub(crate) fn test_sealer() -> ItemSealer {
		let codec = Codec::new(Arc::new(AlgorithmRegistry::standard()));
		let keys = LocalKeyService::new(
			codec.clone(),
			"default",
			"aes-256-gcm",
			Zeroizing::new(vec![7u8; 32]),
		)
		.unwrap();
		ItemSealer::new(codec, Arc::new(keys), "default", "aes-256-gcm").unwrap()
	}

	fn groups(names: &[&str]) -> GroupSet {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn unknown_algorithm_is_rejected() {
		let sealer = test_sealer();
		let result = ItemSealer::new(sealer.codec.clone(), sealer.keys.clone(), "default", "rot13");
		assert!(matches!(
			result,
			Err(StoreError::Crypto(CryptoError::UnsupportedAlgorithm(_)))
		));
	}

	#[tokio::test]
	async fn groups_are_bound_to_their_item() {
		let sealer = test_sealer();
		let sealed = sealer.seal_groups("a.txt", &groups(&["ops", "dev"])).await.unwrap();

		assert_eq!(
			sealer.open_groups("a.txt", &sealed).await.unwrap(),
			groups(&["dev", "ops"])
		);
		assert!(matches!(
			sealer.open_groups("b.txt", &sealed).await,
			Err(StoreError::Crypto(CryptoError::AuthenticationFailed))
		));
	}

	#[tokio::test]
	async fn groups_envelope_does_not_embed_aad() {
		let sealer = test_sealer();
		let sealed = sealer.seal_groups("a.txt", &GroupSet::new()).await.unwrap();
		assert!(sealer.peek_aad(&sealed).unwrap().is_empty());
		assert!(sealer.open_groups("a.txt", &sealed).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn main_envelope_embeds_aad() {
		let sealer = test_sealer();
		let aad = AssociatedData::new().with("id", "a.txt").with("v", "2");
		let sealed = sealer.seal(b"payload", &aad, true).await.unwrap();

		assert_eq!(sealer.peek_aad(&sealed).unwrap(), aad);
		let opened = sealer.open(&sealed, None).await.unwrap();
		assert_eq!(opened.plaintext.as_slice(), b"payload");
		assert_eq!(opened.aad, aad);
	}

	#[test]
	fn debug_hides_key_service() {
		let rendered = format!("{:?}", test_sealer());
		assert!(rendered.contains("aes-256-gcm"));
		assert!(!rendered.contains("master"));
	}
}
