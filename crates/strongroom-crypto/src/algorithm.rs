// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated-encryption algorithms and the registry the codec resolves
//! algorithm names against.
//!
//! The registry is built once at startup and handed to the [`Codec`]; nothing
//! in this crate consults a global table.
//!
//! [`Codec`]: crate::codec::Codec

use std::collections::BTreeMap;

use aes_gcm::aead::{AeadInPlace, KeyInit, Nonce, Tag};
use aes_gcm::{Aes128Gcm, Aes256Gcm};

use crate::error::{CryptoError, CryptoResult};

/// Size of the AES-GCM IV in bytes.
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A supported authenticated-encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
	Aes128Gcm,
	Aes256Gcm,
}

impl Algorithm {
	/// Every algorithm this build knows how to run.
	pub const ALL: [Algorithm; 2] = [Algorithm::Aes128Gcm, Algorithm::Aes256Gcm];

	/// Wire name, as written into the record header.
	pub const fn name(self) -> &'static str {
		match self {
			Algorithm::Aes128Gcm => "aes-128-gcm",
			Algorithm::Aes256Gcm => "aes-256-gcm",
		}
	}

	/// Key length in bytes.
	pub const fn key_len(self) -> usize {
		match self {
			Algorithm::Aes128Gcm => 16,
			Algorithm::Aes256Gcm => 32,
		}
	}

	/// IV length in bytes.
	pub const fn iv_len(self) -> usize {
		IV_SIZE
	}

	/// Authentication tag length in bytes.
	pub const fn tag_len(self) -> usize {
		TAG_SIZE
	}

	/// Encrypt `buffer` in place and return the detached authentication tag.
	pub(crate) fn seal_in_place(
		self,
		key: &[u8],
		iv: &[u8],
		aad: &[u8],
		buffer: &mut [u8],
	) -> CryptoResult<Vec<u8>> {
		self.check_key(key)?;
		self.check_iv(iv)?;
		match self {
			Algorithm::Aes128Gcm => seal::<Aes128Gcm>(key, iv, aad, buffer),
			Algorithm::Aes256Gcm => seal::<Aes256Gcm>(key, iv, aad, buffer),
		}
	}

	/// Decrypt `buffer` in place, verifying `tag` over the ciphertext and `aad`.
	pub(crate) fn open_in_place(
		self,
		key: &[u8],
		iv: &[u8],
		aad: &[u8],
		buffer: &mut [u8],
		tag: &[u8],
	) -> CryptoResult<()> {
		self.check_key(key)?;
		self.check_iv(iv)?;
		if tag.len() != self.tag_len() {
			return Err(CryptoError::Corrupt(format!(
				"auth tag is {} bytes, {} expects {}",
				tag.len(),
				self.name(),
				self.tag_len()
			)));
		}
		match self {
			Algorithm::Aes128Gcm => open::<Aes128Gcm>(key, iv, aad, buffer, tag),
			Algorithm::Aes256Gcm => open::<Aes256Gcm>(key, iv, aad, buffer, tag),
		}
	}

	fn check_key(self, key: &[u8]) -> CryptoResult<()> {
		if key.len() != self.key_len() {
			return Err(CryptoError::InvalidKeySize {
				expected: self.key_len(),
				actual: key.len(),
			});
		}
		Ok(())
	}

	fn check_iv(self, iv: &[u8]) -> CryptoResult<()> {
		if iv.len() != self.iv_len() {
			return Err(CryptoError::Corrupt(format!(
				"IV is {} bytes, {} expects {}",
				iv.len(),
				self.name(),
				self.iv_len()
			)));
		}
		Ok(())
	}
}

impl std::fmt::Display for Algorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

fn seal<C>(key: &[u8], iv: &[u8], aad: &[u8], buffer: &mut [u8]) -> CryptoResult<Vec<u8>>
where
	C: AeadInPlace + KeyInit,
{
	let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
		expected: C::key_size(),
		actual: key.len(),
	})?;
	let tag = cipher
		.encrypt_in_place_detached(Nonce::<C>::from_slice(iv), aad, buffer)
		.map_err(|e| CryptoError::Encryption(format!("record encryption failed: {e}")))?;
	Ok(tag.to_vec())
}

fn open<C>(key: &[u8], iv: &[u8], aad: &[u8], buffer: &mut [u8], tag: &[u8]) -> CryptoResult<()>
where
	C: AeadInPlace + KeyInit,
{
	let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
		expected: C::key_size(),
		actual: key.len(),
	})?;
	cipher
		.decrypt_in_place_detached(Nonce::<C>::from_slice(iv), aad, buffer, Tag::<C>::from_slice(tag))
		.map_err(|_| CryptoError::AuthenticationFailed)
}

/// Immutable name-to-algorithm table.
#[derive(Debug, Clone)]
pub struct AlgorithmRegistry {
	algorithms: BTreeMap<&'static str, Algorithm>,
}

impl AlgorithmRegistry {
	/// Registry with every algorithm in [`Algorithm::ALL`].
	pub fn standard() -> Self {
		Self::with_algorithms(Algorithm::ALL)
	}

	/// Registry restricted to the given algorithms.
	pub fn with_algorithms(algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
		Self {
			algorithms: algorithms.into_iter().map(|a| (a.name(), a)).collect(),
		}
	}

	/// Resolve a wire name.
	pub fn lookup(&self, name: &str) -> CryptoResult<Algorithm> {
		self
			.algorithms
			.get(name)
			.copied()
			.ok_or_else(|| CryptoError::UnsupportedAlgorithm(name.to_string()))
	}

	pub fn contains(&self, name: &str) -> bool {
		self.algorithms.contains_key(name)
	}

	/// Registered wire names, sorted.
	pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.algorithms.keys().copied()
	}
}

impl Default for AlgorithmRegistry {
	fn default() -> Self {
		Self::standard()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn standard_registry_knows_both_gcm_variants() {
		let registry = AlgorithmRegistry::standard();
		assert_eq!(registry.lookup("aes-128-gcm").unwrap().key_len(), 16);
		assert_eq!(registry.lookup("aes-256-gcm").unwrap().key_len(), 32);
		assert_eq!(
			registry.names().collect::<Vec<_>>(),
			vec!["aes-128-gcm", "aes-256-gcm"]
		);
	}

	#[test]
	fn unknown_name_is_unsupported() {
		let registry = AlgorithmRegistry::standard();
		assert!(matches!(
			registry.lookup("chacha20-poly1305"),
			Err(CryptoError::UnsupportedAlgorithm(name)) if name == "chacha20-poly1305"
		));
	}

	#[test]
	fn restricted_registry_rejects_missing_algorithm() {
		let registry = AlgorithmRegistry::with_algorithms([Algorithm::Aes256Gcm]);
		assert!(registry.contains("aes-256-gcm"));
		assert!(registry.lookup("aes-128-gcm").is_err());
	}

	#[test]
	fn seal_rejects_wrong_key_length() {
		let mut buffer = b"data".to_vec();
		let result = Algorithm::Aes256Gcm.seal_in_place(&[0u8; 16], &[0u8; IV_SIZE], b"", &mut buffer);
		assert!(matches!(
			result,
			Err(CryptoError::InvalidKeySize {
				expected: 32,
				actual: 16
			})
		));
	}

	#[test]
	fn open_detects_wrong_aad() {
		let key = [7u8; 16];
		let iv = [1u8; IV_SIZE];
		let mut buffer = b"payload".to_vec();
		let tag = Algorithm::Aes128Gcm
			.seal_in_place(&key, &iv, b"bound", &mut buffer)
			.unwrap();

		let result = Algorithm::Aes128Gcm.open_in_place(&key, &iv, b"other", &mut buffer, &tag);
		assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
	}
}
