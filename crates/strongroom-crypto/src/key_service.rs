// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key service abstraction for wrapping per-item data keys.
//!
//! A key service generates data keys and returns them alongside a wrapped
//! copy that only the service can open again. The wrapped bytes are opaque to
//! the rest of the system.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::OsRng;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use crate::algorithm::Algorithm;
use crate::codec::{self, Codec};
use crate::error::{CryptoError, CryptoResult};

/// A freshly generated data key and its wrapped form.
pub struct DataKey {
	pub plaintext: Zeroizing<Vec<u8>>,
	pub wrapped: Vec<u8>,
}

impl fmt::Debug for DataKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DataKey")
			.field("plaintext", &"[REDACTED]")
			.field("wrapped_len", &self.wrapped.len())
			.finish()
	}
}

/// Trait for key services that wrap and unwrap data keys.
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait KeyService: Send + Sync {
	/// Generate a random data key of `len` bytes under the master key `key_id`.
	async fn generate_data_key(&self, key_id: &str, len: usize) -> CryptoResult<DataKey>;

	/// Recover the plaintext data key from its wrapped form.
	///
	/// Fails with [`CryptoError::UnknownKey`] when the wrapped key was produced
	/// under a master key this service does not hold.
	async fn unwrap_key(&self, wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>>;
}

/// How a secret key is written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretKeyEncoding {
	#[default]
	Base64,
	Hex,
}

impl SecretKeyEncoding {
	pub fn decode(self, encoded: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
		let encoded = encoded.trim();
		let bytes = match self {
			SecretKeyEncoding::Base64 => BASE64
				.decode(encoded.as_bytes())
				.map_err(|e| CryptoError::KeyService(format!("invalid base64 secret key: {e}")))?,
			SecretKeyEncoding::Hex => hex::decode(encoded)
				.map_err(|e| CryptoError::KeyService(format!("invalid hex secret key: {e}")))?,
		};
		Ok(Zeroizing::new(bytes))
	}

	pub fn encode(self, key: &[u8]) -> String {
		match self {
			SecretKeyEncoding::Base64 => BASE64.encode(key),
			SecretKeyEncoding::Hex => hex::encode(key),
		}
	}
}

impl FromStr for SecretKeyEncoding {
	type Err = CryptoError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"base64" => Ok(SecretKeyEncoding::Base64),
			"hex" => Ok(SecretKeyEncoding::Hex),
			other => Err(CryptoError::KeyService(format!(
				"unknown secret key encoding: {other}"
			))),
		}
	}
}

/// Generate a random master key for `algorithm`, encoded for configuration.
pub fn generate_secret_key(algorithm: Algorithm, encoding: SecretKeyEncoding) -> String {
	let mut key = Zeroizing::new(vec![0u8; algorithm.key_len()]);
	OsRng.fill_bytes(key.as_mut_slice());
	encoding.encode(&key)
}

/// Key service backed by a single locally held master key.
///
/// Wrapped keys are ordinary codec records (no associated data) encrypted
/// under the master key, so each carries the id of the key that wrapped it.
pub struct LocalKeyService {
	codec: Codec,
	key_id: String,
	algorithm: Algorithm,
	master_key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for LocalKeyService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LocalKeyService")
			.field("key_id", &self.key_id)
			.field("algorithm", &self.algorithm)
			.field("master_key", &"[REDACTED]")
			.finish()
	}
}

impl LocalKeyService {
	/// Create a key service. The master key length must match `algorithm`.
	pub fn new(
		codec: Codec,
		key_id: impl Into<String>,
		algorithm: &str,
		master_key: Zeroizing<Vec<u8>>,
	) -> CryptoResult<Self> {
		let key_id = key_id.into();
		if key_id.is_empty() {
			return Err(CryptoError::KeyService("key id must not be empty".to_string()));
		}
		let algorithm = codec.registry().lookup(algorithm)?;
		if master_key.len() != algorithm.key_len() {
			return Err(CryptoError::InvalidKeySize {
				expected: algorithm.key_len(),
				actual: master_key.len(),
			});
		}
		Ok(Self {
			codec,
			key_id,
			algorithm,
			master_key,
		})
	}

	/// Create a key service from an encoded master key.
	pub fn from_encoded(
		codec: Codec,
		key_id: impl Into<String>,
		algorithm: &str,
		encoded: &str,
		encoding: SecretKeyEncoding,
	) -> CryptoResult<Self> {
		let master_key = encoding.decode(encoded)?;
		Self::new(codec, key_id, algorithm, master_key)
	}

	pub fn key_id(&self) -> &str {
		&self.key_id
	}

	pub fn algorithm(&self) -> Algorithm {
		self.algorithm
	}
}

#[async_trait]
impl KeyService for LocalKeyService {
	async fn generate_data_key(&self, key_id: &str, len: usize) -> CryptoResult<DataKey> {
		if key_id != self.key_id {
			return Err(CryptoError::UnknownKey(key_id.to_string()));
		}

		let mut plaintext = Zeroizing::new(vec![0u8; len]);
		OsRng.fill_bytes(plaintext.as_mut_slice());

		let wrapped = self.codec.encode(
			&plaintext,
			&self.key_id,
			&self.master_key,
			self.algorithm.name(),
			&[],
			false,
		)?;
		debug!(key_id = %self.key_id, len, "generated data key");
		Ok(DataKey { plaintext, wrapped })
	}

	async fn unwrap_key(&self, wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
		let key_id = codec::extract_key_id(wrapped)?;
		if key_id != self.key_id {
			return Err(CryptoError::UnknownKey(key_id));
		}
		let decoded = self.codec.decode(wrapped, &self.master_key, None)?;
		Ok(decoded.plaintext)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::algorithm::AlgorithmRegistry;
	use std::sync::Arc;

	fn codec() -> Codec {
		Codec::new(Arc::new(AlgorithmRegistry::standard()))
	}

	fn service(key_id: &str, fill: u8) -> LocalKeyService {
		LocalKeyService::new(codec(), key_id, "aes-256-gcm", Zeroizing::new(vec![fill; 32])).unwrap()
	}

	#[tokio::test]
	async fn generated_key_unwraps_to_same_bytes() {
		let keys = service("default", 1);
		let data_key = keys.generate_data_key("default", 16).await.unwrap();
		assert_eq!(data_key.plaintext.len(), 16);
		assert_eq!(codec::extract_key_id(&data_key.wrapped).unwrap(), "default");

		let unwrapped = keys.unwrap_key(&data_key.wrapped).await.unwrap();
		assert_eq!(unwrapped.as_slice(), data_key.plaintext.as_slice());
	}

	#[tokio::test]
	async fn refuses_foreign_key_id_on_generate() {
		let keys = service("default", 1);
		let result = keys.generate_data_key("other", 32).await;
		assert!(matches!(result, Err(CryptoError::UnknownKey(id)) if id == "other"));
	}

	#[tokio::test]
	async fn refuses_key_wrapped_by_another_service() {
		let ours = service("default", 1);
		let theirs = service("elsewhere", 2);
		let data_key = theirs.generate_data_key("elsewhere", 32).await.unwrap();

		let result = ours.unwrap_key(&data_key.wrapped).await;
		assert!(matches!(result, Err(CryptoError::UnknownKey(id)) if id == "elsewhere"));
	}

	#[tokio::test]
	async fn same_key_id_with_different_master_key_fails_authentication() {
		let ours = service("default", 1);
		let impostor = service("default", 2);
		let data_key = impostor.generate_data_key("default", 32).await.unwrap();

		let result = ours.unwrap_key(&data_key.wrapped).await;
		assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
	}

	#[test]
	fn rejects_master_key_of_wrong_length() {
		let result = LocalKeyService::new(codec(), "default", "aes-128-gcm", Zeroizing::new(vec![0; 32]));
		assert!(matches!(
			result,
			Err(CryptoError::InvalidKeySize {
				expected: 16,
				actual: 32
			})
		));
	}

	#[test]
	fn rejects_empty_key_id() {
		let result = LocalKeyService::new(codec(), "", "aes-256-gcm", Zeroizing::new(vec![0; 32]));
		assert!(matches!(result, Err(CryptoError::KeyService(_))));
	}

	#[test]
	fn generated_secret_keys_decode_to_algorithm_length() {
		for encoding in [SecretKeyEncoding::Base64, SecretKeyEncoding::Hex] {
			let encoded = generate_secret_key(Algorithm::Aes128Gcm, encoding);
			let service = LocalKeyService::from_encoded(codec(), "k", "aes-128-gcm", &encoded, encoding);
			assert!(service.is_ok(), "{encoding:?}");
		}
	}

	#[test]
	fn encoding_parses_case_insensitively() {
		assert_eq!("HEX".parse::<SecretKeyEncoding>().unwrap(), SecretKeyEncoding::Hex);
		assert_eq!("base64".parse::<SecretKeyEncoding>().unwrap(), SecretKeyEncoding::Base64);
		assert!("utf8".parse::<SecretKeyEncoding>().is_err());
	}

	#[test]
	fn debug_redacts_master_key() {
		let rendered = format!("{:?}", service("default", 0x41));
		assert!(rendered.contains("[REDACTED]"));
		assert!(!rendered.contains("65, 65"));
	}
}
