// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Self-describing authenticated-encryption records.
//!
//! Wire layout, all integers little-endian:
//!
//! ```text
//! version:i16 keyIdLen:i16 algoLen:i16 ivLen:i16 tagLen:i16 aadLen:i16 cipherLen:i32
//! keyId algoName iv tag [aad] ciphertext
//! ```
//!
//! `aadLen` is zero unless the associated data was embedded at encode time.
//! The buffer length must equal the header plus every declared field length.

use std::sync::Arc;

use aes_gcm::aead::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::algorithm::{Algorithm, AlgorithmRegistry};
use crate::error::{CryptoError, CryptoResult};

/// Record format version written by [`Codec::encode`].
pub const VERSION: i16 = 1;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 16;

/// Upper bound for every `i16` length field.
pub const MAX_INT16: usize = i16::MAX as usize;

/// Upper bound for the `i32` ciphertext length field.
pub const MAX_INT32: usize = i32::MAX as usize;

/// Output of [`Codec::decode`].
pub struct Decoded {
	pub plaintext: Zeroizing<Vec<u8>>,
	/// The associated data embedded in the record (empty if none was embedded).
	pub aad: Vec<u8>,
}

impl std::fmt::Debug for Decoded {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Decoded")
			.field("plaintext", &"[REDACTED]")
			.field("aad_len", &self.aad.len())
			.finish()
	}
}

/// Field boundaries of a parsed record. Borrows from the input buffer.
struct RecordView<'a> {
	algorithm: &'a [u8],
	iv: &'a [u8],
	tag: &'a [u8],
	aad: &'a [u8],
	ciphertext: &'a [u8],
}

impl<'a> RecordView<'a> {
	fn parse(bytes: &'a [u8]) -> CryptoResult<Self> {
		if bytes.len() < HEADER_LEN {
			return Err(CryptoError::Corrupt(format!(
				"record is {} bytes, shorter than the {HEADER_LEN}-byte header",
				bytes.len()
			)));
		}
		check_version(bytes)?;

		let key_id_len = header_i16(bytes, 2)?;
		let algo_len = header_i16(bytes, 4)?;
		let iv_len = header_i16(bytes, 6)?;
		let tag_len = header_i16(bytes, 8)?;
		let aad_len = header_i16(bytes, 10)?;
		let cipher_len = header_i32(bytes, 12)?;

		let expected = HEADER_LEN + key_id_len + algo_len + iv_len + tag_len + aad_len + cipher_len;
		if expected != bytes.len() {
			return Err(CryptoError::Corrupt(format!(
				"declared lengths sum to {expected} bytes, record is {}",
				bytes.len()
			)));
		}

		let rest = &bytes[HEADER_LEN..];
		let (_key_id, rest) = rest.split_at(key_id_len);
		let (algorithm, rest) = rest.split_at(algo_len);
		let (iv, rest) = rest.split_at(iv_len);
		let (tag, rest) = rest.split_at(tag_len);
		let (aad, ciphertext) = rest.split_at(aad_len);
		Ok(Self {
			algorithm,
			iv,
			tag,
			aad,
			ciphertext,
		})
	}
}

fn check_version(bytes: &[u8]) -> CryptoResult<()> {
	let version = i16::from_le_bytes([bytes[0], bytes[1]]);
	if version != VERSION {
		return Err(CryptoError::UnsupportedVersion(version));
	}
	Ok(())
}

fn header_i16(bytes: &[u8], at: usize) -> CryptoResult<usize> {
	let value = i16::from_le_bytes([bytes[at], bytes[at + 1]]);
	usize::try_from(value)
		.map_err(|_| CryptoError::Corrupt(format!("negative length {value} at header offset {at}")))
}

fn header_i32(bytes: &[u8], at: usize) -> CryptoResult<usize> {
	let value = i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
	usize::try_from(value)
		.map_err(|_| CryptoError::Corrupt(format!("negative length {value} at header offset {at}")))
}

fn check_field(field: &'static str, len: usize, max: usize) -> CryptoResult<()> {
	if len > max {
		return Err(CryptoError::FieldTooLarge { field, len, max });
	}
	Ok(())
}

/// Packs and unpacks encrypted records.
#[derive(Debug, Clone)]
pub struct Codec {
	registry: Arc<AlgorithmRegistry>,
}

impl Codec {
	pub fn new(registry: Arc<AlgorithmRegistry>) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &AlgorithmRegistry {
		&self.registry
	}

	/// Encrypt `plaintext` under `key` and serialize the record.
	///
	/// `aad` is authenticated in every case; it is also written into the
	/// record when `embed_aad` is set.
	pub fn encode(
		&self,
		plaintext: &[u8],
		key_id: &str,
		key: &[u8],
		algorithm: &str,
		aad: &[u8],
		embed_aad: bool,
	) -> CryptoResult<Vec<u8>> {
		let algorithm = self.registry.lookup(algorithm)?;
		let mut iv = vec![0u8; algorithm.iv_len()];
		OsRng.fill_bytes(&mut iv);
		encode_with_iv(plaintext, key_id, key, algorithm, aad, embed_aad, &iv)
	}

	/// Authenticate and decrypt a record.
	///
	/// `aad_override`, when non-empty, replaces the embedded associated data
	/// for authentication. The returned `aad` is always the embedded copy.
	pub fn decode(&self, bytes: &[u8], key: &[u8], aad_override: Option<&[u8]>) -> CryptoResult<Decoded> {
		let record = RecordView::parse(bytes)?;
		let name = std::str::from_utf8(record.algorithm)
			.map_err(|_| CryptoError::Corrupt("algorithm name is not valid UTF-8".to_string()))?;
		let algorithm = self.registry.lookup(name)?;

		let aad = match aad_override {
			Some(aad) if !aad.is_empty() => aad,
			_ => record.aad,
		};

		let mut buffer = Zeroizing::new(record.ciphertext.to_vec());
		algorithm.open_in_place(key, record.iv, aad, &mut buffer, record.tag)?;

		Ok(Decoded {
			plaintext: buffer,
			aad: record.aad.to_vec(),
		})
	}

	/// Read the key id without decrypting.
	pub fn extract_key_id(&self, bytes: &[u8]) -> CryptoResult<String> {
		extract_key_id(bytes)
	}

	/// Read the embedded associated data without decrypting.
	pub fn extract_aad(&self, bytes: &[u8]) -> CryptoResult<Vec<u8>> {
		extract_aad(bytes)
	}
}

/// Read the key id of a record without parsing the remaining fields.
pub fn extract_key_id(bytes: &[u8]) -> CryptoResult<String> {
	if bytes.len() < HEADER_LEN {
		return Err(CryptoError::Corrupt("record shorter than header".to_string()));
	}
	check_version(bytes)?;
	let len = header_i16(bytes, 2)?;
	let key_id = bytes
		.get(HEADER_LEN..HEADER_LEN + len)
		.ok_or_else(|| CryptoError::Corrupt("key id overruns the record".to_string()))?;
	String::from_utf8(key_id.to_vec())
		.map_err(|_| CryptoError::Corrupt("key id is not valid UTF-8".to_string()))
}

/// Read the embedded associated data of a record.
pub fn extract_aad(bytes: &[u8]) -> CryptoResult<Vec<u8>> {
	Ok(RecordView::parse(bytes)?.aad.to_vec())
}

pub(crate) fn encode_with_iv(
	plaintext: &[u8],
	key_id: &str,
	key: &[u8],
	algorithm: Algorithm,
	aad: &[u8],
	embed_aad: bool,
	iv: &[u8],
) -> CryptoResult<Vec<u8>> {
	if aad.len() > MAX_INT16 {
		return Err(CryptoError::AadTooLarge(aad.len()));
	}
	check_field("key id", key_id.len(), MAX_INT16)?;
	check_field("plaintext", plaintext.len(), MAX_INT32)?;

	let mut ciphertext = plaintext.to_vec();
	let tag = algorithm.seal_in_place(key, iv, aad, &mut ciphertext)?;

	let algo_name = algorithm.name().as_bytes();
	let embedded: &[u8] = if embed_aad { aad } else { &[] };

	let total = HEADER_LEN
		+ key_id.len()
		+ algo_name.len()
		+ iv.len()
		+ tag.len()
		+ embedded.len()
		+ ciphertext.len();
	let mut out = Vec::with_capacity(total);
	out.extend_from_slice(&VERSION.to_le_bytes());
	out.extend_from_slice(&(key_id.len() as i16).to_le_bytes());
	out.extend_from_slice(&(algo_name.len() as i16).to_le_bytes());
	out.extend_from_slice(&(iv.len() as i16).to_le_bytes());
	out.extend_from_slice(&(tag.len() as i16).to_le_bytes());
	out.extend_from_slice(&(embedded.len() as i16).to_le_bytes());
	out.extend_from_slice(&(ciphertext.len() as i32).to_le_bytes());
	out.extend_from_slice(key_id.as_bytes());
	out.extend_from_slice(algo_name);
	out.extend_from_slice(iv);
	out.extend_from_slice(&tag);
	out.extend_from_slice(embedded);
	out.extend_from_slice(&ciphertext);
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::aad::AssociatedData;
	use proptest::prelude::*;

	fn codec() -> Codec {
		Codec::new(Arc::new(AlgorithmRegistry::standard()))
	}

	#[test]
	fn known_answer_empty_plaintext() {
		let bytes = encode_with_iv(b"", "k", &[0u8; 16], Algorithm::Aes128Gcm, b"", false, &[0u8; 12]).unwrap();

		let mut expected = Vec::new();
		expected.extend_from_slice(&[1, 0, 1, 0, 11, 0, 12, 0, 16, 0, 0, 0, 0, 0, 0, 0]);
		expected.extend_from_slice(b"k");
		expected.extend_from_slice(b"aes-128-gcm");
		expected.extend_from_slice(&[0u8; 12]);
		expected.extend_from_slice(&hex::decode("58e2fccefa7e3061367f1d57a4e7455a").unwrap());
		assert_eq!(bytes, expected);
	}

	#[test]
	fn known_answer_zero_block() {
		let bytes = encode_with_iv(
			&[0u8; 16],
			"k",
			&[0u8; 16],
			Algorithm::Aes128Gcm,
			b"",
			false,
			&[0u8; 12],
		)
		.unwrap();

		let tag_at = HEADER_LEN + 1 + 11 + 12;
		assert_eq!(
			hex::encode(&bytes[tag_at..tag_at + 16]),
			"ab6e47d42cec13bdf53a67b21257bddf"
		);
		assert_eq!(
			hex::encode(&bytes[tag_at + 16..]),
			"0388dace60b6a392f328c2b971b2fe78"
		);
		assert_eq!(&bytes[12..16], &16i32.to_le_bytes());
	}

	#[test]
	fn embedded_aad_is_returned_and_used() {
		let codec = codec();
		let aad = AssociatedData::new().with("id", "secret.txt").encode().unwrap();
		let key = [3u8; 32];
		let bytes = codec.encode(b"hello", "default", &key, "aes-256-gcm", &aad, true).unwrap();

		let decoded = codec.decode(&bytes, &key, None).unwrap();
		assert_eq!(decoded.plaintext.as_slice(), b"hello");
		assert_eq!(decoded.aad, aad);
		assert_eq!(codec.extract_aad(&bytes).unwrap(), aad);
		assert_eq!(codec.extract_key_id(&bytes).unwrap(), "default");
	}

	#[test]
	fn detached_aad_must_be_supplied() {
		let codec = codec();
		let key = [4u8; 16];
		let bytes = codec.encode(b"groups", "default", &key, "aes-128-gcm", b"id-bytes", false).unwrap();

		assert!(codec.extract_aad(&bytes).unwrap().is_empty());
		assert!(matches!(
			codec.decode(&bytes, &key, None),
			Err(CryptoError::AuthenticationFailed)
		));
		let decoded = codec.decode(&bytes, &key, Some(&b"id-bytes"[..])).unwrap();
		assert_eq!(decoded.plaintext.as_slice(), b"groups");
		assert!(decoded.aad.is_empty());
	}

	#[test]
	fn empty_override_falls_back_to_embedded() {
		let codec = codec();
		let key = [5u8; 32];
		let bytes = codec.encode(b"x", "default", &key, "aes-256-gcm", b"meta", true).unwrap();
		assert!(codec.decode(&bytes, &key, Some(&b""[..])).is_ok());
	}

	#[test]
	fn unknown_algorithm_fails_encode() {
		let result = codec().encode(b"x", "default", &[0u8; 32], "rot13", b"", false);
		assert!(matches!(result, Err(CryptoError::UnsupportedAlgorithm(_))));
	}

	#[test]
	fn unregistered_algorithm_fails_decode() {
		let full = codec();
		let key = [6u8; 16];
		let bytes = full.encode(b"x", "default", &key, "aes-128-gcm", b"", false).unwrap();

		let narrow = Codec::new(Arc::new(AlgorithmRegistry::with_algorithms([Algorithm::Aes256Gcm])));
		assert!(matches!(
			narrow.decode(&bytes, &key, None),
			Err(CryptoError::UnsupportedAlgorithm(_))
		));
	}

	#[test]
	fn oversized_aad_is_rejected() {
		let aad = vec![0u8; MAX_INT16 + 1];
		let result = codec().encode(b"x", "default", &[0u8; 32], "aes-256-gcm", &aad, false);
		assert!(matches!(result, Err(CryptoError::AadTooLarge(_))));
	}

	#[test]
	fn wrong_version_is_rejected() {
		let codec = codec();
		let mut bytes = codec.encode(b"x", "default", &[0u8; 32], "aes-256-gcm", b"", false).unwrap();
		bytes[0] = 2;
		assert!(matches!(
			codec.decode(&bytes, &[0u8; 32], None),
			Err(CryptoError::UnsupportedVersion(2))
		));
		assert!(matches!(
			codec.extract_key_id(&bytes),
			Err(CryptoError::UnsupportedVersion(2))
		));
	}

	#[test]
	fn length_mismatch_is_corrupt() {
		let codec = codec();
		let mut bytes = codec.encode(b"x", "default", &[0u8; 32], "aes-256-gcm", b"", false).unwrap();
		bytes.push(0);
		assert!(matches!(
			codec.decode(&bytes, &[0u8; 32], None),
			Err(CryptoError::Corrupt(_))
		));
		assert!(matches!(codec.decode(&bytes[..10], &[0u8; 32], None), Err(CryptoError::Corrupt(_))));
	}

	#[test]
	fn wrong_key_fails_authentication() {
		let codec = codec();
		let bytes = codec.encode(b"x", "default", &[1u8; 32], "aes-256-gcm", b"", false).unwrap();
		assert!(matches!(
			codec.decode(&bytes, &[2u8; 32], None),
			Err(CryptoError::AuthenticationFailed)
		));
	}

	fn algorithm_name() -> impl Strategy<Value = &'static str> {
		prop_oneof![Just("aes-128-gcm"), Just("aes-256-gcm")]
	}

	proptest! {
		#[test]
		fn round_trip(
			name in algorithm_name(),
			plaintext in prop::collection::vec(any::<u8>(), 0..512),
			map in prop::collection::btree_map("[a-z]{1,10}", "[ -~]{0,24}", 0..=20),
			embed in any::<bool>(),
		) {
			let codec = codec();
			let algorithm = codec.registry().lookup(name).unwrap();
			let key = vec![9u8; algorithm.key_len()];
			let aad = map.into_iter().collect::<AssociatedData>().encode().unwrap();

			let bytes = codec.encode(&plaintext, "default", &key, name, &aad, embed).unwrap();
			let decoded = codec.decode(&bytes, &key, Some(aad.as_slice())).unwrap();
			prop_assert_eq!(decoded.plaintext.as_slice(), plaintext.as_slice());
			if embed {
				prop_assert_eq!(decoded.aad, aad);
			} else {
				prop_assert!(decoded.aad.is_empty());
			}
		}

		#[test]
		fn any_flipped_tag_or_ciphertext_bit_fails(
			name in algorithm_name(),
			plaintext in prop::collection::vec(any::<u8>(), 1..128),
			bit in any::<prop::sample::Index>(),
		) {
			let codec = codec();
			let algorithm = codec.registry().lookup(name).unwrap();
			let key = vec![11u8; algorithm.key_len()];
			let mut bytes = codec.encode(&plaintext, "default", &key, name, b"meta", true).unwrap();

			// tag, embedded aad and ciphertext run to the end of the record
			let tag_start = bytes.len() - plaintext.len() - b"meta".len() - algorithm.tag_len();
			let flip = bit.index((bytes.len() - tag_start) * 8);
			bytes[tag_start + flip / 8] ^= 1 << (flip % 8);

			prop_assert!(matches!(
				codec.decode(&bytes, &key, None),
				Err(CryptoError::AuthenticationFailed)
			));
		}
	}
}
