// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical associated-data encoding.
//!
//! An associated-data map is serialized as a concatenation of
//! `[keyLen:i16 LE, valLen:i16 LE, key, val]` tuples in ascending key order.
//! The empty map encodes to the empty buffer.

use std::collections::BTreeMap;

use crate::codec::MAX_INT16;
use crate::error::{CryptoError, CryptoResult};

const ENTRY_HEADER_LEN: usize = 4;

/// String-keyed metadata bound to a ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociatedData {
	entries: BTreeMap<String, String>,
}

impl AssociatedData {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.entries.insert(key.into(), value.into())
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.get(key).map(String::as_str)
	}

	/// Returns the value for `key` or a `Corrupt` error naming the missing field.
	pub fn require(&self, key: &str) -> CryptoResult<&str> {
		self
			.get(key)
			.ok_or_else(|| CryptoError::Corrupt(format!("associated data is missing `{key}`")))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Serialize to the canonical byte form.
	pub fn encode(&self) -> CryptoResult<Vec<u8>> {
		let mut out = Vec::new();
		for (key, value) in &self.entries {
			check_len("associated data key", key.len())?;
			check_len("associated data value", value.len())?;
			out.extend_from_slice(&(key.len() as i16).to_le_bytes());
			out.extend_from_slice(&(value.len() as i16).to_le_bytes());
			out.extend_from_slice(key.as_bytes());
			out.extend_from_slice(value.as_bytes());
		}
		if out.len() > MAX_INT16 {
			return Err(CryptoError::AadTooLarge(out.len()));
		}
		Ok(out)
	}

	/// Parse the canonical byte form. A repeated key keeps its last value.
	pub fn decode(bytes: &[u8]) -> CryptoResult<Self> {
		let mut entries = BTreeMap::new();
		let mut pos = 0;
		while pos < bytes.len() {
			if bytes.len() - pos < ENTRY_HEADER_LEN {
				return Err(CryptoError::Corrupt(
					"truncated associated data entry header".to_string(),
				));
			}
			let key_len = read_len(bytes, pos)?;
			let value_len = read_len(bytes, pos + 2)?;
			pos += ENTRY_HEADER_LEN;

			if bytes.len() - pos < key_len + value_len {
				return Err(CryptoError::Corrupt(
					"associated data entry overruns the buffer".to_string(),
				));
			}
			let key = utf8(&bytes[pos..pos + key_len])?;
			pos += key_len;
			let value = utf8(&bytes[pos..pos + value_len])?;
			pos += value_len;

			entries.insert(key, value);
		}
		Ok(Self { entries })
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AssociatedData {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			entries: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}

fn check_len(field: &'static str, len: usize) -> CryptoResult<()> {
	if len > MAX_INT16 {
		return Err(CryptoError::FieldTooLarge {
			field,
			len,
			max: MAX_INT16,
		});
	}
	Ok(())
}

fn read_len(bytes: &[u8], at: usize) -> CryptoResult<usize> {
	let len = i16::from_le_bytes([bytes[at], bytes[at + 1]]);
	usize::try_from(len)
		.map_err(|_| CryptoError::Corrupt(format!("negative associated data length {len}")))
}

fn utf8(bytes: &[u8]) -> CryptoResult<String> {
	String::from_utf8(bytes.to_vec())
		.map_err(|_| CryptoError::Corrupt("associated data is not valid UTF-8".to_string()))
}
