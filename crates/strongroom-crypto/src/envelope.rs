// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption: a per-item data key from the key service, the payload
//! encrypted under it, and both framed as
//! `[wrappedKeyLen:i32 LE, recordLen:i32 LE, wrappedKey, record]`.

use tracing::instrument;
use zeroize::Zeroizing;

use crate::aad::AssociatedData;
use crate::codec::{self, Codec, MAX_INT32};
use crate::error::{CryptoError, CryptoResult};
use crate::key_service::KeyService;

/// Length of the envelope framing header.
pub const ENVELOPE_HEADER_LEN: usize = 8;

/// Plaintext and embedded associated data recovered from an envelope.
pub struct Opened {
	pub plaintext: Zeroizing<Vec<u8>>,
	pub aad: AssociatedData,
}

impl std::fmt::Debug for Opened {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Opened")
			.field("plaintext", &"[REDACTED]")
			.field("aad", &self.aad)
			.finish()
	}
}

/// Encrypt `plaintext` under a fresh data key and frame the result.
#[instrument(skip(codec, keys, plaintext, aad), fields(len = plaintext.len()))]
pub async fn encrypt(
	codec: &Codec,
	keys: &dyn KeyService,
	key_id: &str,
	algorithm: &str,
	plaintext: &[u8],
	aad: &AssociatedData,
	embed_aad: bool,
) -> CryptoResult<Vec<u8>> {
	let spec = codec.registry().lookup(algorithm)?;
	let aad = aad.encode()?;

	let data_key = keys.generate_data_key(key_id, spec.key_len()).await?;
	let record = codec.encode(plaintext, key_id, &data_key.plaintext, algorithm, &aad, embed_aad)?;

	frame(&data_key.wrapped, &record)
}

/// Unwrap the data key and decrypt the record.
///
/// `aad_override` authenticates a record whose associated data was not
/// embedded; `None` authenticates against the embedded copy.
#[instrument(skip_all, fields(len = envelope.len()))]
pub async fn decrypt(
	codec: &Codec,
	keys: &dyn KeyService,
	envelope: &[u8],
	aad_override: Option<&AssociatedData>,
) -> CryptoResult<Opened> {
	let (wrapped, record) = split(envelope)?;
	let aad_override = aad_override.map(AssociatedData::encode).transpose()?;

	let data_key = keys.unwrap_key(wrapped).await?;
	let decoded = codec.decode(record, &data_key, aad_override.as_deref())?;

	Ok(Opened {
		plaintext: decoded.plaintext,
		aad: AssociatedData::decode(&decoded.aad)?,
	})
}

/// Read the embedded associated data without contacting the key service.
pub fn extract_aad(envelope: &[u8]) -> CryptoResult<AssociatedData> {
	let (_, record) = split(envelope)?;
	AssociatedData::decode(&codec::extract_aad(record)?)
}

/// Split an envelope into its wrapped key and record.
pub fn split(envelope: &[u8]) -> CryptoResult<(&[u8], &[u8])> {
	if envelope.len() < ENVELOPE_HEADER_LEN {
		return Err(CryptoError::Corrupt(format!(
			"envelope is {} bytes, shorter than its header",
			envelope.len()
		)));
	}
	let wrapped_len = read_len(envelope, 0)?;
	let record_len = read_len(envelope, 4)?;

	if ENVELOPE_HEADER_LEN + wrapped_len + record_len != envelope.len() {
		return Err(CryptoError::Corrupt(format!(
			"envelope declares {} bytes, has {}",
			ENVELOPE_HEADER_LEN + wrapped_len + record_len,
			envelope.len()
		)));
	}
	Ok(envelope[ENVELOPE_HEADER_LEN..].split_at(wrapped_len))
}

fn frame(wrapped: &[u8], record: &[u8]) -> CryptoResult<Vec<u8>> {
	if wrapped.len() > MAX_INT32 || record.len() > MAX_INT32 {
		return Err(CryptoError::FieldTooLarge {
			field: "envelope part",
			len: wrapped.len().max(record.len()),
			max: MAX_INT32,
		});
	}
	let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + wrapped.len() + record.len());
	out.extend_from_slice(&(wrapped.len() as i32).to_le_bytes());
	out.extend_from_slice(&(record.len() as i32).to_le_bytes());
	out.extend_from_slice(wrapped);
	out.extend_from_slice(record);
	Ok(out)
}

fn read_len(bytes: &[u8], at: usize) -> CryptoResult<usize> {
	let value = i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
	usize::try_from(value).map_err(|_| CryptoError::Corrupt(format!("negative envelope length {value}")))
}
