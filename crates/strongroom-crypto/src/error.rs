// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for record encoding and envelope encryption.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while encoding, decoding or wrapping records.
#[derive(Debug, Error)]
pub enum CryptoError {
	// =========================================================================
	// Wire Format Errors
	// =========================================================================
	#[error("unsupported algorithm: {0}")]
	UnsupportedAlgorithm(String),

	#[error("unsupported record version: {0}")]
	UnsupportedVersion(i16),

	#[error("associated data is {0} bytes, the limit is 32767")]
	AadTooLarge(usize),

	#[error("{field} is {len} bytes, the limit is {max}")]
	FieldTooLarge {
		field: &'static str,
		len: usize,
		max: usize,
	},

	#[error("corrupt record: {0}")]
	Corrupt(String),

	// =========================================================================
	// Key Errors
	// =========================================================================
	#[error("authentication failed (wrong key or tampered data)")]
	AuthenticationFailed,

	#[error("unknown key: {0}")]
	UnknownKey(String),

	#[error("invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("key service error: {0}")]
	KeyService(String),

	#[error("encryption failed: {0}")]
	Encryption(String),
}

impl CryptoError {
	/// Returns true if the error describes a record that can never be read
	/// as-is (format mismatch or failed authentication).
	pub fn is_fatal_for_record(&self) -> bool {
		matches!(
			self,
			CryptoError::UnsupportedAlgorithm(_)
				| CryptoError::UnsupportedVersion(_)
				| CryptoError::Corrupt(_)
				| CryptoError::AuthenticationFailed
		)
	}
}
