// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the secret store.

use strongroom_crypto::CryptoError;
use thiserror::Error;

use crate::item::ItemKind;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while loading, querying or mutating the store.
#[derive(Debug, Error)]
pub enum StoreError {
	// =========================================================================
	// Validation Errors
	// =========================================================================
	#[error("invalid {field}: {message}")]
	Validation { field: &'static str, message: String },

	#[error("invalid group set: {0}")]
	InvalidGroupSet(String),

	// =========================================================================
	// Item State Errors
	// =========================================================================
	#[error("{kind} with id '{id}' already exists")]
	DuplicateId { kind: ItemKind, id: String },

	#[error("{kind} with id '{id}' does not exist")]
	NotFound { kind: ItemKind, id: String },

	// =========================================================================
	// Record Errors
	// =========================================================================
	#[error(transparent)]
	Crypto(#[from] CryptoError),

	// =========================================================================
	// Storage Errors
	// =========================================================================
	#[error("storage already holds {kind} '{id}'")]
	AlreadyStored { kind: ItemKind, id: String },

	#[error("stored {kind} '{id}' is missing its {missing} blob")]
	IncompleteItem {
		kind: ItemKind,
		id: String,
		missing: &'static str,
	},

	#[error("storage error: {0}")]
	Storage(String),

	#[error("storage I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("store failed to load: {0}")]
	LoadFailed(#[source] Box<StoreError>),
}

impl StoreError {
	pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
		StoreError::Validation {
			field,
			message: message.into(),
		}
	}

	pub(crate) fn corrupt(message: impl Into<String>) -> Self {
		StoreError::Crypto(CryptoError::Corrupt(message.into()))
	}

	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		match self {
			StoreError::Validation { .. }
			| StoreError::InvalidGroupSet(_)
			| StoreError::DuplicateId { .. }
			| StoreError::NotFound { .. } => false,
			StoreError::Crypto(_)
			| StoreError::AlreadyStored { .. }
			| StoreError::IncompleteItem { .. }
			| StoreError::Storage(_)
			| StoreError::Io(_)
			| StoreError::LoadFailed(_) => true,
		}
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			// 400 Bad Request
			StoreError::Validation { .. } | StoreError::InvalidGroupSet(_) => 400,

			// 404 Not Found
			StoreError::NotFound { .. } => 404,

			// 409 Conflict
			StoreError::DuplicateId { .. } | StoreError::AlreadyStored { .. } => 409,

			// 500 Internal Server Error
			StoreError::Crypto(_)
			| StoreError::IncompleteItem { .. }
			| StoreError::Storage(_)
			| StoreError::Io(_)
			| StoreError::LoadFailed(_) => 500,
		}
	}

	/// Stable short name for the error kind.
	pub fn kind(&self) -> &'static str {
		match self {
			StoreError::Validation { .. } => "validation",
			StoreError::InvalidGroupSet(_) => "invalid_group_set",
			StoreError::DuplicateId { .. } => "duplicate_id",
			StoreError::NotFound { .. } => "not_found",
			StoreError::Crypto(e) => match e {
				CryptoError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
				CryptoError::UnsupportedVersion(_) => "unsupported_version",
				CryptoError::AadTooLarge(_) | CryptoError::FieldTooLarge { .. } => "too_large",
				CryptoError::Corrupt(_) => "corrupt",
				CryptoError::AuthenticationFailed => "authentication_failed",
				CryptoError::UnknownKey(_) => "unknown_key",
				CryptoError::InvalidKeySize { .. }
				| CryptoError::KeyService(_)
				| CryptoError::Encryption(_) => "key_service",
			},
			StoreError::AlreadyStored { .. } => "already_stored",
			StoreError::IncompleteItem { .. } => "incomplete_item",
			StoreError::Storage(_) | StoreError::Io(_) => "storage",
			StoreError::LoadFailed(_) => "load_failed",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validation_is_400_and_not_internal() {
		let err = StoreError::validation("name", "too long");
		assert_eq!(err.status_code(), 400);
		assert!(!err.is_internal());
		assert_eq!(err.to_string(), "invalid name: too long");
	}

	#[test]
	fn duplicate_is_409() {
		let err = StoreError::DuplicateId {
			kind: ItemKind::File,
			id: "secret.txt".into(),
		};
		assert_eq!(err.status_code(), 409);
		assert_eq!(err.kind(), "duplicate_id");
		assert_eq!(err.to_string(), "file with id 'secret.txt' already exists");
	}

	#[test]
	fn authentication_failure_is_internal() {
		let err = StoreError::from(CryptoError::AuthenticationFailed);
		assert_eq!(err.status_code(), 500);
		assert!(err.is_internal());
		assert_eq!(err.kind(), "authentication_failed");
	}

	#[test]
	fn load_failed_keeps_cause() {
		let err = StoreError::LoadFailed(Box::new(StoreError::corrupt("bad header")));
		assert!(err.to_string().contains("bad header"));
		assert!(std::error::Error::source(&err).is_some());
	}
}
