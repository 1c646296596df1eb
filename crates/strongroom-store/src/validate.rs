// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Field-level validation shared by the item kinds.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{StoreError, StoreResult};

pub const MAX_ID_LENGTH: usize = 64;
pub const MAX_NAME_LENGTH: usize = 64;
pub const MAX_CONTENT_TYPE_LENGTH: usize = 255;
pub const MAX_FILE_SIZE: usize = 128 * 1024;

static FILE_NAME_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-z0-9_][a-z0-9_.-]*$").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^(([a-zA-Z0-9][a-zA-Z0-9._%+-]*[a-zA-Z0-9])|([a-zA-Z0-9]))@[a-zA-Z0-9][a-zA-Z0-9.-]*[a-zA-Z0-9]\.[a-zA-Z]{2,63}$",
	)
	.unwrap()
});

static FINGERPRINT_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^([A-F0-9]{2}:){19}[A-F0-9]{2}$").unwrap());

pub fn validate_file_name(id: &str) -> StoreResult<()> {
	if id.is_empty() || id.len() > MAX_ID_LENGTH {
		return Err(StoreError::validation(
			"file name",
			format!("must be 1 to {MAX_ID_LENGTH} characters"),
		));
	}
	if !FILE_NAME_RE.is_match(id) {
		return Err(StoreError::validation(
			"file name",
			format!("'{id}' may only contain a-z, 0-9, '_', '.' and '-' and must not start with '.' or '-'"),
		));
	}
	Ok(())
}

pub fn validate_email(id: &str) -> StoreResult<()> {
	if id.is_empty() || id.len() > MAX_ID_LENGTH {
		return Err(StoreError::validation(
			"user id",
			format!("must be 1 to {MAX_ID_LENGTH} characters"),
		));
	}
	if !EMAIL_RE.is_match(id) {
		return Err(StoreError::validation(
			"user id",
			format!("'{id}' is not an email address"),
		));
	}
	Ok(())
}

pub fn validate_user_name(name: &str) -> StoreResult<()> {
	let len = name.chars().count();
	if len == 0 || len > MAX_NAME_LENGTH {
		return Err(StoreError::validation(
			"user name",
			format!("must be 1 to {MAX_NAME_LENGTH} characters"),
		));
	}
	Ok(())
}

/// Certificate fingerprints are 20 upper-case hex pairs separated by colons.
pub fn validate_fingerprint(fingerprint: &str) -> StoreResult<()> {
	if !FINGERPRINT_RE.is_match(fingerprint) {
		return Err(StoreError::validation(
			"certificate fingerprint",
			"expected 20 colon-separated upper-case hex pairs",
		));
	}
	Ok(())
}

pub fn validate_content_type(content_type: &str) -> StoreResult<()> {
	if content_type.is_empty() || content_type.len() > MAX_CONTENT_TYPE_LENGTH {
		return Err(StoreError::validation(
			"content type",
			format!("must be 1 to {MAX_CONTENT_TYPE_LENGTH} characters"),
		));
	}
	if !content_type.bytes().all(|b| (0x20..0x7f).contains(&b)) {
		return Err(StoreError::validation(
			"content type",
			"must be printable ASCII",
		));
	}
	Ok(())
}

pub fn validate_file_size(len: usize) -> StoreResult<()> {
	if len > MAX_FILE_SIZE {
		return Err(StoreError::validation(
			"file content",
			format!("{len} bytes exceeds the {MAX_FILE_SIZE} byte limit"),
		));
	}
	Ok(())
}
