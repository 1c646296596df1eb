// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};

/// The parts of a verified client certificate the store needs to resolve a
/// user. Produced by the TLS layer; this crate does not parse X.509.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
	pub fingerprint: Option<String>,
	pub common_name: Option<String>,
	pub email_address: Option<String>,
	pub is_verified: bool,
	pub valid_start: Option<DateTime<Utc>>,
	pub valid_end: Option<DateTime<Utc>>,
}

impl CertificateInfo {
	/// Fingerprint, common name and email, if all three are present and non-empty.
	pub fn identity(&self) -> Option<(&str, &str, &str)> {
		fn non_empty(v: &Option<String>) -> Option<&str> {
			v.as_deref().filter(|s| !s.is_empty())
		}
		Some((
			non_empty(&self.fingerprint)?,
			non_empty(&self.common_name)?,
			non_empty(&self.email_address)?,
		))
	}
}
