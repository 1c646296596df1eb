// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! What a path resolves to: the synthetic root directory or a stored file.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::file::SecretFile;
use crate::item::{md5_base64, SecretItem};

pub const ROOT_PATH: &str = "/";
pub const ROOT_TEXT: &str = "Secret server root directory";
pub const ROOT_CONTENT_TYPE: &str = "text/plain";

/// Always-present, unencrypted pseudo-file standing for the store root.
#[derive(Debug, Clone)]
pub struct VirtualRoot {
	created_at: DateTime<Utc>,
	etag: String,
}

impl VirtualRoot {
	pub fn new(created_at: DateTime<Utc>) -> Self {
		Self {
			created_at,
			etag: md5_base64(ROOT_TEXT.as_bytes()),
		}
	}

	pub fn content(&self) -> &'static [u8] {
		ROOT_TEXT.as_bytes()
	}
}

#[derive(Debug, Clone)]
pub enum FileNode {
	Root(Arc<VirtualRoot>),
	File(Arc<SecretFile>),
}

impl FileNode {
	pub fn path(&self) -> String {
		match self {
			FileNode::Root(_) => ROOT_PATH.to_string(),
			FileNode::File(file) => file.path(),
		}
	}

	pub fn content_length(&self) -> u64 {
		match self {
			FileNode::Root(_) => ROOT_TEXT.len() as u64,
			FileNode::File(file) => file.content_length(),
		}
	}

	pub fn content_type(&self) -> &str {
		match self {
			FileNode::Root(_) => ROOT_CONTENT_TYPE,
			FileNode::File(file) => file.content_type(),
		}
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		match self {
			FileNode::Root(root) => root.created_at,
			FileNode::File(file) => file.created_at(),
		}
	}

	pub fn modified_at(&self) -> DateTime<Utc> {
		match self {
			FileNode::Root(root) => root.created_at,
			FileNode::File(file) => file.modified_at(),
		}
	}

	pub fn is_directory(&self) -> bool {
		matches!(self, FileNode::Root(_))
	}

	pub fn etag(&self) -> &str {
		match self {
			FileNode::Root(root) => &root.etag,
			FileNode::File(file) => file.content_fingerprint(),
		}
	}

	pub fn as_file(&self) -> Option<&Arc<SecretFile>> {
		match self {
			FileNode::Root(_) => None,
			FileNode::File(file) => Some(file),
		}
	}
}
