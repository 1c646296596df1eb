// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization group sets: validation, the `|`-joined payload encoding and
//! the intersection test behind every visibility check.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use strongroom_crypto::AssociatedData;

use crate::error::{StoreError, StoreResult};

pub const MAX_GROUP_LENGTH: usize = 64;

const SEPARATOR: char = '|';

static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").unwrap());

pub type GroupSet = BTreeSet<String>;

pub fn validate_group(name: &str) -> StoreResult<()> {
	if name.is_empty() || name.len() > MAX_GROUP_LENGTH || !GROUP_RE.is_match(name) {
		return Err(StoreError::InvalidGroupSet(format!(
			"'{name}' must be 1 to {MAX_GROUP_LENGTH} characters of a-z, 0-9, '_' or '-'"
		)));
	}
	Ok(())
}

pub fn validate_groups(groups: &GroupSet) -> StoreResult<()> {
	groups.iter().try_for_each(|g| validate_group(g))
}

/// Build a group set from user input, rejecting the first malformed name.
pub fn parse_groups<I, S>(names: I) -> StoreResult<GroupSet>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut groups = GroupSet::new();
	for name in names {
		let name = name.as_ref().trim();
		validate_group(name)?;
		groups.insert(name.to_string());
	}
	Ok(groups)
}

pub fn groups_to_bytes(groups: &GroupSet) -> Vec<u8> {
	let joined: Vec<&str> = groups.iter().map(String::as_str).collect();
	joined.join(&SEPARATOR.to_string()).into_bytes()
}

pub fn groups_from_bytes(bytes: &[u8]) -> StoreResult<GroupSet> {
	if bytes.is_empty() {
		return Ok(GroupSet::new());
	}
	let text = std::str::from_utf8(bytes)
		.map_err(|_| StoreError::corrupt("group payload is not UTF-8"))?;
	Ok(text.split(SEPARATOR).map(str::to_string).collect())
}

/// Associated data binding a groups envelope to its item.
pub fn groups_aad(id: &str) -> AssociatedData {
	AssociatedData::new().with("id", id)
}

/// True when the two sets share at least one group.
pub fn sets_intersect(a: &GroupSet, b: &GroupSet) -> bool {
	let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
	small.iter().any(|g| large.contains(g))
}
