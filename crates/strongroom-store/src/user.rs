// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User items. The encrypted payload is the certificate fingerprint; the rest
//! of the profile is embedded associated data.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use strongroom_crypto::AssociatedData;

use crate::error::{StoreError, StoreResult};
use crate::groups::GroupSet;
use crate::item::{decode_time, decode_version, encode_time, ItemKind, Sealed, SecretItem, SCHEMA_VERSION};
use crate::validate::{validate_email, validate_fingerprint, validate_user_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
	Admin,
	#[default]
	User,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Admin => "admin",
			Role::User => "user",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = StoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"admin" => Ok(Role::Admin),
			"user" => Ok(Role::User),
			other => Err(StoreError::validation(
				"role",
				format!("'{other}' is neither 'admin' nor 'user'"),
			)),
		}
	}
}

/// The associated-data half of a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
	pub version: u32,
	pub id: String,
	pub name: String,
	pub role: Role,
	pub valid_start: DateTime<Utc>,
	pub valid_end: DateTime<Utc>,
}

impl UserProfile {
	pub fn to_aad(&self) -> AssociatedData {
		AssociatedData::new()
			.with("v", self.version.to_string())
			.with("id", self.id.as_str())
			.with("name", self.name.as_str())
			.with("role", self.role.as_str())
			.with("validStart", encode_time(&self.valid_start))
			.with("validEnd", encode_time(&self.valid_end))
	}

	pub fn from_aad(aad: &AssociatedData) -> StoreResult<Self> {
		Ok(Self {
			version: decode_version(aad)?,
			id: aad.require("id")?.to_string(),
			name: aad.require("name")?.to_string(),
			role: aad
				.require("role")?
				.parse()
				.map_err(|_| StoreError::corrupt("user role is not recognised"))?,
			valid_start: decode_time(aad, "validStart")?,
			valid_end: decode_time(aad, "validEnd")?,
		})
	}

	pub fn validate(&self) -> StoreResult<()> {
		validate_email(&self.id)?;
		validate_user_name(&self.name)?;
		if self.valid_end <= self.valid_start {
			return Err(StoreError::validation(
				"validity window",
				"end must be after start",
			));
		}
		Ok(())
	}
}

/// A user to be added to the store.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub id: String,
	pub name: String,
	pub role: Role,
	pub valid_start: DateTime<Utc>,
	pub valid_end: DateTime<Utc>,
	pub cert_fingerprint: String,
	pub groups: GroupSet,
}

impl NewUser {
	pub(crate) fn prepare(self) -> StoreResult<(UserProfile, String, GroupSet)> {
		let profile = UserProfile {
			version: SCHEMA_VERSION,
			id: self.id,
			name: self.name,
			role: self.role,
			valid_start: self.valid_start,
			valid_end: self.valid_end,
		};
		profile.validate()?;
		validate_fingerprint(&self.cert_fingerprint)?;
		Ok((profile, self.cert_fingerprint, self.groups))
	}
}

/// Field overrides for an existing user. The id cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
	pub name: Option<String>,
	pub role: Option<Role>,
	pub valid_start: Option<DateTime<Utc>>,
	pub valid_end: Option<DateTime<Utc>>,
	pub cert_fingerprint: Option<String>,
}

impl UserUpdate {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.role.is_none()
			&& self.valid_start.is_none()
			&& self.valid_end.is_none()
			&& self.cert_fingerprint.is_none()
	}
}

/// A loaded user.
#[derive(Clone)]
pub struct SecretUser {
	profile: UserProfile,
	cert_fingerprint: String,
	groups: GroupSet,
	sealed: Sealed,
}

impl SecretUser {
	pub(crate) fn new(
		profile: UserProfile,
		cert_fingerprint: String,
		groups: GroupSet,
		sealed: Sealed,
	) -> Self {
		Self {
			profile,
			cert_fingerprint,
			groups,
			sealed,
		}
	}

	pub fn profile(&self) -> &UserProfile {
		&self.profile
	}

	pub fn name(&self) -> &str {
		&self.profile.name
	}

	pub fn role(&self) -> Role {
		self.profile.role
	}

	pub fn is_admin(&self) -> bool {
		self.profile.role == Role::Admin
	}

	pub fn valid_start(&self) -> DateTime<Utc> {
		self.profile.valid_start
	}

	pub fn valid_end(&self) -> DateTime<Utc> {
		self.profile.valid_end
	}

	pub fn cert_fingerprint(&self) -> &str {
		&self.cert_fingerprint
	}

	/// Copy the current fields and apply `update` on top, keeping the id.
	pub(crate) fn merged(&self, update: UserUpdate) -> StoreResult<(UserProfile, String)> {
		let mut profile = self.profile.clone();
		if let Some(name) = update.name {
			profile.name = name;
		}
		if let Some(role) = update.role {
			profile.role = role;
		}
		if let Some(start) = update.valid_start {
			profile.valid_start = start;
		}
		if let Some(end) = update.valid_end {
			profile.valid_end = end;
		}
		let fingerprint = update
			.cert_fingerprint
			.unwrap_or_else(|| self.cert_fingerprint.clone());

		profile.validate()?;
		validate_fingerprint(&fingerprint)?;
		Ok((profile, fingerprint))
	}

	pub(crate) fn regrouped(&self, groups: GroupSet, encrypted_groups: Vec<u8>) -> Self {
		Self {
			profile: self.profile.clone(),
			cert_fingerprint: self.cert_fingerprint.clone(),
			groups,
			sealed: self.sealed.with_groups(encrypted_groups),
		}
	}

	pub(crate) fn rewritten(&self, profile: UserProfile, cert_fingerprint: String, encrypted_main: Vec<u8>) -> Self {
		Self {
			profile,
			cert_fingerprint,
			groups: self.groups.clone(),
			sealed: self.sealed.with_main(encrypted_main),
		}
	}
}

impl fmt::Debug for SecretUser {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SecretUser")
			.field("profile", &self.profile)
			.field("groups", &self.groups)
			.field("sealed", &self.sealed)
			.finish_non_exhaustive()
	}
}

impl SecretItem for SecretUser {
	const KIND: ItemKind = ItemKind::User;

	fn id(&self) -> &str {
		&self.profile.id
	}

	fn version(&self) -> u32 {
		self.profile.version
	}

	fn groups(&self) -> &GroupSet {
		&self.groups
	}

	fn sealed(&self) -> &Sealed {
		&self.sealed
	}
}
