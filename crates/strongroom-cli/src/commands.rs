// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use strongroom_crypto::{generate_secret_key, AlgorithmRegistry, SecretKeyEncoding};
use strongroom_store::{
	parse_groups, NewFile, NewUser, Role, SecretIndex, SecretItem, SecretUser, UserUpdate,
};
use tokio::io::AsyncWriteExt;

use crate::{Command, KindArg, RoleArg};

impl From<RoleArg> for Role {
	fn from(role: RoleArg) -> Self {
		match role {
			RoleArg::Admin => Role::Admin,
			RoleArg::User => Role::User,
		}
	}
}

/// Generate an encoded master key for the named algorithm.
pub fn gen_key(algorithm: &str, encoding: &str) -> Result<String> {
	let algorithm = AlgorithmRegistry::standard().lookup(algorithm)?;
	let encoding: SecretKeyEncoding = encoding.parse()?;
	Ok(generate_secret_key(algorithm, encoding))
}

fn require_user(index: &SecretIndex, email: &str) -> Result<Arc<SecretUser>> {
	index
		.get_user(email)
		.with_context(|| format!("no such user: {email}"))
}

/// End of a validity window `days` long starting at `start`.
fn valid_until(start: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
	Duration::try_days(days)
		.and_then(|span| start.checked_add_signed(span))
		.with_context(|| format!("{days} days is out of range"))
}

fn join_groups<'a>(groups: impl IntoIterator<Item = &'a String>) -> String {
	groups.into_iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

pub async fn run(index: &SecretIndex, command: Command) -> Result<()> {
	match command {
		Command::Check => {
			println!(
				"files={} users={} admins={}",
				index.file_count(),
				index.user_count(),
				index.admin_user_count()
			);
		}

		Command::Files { as_user } => {
			let files = match as_user {
				Some(email) => index.user_files(&*require_user(index, &email)?),
				None => {
					let mut files = Vec::new();
					index.for_each_file(|file| files.push(Arc::clone(file)));
					files.sort_by(|a, b| a.id().cmp(b.id()));
					files
				}
			};
			for file in files {
				println!(
					"{}\t{}\t{}\t{}\t{}",
					file.path(),
					file.content_length(),
					file.content_type(),
					file.modified_at().to_rfc3339(),
					join_groups(file.groups())
				);
			}
		}

		Command::Users => {
			let mut users = Vec::new();
			index.for_each_user(|user| users.push(Arc::clone(user)));
			users.sort_by(|a, b| a.id().cmp(b.id()));
			for user in users {
				println!(
					"{}\t{}\t{}\t{}\t{}",
					user.id(),
					user.name(),
					user.role(),
					user.valid_end().to_rfc3339(),
					join_groups(user.groups())
				);
			}
		}

		Command::Groups => {
			for group in index.groups() {
				println!("{group}");
			}
		}

		Command::AddFile {
			id,
			from,
			content_type,
			groups,
		} => {
			let content = tokio::fs::read(&from)
				.await
				.with_context(|| format!("failed to read {}", from.display()))?;
			let mut new = NewFile::new(id, content).groups(parse_groups(&groups)?);
			if let Some(content_type) = content_type {
				new = new.content_type(content_type);
			}
			let file = index.add_file(new).await?;
			println!("added {}", file.path());
		}

		Command::AddUser {
			email,
			name,
			fingerprint,
			role,
			valid_days,
			groups,
		} => {
			let valid_start = Utc::now();
			let user = index
				.add_user(NewUser {
					id: email,
					name,
					role: role.into(),
					valid_start,
					valid_end: valid_until(valid_start, valid_days)?,
					cert_fingerprint: fingerprint,
					groups: parse_groups(&groups)?,
				})
				.await?;
			println!("added {}", user.id());
		}

		Command::SetGroups { kind, id, groups } => {
			let groups = parse_groups(&groups)?;
			match kind {
				KindArg::File => {
					index
						.update_file_groups(id.trim_start_matches('/'), groups)
						.await?;
				}
				KindArg::User => {
					index.update_user_groups(&id, groups).await?;
				}
			}
		}

		Command::SetUser {
			email,
			name,
			fingerprint,
			role,
			renew_days,
		} => {
			let mut update = UserUpdate {
				name,
				role: role.map(Role::from),
				cert_fingerprint: fingerprint,
				..UserUpdate::default()
			};
			if let Some(days) = renew_days {
				let start = Utc::now();
				update.valid_start = Some(start);
				update.valid_end = Some(valid_until(start, days)?);
			}
			if update.is_empty() {
				bail!("nothing to change");
			}
			index.update_user_data(&email, update).await?;
		}

		Command::Cat { path, as_user } => {
			let user = require_user(index, &as_user)?;
			let node = index
				.user_get_file(Some(&*user), &path)
				.with_context(|| format!("{path} not found"))?;
			if node.is_directory() {
				bail!("{path} is a directory");
			}
			let content = index.read_file(&node).await?;
			let mut stdout = tokio::io::stdout();
			stdout.write_all(&content).await?;
			stdout.flush().await?;
		}

		Command::Erase { yes } => {
			if !yes {
				bail!("refusing to erase without --yes");
			}
			index.erase_all().await?;
		}

		Command::GenKey {
			algorithm,
			encoding,
		} => println!("{}", gen_key(&algorithm, &encoding)?),
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use strongroom_crypto::{Codec, LocalKeyService};
	use strongroom_store::{ItemSealer, MemoryStorage};

	async fn index() -> SecretIndex {
		let codec = Codec::new(Arc::new(AlgorithmRegistry::standard()));
		let secret = gen_key("aes-256-gcm", "hex").unwrap();
		let keys = LocalKeyService::from_encoded(
			codec.clone(),
			"default",
			"aes-256-gcm",
			&secret,
			SecretKeyEncoding::Hex,
		)
		.unwrap();
		let sealer = ItemSealer::new(codec, Arc::new(keys), "default", "aes-256-gcm").unwrap();
		SecretIndex::load(sealer, Arc::new(MemoryStorage::new()))
			.await
			.unwrap()
	}

	#[test]
	fn gen_key_honours_length_and_encoding() {
		assert_eq!(gen_key("aes-128-gcm", "hex").unwrap().len(), 32);
		assert_eq!(gen_key("aes-256-gcm", "hex").unwrap().len(), 64);
		assert!(gen_key("rot13", "hex").is_err());
		assert!(gen_key("aes-256-gcm", "base32").is_err());
	}

	#[tokio::test]
	async fn add_user_then_set_user_changes_role() {
		let index = index().await;
		run(
			&index,
			Command::AddUser {
				email: "ana@example.com".into(),
				name: "Ana".into(),
				fingerprint: vec!["AB"; 20].join(":"),
				role: RoleArg::User,
				valid_days: 30,
				groups: vec!["ops".into()],
			},
		)
		.await
		.unwrap();
		run(
			&index,
			Command::SetUser {
				email: "ana@example.com".into(),
				name: None,
				fingerprint: None,
				role: Some(RoleArg::Admin),
				renew_days: None,
			},
		)
		.await
		.unwrap();
		assert!(index.get_user("ana@example.com").unwrap().is_admin());
	}

	#[tokio::test]
	async fn empty_set_user_is_rejected() {
		let index = index().await;
		let err = run(
			&index,
			Command::SetUser {
				email: "nobody@example.com".into(),
				name: None,
				fingerprint: None,
				role: None,
				renew_days: None,
			},
		)
		.await
		.unwrap_err();
		assert!(err.to_string().contains("nothing to change"));
	}

	#[tokio::test]
	async fn out_of_range_validity_is_an_error() {
		let index = index().await;
		let err = run(
			&index,
			Command::AddUser {
				email: "ana@example.com".into(),
				name: "Ana".into(),
				fingerprint: vec!["AB"; 20].join(":"),
				role: RoleArg::User,
				valid_days: i64::MAX / 1000,
				groups: Vec::new(),
			},
		)
		.await
		.unwrap_err();
		assert!(err.to_string().contains("out of range"));
		assert!(!index.has_user("ana@example.com"));

		let err = run(
			&index,
			Command::SetUser {
				email: "ana@example.com".into(),
				name: None,
				fingerprint: None,
				role: None,
				renew_days: Some(i64::MIN),
			},
		)
		.await
		.unwrap_err();
		assert!(err.to_string().contains("out of range"));
	}

	#[tokio::test]
	async fn files_as_user_lists_only_shared_groups() {
		let index = index().await;
		index
			.add_file(NewFile::new("ops.txt", "x").groups(parse_groups(["ops"]).unwrap()))
			.await
			.unwrap();
		run(
			&index,
			Command::AddUser {
				email: "ana@example.com".into(),
				name: "Ana".into(),
				fingerprint: vec!["AB"; 20].join(":"),
				role: RoleArg::User,
				valid_days: 30,
				groups: vec!["dev".into()],
			},
		)
		.await
		.unwrap();
		run(
			&index,
			Command::Files {
				as_user: Some("ana@example.com".into()),
			},
		)
		.await
		.unwrap();
		assert!(run(&index, Command::Files { as_user: Some("nobody@example.com".into()) })
			.await
			.is_err());
	}

	#[tokio::test]
	async fn erase_requires_confirmation() {
		let index = index().await;
		assert!(run(&index, Command::Erase { yes: false }).await.is_err());
		run(&index, Command::Erase { yes: true }).await.unwrap();
	}

	#[tokio::test]
	async fn set_groups_accepts_a_leading_slash() {
		let index = index().await;
		index
			.add_file(NewFile::new("a.txt", "x"))
			.await
			.unwrap();
		run(
			&index,
			Command::SetGroups {
				kind: KindArg::File,
				id: "/a.txt".into(),
				groups: vec!["ops".into()],
			},
		)
		.await
		.unwrap();
		assert_eq!(index.groups().len(), 1);
	}
}
