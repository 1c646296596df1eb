// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `strongroom` administration binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod boot;
mod commands;

/// Strongroom - encrypted secret store administration.
#[derive(Parser, Debug)]
#[command(name = "strongroom", about = "Encrypted secret store administration", version)]
struct Args {
	/// TOML configuration file (defaults to /etc/strongroom/strongroom.toml)
	#[arg(long, global = true, env = "STRONGROOM_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Load every item and report counts; exits non-zero if the store is unreadable
	Check,

	/// List files, optionally only those visible to a user
	Files {
		/// Only list files this user may read
		#[arg(long = "as", value_name = "EMAIL")]
		as_user: Option<String>,
	},

	/// List users
	Users,

	/// List every group in use
	Groups,

	/// Add a file from a local path
	AddFile {
		/// File name in the store
		id: String,

		/// Local file to read the content from
		#[arg(long)]
		from: PathBuf,

		#[arg(long)]
		content_type: Option<String>,

		/// Comma-separated groups allowed to read the file
		#[arg(long, value_delimiter = ',')]
		groups: Vec<String>,
	},

	/// Add a user
	AddUser {
		/// Email address, also the user id
		email: String,

		/// Name, must equal the certificate common name
		#[arg(long)]
		name: String,

		/// Certificate SHA-1 fingerprint, e.g. AB:CD:...
		#[arg(long)]
		fingerprint: String,

		#[arg(long, value_enum, default_value_t = RoleArg::User)]
		role: RoleArg,

		/// Days from now until the user expires
		#[arg(long, default_value_t = 365)]
		valid_days: i64,

		/// Comma-separated groups
		#[arg(long, value_delimiter = ',')]
		groups: Vec<String>,
	},

	/// Replace the groups of a file or user
	SetGroups {
		#[arg(value_enum)]
		kind: KindArg,

		id: String,

		/// Comma-separated groups; omit to clear
		#[arg(long, value_delimiter = ',')]
		groups: Vec<String>,
	},

	/// Change a user's profile or certificate
	SetUser {
		email: String,

		#[arg(long)]
		name: Option<String>,

		#[arg(long)]
		fingerprint: Option<String>,

		#[arg(long, value_enum)]
		role: Option<RoleArg>,

		/// Restart the validity window now, lasting this many days
		#[arg(long)]
		renew_days: Option<i64>,
	},

	/// Print a file's content as a given user would read it
	Cat {
		path: String,

		#[arg(long = "as", value_name = "EMAIL")]
		as_user: String,
	},

	/// Generate a random master key for the local key service
	GenKey {
		#[arg(long, default_value = "aes-256-gcm")]
		algorithm: String,

		#[arg(long, default_value = "base64")]
		encoding: String,
	},

	/// Delete every stored file and user
	Erase {
		/// Confirm the erase
		#[arg(long)]
		yes: bool,
	},
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
	Admin,
	User,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
	File,
	User,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<strongroom_config::StrongroomConfig> {
	let config = match path {
		Some(path) => strongroom_config::load_config_with_file(path)?,
		None => strongroom_config::load_config()?,
	};
	Ok(config)
}

fn init_tracing(level: &str) {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| level.to_string().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	// Key generation must work before any configuration exists.
	if let Command::GenKey {
		algorithm,
		encoding,
	} = &args.command
	{
		init_tracing("warn");
		println!("{}", commands::gen_key(algorithm, encoding)?);
		return Ok(());
	}

	let config = load_config(args.config.as_ref())?;
	init_tracing(&config.logging.level);

	let index = boot::open_index(&config).await?;
	commands::run(&index, args.command).await
}
