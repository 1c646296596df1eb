// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment
//! variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::StrongroomConfigLayer;
use crate::secret::load_secret_env;
use crate::sections::{
	EncryptionConfigLayer, KeyServiceConfigLayer, LoggingConfigLayer, StorageConfigLayer,
};

/// Environment variable holding the master key.
pub const SECRET_KEY_ENV: &str = "STRONGROOM_KEY_SERVICE_SECRET_KEY";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<StrongroomConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<StrongroomConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(StrongroomConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/strongroom/strongroom.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<StrongroomConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(StrongroomConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: StrongroomConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: STRONGROOM_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<StrongroomConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(StrongroomConfigLayer {
			encryption: Some(load_encryption_from_env()),
			key_service: Some(load_key_service_from_env()?),
			storage: Some(load_storage_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr<Err = ConfigError>,
{
	env_var(name).map(|v| v.parse()).transpose()
}

fn load_encryption_from_env() -> EncryptionConfigLayer {
	EncryptionConfigLayer {
		key_id: env_var("STRONGROOM_ENCRYPTION_KEY_ID"),
		algorithm: env_var("STRONGROOM_ENCRYPTION_ALGORITHM"),
	}
}

fn load_key_service_from_env() -> Result<KeyServiceConfigLayer, ConfigError> {
	Ok(KeyServiceConfigLayer {
		provider: env_parse("STRONGROOM_KEY_SERVICE_PROVIDER")?,
		algorithm: env_var("STRONGROOM_KEY_SERVICE_ALGORITHM"),
		secret_key: load_secret_env(SECRET_KEY_ENV)?,
		secret_key_encoding: env_var("STRONGROOM_KEY_SERVICE_SECRET_KEY_ENCODING"),
	})
}

fn load_storage_from_env() -> Result<StorageConfigLayer, ConfigError> {
	Ok(StorageConfigLayer {
		provider: env_parse("STRONGROOM_STORAGE_PROVIDER")?,
		root_directory: env_var("STRONGROOM_STORAGE_ROOT_DIRECTORY").map(PathBuf::from),
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("STRONGROOM_LOGGING_LEVEL"),
	}
}
