// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the strongroom secret store.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`STRONGROOM_*`)
//!
//! # Usage
//!
//! ```ignore
//! use strongroom_config::load_config_with_file;
//!
//! let config = load_config_with_file("/etc/strongroom/strongroom.toml")?;
//! println!("storing items under {}", config.storage.root_directory.display());
//! ```

pub mod error;
pub mod layer;
pub mod secret;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::StrongroomConfigLayer;
pub use secret::{load_secret_env, SecretString};
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SECRET_KEY_ENV};

use strongroom_crypto::AlgorithmRegistry;
use tracing::{debug, info};

/// Fully resolved strongroom configuration.
#[derive(Debug, Clone, Default)]
pub struct StrongroomConfig {
	pub encryption: EncryptionConfig,
	pub key_service: KeyServiceConfig,
	pub storage: StorageConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`STRONGROOM_*`)
/// 2. Config file (`/etc/strongroom/strongroom.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<StrongroomConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<StrongroomConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and finalize.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<StrongroomConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = StrongroomConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: StrongroomConfigLayer) -> Result<StrongroomConfig, ConfigError> {
	let encryption = layer.encryption.unwrap_or_default().finalize();
	let key_service = layer.key_service.unwrap_or_default().finalize()?;
	let storage = layer.storage.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&encryption, &key_service)?;

	info!(
		key_id = %encryption.key_id,
		algorithm = %encryption.algorithm,
		key_service = %key_service.provider,
		storage = %storage.provider,
		root_directory = %storage.root_directory.display(),
		"Strongroom configuration loaded"
	);

	Ok(StrongroomConfig {
		encryption,
		key_service,
		storage,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(
	encryption: &EncryptionConfig,
	key_service: &KeyServiceConfig,
) -> Result<(), ConfigError> {
	let registry = AlgorithmRegistry::standard();

	if encryption.key_id.is_empty() {
		return Err(ConfigError::Validation(
			"encryption.key_id must not be empty".to_string(),
		));
	}
	if !registry.contains(&encryption.algorithm) {
		return Err(ConfigError::InvalidValue {
			key: "encryption.algorithm".to_string(),
			message: format!(
				"'{}' is not one of: {}",
				encryption.algorithm,
				registry.names().collect::<Vec<_>>().join(", ")
			),
		});
	}
	if !registry.contains(&key_service.algorithm) {
		return Err(ConfigError::InvalidValue {
			key: "key_service.algorithm".to_string(),
			message: format!("'{}' is not a supported algorithm", key_service.algorithm),
		});
	}

	match key_service.provider {
		KeyServiceProvider::LocalSymmetric if key_service.secret_key.is_none() => {
			Err(ConfigError::MissingSecret {
				var: SECRET_KEY_ENV.to_string(),
			})
		}
		KeyServiceProvider::LocalSymmetric => Ok(()),
	}
}
