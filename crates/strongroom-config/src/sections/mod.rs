// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for strongroom.

pub mod encryption;
pub mod key_service;
pub mod logging;
pub mod storage;

pub use encryption::{EncryptionConfig, EncryptionConfigLayer};
pub use key_service::{KeyServiceConfig, KeyServiceConfigLayer, KeyServiceProvider};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use storage::{StorageConfig, StorageConfigLayer, StorageProvider};
