// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Record encryption for strongroom.
//!
//! Two layers:
//!
//! - [`codec`]: a versioned, self-describing AES-GCM record carrying its key
//!   id, algorithm, IV, tag and optionally its associated data.
//! - [`envelope`]: per-item data keys from a [`KeyService`], with the wrapped
//!   key framed in front of the codec record.
//!
//! # Example
//!
//! ```ignore
//! let codec = Codec::new(Arc::new(AlgorithmRegistry::standard()));
//! let keys = LocalKeyService::new(codec.clone(), "default", "aes-256-gcm", master_key)?;
//! let aad = AssociatedData::new().with("id", "secret.txt");
//! let blob = envelope::encrypt(&codec, &keys, "default", "aes-256-gcm", b"hello", &aad, true).await?;
//! let opened = envelope::decrypt(&codec, &keys, &blob, None).await?;
//! ```

pub mod aad;
pub mod algorithm;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod key_service;

pub use aad::AssociatedData;
pub use algorithm::{Algorithm, AlgorithmRegistry};
pub use codec::{Codec, Decoded};
pub use envelope::Opened;
pub use error::{CryptoError, CryptoResult};
pub use key_service::{generate_secret_key, DataKey, KeyService, LocalKeyService, SecretKeyEncoding};
