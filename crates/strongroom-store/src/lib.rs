// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Encrypted, access-controlled store of secret files and the users allowed
//! to read them.
//!
//! Each item is persisted as two envelopes: the main payload (file content,
//! or a user's certificate fingerprint) with its metadata embedded as
//! associated data, and the item's authorization groups bound to its id.
//! [`SecretIndex`] loads everything at startup, refuses to start if any item
//! fails to decrypt, and mediates every read and write afterwards.
//!
//! # Example
//!
//! ```ignore
//! let index = SecretIndex::load(sealer, Arc::new(FsStorage::new("/var/lib/strongroom"))).await?;
//! index.add_file(NewFile::new("secret.txt", "hello").groups(parse_groups(["ops"])?)).await?;
//!
//! let user = index.get_user_for_cert(&cert).ok_or(Forbidden)?;
//! if let Some(node) = index.user_get_file(Some(&*user), "/secret.txt") {
//!     let content = index.read_file(&node).await?;
//! }
//! ```

pub mod cert;
pub mod error;
pub mod file;
pub mod groups;
pub mod index;
pub mod item;
pub mod node;
pub mod sealer;
pub mod storage;
pub mod user;
pub mod validate;

pub use cert::CertificateInfo;
pub use error::{StoreError, StoreResult};
pub use file::{FileMetadata, NewFile, SecretFile};
pub use groups::{parse_groups, GroupSet};
pub use index::SecretIndex;
pub use item::{ItemKind, SecretItem};
pub use node::{FileNode, VirtualRoot};
pub use sealer::ItemSealer;
pub use storage::{FsStorage, MemoryStorage, StorageBackend, StoredItem, StoredRecords};
pub use user::{NewUser, Role, SecretUser, UserProfile, UserUpdate};
