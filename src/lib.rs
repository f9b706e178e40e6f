//! cloud-builder - configuration store for a multi-cloud deployment manager.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/
//! │   ├── cloud/        # Provider, backend and recipe traits
//! │   │   ├── fields    # Named-field payloads
//! │   │   └── configs   # Field-set provider/backend/recipe
//! │   ├── cookbook      # Packaged recipes by name and IaaS
//! │   ├── target/       # Deployment targets
//! │   │   └── set       # Keyed target collection and decoder
//! │   ├── context/      # Aggregate root
//! │   │   ├── load      # Streaming schema-strict decode
//! │   │   └── save      # Fixed-order encode
//! │   ├── cipher/       # AES-256-GCM, Argon2id, envelope
//! │   ├── store/        # Encrypted file store, key cache
//! │   └── settings      # ~/.cb/settings.toml
//! ├── logging           # Tracing subscriber setup
//! └── error             # Error types
//! ```
//!
//! # Features
//!
//! - Polymorphic configuration decoded into registered instances in place
//! - Targets keyed by recipe, IaaS and recipe key values
//! - Passphrase-based authenticated encryption at rest
//! - Derived keys cached with a timeout, shareable between processes

pub mod core;
pub mod error;
pub mod logging;

pub use crate::core::context::Context;
pub use crate::core::cookbook::Cookbook;
pub use crate::core::settings::Settings;
pub use crate::core::store::{FileStore, PassphraseSource, Prompt};
pub use crate::core::target::{Target, TargetFactory, TargetSet};
pub use crate::error::{Error, Result};
