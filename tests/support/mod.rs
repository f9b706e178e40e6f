//! Test support utilities for cloud-builder integration tests.
//!
//! Provides fixture contexts, document snapshots and isolated store setup.

#![allow(dead_code)]

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use cloud_builder::core::cipher::KdfParams;
use cloud_builder::{Context, FileStore};
use tempfile::TempDir;

/// Isolated directory holding one store file.
///
/// Each test gets its own temp dir, so tests can run in parallel.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Path of the store file.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    /// A store over `context` whose passphrase source counts its calls.
    pub fn store(&self, context: Context, passphrase: &'static str) -> (FileStore, Calls) {
        let calls = Calls::default();
        let counter = calls.clone();
        let store = FileStore::init(self.path(), context, move || {
            counter.0.set(counter.0.get() + 1);
            passphrase.to_string()
        })
        .expect("failed to init store")
        .with_kdf_params(fast_kdf());
        (store, calls)
    }
}

impl Default for Test {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of times a passphrase source was asked.
#[derive(Clone, Default)]
pub struct Calls(Rc<Cell<usize>>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.get()
    }
}

/// Cheap Argon2id parameters so tests don't spend seconds deriving keys.
pub fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

/// The saved document with targets in a stable order.
pub fn snapshot(ctx: &Context) -> serde_json::Value {
    let mut buf = Vec::new();
    ctx.save(&mut buf).expect("failed to save context");
    let mut doc: serde_json::Value = serde_json::from_slice(&buf).expect("saved invalid json");
    if let Some(targets) = doc["cloud"]["targets"].as_array_mut() {
        targets.sort_by_cached_key(|t| t.to_string());
    }
    doc
}
