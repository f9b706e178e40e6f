//! Core library components.
//!
//! This module contains the configuration model, its document encoding, and
//! the encrypted store it is persisted through.

pub mod cipher;
pub mod cloud;
pub mod constants;
pub mod context;
pub mod cookbook;
pub mod settings;
pub mod store;
pub mod target;
pub mod types;
