//! Core types shared across PhoenixDB crates
//!
//! This crate holds the vocabulary of the instant-recovery engine: the
//! error type, byte-string key/value aliases, durability modes, and the
//! typed configuration loaded at startup. It has no I/O machinery of its
//! own beyond reading the config file.

mod config;
mod error;
mod types;

pub use config::{Config, IndexerStart, LogStructure};
pub use error::{Error, Result};
pub use types::{Key, SyncMode, Value, WalOffset};
