//! redlite - a small RESP key-value server
//!
//! This library provides:
//! - An in-memory string store with lazy millisecond TTLs
//! - PING, ECHO, SET [PX], GET, CONFIG GET and KEYS over RESP
//! - KEYS answered from the keys of an on-disk RDB snapshot
//! - An async client

pub mod client;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pattern;
pub mod protocol;
pub mod server;
pub mod snapshot;
pub mod store;

pub use client::Client;
pub use command::Command;
pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{RedliteError, Result};
pub use protocol::Frame;
pub use server::{RedliteServer, ServerConfig};
pub use snapshot::SnapshotScanner;
pub use store::{MemoryStore, Store};
