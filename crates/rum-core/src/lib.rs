//! rum-core - Core library for rum-sync
//!
//! This crate keeps a local store of group content coherent with a remote
//! node: it polls the node for content deltas, merges them into `SQLite`
//! tables with derived counters, serves cached reads and submits local
//! activities optimistically. Front ends (the `rum` CLI today) drive it
//! through [`sync::SyncEngine`], [`sync::Submitter`] and
//! [`services::StoreService`].

pub mod cache;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod node;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Post, TrxId};
