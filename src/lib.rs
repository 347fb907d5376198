//! wfm - workforce task assignment library
//!
//! Core of the `wfm` CLI: tasks attached to reference entities (orders,
//! shipments, ...), each with an append-only activity log, plus the flows
//! that create, update, reassign and query them.
//!
//! # Module Organization
//!
//! - `task`: task and activity records
//! - `reference`: reference type to task type table
//! - `service`: business operations over a task store
//! - `store`: `TaskStore` trait with in-memory and file-backed stores
//! - `clock`: injectable time source and day boundaries
//! - `config`: configuration loading from `.wfm.toml`
//! - `storage`: on-disk layout and atomic writes
//! - `lock`: file locking for snapshot writes
//! - `output`, `events`: CLI output envelopes and JSONL events
//! - `cli`: command-line interface using clap
//! - `error`: error types and result alias

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod output;
pub mod reference;
pub mod service;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
pub use service::TaskService;
