//! shopsync - offline sync queue for the repair-shop console
//!
//! Records diagnostics, device records, backups, and reports while the
//! console is offline and replays them against the shop API, in priority
//! order with bounded retries, once connectivity returns.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::ShopsyncError;
pub use sync::SyncService;
