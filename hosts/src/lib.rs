//! Local host implementations for fleet-bench
//!
//! This crate provides implementations of the core collaborator traits that
//! treat directories on the local machine as hosts:
//!
//! - `LocalExecutor`: runs commands as child processes
//! - `LocalSession`: one simulated host rooted at a directory
//! - `LocalTransfer`: copies staged files into a host root
//! - `LocalFleet`: launches one participant per task concurrency slot

#![warn(missing_docs)]
#![warn(clippy::all)]

mod executor;
mod fleet;
mod session;
mod transfer;

pub use executor::{LocalExecutor, HOST_ENV};
pub use fleet::{LocalFleet, PARTICIPANT_ENV};
pub use session::{resolve_remote, LocalSession};
pub use transfer::{LocalChannel, LocalTransfer};
