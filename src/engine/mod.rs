//! Timed quiz attempt engine.
//!
//! A [`SessionManager`] owns live sessions. Each session has an
//! [`AnswerLedger`](ledger::AnswerLedger) of write-once answers, an absolute
//! deadline read through a [`Clock`], and a watcher task that finalizes it
//! when the deadline passes. Finalized attempts go to a
//! [`ResultStore`](crate::store::ResultStore).

pub mod clock;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod scoring;
mod session;
pub mod sweeper;
mod watcher;

pub use clock::{Clock, MonotonicClock};
pub use error::{EngineError, ErrorKind};
pub use manager::{SessionManager, SweepReport};
pub use watcher::RetryPolicy;

#[cfg(test)]
mod tests;
