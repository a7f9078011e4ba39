//! Run ledger operations

pub mod runs;

pub use runs::{record_run, RunRow, RunStatus};
