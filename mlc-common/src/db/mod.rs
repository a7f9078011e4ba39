//! Run ledger database

pub mod init;

pub use init::init_database;
