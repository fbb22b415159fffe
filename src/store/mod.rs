//! Transactional data store
//!
//! - `database`: shared tables, id sequences, per-stock locks
//! - `unit_of_work`: staged all-or-nothing transaction over the tables

pub mod database;
pub mod unit_of_work;

pub use database::{Database, IdempotencyRecord};
pub use unit_of_work::UnitOfWork;
