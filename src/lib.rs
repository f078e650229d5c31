//! minirel - a minimal in-memory relational engine
//!
//! This crate provides an embeddable single-process data engine with:
//! - typed columns with NOT NULL enforcement
//! - primary-key / UNIQUE constraints backed by hash indexes
//! - execution of parsed SELECT, INSERT, UPDATE and DELETE statements,
//!   including two-table equality joins
//!
//! SQL text parsing is an external collaborator: the engine consumes the
//! statement tree defined in [`sql::ast`] and never sees SQL source. There is
//! no durability and no locking; a single caller owns the
//! [`sql::catalog::Catalog`] and drives everything synchronously.

pub mod error;
pub mod sql;
