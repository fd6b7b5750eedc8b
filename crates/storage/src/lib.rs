// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! ne-storage: relational accessor for the edge configuration store.

mod db;
mod rows;
mod schema;

pub use db::{EdgeDB, EdgeDbError};
pub use rows::{AppRow, BlockRow, ConnRow, LinkParams, NewApp, PropColumn, TagMapRow};
pub use schema::SCHEMA_SQL;
