// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! All durable state lives in a single embedded redb database (see
//! [`db::PaymentDb`] for the table layout). Every mutation commits before
//! the triggering operation reports success, so a crash between decide and
//! flush can only lose un-acknowledged work; on restart the poller and the
//! pending-transfer table let the system re-derive where it was.

pub mod balance_cache;
pub mod db;

pub use balance_cache::BalanceCache;
pub use db::{PaymentDb, StoreError, StoreResult};
