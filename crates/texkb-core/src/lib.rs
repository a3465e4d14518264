//! # texkb core
//!
//! Filesystem-free logic for texkb: the knowledge item model, chart
//! classification, raw record structuring, the immutable knowledge base
//! aggregate, and the query engine over it.
//!
//! Nothing in this crate reads files, binds sockets or spawns tasks. The
//! `texkb` application crate feeds it raw records and serves its results.

pub mod classify;
pub mod knowledge;
pub mod models;
pub mod query;
pub mod structure;
