//! # texkb
//!
//! Extracts LaTeX package manuals into a normalized knowledge base and serves
//! it through a filterable, paginated query interface.
//!
//! Each source collection (one manual directory) is read by a dialect
//! specific [`extract::PatternExtractor`] into loosely typed raw records. The
//! structurer in `texkb-core` turns those into canonical knowledge items,
//! which are aggregated into an immutable knowledge base and queried through
//! the CLI, a REST API, a tool-dispatch façade and an MCP endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Manuals    │──▶│  Extractors  │──▶│  Structurer  │──▶│ KnowledgeBase│
//! │ <name>-manual│   │ per dialect  │   │  raw → item  │   │  + indices   │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                                                 │
//!                                   ┌─────────────────────────────┤
//!                                   ▼                             ▼
//!                              ┌──────────┐                ┌─────────────┐
//!                              │   CLI    │                │ HTTP + MCP  │
//!                              │ (texkb)  │                │   (axum)    │
//!                              └──────────┘                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Extractor trait and shared scanning helpers |
//! | `dialect_*` | One extractor per manual dialect |
//! | [`registry`] | Dialect name → extractor lookup |
//! | [`collect`] | Collection discovery and the extraction driver |
//! | [`pipeline`] | Full build and batch JSON artifacts |
//! | [`snapshot`] | Current knowledge base, swapped on rebuild |
//! | [`tools`] | Name-dispatched tool façade |
//! | [`server`] | REST routes, tool dispatch and MCP over HTTP |
//! | [`progress`] | Build progress on stderr |

pub mod collect;
pub mod config;
pub mod dialect_chemfig;
pub mod dialect_circuitikz;
pub mod dialect_generic;
pub mod dialect_standard;
pub mod dialect_tikz_network;
pub mod dialect_tkz_euclide;
pub mod extract;
pub mod mcp;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod sources;
pub mod stats;
pub mod tools;

pub use texkb_core::{classify, knowledge, models, query, structure};
