//! Synchronized list-view state for terminal front ends.
//!
//! Composite list state (paging, search, date window, sort, column
//! configuration) lives in a [`sync::SyncedState`] whose every change is
//! mirrored into a shareable address, batched so one user action lands as
//! one external write. Data arrives through [`data::DataSourceAdapter`]
//! from either a callback fetcher or a managed query integration;
//! selection is identity-keyed so it survives paging. The [`ui`] module
//! offers a table and a grid orchestrator over the same core, and
//! [`export`] turns any view into CSV and XLSX artifacts side by side.

pub mod api_client;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod sync;
pub mod ui;
pub mod utils;
