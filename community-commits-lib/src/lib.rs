#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for community-commits
//!
//! This library discovers forks of tracked repositories, periodically re-crawls
//! them, and aggregates the push activity that happened on those forks into a
//! date-grouped view of community work not yet present in the mainline.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`schedule`]: Re-scan cadence to recurring trigger conversion
//! - [`queue`]: Persisted work queue with duplicate suppression
//! - [`source`]: Hosting platform clients and their registry
//! - [`store`]: Commit persistence
//! - [`worker`]: Crawl orchestration
//! - [`aggregate`]: Push event deduplication and grouping
//! - [`reports`]: Rendering of the aggregated view

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod aggregate;
pub mod commands;
pub mod config;
mod document;
mod path_utils;
pub mod queue;
pub mod reports;
pub mod schedule;
pub mod source;
pub mod store;
pub mod worker;

pub use crate::commands::{Host, run};
