//! PyrHouse client library
//!
//! This crate provides the transfer composition core of the PyrHouse
//! inventory and logistics client: resolving item codes and stock lines row
//! by row, aggregating a draft into a submission, and the confirm-then-submit
//! workflow against the PyrHouse REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod transfers;

pub use catalog::{CatalogApi, HttpCatalogClient};
pub use config::{ClientConfig, ClientConfigError};
pub use errors::{DraftError, ErrorCategory, RowError, ServiceError, SubmissionError};
