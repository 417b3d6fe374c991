//! Core domain model for soundseek.
//!
//! This crate defines the sample and feature-record types shared by the
//! fetch, extract and search layers, together with the SQLite catalog
//! that records what has been fetched and analysed.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};
