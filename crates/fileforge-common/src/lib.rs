//! Fileforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across fileforge:
//!
//! - **Core Types**: File categories, normalized format tags, and file snapshots
//! - **Path Utilities**: Extension tables for each category
//! - **Signatures**: Magic-byte sniffing for the formats fileforge handles
//! - **Classification**: The single authority deciding a file's category
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use fileforge_common::{classify_path, FileCategory};
//! use std::path::Path;
//!
//! let (category, format) = classify_path(Path::new("holiday.JPEG"));
//! assert_eq!(category, FileCategory::Image);
//! assert_eq!(format.as_str(), "jpg");
//! ```

pub mod classify;
pub mod error;
pub mod paths;
pub mod signature;
pub mod types;

pub use classify::{classify, classify_path};
pub use error::{Error, Result};
pub use types::*;
