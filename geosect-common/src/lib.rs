//! # Geosect Common Library
//!
//! Shared code for the geological sections service:
//! - Domain models (sections, geological classes, job records)
//! - Bootstrap configuration and root folder resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{GeologicalClass, JobKind, JobState, JobStatus, NewGeologicalClass, NewSection, Section};
