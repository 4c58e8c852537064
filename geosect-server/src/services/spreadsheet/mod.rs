//! Spreadsheet codec: xlsx workbook <-> section records
//!
//! Fixed layout, one sheet:
//!
//! | col 0        | col 1        | col 2        | col 3        | ... |
//! |--------------|--------------|--------------|--------------|-----|
//! | Section name | Class 1 name | Class 1 code | Class 2 name | ... |
//!
//! Row 0 is a header. Each later row is one section followed by its classes
//! as (name, code) pairs. Rows are ragged: a section with fewer classes simply
//! ends earlier.
//!
//! Both directions are pure and synchronous; callers on the async runtime run
//! them through `spawn_blocking`.

mod decode;
mod encode;

pub use decode::decode_sections;
pub use encode::{encode_sections, header_labels};

use thiserror::Error;

/// Worksheet name written on export
pub const SHEET_NAME: &str = "Sections";

/// Label of the first header column
pub const SECTION_NAME_HEADER: &str = "Section name";

/// Codec failures. Row and column numbers are 1-based, as a spreadsheet shows them.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unreadable workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),

    #[error("Workbook contains no worksheet")]
    NoWorksheet,

    #[error("Row {row}: section name is missing")]
    MissingSectionName { row: u32 },

    #[error("Row {row}: geological class pair starting at column {column} is incomplete")]
    IncompleteClassPair { row: u32, column: u32 },

    #[error("Row {row}, column {column}: {reason}")]
    InvalidCell { row: u32, column: u32, reason: String },

    #[error("Section '{name}' has {classes} classes, more than a worksheet row can hold")]
    TooManyClasses { name: String, classes: usize },

    #[error("Spreadsheet writer failed: {0}")]
    Writer(#[from] rust_xlsxwriter::XlsxError),
}
