//! Workbook -> sections (import direction)

use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use geosect_common::{NewGeologicalClass, NewSection};

use super::CodecError;

/// Decode every data row of the first worksheet into a section
///
/// All-or-nothing: the first malformed row aborts the whole decode, so a
/// caller never holds a partial result.
pub fn decode_sections(bytes: &[u8]) -> Result<Vec<NewSection>, CodecError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(CodecError::NoWorksheet)??;

    decode_range(&range)
}

fn decode_range(range: &Range<Data>) -> Result<Vec<NewSection>, CodecError> {
    let (start, end) = match (range.start(), range.end()) {
        (Some(start), Some(end)) => (start, end),
        // Blank sheet
        _ => return Ok(Vec::new()),
    };

    let mut sections = Vec::new();
    // Absolute row 0 is the header
    for row in start.0.max(1)..=end.0 {
        let cells = (0..=end.1)
            .map(|col| cell_text(range.get_value((row, col)), row, col))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(section) = decode_row(&cells, row)? {
            sections.push(section);
        }
    }

    Ok(sections)
}

/// One row of cell texts -> section; `None` for a fully empty row
fn decode_row(cells: &[Option<String>], row: u32) -> Result<Option<NewSection>, CodecError> {
    let Some(last) = cells.iter().rposition(Option::is_some) else {
        return Ok(None);
    };

    let name = cells[0]
        .clone()
        .ok_or(CodecError::MissingSectionName { row: row + 1 })?;

    // Class columns are 1..=last; they must come in complete pairs
    let mut classes = Vec::with_capacity(last / 2);
    let mut col = 1;
    while col <= last {
        let class_name = cells[col].clone();
        let class_code = cells.get(col + 1).cloned().flatten();
        match (class_name, class_code) {
            (Some(name), Some(code)) => classes.push(NewGeologicalClass { name, code }),
            _ => {
                return Err(CodecError::IncompleteClassPair {
                    row: row + 1,
                    column: col as u32 + 1,
                })
            }
        }
        col += 2;
    }

    Ok(Some(NewSection {
        name,
        geological_classes: classes,
    }))
}

/// Text of a cell; `None` when empty
///
/// Numbers and booleans are accepted and rendered as text, so a code typed
/// as `12` in a spreadsheet survives as "12".
fn cell_text(cell: Option<&Data>, row: u32, col: u32) -> Result<Option<String>, CodecError> {
    let text = match cell {
        None | Some(Data::Empty) => return Ok(None),
        Some(Data::String(s)) => s.clone(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) => format_float(*f),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::Error(e)) => {
            return Err(CodecError::InvalidCell {
                row: row + 1,
                column: col + 1,
                reason: format!("cell contains an error value ({:?})", e),
            })
        }
        Some(other) => other.to_string(),
    };

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
