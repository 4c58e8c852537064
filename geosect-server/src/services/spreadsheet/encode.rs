//! Sections -> workbook (export direction)

use geosect_common::Section;
use rust_xlsxwriter::Workbook;

use super::{CodecError, SECTION_NAME_HEADER, SHEET_NAME};

/// Excel's column limit (XFD)
const MAX_COLUMNS: usize = 16_384;

/// Header row for `class_count` class pairs
///
/// The width follows the widest section so every data column has a label.
pub fn header_labels(class_count: usize) -> Vec<String> {
    let mut labels = Vec::with_capacity(1 + class_count * 2);
    labels.push(SECTION_NAME_HEADER.to_string());
    for n in 1..=class_count {
        labels.push(format!("Class {} name", n));
        labels.push(format!("Class {} code", n));
    }
    labels
}

/// Encode sections, in the given order, into xlsx bytes
pub fn encode_sections(sections: &[Section]) -> Result<Vec<u8>, CodecError> {
    if let Some(section) = sections
        .iter()
        .find(|s| 1 + s.geological_classes.len() * 2 > MAX_COLUMNS)
    {
        return Err(CodecError::TooManyClasses {
            name: section.name.clone(),
            classes: section.geological_classes.len(),
        });
    }

    let width = sections
        .iter()
        .map(|s| s.geological_classes.len())
        .max()
        .unwrap_or(0);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, label) in header_labels(width).into_iter().enumerate() {
        sheet.write_string(0, col as u16, label)?;
    }

    for (index, section) in sections.iter().enumerate() {
        let row = (index + 1) as u32;
        sheet.write_string(row, 0, &section.name)?;

        let mut col: u16 = 1;
        for class in &section.geological_classes {
            sheet.write_string(row, col, &class.name)?;
            sheet.write_string(row, col + 1, &class.code)?;
            col += 2;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
