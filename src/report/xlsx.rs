use chrono::Local;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::llm::schema::RFP_SCHEMA;

use super::matrix::BidMatrix;
use super::title_case;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const MATRIX_HEADERS: [&str; 5] = ["Category", "Requirement", "Priority", "Status", "Notes"];
const MATRIX_LAST_COL: u16 = MATRIX_HEADERS.len() as u16 - 1;
// Report rows are merged across A:F
const REPORT_LAST_COL: u16 = 5;

fn title_format() -> Format {
    Format::new().set_bold().set_font_size(14).set_align(FormatAlign::Center)
}

fn banner_format() -> Format {
    Format::new().set_bold().set_background_color(0xD9E1F2)
}

/// Matrix workbook: title, header row, then each section as a banner
/// followed by its items.
pub fn matrix_workbook(matrix: &BidMatrix, doc_id: &str) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let banner = banner_format();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Bid Matrix")?;
    sheet.merge_range(0, 0, 0, MATRIX_LAST_COL, &format!("Bid Matrix: {}", doc_id), &title_format())?;

    for (col, header) in MATRIX_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(1, col as u16, *header, &bold)?;
    }

    let mut row = 2u32;
    for section in &matrix.sections {
        sheet.merge_range(row, 0, row, MATRIX_LAST_COL, &section.name, &banner)?;
        row += 1;

        for item in &section.items {
            let cells = [
                &item.category,
                &item.requirement,
                &item.priority,
                &item.status,
                &item.notes,
            ];
            for (col, value) in cells.iter().enumerate() {
                sheet.write_string(row, col as u16, value.as_str())?;
            }
            row += 1;
        }
    }

    sheet.set_column_width(1, 50)?;
    sheet.set_column_width(4, 45)?;

    workbook.save_to_buffer()
}

/// Report workbook over a client-supplied extraction tree.
pub fn report_workbook(rfp_data: &Value) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let banner = banner_format();

    let sheet = workbook.add_worksheet();
    sheet.set_name("RFP Analysis Report")?;
    sheet.merge_range(0, 0, 0, REPORT_LAST_COL, "RFP Analysis Report", &title_format())?;
    let generated = format!("Generated on: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    sheet.merge_range(1, 0, 1, REPORT_LAST_COL, &generated, &Format::new())?;

    let mut row = 3u32;
    for (section, fields) in RFP_SCHEMA {
        sheet.merge_range(row, 0, row, REPORT_LAST_COL, &title_case(section), &banner)?;
        row += 1;

        if let Some(data) = rfp_data.get(*section).and_then(Value::as_object) {
            // Schema fields first in schema order, then anything extra
            let known = fields.iter().filter_map(|f| data.get(*f).map(|v| (*f, v)));
            let extra = data
                .iter()
                .filter(|(k, _)| !fields.contains(&k.as_str()))
                .map(|(k, v)| (k.as_str(), v));

            for (name, value) in known.chain(extra) {
                write_field(sheet, row, name, value)?;
                row += 1;
            }
        }
        row += 1;
    }

    sheet.set_column_width(0, 35)?;
    sheet.set_column_width(1, 60)?;

    workbook.save_to_buffer()
}

fn write_field(sheet: &mut Worksheet, row: u32, name: &str, value: &Value) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, title_case(name))?;

    match value.as_object().filter(|o| o.contains_key("value")) {
        Some(field) => {
            let text = field.get("value").map(scalar_text).unwrap_or_default();
            sheet.write_string(row, 1, text)?;
            if let Some(confidence) = field.get("confidence").and_then(Value::as_f64) {
                sheet.write_number(row, 2, confidence)?;
            }
            if let Some(interpreted) = field.get("is_interpreted").and_then(Value::as_bool) {
                sheet.write_string(row, 3, if interpreted { "Interpreted" } else { "Explicit" })?;
            }
        }
        None => {
            sheet.write_string(row, 1, scalar_text(value))?;
        }
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
