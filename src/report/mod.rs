pub mod matrix;
pub mod xlsx;

pub use matrix::{BidMatrix, MatrixItem, MatrixSection};
pub use xlsx::{matrix_workbook, report_workbook, XLSX_CONTENT_TYPE};

/// "key_dates" -> "Key Dates", "introduction/background" -> "Introduction/Background".
pub fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut word_start = true;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("key_dates"), "Key Dates");
        assert_eq!(title_case("introduction/background"), "Introduction/Background");
        assert_eq!(title_case("rfp_number"), "Rfp Number");
    }
}
