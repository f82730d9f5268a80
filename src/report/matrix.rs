use serde::Serialize;

use crate::llm::schema::ExtractionResult;

use super::title_case;

pub const NOT_SPECIFIED: &str = "Not specified";
const TO_REVIEW: &str = "To Review";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixItem {
    pub category: String,
    pub requirement: String,
    pub priority: String,
    pub status: String,
    pub notes: String,
}

impl MatrixItem {
    fn new(category: &str, requirement: String, priority: &str, notes: &str) -> Self {
        Self {
            category: category.to_string(),
            requirement,
            priority: priority.to_string(),
            status: TO_REVIEW.to_string(),
            notes: notes.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixSection {
    pub name: String,
    pub items: Vec<MatrixItem>,
}

/// Bid/no-bid review sheet derived from an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidMatrix {
    pub sections: Vec<MatrixSection>,
}

impl BidMatrix {
    pub fn from_result(result: &ExtractionResult) -> Self {
        let overview = vec![
            MatrixItem::new(
                "Budget",
                value_or_default(result, "commercials", "budget"),
                "High",
                "Compare with past successful bids in this range",
            ),
            MatrixItem::new(
                "Deadline",
                value_or_default(result, "key_dates", "submission_deadline"),
                "High",
                "Assess resource availability for timeline",
            ),
        ];

        let technical = filled_fields(result, "requirements")
            .map(|req| {
                MatrixItem::new(
                    "Requirement",
                    req,
                    "Medium",
                    "Evaluate against technical capabilities",
                )
            })
            .collect();

        let skills = filled_fields(result, "work_portfolio")
            .map(|skill| {
                MatrixItem::new("Skill", skill, "High", "Check team availability and expertise")
            })
            .collect();

        Self {
            sections: vec![
                MatrixSection {
                    name: "Project Overview".to_string(),
                    items: overview,
                },
                MatrixSection {
                    name: "Technical Requirements".to_string(),
                    items: technical,
                },
                MatrixSection {
                    name: "Required Skills".to_string(),
                    items: skills,
                },
            ],
        }
    }
}

fn value_or_default(result: &ExtractionResult, section: &str, field: &str) -> String {
    result
        .get(section, field)
        .map(|f| f.value.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
        .to_string()
}

// "Field Name: value" for every non-empty field of a section
fn filled_fields<'a>(
    result: &'a ExtractionResult,
    section: &'a str,
) -> impl Iterator<Item = String> + 'a {
    result
        .fields(section)
        .filter(|(_, f)| !f.value.trim().is_empty())
        .map(|(name, f)| format!("{}: {}", title_case(name), f.value.trim()))
}
