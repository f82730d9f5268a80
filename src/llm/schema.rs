//! Fixed RFP extraction schema.
//!
//! The schema is plain data ([`RFP_SCHEMA`]); the prompt skeleton and the
//! validation of model replies are both derived from it, so adding a field
//! is a one-line change.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RfpError};

/// Sections and their fields, in output order.
pub const RFP_SCHEMA: &[(&str, &[&str])] = &[
    (
        "strategic_summary",
        &[
            "overview",
            "key_differentiators",
            "risks_and_challenges",
            "recommended_approach",
            "resource_needs",
            "competitive_landscape",
        ],
    ),
    ("introduction/background", &["introduction", "background"]),
    (
        "bid_summary",
        &[
            "client_name",
            "rfp_number",
            "services_required",
            "client_contact",
            "email",
            "incumbent",
        ],
    ),
    (
        "key_dates",
        &[
            "start_date",
            "submission_deadline",
            "clarifications_deadline",
            "issuance_of_response_to_bidder_questions",
            "instruction_to_clarification_question",
            "fully_executed_agreement",
            "site_visit_date",
            "contract_award_date",
            "method_of_submission",
            "submission_instructions",
        ],
    ),
    (
        "work_portfolio",
        &[
            "experience",
            "case_studies",
            "case_studies_specifications",
            "integration_requirements",
            "other_requirements",
            "references",
        ],
    ),
    (
        "requirements",
        &[
            "confidentiality",
            "compliances",
            "security",
            "foreign_workers_limitations",
            "notary",
            "on_site_requirements",
            "resumes_required",
            "registration_requirements",
            "contract_length",
            "other_requirements",
        ],
    ),
    ("submission_details", &["method", "instructions"]),
    ("checklist", &["insurances", "resumes", "business_registrations"]),
    ("commercials", &["budget", "contract_length", "price_quality_ratio"]),
    ("website_details", &["web_address", "current_cms", "preferred_cms"]),
    (
        "flags",
        &[
            "workload_summary",
            "total_wordcount",
            "targets_provided",
            "design_required",
            "media_plan",
            "pricing_summary",
            "notes",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    pub confidence: f64,
    pub is_interpreted: bool,
}

impl FieldValue {
    pub fn absent() -> Self {
        Self {
            value: String::new(),
            confidence: 0.0,
            is_interpreted: false,
        }
    }

    pub fn explicit(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: value.into(),
            confidence,
            is_interpreted: false,
        }
    }

    pub fn interpreted(value: impl Into<String>, confidence: f64) -> Self {
        Self {
            value: value.into(),
            confidence,
            is_interpreted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Section {
    name: &'static str,
    fields: Vec<(&'static str, FieldValue)>,
}

/// Sections -> fields -> [`FieldValue`]. Either covers the whole schema or is
/// empty; there is no partial state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionResult {
    sections: Vec<Section>,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every schema field present with an absent value.
    pub fn blank() -> Self {
        Self {
            sections: RFP_SCHEMA
                .iter()
                .map(|&(name, fields)| Section {
                    name,
                    fields: fields.iter().map(|f| (*f, FieldValue::absent())).collect(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, section: &str, field: &str) -> Option<&FieldValue> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    /// Replaces a field. Returns false when the field is not in the schema
    /// or the result is empty.
    pub fn set(&mut self, section: &str, field: &str, value: FieldValue) -> bool {
        let slot = self
            .sections
            .iter_mut()
            .find(|s| s.name == section)
            .and_then(|s| s.fields.iter_mut().find(|(name, _)| *name == field));
        match slot {
            Some((_, existing)) => {
                *existing = value;
                true
            }
            None => false,
        }
    }

    /// Fields of one section in schema order.
    pub fn fields<'a>(
        &'a self,
        section: &'a str,
    ) -> impl Iterator<Item = (&'static str, &'a FieldValue)> + 'a {
        self.sections
            .iter()
            .filter(move |s| s.name == section)
            .flat_map(|s| s.fields.iter().map(|(name, value)| (*name, value)))
    }

    /// Validates a parsed reply against the schema. Unknown keys are dropped.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let root = value.as_object().ok_or("top level is not an object")?;

        let mut sections = Vec::with_capacity(RFP_SCHEMA.len());
        for &(name, field_names) in RFP_SCHEMA {
            let section = root
                .get(name)
                .and_then(Value::as_object)
                .ok_or_else(|| format!("section '{}' is missing", name))?;

            let mut fields = Vec::with_capacity(field_names.len());
            for field in field_names.iter() {
                let raw = section
                    .get(*field)
                    .ok_or_else(|| format!("field '{}.{}' is missing", name, field))?;
                fields.push((*field, parse_field(raw).map_err(|e| format!("{}.{}: {}", name, field, e))?));
            }
            sections.push(Section { name, fields });
        }

        Ok(Self { sections })
    }
}

fn parse_field(raw: &Value) -> std::result::Result<FieldValue, String> {
    let field = raw.as_object().ok_or("not an object")?;

    let value = field
        .get("value")
        .and_then(Value::as_str)
        .ok_or("value is not a string")?;
    let confidence = field
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or("confidence is not a number")?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {} is outside [0, 1]", confidence));
    }
    let is_interpreted = field
        .get("is_interpreted")
        .and_then(Value::as_bool)
        .ok_or("is_interpreted is not a boolean")?;

    Ok(FieldValue {
        value: value.to_string(),
        confidence,
        is_interpreted,
    })
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(section.name, &Fields(&section.fields))?;
        }
        map.end()
    }
}

struct Fields<'a>(&'a [(&'static str, FieldValue)]);

impl Serialize for Fields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

const ANALYST_PREAMBLE: &str = "\
System: You are an expert RFP analyzer. Extract information from the RFP and return it ONLY as a valid JSON object. Do not include any additional text.
First, analyze the entire document and provide a strategic summary that includes:
- The core opportunity and its strategic value
- Key differentiators needed to win
- Major risks or challenges to consider
- Recommended approach or win themes
- Resource implications
- Any competitive insights

For the introduction and background sections:
- Look for any opening paragraphs that describe the project overview
- Identify any background context about the organization
- Include historical information or previous related projects
- Capture the overall purpose and goals";

const FIELD_RULES: &str = "\
For each field:
1. Set \"value\" to the extracted information from the RFP
2. Set \"confidence\" to a value between 0.0 and 1.0 indicating your confidence in the extraction
3. Set \"is_interpreted\" to true if you had to interpret or infer the information rather than directly extract it

If information is explicitly stated in the RFP, set confidence high (0.8-1.0) and is_interpreted to false.
If information is implied but not explicitly stated, provide your best interpretation, set confidence lower (0.4-0.7), and set is_interpreted to true.
If you're making an educated guess based on context, set confidence even lower (0.1-0.3) and set is_interpreted to true.
If information is completely absent, leave value as empty string, set confidence to 0.0, and is_interpreted to false.

For example:
- If the RFP clearly states \"Budget: $500,000\", set {\"value\": \"$500,000\", \"confidence\": 1.0, \"is_interpreted\": false}
- If the RFP mentions \"work must be completed within 12 months\" but doesn't explicitly state contract length, set {\"value\": \"12 months\", \"confidence\": 0.6, \"is_interpreted\": true}
- If there's no mention of the incumbent, leave as {\"value\": \"\", \"confidence\": 0.0, \"is_interpreted\": false}";

/// The JSON skeleton the model is asked to fill in.
pub fn schema_skeleton() -> String {
    serde_json::to_string_pretty(&ExtractionResult::blank()).unwrap_or_else(|_| "{}".to_string())
}

/// Builds the extraction prompt around the retrieved passages.
pub fn render_prompt<S: AsRef<str>>(documents: &[S], query: &str) -> String {
    let mut prompt = String::with_capacity(8 * 1024);
    prompt.push_str(ANALYST_PREAMBLE);
    prompt.push_str("\n\nDocuments:\n");
    for doc in documents {
        prompt.push_str(doc.as_ref());
        prompt.push('\n');
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(query);
    prompt.push_str("\n\nReturn a JSON object with exactly this structure:\n\n");
    prompt.push_str(&schema_skeleton());
    prompt.push_str("\n\n");
    prompt.push_str(FIELD_RULES);
    prompt
}

pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parses a model reply into a complete [`ExtractionResult`].
pub fn parse_model_reply(raw: &str) -> Result<ExtractionResult> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| RfpError::MalformedModelOutput(format!("invalid JSON: {}", e)))?;
    ExtractionResult::from_value(&value).map_err(RfpError::MalformedModelOutput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_reply() -> Value {
        serde_json::to_value(ExtractionResult::blank()).unwrap()
    }

    #[test]
    fn test_schema_has_all_sections() {
        let names: Vec<&str> = RFP_SCHEMA.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "strategic_summary",
                "introduction/background",
                "bid_summary",
                "key_dates",
                "work_portfolio",
                "requirements",
                "submission_details",
                "checklist",
                "commercials",
                "website_details",
                "flags",
            ]
        );
    }

    #[test]
    fn test_empty_result_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&ExtractionResult::empty()).unwrap(), "{}");
    }

    #[test]
    fn test_blank_result_keeps_schema_order() {
        let json = serde_json::to_string(&ExtractionResult::blank()).unwrap();
        let strategic = json.find("strategic_summary").unwrap();
        let flags = json.find("\"flags\"").unwrap();
        assert!(strategic < flags);
        assert!(json.contains("\"submission_deadline\":{\"value\":\"\",\"confidence\":0.0,\"is_interpreted\":false}"));
    }

    #[test]
    fn test_prompt_lists_every_field_and_document() {
        let prompt = render_prompt(&["Budget: $500,000.", "Submission deadline: March 1."], "Extract it.");
        for (section, fields) in RFP_SCHEMA {
            assert!(prompt.contains(&format!("\"{}\"", section)));
            for field in fields.iter() {
                assert!(prompt.contains(&format!("\"{}\"", field)), "missing {}", field);
            }
        }
        assert!(prompt.contains("Budget: $500,000."));
        assert!(prompt.contains("Question: Extract it."));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = parse_model_reply("not json").unwrap_err();
        assert!(matches!(err, RfpError::MalformedModelOutput(_)));
    }

    #[test]
    fn test_fenced_full_reply_parses() {
        let mut reply = full_reply();
        reply["commercials"]["budget"] = json!({"value": "$500,000", "confidence": 1, "is_interpreted": false});
        reply["extra_section"] = json!({"ignored": true});
        let raw = format!("```json\n{}\n```", reply);

        let result = parse_model_reply(&raw).unwrap();
        let budget = result.get("commercials", "budget").unwrap();
        assert_eq!(budget.value, "$500,000");
        assert_eq!(budget.confidence, 1.0);
        assert!(!budget.is_interpreted);
        assert!(!serde_json::to_string(&result).unwrap().contains("extra_section"));
    }

    #[test]
    fn test_partial_trees_are_rejected() {
        let mut reply = full_reply();
        reply.as_object_mut().unwrap().remove("flags");
        assert!(parse_model_reply(&reply.to_string()).is_err());

        let mut reply = full_reply();
        reply["key_dates"]["submission_deadline"]["confidence"] = json!("high");
        assert!(parse_model_reply(&reply.to_string()).is_err());

        let mut reply = full_reply();
        reply["key_dates"]["submission_deadline"]["confidence"] = json!(1.5);
        assert!(parse_model_reply(&reply.to_string()).is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut result = ExtractionResult::blank();
        assert!(result.set("key_dates", "submission_deadline", FieldValue::explicit("March 1", 0.9)));
        assert!(!result.set("key_dates", "not_a_field", FieldValue::absent()));
        assert_eq!(result.get("key_dates", "submission_deadline").unwrap().value, "March 1");
        assert_eq!(result.fields("commercials").count(), 3);

        let mut empty = ExtractionResult::empty();
        assert!(!empty.set("commercials", "budget", FieldValue::absent()));
    }
}
