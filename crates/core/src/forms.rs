//! Form catalogue.
//!
//! Each long-form editor edits one document type. A [`FormSchema`] lists the fields the
//! editor knows about, what kind of value each holds, and how a draft is turned into the
//! payload the backend expects. The field lists cover the fields the autosave path depends
//! on; rendering concerns (sections, labels, option lists) belong to the editors.

use crate::precondition::Precondition;
use crate::DraftState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

/// The document types edited through an autosave session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    CaseHistory,
    MentalStatusExam,
    PlanOfAssessment,
    Questionnaire,
}

impl FormKind {
    pub const ALL: [FormKind; 4] = [
        FormKind::CaseHistory,
        FormKind::MentalStatusExam,
        FormKind::PlanOfAssessment,
        FormKind::Questionnaire,
    ];

    pub fn schema(self) -> FormSchema {
        let fields = match self {
            FormKind::CaseHistory => CASE_HISTORY_FIELDS,
            FormKind::MentalStatusExam => MENTAL_STATUS_FIELDS,
            FormKind::PlanOfAssessment => PLAN_OF_ASSESSMENT_FIELDS,
            FormKind::Questionnaire => QUESTIONNAIRE_FIELDS,
        };
        FormSchema { kind: self, fields }
    }

    /// Directory name used by the file store, also the canonical textual form.
    pub fn dir_name(self) -> &'static str {
        match self {
            FormKind::CaseHistory => "case_history",
            FormKind::MentalStatusExam => "mental_status_exam",
            FormKind::PlanOfAssessment => "plan_of_assessment",
            FormKind::Questionnaire => "questionnaire",
        }
    }

    /// The rule each editor applies before creating a brand-new document.
    pub fn default_precondition(self) -> Precondition {
        match self {
            FormKind::CaseHistory => Precondition::field_non_empty("identification_name"),
            FormKind::MentalStatusExam => Precondition::any_field_non_empty(),
            FormKind::PlanOfAssessment => Precondition::any_field_non_empty(),
            FormKind::Questionnaire => Precondition::field_non_empty("name"),
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for FormKind {
    type Err = String;

    /// Accepts the snake_case name or its kebab-case spelling (`case-history`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace('-', "_");
        FormKind::ALL
            .into_iter()
            .find(|kind| kind.dir_name() == normalised)
            .ok_or_else(|| format!("unknown form: '{s}'"))
    }
}

/// What kind of value a field holds while it is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text; blank becomes `null` in the payload.
    Text,
    /// Numeric input kept as typed; converted to a number (or `null`) in the payload.
    Number,
    /// Repeatable sub-records such as chief complaints or family members.
    List,
    /// Checkbox.
    Flag,
}

impl FieldKind {
    pub fn default_value(self) -> Value {
        match self {
            FieldKind::Text | FieldKind::Number => Value::String(String::new()),
            FieldKind::List => Value::Array(Vec::new()),
            FieldKind::Flag => Value::Bool(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn number(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Number,
    }
}

const fn list(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::List,
    }
}

const fn flag(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Flag,
    }
}

const CASE_HISTORY_FIELDS: &[FieldSpec] = &[
    text("identification_name"),
    number("identification_age"),
    text("identification_gender"),
    text("identification_father_husband_name"),
    text("identification_education"),
    text("identification_occupation"),
    text("identification_marital_status"),
    text("identification_religion"),
    text("identification_address"),
    text("identification_source_of_referral"),
    text("identification_reason_for_referral"),
    text("informant_name"),
    number("informant_age"),
    text("informant_relation_duration"),
    text("informant_reliability"),
    text("patient_report_reliability"),
    list("chief_complaints"),
    list("family_members"),
    text("family_history_psychiatric_illness"),
    text("family_history_home_atmosphere"),
    text("personal_history_birth_date"),
    text("scholastic_academic_performance"),
    text("vocation_work_record"),
    number("menstrual_menarche_age"),
    number("marital_age_at_marriage"),
    text("marital_adjustment"),
];

const MENTAL_STATUS_FIELDS: &[FieldSpec] = &[
    text("general_appearance_appearance"),
    text("general_appearance_rapport"),
    text("attitude"),
    text("motor_behavior"),
    text("speech_coherent_incoherent"),
    text("speech_goal_direction"),
    text("cognitive_orientation_time"),
    text("cognitive_orientation_space"),
    text("cognitive_orientation_person"),
    text("cognitive_memory_recent"),
    text("cognitive_memory_remote"),
    text("mood_affect_subjective"),
    text("mood_affect_objective"),
    text("thought_stream"),
    text("thought_form"),
    text("thought_content_ideas_suicide"),
    text("thought_content_delusions_types"),
    text("perceptual_modality"),
    text("judgement_social"),
    text("judgement_personal"),
    text("insight"),
    text("verbatim_report"),
    text("behavior_observation"),
];

const PLAN_OF_ASSESSMENT_FIELDS: &[FieldSpec] = &[list("plan_of_assessment")];

const QUESTIONNAIRE_FIELDS: &[FieldSpec] = &[
    text("name"),
    text("description"),
    flag("has_text_field"),
    text("text_field_label"),
    text("text_field_placeholder"),
    text("color_coding_scheme"),
    list("questions"),
];

/// The known fields of one form and the conversions between drafts and stored documents.
#[derive(Debug, Clone, Copy)]
pub struct FormSchema {
    kind: FormKind,
    fields: &'static [FieldSpec],
}

impl FormSchema {
    pub fn kind(&self) -> FormKind {
        self.kind
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// A fully-defined draft with every known field at its default value.
    pub fn defaults(&self) -> DraftState {
        self.fields
            .iter()
            .map(|spec| (spec.name.to_string(), spec.kind.default_value()))
            .collect()
    }

    /// Overlay a stored document onto the defaults.
    ///
    /// Missing or `null` values fall back to the default, unknown keys are dropped, and list
    /// fields stored as JSON-encoded strings are decoded.
    pub fn hydrate(&self, document: &Value) -> DraftState {
        let mut draft = self.defaults();

        for spec in self.fields {
            let Some(stored) = document.get(spec.name) else {
                continue;
            };
            if let Some(value) = hydrate_value(spec, stored) {
                draft.set(spec.name, value);
            }
        }

        draft
    }

    /// Build the payload the backend expects from a draft.
    ///
    /// Blank text becomes `null`, numeric text becomes a number (`null` when it does not
    /// parse), and blank members of list items become `null`. Fields outside the schema are
    /// not sent.
    pub fn payload(&self, draft: &DraftState) -> Value {
        let mut payload = Map::new();

        for spec in self.fields {
            let value = draft
                .get(spec.name)
                .cloned()
                .unwrap_or_else(|| spec.kind.default_value());

            let normalised = match spec.kind {
                FieldKind::Text => blank_to_null(value),
                FieldKind::Number => to_number(value),
                FieldKind::List => match value {
                    Value::Array(items) => {
                        Value::Array(items.into_iter().map(normalise_item).collect())
                    }
                    other => other,
                },
                FieldKind::Flag => value,
            };

            payload.insert(spec.name.to_string(), normalised);
        }

        Value::Object(payload)
    }
}

fn hydrate_value(spec: &FieldSpec, stored: &Value) -> Option<Value> {
    match (spec.kind, stored) {
        (_, Value::Null) => None,
        (FieldKind::List, Value::Array(_)) => Some(stored.clone()),
        (FieldKind::List, Value::String(encoded)) => {
            match serde_json::from_str::<Value>(encoded) {
                Ok(decoded @ Value::Array(_)) => Some(decoded),
                _ => {
                    tracing::warn!("ignoring malformed list in field {}", spec.name);
                    None
                }
            }
        }
        (FieldKind::List, _) => None,
        (FieldKind::Flag, Value::Bool(_)) => Some(stored.clone()),
        (FieldKind::Flag, _) => None,
        (FieldKind::Number, Value::Number(_) | Value::String(_)) => Some(stored.clone()),
        (FieldKind::Number, _) => None,
        (FieldKind::Text, _) => Some(stored.clone()),
    }
}

fn blank_to_null(value: Value) -> Value {
    match value {
        Value::String(s) if s.is_empty() => Value::Null,
        other => other,
    }
}

fn to_number(value: Value) -> Value {
    match value {
        Value::Number(_) => value,
        Value::String(s) => {
            let s = s.trim();
            if let Ok(int) = s.parse::<i64>() {
                Value::Number(int.into())
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        _ => Value::Null,
    }
}

fn normalise_item(item: Value) -> Value {
    match item {
        Value::Object(members) => Value::Object(
            members
                .into_iter()
                .map(|(key, value)| (key, blank_to_null(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_define_every_field() {
        for kind in FormKind::ALL {
            let schema = kind.schema();
            let defaults = schema.defaults();
            assert_eq!(defaults.len(), schema.fields().len(), "{kind}");
            for spec in schema.fields() {
                assert_eq!(defaults.get(spec.name), Some(&spec.kind.default_value()));
            }
        }
    }

    #[test]
    fn test_hydrate_maps_null_to_default_and_drops_unknown_keys() {
        let schema = FormKind::Questionnaire.schema();
        let draft = schema.hydrate(&json!({
            "name": "PHQ-9",
            "description": null,
            "has_text_field": true,
            "created_by": "admin-1"
        }));

        assert_eq!(draft.get("name"), Some(&json!("PHQ-9")));
        assert_eq!(draft.get("description"), Some(&json!("")));
        assert_eq!(draft.get("has_text_field"), Some(&json!(true)));
        assert!(draft.get("created_by").is_none());
        assert_eq!(draft.len(), schema.fields().len());
    }

    #[test]
    fn test_hydrate_decodes_json_encoded_lists() {
        let schema = FormKind::CaseHistory.schema();
        let draft = schema.hydrate(&json!({
            "chief_complaints": "[\"insomnia\",\"low mood\"]",
            "family_members": "not json"
        }));

        assert_eq!(
            draft.get("chief_complaints"),
            Some(&json!(["insomnia", "low mood"]))
        );
        assert_eq!(draft.get("family_members"), Some(&json!([])));
    }

    #[test]
    fn test_payload_normalises_blank_and_numeric_fields() {
        let schema = FormKind::CaseHistory.schema();
        let mut draft = schema.defaults();
        draft.set("identification_name", json!("A"));
        draft.set("identification_age", json!(" 34 "));
        draft.set("informant_age", json!("unknown"));
        draft.set("marital_age_at_marriage", json!("27.5"));
        draft.set(
            "family_members",
            json!([{"member_type": "father", "name": "B", "occupation": ""}]),
        );

        let payload = schema.payload(&draft);

        assert_eq!(payload["identification_name"], json!("A"));
        assert_eq!(payload["identification_age"], json!(34));
        assert_eq!(payload["informant_age"], Value::Null);
        assert_eq!(payload["marital_age_at_marriage"], json!(27.5));
        assert_eq!(payload["identification_gender"], Value::Null);
        assert_eq!(payload["menstrual_menarche_age"], Value::Null);
        assert_eq!(payload["chief_complaints"], json!([]));
        assert_eq!(
            payload["family_members"],
            json!([{"member_type": "father", "name": "B", "occupation": null}])
        );
    }

    #[test]
    fn test_payload_skips_fields_outside_schema() {
        let schema = FormKind::PlanOfAssessment.schema();
        let mut draft = schema.defaults();
        draft.set("scratch", json!("x"));

        assert_eq!(schema.payload(&draft), json!({"plan_of_assessment": []}));
    }

    #[test]
    fn test_form_kind_parses_kebab_and_snake_case() {
        assert_eq!(
            "case-history".parse::<FormKind>(),
            Ok(FormKind::CaseHistory)
        );
        assert_eq!(
            "MENTAL_STATUS_EXAM".parse::<FormKind>(),
            Ok(FormKind::MentalStatusExam)
        );
        assert!("billing".parse::<FormKind>().is_err());
    }

    #[test]
    fn test_default_preconditions() {
        let schema = FormKind::CaseHistory.schema();
        let mut draft = schema.defaults();
        let pre = FormKind::CaseHistory.default_precondition();

        draft.set("identification_gender", json!("F"));
        assert!(!pre.is_met(&draft));
        draft.set("identification_name", json!("A"));
        assert!(pre.is_met(&draft));

        let mse = FormKind::MentalStatusExam;
        let mut draft = mse.schema().defaults();
        assert!(!mse.default_precondition().is_met(&draft));
        draft.set("insight", json!("partial"));
        assert!(mse.default_precondition().is_met(&draft));
    }
}
