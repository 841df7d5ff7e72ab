use serde_json::{Value, json};

use crate::models::{Side, Stimulation};

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn string_array() -> Value {
    json!({ "type": "ARRAY", "items": string() })
}

fn string_enum(values: &[&str]) -> Value {
    json!({ "type": "STRING", "enum": values })
}

/// Structured-output schema for the generation call, in the provider's
/// OpenAPI subset (`OBJECT`, `ARRAY`, `STRING`, `enum`, `required`).
pub fn response_schema() -> Value {
    let sides: Vec<&str> = Side::ALL.iter().map(|side| side.label()).collect();
    let stimulations: Vec<&str> = Stimulation::ALL.iter().map(|mode| mode.label()).collect();

    let treatment_point = json!({
        "type": "OBJECT",
        "properties": {
            "code": string(),
            "chineseName": string(),
            "location": string(),
            "angle": string(),
            "depth": string(),
            "precautions": string(),
            "side": string_enum(&sides),
            "stimulation": string_enum(&stimulations),
        },
        "required": ["code", "chineseName", "location", "angle", "depth", "precautions", "side", "stimulation"],
    });

    json!({
        "type": "OBJECT",
        "properties": {
            "reportData": {
                "type": "OBJECT",
                "properties": {
                    "clinicalSynthesis": string(),
                    "objectiveExamination": {
                        "type": "OBJECT",
                        "properties": {
                            "tongue": string(),
                            "pulse": string(),
                        },
                        "required": ["tongue", "pulse"],
                    },
                    "tcmDiagnosis": string(),
                    "treatmentPointsSimple": string_array(),
                    "needleRetentionTime": string(),
                },
                "required": ["clinicalSynthesis", "objectiveExamination", "tcmDiagnosis", "treatmentPointsSimple", "needleRetentionTime"],
            },
            "protocolData": {
                "type": "OBJECT",
                "properties": {
                    "diagnosticReasoning": string(),
                    "treatmentPointsDetailed": {
                        "type": "ARRAY",
                        "items": treatment_point,
                    },
                    "needlingOrder": string_array(),
                    "stimulationLegend": {
                        "type": "OBJECT",
                        "properties": {
                            "tonification": string(),
                            "dispersion": string(),
                            "harmonization": string(),
                        },
                        "required": ["tonification", "dispersion", "harmonization"],
                    },
                },
                "required": ["diagnosticReasoning", "treatmentPointsDetailed", "needlingOrder", "stimulationLegend"],
            },
        },
        "required": ["reportData", "protocolData"],
    })
}
