use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// The ten questions of the TCM interview, in the order they are asked
pub const TCM_QUESTIONS: [&str; 10] = [
    "Caldo e Freddo",
    "Sudorazione",
    "Sintomi a Testa e Corpo (dolori o altro)",
    "Feci e Urine",
    "Appetito, Sete e Sapori",
    "Torace e Addome",
    "Sonno",
    "Orecchie e Occhi",
    "Ginecologia (se applicabile)",
    "Stato Emotivo e Stile di Vita",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub dob: NaiveDate,
    pub phone: String,
}

/// Answers to [`TCM_QUESTIONS`], positionally aligned with the question list.
///
/// Serialized as a `label -> answer` map in question order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub struct TcmAnswers {
    answers: [String; 10],
}

impl TcmAnswers {
    /// Look up the answer for `label`; `None` if the label is not one of the ten questions
    pub fn get(&self, label: &str) -> Option<&str> {
        TCM_QUESTIONS
            .iter()
            .position(|question| *question == label)
            .map(|index| self.answers[index].as_str())
    }

    /// `(question, answer)` pairs in question order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        TCM_QUESTIONS
            .iter()
            .copied()
            .zip(self.answers.iter().map(String::as_str))
    }

    pub fn has_any_answer(&self) -> bool {
        self.answers.iter().any(|answer| !answer.trim().is_empty())
    }
}

impl TryFrom<HashMap<String, String>> for TcmAnswers {
    type Error = String;

    fn try_from(map: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut answers = TcmAnswers::default();
        let mut unknown: Vec<String> = Vec::new();

        for (label, answer) in map {
            match TCM_QUESTIONS.iter().position(|question| *question == label) {
                Some(index) => answers.answers[index] = answer,
                None => unknown.push(label),
            }
        }

        if unknown.is_empty() {
            Ok(answers)
        } else {
            unknown.sort();
            Err(format!("unknown TCM question(s): {}", unknown.join(", ")))
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TcmAnswers {
    /// Build from literal pairs; labels that are not TCM questions are ignored
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut answers = TcmAnswers::default();
        for (label, answer) in pairs {
            if let Some(index) = TCM_QUESTIONS.iter().position(|question| *question == label) {
                answers.answers[index] = answer.to_string();
            }
        }
        answers
    }
}

impl Serialize for TcmAnswers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TCM_QUESTIONS.len()))?;
        for (question, answer) in self.iter() {
            map.serialize_entry(question, answer)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub session_number: String,
    pub main_complaint: String,
    pub tongue: String,
    pub pulse: String,
    pub tcm_answers: TcmAnswers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "Bilaterale")]
    Bilateral,
    #[serde(rename = "Monolaterale")]
    Unilateral,
    #[serde(rename = "Mediale")]
    Medial,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Bilateral, Side::Unilateral, Side::Medial];

    /// Label used on the wire and in printed documents
    pub fn label(self) -> &'static str {
        match self {
            Side::Bilateral => "Bilaterale",
            Side::Unilateral => "Monolaterale",
            Side::Medial => "Mediale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stimulation {
    #[serde(rename = "Tonificazione")]
    Tonification,
    #[serde(rename = "Dispersione")]
    Dispersion,
    #[serde(rename = "Armonizzazione")]
    Harmonization,
}

impl Stimulation {
    pub const ALL: [Stimulation; 3] = [
        Stimulation::Tonification,
        Stimulation::Dispersion,
        Stimulation::Harmonization,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stimulation::Tonification => "Tonificazione",
            Stimulation::Dispersion => "Dispersione",
            Stimulation::Harmonization => "Armonizzazione",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPointDetailed {
    pub code: String,
    pub chinese_name: String,
    pub location: String,
    pub angle: String,
    pub depth: String,
    pub precautions: String,
    pub side: Side,
    pub stimulation: Stimulation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveExamination {
    pub tongue: String,
    pub pulse: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub clinical_synthesis: String,
    pub objective_examination: ObjectiveExamination,
    pub tcm_diagnosis: String,
    pub treatment_points_simple: Vec<String>,
    pub needle_retention_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulationLegend {
    pub tonification: String,
    pub dispersion: String,
    pub harmonization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolData {
    pub diagnostic_reasoning: String,
    pub treatment_points_detailed: Vec<TreatmentPointDetailed>,
    pub needling_order: Vec<String>,
    pub stimulation_legend: StimulationLegend,
}

/// Structured result of the report generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    pub report_data: ReportData,
    pub protocol_data: ProtocolData,
}

/// Step 1 submission; fields arrive as raw text and are validated by the wizard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub phone: String,
}

/// Step 2 submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcmForm {
    #[serde(default)]
    pub session_number: String,
    #[serde(default)]
    pub main_complaint: String,
    #[serde(default)]
    pub tongue: String,
    #[serde(default)]
    pub pulse: String,
    #[serde(default)]
    pub tcm_answers: TcmAnswers,
}

/// Client-facing view of a wizard session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub step: String,
    pub epoch: u64,
    pub patient: Option<Patient>,
    pub age: Option<u32>,
    pub session_data: Option<SessionData>,
    pub response: Option<GeminiResponse>,
    pub error: Option<String>,
    pub waiting_for_input: bool,
}
