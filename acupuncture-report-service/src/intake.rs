//! Validation of the two intake steps.
//!
//! Both checks run before any state change; a rejected form never reaches the
//! generation client.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Patient, PatientForm, SessionData, TcmForm};

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub fields: Vec<&'static str>,
}

impl ValidationError {
    fn new(message: impl Into<String>, fields: Vec<&'static str>) -> Self {
        Self {
            message: message.into(),
            fields,
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Step 1: name, date of birth and phone are all required
pub fn validate_patient(form: PatientForm, today: NaiveDate) -> Result<Patient, ValidationError> {
    let missing: Vec<&'static str> = [
        ("name", form.name.as_str()),
        ("dob", form.dob.as_str()),
        ("phone", form.phone.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| is_blank(value))
    .map(|(field, _)| field)
    .collect();

    if !missing.is_empty() {
        return Err(ValidationError::new(
            "Please fill in all fields: name, date of birth and phone.",
            missing,
        ));
    }

    let dob = NaiveDate::parse_from_str(form.dob.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::new("Date of birth must be a date in YYYY-MM-DD format.", vec!["dob"])
    })?;

    if dob > today {
        return Err(ValidationError::new(
            "Date of birth cannot be in the future.",
            vec!["dob"],
        ));
    }

    Ok(Patient {
        name: form.name.trim().to_string(),
        dob,
        phone: form.phone.trim().to_string(),
    })
}

/// Step 2: session number, complaint, tongue and pulse are required, plus at
/// least one of the ten TCM answers
pub fn validate_session(form: TcmForm) -> Result<SessionData, ValidationError> {
    let mut missing: Vec<&'static str> = [
        ("sessionNumber", form.session_number.as_str()),
        ("mainComplaint", form.main_complaint.as_str()),
        ("tongue", form.tongue.as_str()),
        ("pulse", form.pulse.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| is_blank(value))
    .map(|(field, _)| field)
    .collect();

    if !form.tcm_answers.has_any_answer() {
        missing.push("tcmAnswers");
    }

    if !missing.is_empty() {
        return Err(ValidationError::new(
            "Please fill in all fields: session number, main complaint, tongue, pulse and at least one answer to the questions.",
            missing,
        ));
    }

    let session_number = form.session_number.trim();
    match session_number.parse::<u32>() {
        Ok(n) if n > 0 => {}
        _ => {
            return Err(ValidationError::new(
                "Session number must be a positive integer.",
                vec!["sessionNumber"],
            ));
        }
    }

    Ok(SessionData {
        session_number: session_number.to_string(),
        main_complaint: form.main_complaint,
        tongue: form.tongue,
        pulse: form.pulse,
        tcm_answers: form.tcm_answers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TcmAnswers;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn patient_form() -> PatientForm {
        PatientForm {
            name: "Mario Rossi".to_string(),
            dob: "1970-05-12".to_string(),
            phone: "+39 333 1234567".to_string(),
        }
    }

    fn tcm_form() -> TcmForm {
        TcmForm {
            session_number: "2".to_string(),
            main_complaint: "Cefalea".to_string(),
            tongue: "Pallida".to_string(),
            pulse: "Sottile".to_string(),
            tcm_answers: TcmAnswers::from([("Sonno", "Risvegli notturni")]),
        }
    }

    #[test]
    fn accepts_complete_patient() {
        let patient = validate_patient(patient_form(), today()).unwrap();
        assert_eq!(patient.name, "Mario Rossi");
        assert_eq!(patient.dob, NaiveDate::from_ymd_opt(1970, 5, 12).unwrap());
    }

    #[test]
    fn each_missing_patient_field_is_reported() {
        for field in ["name", "dob", "phone"] {
            let mut form = patient_form();
            match field {
                "name" => form.name = "  ".to_string(),
                "dob" => form.dob.clear(),
                _ => form.phone.clear(),
            }
            let error = validate_patient(form, today()).unwrap_err();
            assert_eq!(error.fields, vec![field]);
        }
    }

    #[test]
    fn rejects_unparseable_and_future_dob() {
        let mut form = patient_form();
        form.dob = "12/05/1970".to_string();
        assert_eq!(validate_patient(form, today()).unwrap_err().fields, vec!["dob"]);

        let mut form = patient_form();
        form.dob = "2027-01-01".to_string();
        assert!(validate_patient(form, today()).is_err());
    }

    #[test]
    fn rejects_all_empty_answers_even_when_other_fields_are_filled() {
        let mut form = tcm_form();
        form.tcm_answers = TcmAnswers::default();
        let error = validate_session(form).unwrap_err();
        assert_eq!(error.fields, vec!["tcmAnswers"]);
    }

    #[test]
    fn rejects_missing_exam_fields() {
        let mut form = tcm_form();
        form.tongue.clear();
        form.pulse = " ".to_string();
        let error = validate_session(form).unwrap_err();
        assert_eq!(error.fields, vec!["tongue", "pulse"]);
    }

    #[test]
    fn rejects_non_positive_session_number() {
        for bad in ["0", "-1", "prima"] {
            let mut form = tcm_form();
            form.session_number = bad.to_string();
            assert_eq!(
                validate_session(form).unwrap_err().fields,
                vec!["sessionNumber"]
            );
        }
    }

    #[test]
    fn accepts_complete_session() {
        let session = validate_session(tcm_form()).unwrap();
        assert_eq!(session.session_number, "2");
        assert_eq!(session.tcm_answers.get("Sonno"), Some("Risvegli notturni"));
    }
}
