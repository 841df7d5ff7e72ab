use chrono::NaiveDate;
use tracing::warn;
use wizard_flow::{FlowError, Reducer, Result};

use crate::age::local_today;
use crate::intake::{validate_patient, validate_session};
use crate::models::{GeminiResponse, Patient, PatientForm, SessionData, TcmForm};

/// Where a wizard session currently stands
#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    PatientIntake,
    TcmIntake {
        patient: Patient,
    },
    Loading {
        patient: Patient,
        session: SessionData,
    },
    Error {
        message: String,
    },
    Ready {
        patient: Patient,
        session: SessionData,
        response: GeminiResponse,
    },
}

impl WizardState {
    pub fn label(&self) -> &'static str {
        match self {
            WizardState::PatientIntake => "patient_intake",
            WizardState::TcmIntake { .. } => "tcm_intake",
            WizardState::Loading { .. } => "loading",
            WizardState::Error { .. } => "error",
            WizardState::Ready { .. } => "ready",
        }
    }

    pub fn patient(&self) -> Option<&Patient> {
        match self {
            WizardState::TcmIntake { patient }
            | WizardState::Loading { patient, .. }
            | WizardState::Ready { patient, .. } => Some(patient),
            WizardState::PatientIntake | WizardState::Error { .. } => None,
        }
    }

    pub fn session(&self) -> Option<&SessionData> {
        match self {
            WizardState::Loading { session, .. } | WizardState::Ready { session, .. } => {
                Some(session)
            }
            _ => None,
        }
    }

    /// Steps that wait on the client rather than on the generation service
    pub fn waiting_for_input(&self) -> bool {
        !matches!(self, WizardState::Loading { .. })
    }
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    SubmitPatient(PatientForm),
    SubmitTcm(TcmForm),
    GenerationSucceeded(GeminiResponse),
    GenerationFailed(String),
    Retry,
    StartOver,
}

impl WizardEvent {
    pub fn label(&self) -> &'static str {
        match self {
            WizardEvent::SubmitPatient(_) => "submit_patient",
            WizardEvent::SubmitTcm(_) => "submit_tcm",
            WizardEvent::GenerationSucceeded(_) => "generation_succeeded",
            WizardEvent::GenerationFailed(_) => "generation_failed",
            WizardEvent::Retry => "retry",
            WizardEvent::StartOver => "start_over",
        }
    }
}

/// The three-step intake wizard: patient data, TCM questionnaire, result.
#[derive(Debug, Clone, Default)]
pub struct IntakeWizard {
    today: Option<NaiveDate>,
}

impl IntakeWizard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the calendar date used for date-of-birth validation
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(local_today)
    }
}

impl Reducer for IntakeWizard {
    type State = WizardState;
    type Event = WizardEvent;

    fn initial(&self) -> WizardState {
        WizardState::PatientIntake
    }

    fn reduce(&self, state: &WizardState, event: WizardEvent) -> Result<WizardState> {
        match (state, event) {
            (_, WizardEvent::StartOver) => Ok(WizardState::PatientIntake),

            (WizardState::PatientIntake, WizardEvent::SubmitPatient(form)) => {
                let patient = validate_patient(form, self.today())
                    .map_err(|e| FlowError::Rejected(e.to_string()))?;
                Ok(WizardState::TcmIntake { patient })
            }

            (WizardState::TcmIntake { patient }, WizardEvent::SubmitTcm(form)) => {
                let session =
                    validate_session(form).map_err(|e| FlowError::Rejected(e.to_string()))?;
                Ok(WizardState::Loading {
                    patient: patient.clone(),
                    session,
                })
            }

            (
                WizardState::Loading { patient, session },
                WizardEvent::GenerationSucceeded(mut response),
            ) => {
                pin_objective_examination(&mut response, session);
                Ok(WizardState::Ready {
                    patient: patient.clone(),
                    session: session.clone(),
                    response,
                })
            }

            (WizardState::Loading { .. }, WizardEvent::GenerationFailed(message)) => {
                Ok(WizardState::Error { message })
            }

            (WizardState::Error { .. }, WizardEvent::Retry) => Ok(WizardState::PatientIntake),

            (state, event) => Err(FlowError::InvalidTransition {
                state: state.label().to_string(),
                event: event.label().to_string(),
            }),
        }
    }

    fn discards_pending(&self, event: &WizardEvent) -> bool {
        matches!(event, WizardEvent::Retry | WizardEvent::StartOver)
    }

    fn label(&self, state: &WizardState) -> &'static str {
        state.label()
    }
}

/// The objective examination is copied from the intake, whatever the service echoed back
fn pin_objective_examination(response: &mut GeminiResponse, session: &SessionData) {
    let exam = &mut response.report_data.objective_examination;
    if exam.tongue != session.tongue || exam.pulse != session.pulse {
        warn!("Generated objective examination differs from intake, restoring submitted values");
    }
    exam.tongue = session.tongue.clone();
    exam.pulse = session.pulse.clone();
}
