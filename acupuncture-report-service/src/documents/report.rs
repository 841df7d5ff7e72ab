use chrono::NaiveDate;

use super::{
    Document, NOT_SPECIFIED, Node, TextStyle, format_date, list_or_fallback, or_fallback,
};
use crate::age::age_on;
use crate::config::ProviderIdentity;
use crate::models::{Patient, ReportData};

pub const REPORT_TITLE: &str = "Scheda Riepilogativa della Seduta di Agopuntura";

pub const TCM_ORGAN_DISCLAIMER: &str = "Si sottolinea che nella Medicina Tradizionale Cinese gli organi sono intesi come sistemi energetico-funzionali che integrano aspetti fisici ed emotivi, andando oltre la semplice definizione anatomica considerata dalla medicina convenzionale occidentale.";

const CONSENT_NOTE: &str = "Previa acquisizione del Consenso Informato espresso dal/lla Paziente, si è proceduto al trattamento dei seguenti agopunti:";

const FREE_SERVICE_NOTE: &str = "(prestazione gratuita – training su campo)";

/// Project a generated report into the printable clinical report.
pub fn render_clinical_report(
    patient: &Patient,
    session_number: &str,
    report: &ReportData,
    provider: &ProviderIdentity,
    today: NaiveDate,
) -> Document {
    let mut doc = Document::new(format!("Referto {}", patient.name));

    doc.push(Node::Letterhead {
        title: provider.practice_title.clone(),
        practitioner: provider.practitioner.clone(),
    })
    .heading(REPORT_TITLE, 1)
    .field(
        "Data della Valutazione",
        format!("{} ({}ª seduta)", format_date(today), session_number),
    )
    .field("Paziente", patient.name.to_uppercase())
    .field("Età", format!("{} anni", age_on(patient.dob, today)))
    .field("Contatto Telefonico", or_fallback(&patient.phone, NOT_SPECIFIED))
    .push(Node::Spacer);

    doc.heading("SINTESI CLINICA", 2).paragraph(
        or_fallback(&report.clinical_synthesis, NOT_SPECIFIED),
        TextStyle::Normal,
    );

    let exam = &report.objective_examination;
    doc.heading("Esame Obiettivo", 2).bullets(vec![
        format!("Lingua: {}", or_fallback(&exam.tongue, NOT_SPECIFIED)),
        format!("Polso: {}", or_fallback(&exam.pulse, NOT_SPECIFIED)),
    ]);

    doc.heading(
        "ORIENTAMENTO DIAGNOSTICO SECONDO MTC (Rivalutabile nel tempo)",
        2,
    )
    .paragraph(
        or_fallback(&report.tcm_diagnosis, NOT_SPECIFIED),
        TextStyle::Normal,
    )
    .paragraph(TCM_ORGAN_DISCLAIMER, TextStyle::Emphasis)
    .push(Node::Rule);

    doc.paragraph(CONSENT_NOTE, TextStyle::Normal)
        .bullets(list_or_fallback(&report.treatment_points_simple))
        .field(
            "Tempo di Ritenzione degli Aghi",
            or_fallback(&report.needle_retention_time, NOT_SPECIFIED),
        )
        .paragraph(FREE_SERVICE_NOTE, TextStyle::Small)
        .push(Node::Spacer)
        .push(Node::Signature {
            name: provider.practitioner.clone(),
            role: provider.role.clone(),
        });

    doc
}
