use chrono::NaiveDate;

use super::{
    Document, NO_PRECAUTIONS, NOT_SPECIFIED, Node, TextStyle, format_date, or_fallback,
};
use crate::config::ProviderIdentity;
use crate::models::{Patient, ProtocolData, TreatmentPointDetailed};

pub const PROTOCOL_TITLE: &str = "Protocollo di Trattamento di Agopuntura";

const FOOTER_NOTES: [&str; 2] = [
    "Previa acquisizione del Consenso Informato espresso dal/dalla Paziente.",
    "Questo protocollo è un suggerimento basato sull'analisi e può essere modificato dal medico agopuntore.",
];

/// Project a generated protocol into the printable treatment protocol.
pub fn render_treatment_protocol(
    patient: &Patient,
    session_number: &str,
    protocol: &ProtocolData,
    provider: &ProviderIdentity,
    today: NaiveDate,
) -> Document {
    let mut doc = Document::new(format!("Protocollo {}", patient.name));

    doc.push(Node::Letterhead {
        title: provider.practice_title.clone(),
        practitioner: provider.practitioner.clone(),
    })
    .heading(PROTOCOL_TITLE, 1)
    .heading("Dati Paziente e Seduta", 2)
    .field("Paziente", patient.name.to_uppercase())
    .field("Data", format_date(today))
    .field("Contatto", or_fallback(&patient.phone, NOT_SPECIFIED))
    .field("Seduta N°", or_fallback(session_number, NOT_SPECIFIED))
    .push(Node::Rule);

    doc.heading("Ragionamento Diagnostico Sintetico", 2)
        .paragraph(
            or_fallback(&protocol.diagnostic_reasoning, NOT_SPECIFIED),
            TextStyle::Normal,
        )
        .heading("Ordine di Infissione suggerito", 2)
        .paragraph(needling_order(&protocol.needling_order), TextStyle::Emphasis);

    doc.heading("Protocollo Terapeutico Dettagliato", 2);
    if protocol.treatment_points_detailed.is_empty() {
        doc.paragraph(NOT_SPECIFIED, TextStyle::Normal);
    }
    for point in &protocol.treatment_points_detailed {
        doc.push(point_card(point));
    }

    let legend = &protocol.stimulation_legend;
    doc.push(Node::PageBreakHint)
        .heading("Legenda Modalità di Stimolazione", 2)
        .field("Tonificazione", or_fallback(&legend.tonification, NOT_SPECIFIED))
        .field("Dispersione", or_fallback(&legend.dispersion, NOT_SPECIFIED))
        .field(
            "Armonizzazione",
            or_fallback(&legend.harmonization, NOT_SPECIFIED),
        )
        .push(Node::Rule);

    for note in FOOTER_NOTES {
        doc.paragraph(note, TextStyle::Small);
    }
    doc.push(Node::Signature {
        name: provider.practitioner.clone(),
        role: provider.role.clone(),
    });

    doc
}

fn needling_order(order: &[String]) -> String {
    let codes: Vec<&str> = order
        .iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .collect();
    if codes.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        codes.join(" → ")
    }
}

fn point_card(point: &TreatmentPointDetailed) -> Node {
    let title = if point.chinese_name.trim().is_empty() {
        point.code.clone()
    } else {
        format!("{} - {}", point.code, point.chinese_name)
    };

    let fields = [
        ("Localizzazione", or_fallback(&point.location, NOT_SPECIFIED)),
        (
            "Stimolazione",
            format!("{} ({})", point.stimulation.label(), point.side.label()),
        ),
        ("Angolo", or_fallback(&point.angle, NOT_SPECIFIED)),
        ("Profondità", or_fallback(&point.depth, NOT_SPECIFIED)),
        ("Precauzioni", or_fallback(&point.precautions, NO_PRECAUTIONS)),
    ];

    Node::PointCard {
        title,
        fields: fields
            .into_iter()
            .map(|(label, value)| (label.to_string(), value))
            .collect(),
    }
}
