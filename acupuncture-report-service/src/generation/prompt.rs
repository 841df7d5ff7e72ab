use crate::models::{Patient, SessionData};

const ROLE: &str = "Sei un esperto di Medicina Tradizionale Cinese (MTC) e agopuntura.
Analizza i seguenti dati del paziente e genera un referto di agopuntura e un protocollo di trattamento dettagliato in lingua ITALIANA.";

const DIRECTIVES: [&str; 9] = [
    "**Sintesi Clinica:** Riassumi in modo descrittivo e oggettivo i sintomi e i disturbi principali lamentati dal paziente, basandoti sul motivo della visita e sulle risposte alle 10 domande. **NON utilizzare terminologia diagnostica o interpretativa della MTC** (es. evita frasi come \"deficit di Qi\", \"stasi di Fegato\", \"calore nel Sangue\", ecc.). La sintesi deve essere puramente sintomatologica.",
    "**Esame Obiettivo:** Utilizza ESATTAMENTE i dati forniti nella sezione \"Esame Obiettivo Fornito\" per descrivere lingua e polso nel referto. Non inventare o modificare queste informazioni.",
    "**Orientamento Diagnostico MTC:** Fornisci un orientamento diagnostico secondo i principi della MTC, descrivendo sinteticamente il pattern disarmonico principale riscontrato (es. \"Stasi di Qi di Fegato\", \"Deficit di Sangue di Milza\", \"Umidità-Calore nella Vescica Urinaria\"). Puoi fare riferimento sintetico ai principi interpretativi della MTC. La descrizione deve essere concisa.",
    "**Punti di Trattamento Semplificati:** Elenca solo i codici dei punti di trattamento e se sono mediali o bilaterali (es. \"Yintang (Mediale)\", \"LR3 (Bilaterale)\").",
    "**Tempo di Ritenzione Aghi:** Suggerisci un tempo di ritenzione standard (es. \"30-40 minuti\").",
    "**Ragionamento Diagnostico:** Fornisci un ragionamento diagnostico estremamente sintetico per il protocollo dettagliato.",
    "**Protocollo Dettagliato:** Per ogni punto suggerito, fornisci: codice, nome cinese (Pinyin), localizzazione sintetica, angolo e profondità di infissione, precauzioni, se è bilaterale/monolaterale/mediale, e la modalità di stimolazione (Tonificazione, Dispersione, Armonizzazione).",
    "**Ordine di Infissione:** Suggerisci un ordine logico per l'infissione degli aghi.",
    "**Legenda Stimolazione:** Fornisci una breve spiegazione su come ottenere le tre modalità di stimolazione.",
];

const OUTPUT_RULE: &str = "Restituisci l'output ESCLUSIVAMENTE in formato JSON, seguendo lo schema fornito. Non includere testo o spiegazioni al di fuori del JSON.";

/// Build the instruction sent to the generation service.
///
/// Every intake field is embedded verbatim; the questionnaire contributes one
/// `- question: answer` line per question, in question order.
pub fn build_prompt(patient: &Patient, age: u32, session: &SessionData) -> String {
    let answers = session
        .tcm_answers
        .iter()
        .map(|(question, answer)| format!("- {}: {}", question, answer))
        .collect::<Vec<_>>()
        .join("\n");

    let directives = DIRECTIVES
        .iter()
        .enumerate()
        .map(|(i, directive)| format!("{}. {}", i + 1, directive))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{ROLE}

**Dati Paziente:**
- Nome: {name}
- Età: {age} anni
- Motivo Principale della Visita: {complaint}

**Risposte alle 10 Domande della MTC:**
{answers}

**Esame Obiettivo Fornito:**
- Lingua: {tongue}
- Polso: {pulse}

**Istruzioni per la Generazione:**
{directives}

{OUTPUT_RULE}",
        name = patient.name,
        complaint = session.main_complaint,
        tongue = session.tongue,
        pulse = session.pulse,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TCM_QUESTIONS, TcmAnswers};
    use chrono::NaiveDate;

    fn patient() -> Patient {
        Patient {
            name: "Luca Verdi".to_string(),
            dob: NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
            phone: "0".to_string(),
        }
    }

    fn session() -> SessionData {
        SessionData {
            session_number: "3".to_string(),
            main_complaint: "Insonnia persistente".to_string(),
            tongue: "Punta rossa".to_string(),
            pulse: "Rapido e sottile".to_string(),
            tcm_answers: TcmAnswers::from([("Sonno", "Difficoltà ad addormentarsi")]),
        }
    }

    #[test]
    fn embeds_intake_fields_verbatim() {
        let prompt = build_prompt(&patient(), 66, &session());
        assert!(prompt.contains("- Nome: Luca Verdi"));
        assert!(prompt.contains("- Età: 66 anni"));
        assert!(prompt.contains("- Motivo Principale della Visita: Insonnia persistente"));
        assert!(prompt.contains("- Lingua: Punta rossa"));
        assert!(prompt.contains("- Polso: Rapido e sottile"));
    }

    #[test]
    fn lists_every_question_once_in_order() {
        let prompt = build_prompt(&patient(), 66, &session());
        let mut last = 0;
        for question in TCM_QUESTIONS {
            let line = format!("- {}:", question);
            let position = prompt.find(&line).expect("question missing");
            assert!(position > last);
            assert_eq!(prompt.matches(&line).count(), 1);
            last = position;
        }
        assert!(prompt.contains("- Sonno: Difficoltà ad addormentarsi"));
        assert!(prompt.contains("- Sudorazione: \n"));
    }

    #[test]
    fn numbers_all_nine_directives() {
        let prompt = build_prompt(&patient(), 66, &session());
        for n in 1..=9 {
            assert!(prompt.contains(&format!("\n{}. **", n)));
        }
        assert!(!prompt.contains("\n10. **"));
        assert!(prompt.ends_with(OUTPUT_RULE));
    }

    #[test]
    fn directives_keep_their_examples_and_allowances() {
        let prompt = build_prompt(&patient(), 66, &session());
        assert!(prompt.contains("\"calore nel Sangue\", ecc.). La sintesi deve essere puramente sintomatologica."));
        assert!(prompt.contains("\"Umidità-Calore nella Vescica Urinaria\")."));
        assert!(prompt.contains(
            "Puoi fare riferimento sintetico ai principi interpretativi della MTC. La descrizione deve essere concisa."
        ));
    }
}
