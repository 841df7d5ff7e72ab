//! Printable document trees.
//!
//! Renderers project session data into a [`Document`]; export backends
//! consume the tree without knowing where the data came from.

pub mod protocol;
pub mod report;

use chrono::NaiveDate;
use serde::Serialize;

pub use protocol::render_treatment_protocol;
pub use report::render_clinical_report;

/// Fallback for an empty precautions field
pub const NO_PRECAUTIONS: &str = "Nessuna particolare.";
/// Fallback for any other empty field
pub const NOT_SPECIFIED: &str = "Non specificato.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextStyle {
    Normal,
    Emphasis,
    Small,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Letterhead {
        title: String,
        practitioner: String,
    },
    Heading {
        text: String,
        level: u8,
    },
    Paragraph {
        text: String,
        style: TextStyle,
    },
    Field {
        label: String,
        value: String,
    },
    Bullets {
        items: Vec<String>,
    },
    /// A titled block of fields kept together, one per treatment point
    PointCard {
        title: String,
        fields: Vec<(String, String)>,
    },
    Rule,
    Spacer,
    Signature {
        name: String,
        role: String,
    },
    PageBreakHint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub nodes: Vec<Node>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            nodes: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn heading(&mut self, text: impl Into<String>, level: u8) -> &mut Self {
        self.push(Node::Heading {
            text: text.into(),
            level,
        })
    }

    pub fn paragraph(&mut self, text: impl Into<String>, style: TextStyle) -> &mut Self {
        self.push(Node::Paragraph {
            text: text.into(),
            style,
        })
    }

    pub fn field(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Node::Field {
            label: label.into(),
            value: value.into(),
        })
    }

    pub fn bullets(&mut self, items: Vec<String>) -> &mut Self {
        self.push(Node::Bullets { items })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every piece of visible text in document order
    pub fn text_content(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in &self.nodes {
            match node {
                Node::Letterhead {
                    title,
                    practitioner,
                } => {
                    out.push(title.as_str());
                    out.push(practitioner.as_str());
                }
                Node::Heading { text, .. } | Node::Paragraph { text, .. } => out.push(text),
                Node::Field { label, value } => {
                    out.push(label.as_str());
                    out.push(value.as_str());
                }
                Node::Bullets { items } => out.extend(items.iter().map(String::as_str)),
                Node::PointCard { title, fields } => {
                    out.push(title.as_str());
                    for (label, value) in fields {
                        out.push(label.as_str());
                        out.push(value.as_str());
                    }
                }
                Node::Signature { name, role } => {
                    out.push(name.as_str());
                    out.push(role.as_str());
                }
                Node::Rule | Node::Spacer | Node::PageBreakHint => {}
            }
        }
        out
    }
}

/// `value`, or `fallback` when it is blank
pub(crate) fn or_fallback(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Items with blanks replaced; an empty list becomes a single fallback item
pub(crate) fn list_or_fallback(items: &[String]) -> Vec<String> {
    if items.iter().all(|item| item.trim().is_empty()) {
        return vec![NOT_SPECIFIED.to_string()];
    }
    items
        .iter()
        .filter(|item| !item.trim().is_empty())
        .cloned()
        .collect()
}

/// Italian short date, e.g. `07/03/2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
