//! Word-compatible export: a minimal HTML document that word processors open
//! as a `.doc`.

use crate::documents::{Document, Node, TextStyle};

pub const WORD_MIME_TYPE: &str = "application/msword";

const UTF8_BOM: &str = "\u{FEFF}";

const STYLE: &str = "body{font-family:Calibri,Arial,sans-serif;font-size:11pt;line-height:1.4}\
h1{font-size:16pt;text-align:center}h2{font-size:13pt;margin-top:14pt}\
.letterhead{text-align:center;border-bottom:1px solid #444;padding-bottom:6pt}\
.emphasis{font-style:italic}.small{font-size:9pt}\
.signature{margin-top:28pt;text-align:right}.card{margin:8pt 0}";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Serialize the tree to a standalone HTML document
pub fn render_word_html(document: &Document) -> String {
    let mut html = format!(
        "<!DOCTYPE html><html xmlns:o=\"urn:schemas-microsoft-com:office:office\" \
         xmlns:w=\"urn:schemas-microsoft-com:office:word\"><head><meta charset=\"utf-8\">\
         <title>{}</title><style>{STYLE}</style></head><body>",
        escape(&document.title)
    );

    for node in &document.nodes {
        html.push_str(&render_node(node));
    }

    html.push_str("</body></html>");
    html
}

fn render_node(node: &Node) -> String {
    match node {
        Node::Letterhead {
            title,
            practitioner,
        } => format!(
            "<div class=\"letterhead\"><p><b>{}</b></p><p>{}</p></div>",
            escape(title),
            escape(practitioner)
        ),
        Node::Heading { text, level } => {
            let level = (*level).clamp(1, 3);
            format!("<h{level}>{}</h{level}>", escape(text))
        }
        Node::Paragraph { text, style } => {
            let class = match style {
                TextStyle::Normal => "",
                TextStyle::Emphasis => " class=\"emphasis\"",
                TextStyle::Small => " class=\"small\"",
            };
            format!("<p{class}>{}</p>", escape(text))
        }
        Node::Field { label, value } => {
            format!("<p><b>{}:</b> {}</p>", escape(label), escape(value))
        }
        Node::Bullets { items } => {
            let items: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", escape(item)))
                .collect();
            format!("<ul>{items}</ul>")
        }
        Node::PointCard { title, fields } => {
            let fields: String = fields
                .iter()
                .map(|(label, value)| format!("<li><b>{}:</b> {}</li>", escape(label), escape(value)))
                .collect();
            format!(
                "<div class=\"card\"><p><b>{}</b></p><ul>{fields}</ul></div>",
                escape(title)
            )
        }
        Node::Rule => "<hr>".to_string(),
        Node::Spacer => "<p>&nbsp;</p>".to_string(),
        Node::Signature { name, role } => format!(
            "<div class=\"signature\"><p><b>{}</b></p><p class=\"small\">{}</p></div>",
            escape(name),
            escape(role)
        ),
        Node::PageBreakHint => "<br style=\"page-break-before:always\">".to_string(),
    }
}

/// BOM-prefixed UTF-8 bytes ready to be served as [`WORD_MIME_TYPE`]
pub fn export_word(document: &Document) -> Vec<u8> {
    let mut bytes = UTF8_BOM.as_bytes().to_vec();
    bytes.extend_from_slice(render_word_html(document).as_bytes());
    bytes
}
