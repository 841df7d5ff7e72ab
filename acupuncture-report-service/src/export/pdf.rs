//! Paginated PDF export.
//!
//! The document is first laid out on a single tall canvas, `scale` canvas
//! pixels per CSS pixel, then the canvas is mapped onto A4 width and sliced
//! into pages. Page `i` shows the canvas shifted up by `i` page heights, so
//! every drawing operation lands on exactly one page.

use std::io::BufWriter;

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use tracing::debug;

use super::ExportError;
use crate::documents::{Document, Node, TextStyle};

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

const MM_PER_PT: f32 = 0.352_778;

// Layout constants in CSS pixels; 794 px is A4 width at 96 dpi.
const PAGE_WIDTH_PX: f32 = 794.0;
const MARGIN_PX: f32 = 48.0;
const LINE_SPACING: f32 = 1.35;
const AVG_GLYPH_WIDTH_EM: f32 = 0.52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Oblique,
}

#[derive(Debug, Clone, PartialEq)]
enum DrawOp {
    /// `y` is the baseline, measured from the canvas top
    Text {
        x: f32,
        y: f32,
        size: f32,
        face: Face,
        text: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
    },
}

impl DrawOp {
    fn anchor(&self) -> f32 {
        match self {
            DrawOp::Text { y, .. } | DrawOp::Rule { y, .. } => *y,
        }
    }
}

/// The laid-out document, in canvas pixels
#[derive(Debug)]
struct Canvas {
    width: f32,
    height: f32,
    ops: Vec<DrawOp>,
}

/// One page of the sliced canvas; `offset` is in millimetres and is always
/// `-index * page_height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    pub index: usize,
    pub offset: f32,
}

/// Slice an image of `image_height` into pages of `page_height`.
///
/// Always yields at least one page.
pub fn paginate(image_height: f32, page_height: f32) -> Vec<PageSlice> {
    let pages = if image_height > 0.0 && page_height > 0.0 {
        (image_height / page_height).ceil().max(1.0) as usize
    } else {
        1
    };
    (0..pages)
        .map(|index| PageSlice {
            index,
            offset: -(index as f32) * page_height,
        })
        .collect()
}

struct Layout {
    scale: f32,
    width: f32,
    page_height: f32,
    cursor: f32,
    ops: Vec<DrawOp>,
}

impl Layout {
    fn new(scale: f32) -> Self {
        let width = PAGE_WIDTH_PX * scale;
        Self {
            scale,
            width,
            page_height: width * A4_HEIGHT_MM / A4_WIDTH_MM,
            cursor: MARGIN_PX * scale,
            ops: Vec::new(),
        }
    }

    fn px(&self, css: f32) -> f32 {
        css * self.scale
    }

    fn left(&self) -> f32 {
        self.px(MARGIN_PX)
    }

    fn right(&self) -> f32 {
        self.width - self.px(MARGIN_PX)
    }

    fn space(&mut self, css: f32) {
        self.cursor += self.px(css);
    }

    /// Move to the next page top when `height` would straddle a page boundary
    fn keep_together(&mut self, height: f32) {
        let page = (self.cursor / self.page_height).floor();
        let page_end = (page + 1.0) * self.page_height - self.px(MARGIN_PX / 2.0);
        if self.cursor + height > page_end && height < self.page_height / 2.0 {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        let page = (self.cursor / self.page_height).floor();
        let page_top = page * self.page_height + self.px(MARGIN_PX);
        if self.cursor > page_top {
            self.cursor = (page + 1.0) * self.page_height + self.px(MARGIN_PX);
        }
    }

    fn line_height(&self, size_css: f32) -> f32 {
        self.px(size_css * LINE_SPACING)
    }

    /// Lay out wrapped text starting at `indent` CSS pixels from the margin
    fn text(&mut self, text: &str, size_css: f32, face: Face, indent: f32) {
        let x = self.left() + self.px(indent);
        let available = (self.right() - x) / self.scale;
        let max_chars = (available / (size_css * AVG_GLYPH_WIDTH_EM)).max(8.0) as usize;
        let line_height = self.line_height(size_css);

        for paragraph in text.split('\n') {
            for line in wrap_text(paragraph, max_chars) {
                self.keep_together(line_height);
                self.cursor += line_height;
                self.ops.push(DrawOp::Text {
                    x,
                    y: self.cursor - self.px(size_css * (LINE_SPACING - 1.0)),
                    size: self.px(size_css),
                    face,
                    text: line,
                });
            }
        }
    }

    fn rule(&mut self) {
        self.space(6.0);
        self.ops.push(DrawOp::Rule {
            x1: self.left(),
            x2: self.right(),
            y: self.cursor,
        });
        self.space(8.0);
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Letterhead {
                title,
                practitioner,
            } => {
                self.text(title, 13.0, Face::Bold, 0.0);
                self.text(practitioner, 11.0, Face::Regular, 0.0);
                self.rule();
            }
            Node::Heading { text, level } => {
                let size = if *level <= 1 { 17.0 } else { 13.0 };
                self.space(10.0);
                self.keep_together(self.line_height(size) + self.line_height(11.0) * 2.0);
                self.text(text, size, Face::Bold, 0.0);
                self.space(4.0);
            }
            Node::Paragraph { text, style } => {
                let (size, face) = match style {
                    TextStyle::Normal => (11.0, Face::Regular),
                    TextStyle::Emphasis => (11.0, Face::Oblique),
                    TextStyle::Small => (9.0, Face::Regular),
                };
                self.text(text, size, face, 0.0);
                self.space(6.0);
            }
            Node::Field { label, value } => {
                self.text(&format!("{label}: {value}"), 11.0, Face::Regular, 0.0);
                self.space(2.0);
            }
            Node::Bullets { items } => {
                for item in items {
                    self.text(&format!("- {item}"), 11.0, Face::Regular, 12.0);
                }
                self.space(6.0);
            }
            Node::PointCard { title, fields } => {
                let estimate =
                    self.line_height(12.0) + self.line_height(10.5) * (fields.len() as f32 + 1.0);
                self.space(6.0);
                self.keep_together(estimate);
                self.text(title, 12.0, Face::Bold, 0.0);
                for (label, value) in fields {
                    self.text(&format!("{label}: {value}"), 10.5, Face::Regular, 12.0);
                }
                self.space(6.0);
            }
            Node::Rule => self.rule(),
            Node::Spacer => self.space(16.0),
            Node::Signature { name, role } => {
                let indent = (PAGE_WIDTH_PX - 2.0 * MARGIN_PX) * 0.55;
                self.space(24.0);
                self.keep_together(self.line_height(11.0) * 3.0);
                self.text(name, 11.0, Face::Bold, indent);
                self.text(role, 9.0, Face::Oblique, indent);
            }
            Node::PageBreakHint => self.break_page(),
        }
    }

    fn finish(self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.cursor + self.px(MARGIN_PX),
            ops: self.ops,
        }
    }
}

fn layout(document: &Document, scale: f32) -> Canvas {
    let mut layout = Layout::new(scale);
    for node in &document.nodes {
        layout.node(node);
    }
    layout.finish()
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, ExportError> {
        let font = |builtin| {
            doc.add_builtin_font(builtin)
                .map_err(|e| ExportError::Pdf(format!("font error: {e}")))
        };
        Ok(Self {
            regular: font(BuiltinFont::Helvetica)?,
            bold: font(BuiltinFont::HelveticaBold)?,
            oblique: font(BuiltinFont::HelveticaOblique)?,
        })
    }

    fn face(&self, face: Face) -> &IndirectFontRef {
        match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
            Face::Oblique => &self.oblique,
        }
    }
}

/// Render `document` as a multi-page A4 PDF
pub fn export_pdf(document: &Document, scale: f32) -> Result<Vec<u8>, ExportError> {
    if document.is_empty() {
        return Err(ExportError::EmptyDocument);
    }
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let canvas = layout(document, scale);
    let mm_per_px = A4_WIDTH_MM / canvas.width;
    let image_height = A4_WIDTH_MM / (canvas.width / canvas.height);
    let slices = paginate(image_height, A4_HEIGHT_MM);
    debug!(
        title = %document.title,
        pages = slices.len(),
        ops = canvas.ops.len(),
        "Laying out PDF export"
    );

    let (doc, first_page, first_layer) = PdfDocument::new(
        &document.title,
        Mm(A4_WIDTH_MM),
        Mm(A4_HEIGHT_MM),
        "Layer 1",
    );
    let fonts = Fonts::load(&doc)?;

    for slice in &slices {
        let layer = if slice.index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(
                Mm(A4_WIDTH_MM),
                Mm(A4_HEIGHT_MM),
                format!("Page {}", slice.index + 1),
            );
            doc.get_page(page).get_layer(layer)
        };

        for op in &canvas.ops {
            let top = op.anchor() * mm_per_px + slice.offset;
            if !(0.0..A4_HEIGHT_MM).contains(&top) {
                continue;
            }
            draw(&layer, &fonts, op, mm_per_px, A4_HEIGHT_MM - top);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("PDF buffer error: {e}")))
}

fn draw(layer: &PdfLayerReference, fonts: &Fonts, op: &DrawOp, mm_per_px: f32, y: f32) {
    match op {
        DrawOp::Text {
            x,
            size,
            face,
            text,
            ..
        } => {
            let points = size * mm_per_px / MM_PER_PT;
            layer.use_text(
                pdf_safe(text),
                points,
                Mm(x * mm_per_px),
                Mm(y),
                fonts.face(*face),
            );
        }
        DrawOp::Rule { x1, x2, .. } => {
            layer.set_outline_thickness(0.5);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(x1 * mm_per_px), Mm(y)), false),
                    (Point::new(Mm(x2 * mm_per_px), Mm(y)), false),
                ],
                is_closed: false,
            });
        }
    }
}

/// Builtin PDF fonts have no arrow glyph and no use for control characters
fn pdf_safe(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace('→', "->")
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let len = current.chars().count();
        if len + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_document(paragraphs: usize) -> Document {
        let mut document = Document::new("Protocollo Test");
        document.heading("Protocollo di Trattamento di Agopuntura", 1);
        for i in 0..paragraphs {
            document.paragraph(
                format!("Paragrafo {i}: ago infisso con rotazione uniforme, ritenzione trenta minuti."),
                TextStyle::Normal,
            );
        }
        document
    }

    #[test]
    fn three_and_a_half_pages_become_four() {
        let slices = paginate(3.5 * A4_HEIGHT_MM, A4_HEIGHT_MM);
        assert_eq!(slices.len(), 4);
        for (i, slice) in slices.iter().enumerate() {
            assert_eq!(slice.index, i);
            assert_eq!(slice.offset, -(i as f32) * A4_HEIGHT_MM);
        }
    }

    #[test]
    fn short_and_exact_heights() {
        assert_eq!(paginate(10.0, A4_HEIGHT_MM).len(), 1);
        assert_eq!(paginate(0.0, A4_HEIGHT_MM).len(), 1);
        assert_eq!(paginate(2.0 * A4_HEIGHT_MM, A4_HEIGHT_MM).len(), 2);
    }

    #[test]
    fn every_op_lands_on_exactly_one_page() {
        let canvas = layout(&long_document(120), 2.0);
        let mm_per_px = A4_WIDTH_MM / canvas.width;
        let slices = paginate(A4_WIDTH_MM / (canvas.width / canvas.height), A4_HEIGHT_MM);
        assert!(slices.len() > 1);

        for op in &canvas.ops {
            let hits = slices
                .iter()
                .filter(|slice| {
                    (0.0..A4_HEIGHT_MM).contains(&(op.anchor() * mm_per_px + slice.offset))
                })
                .count();
            assert_eq!(hits, 1, "{op:?}");
        }
    }

    #[test]
    fn scale_changes_resolution_not_page_count() {
        let document = long_document(60);
        let pages = |scale: f32| {
            let canvas = layout(&document, scale);
            paginate(A4_WIDTH_MM / (canvas.width / canvas.height), A4_HEIGHT_MM).len()
        };
        assert_eq!(pages(1.0), pages(2.0));
        assert_eq!(layout(&document, 2.0).width, 2.0 * PAGE_WIDTH_PX);
    }

    #[test]
    fn page_break_hint_starts_a_new_page() {
        let mut document = long_document(1);
        document.push(Node::PageBreakHint);
        document.paragraph("Legenda", TextStyle::Normal);
        let canvas = layout(&document, 1.0);
        let page_height = canvas.width * A4_HEIGHT_MM / A4_WIDTH_MM;
        assert!(canvas.ops.last().unwrap().anchor() > page_height);
    }

    #[test]
    fn wrap_respects_width_and_keeps_words() {
        let lines = wrap_text("uno due tre quattro cinque sei", 10);
        assert!(lines.iter().all(|line| line.chars().count() <= 10));
        assert_eq!(lines.join(" "), "uno due tre quattro cinque sei");
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn arrows_are_replaced_for_builtin_fonts() {
        assert_eq!(pdf_safe("LI4 → LR3"), "LI4 -> LR3");
        assert_eq!(pdf_safe("ANNA\u{7}BIANCHI"), "ANNABIANCHI");
    }

    #[test]
    fn exports_pdf_bytes() {
        let bytes = export_pdf(&long_document(80), 2.0).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_document_is_rejected() {
        let result = export_pdf(&Document::new("Vuoto"), 2.0);
        assert!(matches!(result, Err(ExportError::EmptyDocument)));
    }
}
