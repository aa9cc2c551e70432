use std::io::BufWriter;

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point,
};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_WIDTH: Mm = Mm(PAGE_WIDTH_MM);
const PAGE_HEIGHT: Mm = Mm(297.0);
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const MARGIN: f32 = 20.0;
const LAYER: &str = "Layer 1";

/// A4 document written top to bottom, one text line at a time. A line that
/// does not fit opens a new page.
pub struct PdfReport {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PdfReport {
    pub fn new(title: &str) -> Result<Self, String> {
        let (doc, page, layer) = PdfDocument::new(title, PAGE_WIDTH, PAGE_HEIGHT, LAYER);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| format!("font error: {e}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| format!("font error: {e}"))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self { doc, layer, font, bold, y: TOP, pages: 1 })
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn page_break(&mut self) {
        let (page, layer) = self.doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
        self.pages += 1;
    }

    pub fn line(&mut self, text: &str, size: f32, indent: f32, bold: bool) {
        let step = size * 0.5 + 1.5;
        if self.y - step < BOTTOM {
            self.page_break();
        }

        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(MARGIN + indent), Mm(self.y), font);
        self.y -= step;
    }

    pub fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    /// Horizontal rule across the text width.
    pub fn rule(&mut self) {
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH_MM - MARGIN), Mm(self.y)), false),
            ],
            is_closed: false,
        });
        self.gap(4.0);
    }

    pub fn finish(self) -> Result<Vec<u8>, String> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(|e| format!("save error: {e}"))?;
        buf.into_inner().map_err(|e| format!("buffer error: {e}"))
    }
}
