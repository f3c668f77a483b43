//! PDF asset data sheets.
//!
//! Pages are A4 portrait in PDF points. Text uses the standard Helvetica
//! fonts with WinAnsi encoding, so only Latin-1 text survives; other
//! characters print as `?` and labels use the English field names.

use crate::detail::AssetDetail;
use crate::error::{AppError, Result};
use crate::graph::location_marker_rgb;
use crate::qr::QrMatrix;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;

const PAGE_W: f32 = 595.0;
const PAGE_H: f32 = 842.0;
const MARGIN: f32 = 42.0;
const BOTTOM: f32 = 56.0;
const LABEL_W: f32 = 170.0;
const LINE_H: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;

const MAP_W: u32 = 240;
const MAP_H: u32 = 120;
const QR_SIDE: f32 = 90.0;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// What to include in a data sheet besides the field groups.
#[derive(Clone, Debug)]
pub struct PdfOptions {
    pub include_qr: bool,
    pub include_map: bool,
    /// Printed in every page footer.
    pub generated_at: String,
}

impl Default for PdfOptions {
    fn default() -> Self {
        PdfOptions {
            include_qr: true,
            include_map: true,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Encode text for a WinAnsi-encoded standard font.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            0x09 | 0x0A | 0x0D => b' ',
            _ => b'?',
        })
        .collect()
}

fn is_win_ansi(text: &str) -> bool {
    text.chars().all(|c| matches!(c as u32, 0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0xA0..=0xFF))
}

const LOSSY_NOTICE: &str = "Non-Latin text is shown as ?; the HTML export keeps it.";

// Footer notice for sheets whose values the standard fonts cannot print.
fn lossy_notice(details: &[AssetDetail]) -> Option<&'static str> {
    let lossy = details.iter().any(|d| {
        !is_win_ansi(&d.title)
            || d.asset_id.as_deref().is_some_and(|id| !is_win_ansi(id))
            || d.groups.iter().flat_map(|g| &g.rows).any(|r| !is_win_ansi(&r.value))
    });
    lossy.then_some(LOSSY_NOTICE)
}

/// Rough Helvetica advance width; good enough for wrapping and alignment.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| match c {
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.25,
            ' ' | 'f' | 't' | 'r' | 'I' | '-' | '(' | ')' | '/' => 0.33,
            'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.85,
            'A'..='Z' => 0.67,
            _ => 0.55,
        })
        .sum::<f32>()
        * size
}

/// Greedy word wrap to `width` points; words longer than a line are split.
fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() { word.to_string() } else { format!("{} {}", line, word) };
            if text_width(&candidate, size) <= width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for c in word.chars() {
                line.push(c);
                if text_width(&line, size) > width && line.chars().count() > 1 {
                    let last = line.pop().unwrap_or(c);
                    lines.push(std::mem::take(&mut line));
                    line.push(last);
                }
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn deflated_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, deflate(data)?))
}

fn real(v: f32) -> Object {
    v.into()
}

fn int(v: i64) -> Object {
    Object::Integer(v)
}

#[derive(Default)]
struct PageBuf {
    ops: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

struct Layout<'d> {
    doc: &'d mut Document,
    pages: Vec<PageBuf>,
    y: f32,
    image_count: usize,
}

impl<'d> Layout<'d> {
    fn new(doc: &'d mut Document) -> Self {
        Layout {
            doc,
            pages: Vec::new(),
            y: 0.0,
            image_count: 0,
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(PageBuf::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last].ops
    }

    fn new_page(&mut self) {
        self.pages.push(PageBuf::default());
        self.y = PAGE_H - MARGIN;
        self.text(REGULAR, 9.0, MARGIN, self.y, "Asset Data Sheet");
        self.rule(self.y - 6.0);
        self.y -= 28.0;
    }

    fn ensure(&mut self, height: f32) {
        if self.pages.is_empty() || self.y - height < BOTTOM {
            self.new_page();
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![font.into(), real(size)]));
        ops.push(Operation::new("Td", vec![real(x), real(y)]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]));
        ops.push(Operation::new("ET", vec![]));
    }

    fn rule(&mut self, y: f32) {
        let ops = self.ops();
        ops.push(Operation::new("w", vec![real(0.5)]));
        ops.push(Operation::new("m", vec![real(MARGIN), real(y)]));
        ops.push(Operation::new("l", vec![real(PAGE_W - MARGIN), real(y)]));
        ops.push(Operation::new("S", vec![]));
    }

    fn title(&mut self, title: &str) {
        let lines = wrap(title, 14.0, PAGE_W - 2.0 * MARGIN);
        self.ensure(lines.len() as f32 * 18.0 + 6.0);
        for line in lines {
            self.text(BOLD, 14.0, MARGIN, self.y, &line);
            self.y -= 18.0;
        }
        self.y -= 6.0;
    }

    fn heading(&mut self, heading: &str) {
        self.ensure(LINE_H * 3.0);
        self.y -= 4.0;
        self.text(BOLD, 12.0, MARGIN, self.y, heading);
        self.rule(self.y - 4.0);
        self.y -= LINE_H + 4.0;
    }

    fn field(&mut self, label: &str, value: &str) {
        let lines = wrap(value, BODY_SIZE, PAGE_W - 2.0 * MARGIN - LABEL_W);
        self.ensure(LINE_H);
        self.text(BOLD, BODY_SIZE, MARGIN, self.y, label);
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                self.ensure(LINE_H);
            }
            self.text(REGULAR, BODY_SIZE, MARGIN + LABEL_W, self.y, line);
            self.y -= LINE_H;
        }
    }

    fn image_rgb(&mut self, pixels: &[u8], w: u32, h: u32, x: f32, y: f32, draw_w: f32, draw_h: f32) -> Result<()> {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => int(w as i64),
            "Height" => int(h as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => int(8),
        };
        let id = self.doc.add_object(deflated_stream(dict, pixels)?);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![real(draw_w), real(0.0), real(0.0), real(draw_h), real(x), real(y)],
        ));
        ops.push(Operation::new("Do", vec![name.as_str().into()]));
        ops.push(Operation::new("Q", vec![]));

        if let Some(page) = self.pages.last_mut() {
            page.images.push((name, id));
        }
        Ok(())
    }

    fn qr(&mut self, matrix: &QrMatrix, x: f32, top: f32, side: f32) {
        let module = side / matrix.size() as f32;
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("g", vec![real(0.0)]));
        for (mx, my, len) in matrix.dark_runs() {
            ops.push(Operation::new(
                "re",
                vec![
                    real(x + mx as f32 * module),
                    real(top - (my as f32 + 1.0) * module),
                    real(len as f32 * module),
                    real(module),
                ],
            ));
        }
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn asset(&mut self, detail: &AssetDetail, options: &PdfOptions) -> Result<()> {
        self.new_page();
        self.title(&detail.title);

        for group in &detail.groups {
            self.heading(&group.title);
            for row in &group.rows {
                self.field(&row.label, &row.value);
            }
            self.y -= 4.0;
        }

        let map = match (options.include_map, detail.coordinates) {
            (true, Some(coords)) => Some(location_marker_rgb(coords, MAP_W, MAP_H)?),
            _ => None,
        };
        let qr = match (options.include_qr, detail.asset_id.as_deref()) {
            (true, Some(id)) => Some(QrMatrix::encode(id)?),
            _ => None,
        };
        if map.is_none() && qr.is_none() {
            return Ok(());
        }

        let block = (MAP_H as f32).max(QR_SIDE) + 24.0;
        self.ensure(block);
        let top = self.y - 8.0;
        if let Some(pixels) = map {
            let (w, h) = (MAP_W as f32, MAP_H as f32);
            self.image_rgb(&pixels, MAP_W, MAP_H, MARGIN, top - h, w, h)?;
            if let Some(c) = detail.coordinates {
                self.text(REGULAR, 8.0, MARGIN, top - h - 10.0, &format!("{:.5}, {:.5}", c.lat, c.lon));
            }
        }
        if let Some(matrix) = qr {
            self.qr(&matrix, PAGE_W - MARGIN - QR_SIDE, top, QR_SIDE);
        }
        self.y = top - block;
        Ok(())
    }
}

/// Build a PDF with one data sheet per asset
///
/// Each asset starts on a new page and continues onto further pages when its
/// fields do not fit. The optional location marker is drawn when the asset's
/// coordinates parse; the optional QR code encodes the asset identifier.
///
/// Text goes through the standard Helvetica fonts, so Arabic values print as
/// `?`. When any sheet is affected every footer says so and points to the
/// HTML export, which renders them.
///
/// # Returns
/// * The PDF bytes, or an export error (no partial document is returned)
pub fn assets_to_pdf(details: &[AssetDetail], options: &PdfOptions) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = |base: &str| {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(base.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        }
    };
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));

    let pages = {
        let mut layout = Layout::new(&mut doc);
        if details.is_empty() {
            layout.new_page();
            let y = layout.y;
            layout.text(REGULAR, BODY_SIZE, MARGIN, y, "No matching assets.");
        }
        for detail in details {
            layout.asset(detail, options)?;
        }
        layout.pages
    };

    let total = pages.len();
    let footer_left = match lossy_notice(details) {
        Some(notice) => format!("{}  {}", options.generated_at, notice),
        None => options.generated_at.clone(),
    };
    let mut kids = Vec::with_capacity(total);
    for (i, mut page) in pages.into_iter().enumerate() {
        let footer = format!("Page {}/{}", i + 1, total);
        page.ops.extend(footer_ops(&footer_left, &footer));

        let mut xobjects = Dictionary::new();
        for (name, id) in &page.images {
            xobjects.set(name.as_str(), *id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR => regular_id,
                BOLD => bold_id,
            },
            "XObject" => xobjects,
        });

        let content = Content { operations: page.ops }
            .encode()
            .map_err(|e| AppError::Export(e.to_string()))?;
        let content_id = doc.add_object(deflated_stream(Dictionary::new(), &content)?);

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![int(0), int(0), real(PAGE_W), real(PAGE_H)],
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => int(total as i64),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Asset Data Sheet"),
        "Producer" => Object::string_literal(concat!("asset-register ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AppError::Export(e.to_string()))?;
    log::info!(
        "exported {} assets to pdf ({} pages, {} bytes)",
        details.len(),
        total,
        buffer.len()
    );
    Ok(buffer)
}

fn footer_ops(generated_at: &str, page_label: &str) -> Vec<Operation> {
    let size = 8.0;
    let right_x = PAGE_W - MARGIN - text_width(page_label, size);
    let mut ops = Vec::new();
    for (x, text) in [(MARGIN, generated_at), (right_x, page_label)] {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![REGULAR.into(), real(size)]));
        ops.push(Operation::new("Td", vec![real(x), real(24.0)]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::Coordinates;
    use crate::detail::{DetailGroup, DetailRow};

    fn detail(id: &str, rows: usize, coords: Option<Coordinates>) -> AssetDetail {
        AssetDetail {
            asset_id: Some(id.to_string()),
            title: format!("{} - Water pump", id),
            groups: vec![DetailGroup {
                title: "Identification".into(),
                arabic_title: "أولاً: بيانات التعريف".into(),
                rows: (0..rows)
                    .map(|i| DetailRow {
                        label: format!("Field {}", i),
                        arabic_label: String::new(),
                        value: format!("Value {}", i),
                    })
                    .collect(),
            }],
            coordinates: coords,
        }
    }

    fn options() -> PdfOptions {
        PdfOptions {
            generated_at: "2024-01-01 09:00".into(),
            ..PdfOptions::default()
        }
    }

    #[test]
    fn one_page_per_short_asset() {
        let coords = Some(Coordinates { lat: 24.7136, lon: 46.6753 });
        let details = vec![detail("A-1", 5, coords), detail("A-2", 5, None)];
        let bytes = assets_to_pdf(&details, &options()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn long_assets_continue_on_next_page() {
        let bytes = assets_to_pdf(&[detail("A-1", 80, None)], &options()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 2);
    }

    #[test]
    fn empty_selection_still_yields_a_document() {
        let bytes = assets_to_pdf(&[], &options()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(encode_win_ansi("Café"), b"Caf\xe9".to_vec());
        assert_eq!(encode_win_ansi("مضخة 1"), b"???? 1".to_vec());
    }

    #[test]
    fn arabic_values_add_a_footer_notice() {
        let latin = detail("A-1", 2, None);
        assert_eq!(lossy_notice(std::slice::from_ref(&latin)), None);

        let mut arabic = detail("A-2", 2, None);
        arabic.groups[0].rows[1].value = "مضخة مياه".into();
        assert_eq!(lossy_notice(&[latin.clone(), arabic.clone()]), Some(LOSSY_NOTICE));

        let bytes = assets_to_pdf(&[arabic], &options()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let needle = LOSSY_NOTICE.as_bytes();
        assert!(content.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn wrap_splits_long_values() {
        let lines = wrap("alpha beta gamma delta", 10.0, 60.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, 10.0) <= 60.0));
        let lines = wrap(&"x".repeat(200), 10.0, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(wrap("", 10.0, 100.0), vec![String::new()]);
    }
}
