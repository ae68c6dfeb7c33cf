// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page renderer — turns one validated ticket into one fixed-size PDF page
// using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: a page is a `PdfPage` holding a
// `Vec<Op>`, serialised via `PdfDocument::save()`. Every render builds its
// own document, so renderers are safe to call from many threads at once.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use ticketpress_core::error::TicketpressError;
use ticketpress_core::{ImageAsset, RenderedPage, TicketPage};
use tracing::{debug, instrument, warn};

/// Contract between the pipeline and a ticket layout.
///
/// Implementations must produce exactly one page of `page.paper_size`, must
/// not share mutable state between calls, and report failures for the one
/// record only.
pub trait PageRenderer: Send + Sync {
    fn render(&self, page: &TicketPage) -> Result<RenderedPage, TicketpressError>;
}

/// Default ticket layout: artwork on the left panel, details beside it,
/// QR code on a tear-off stub at the right.
#[derive(Debug, Clone)]
pub struct PdfTicketRenderer {
    /// Resolution at which embedded raster images are placed.
    dpi: f32,
    /// Outer margin on every edge.
    margin_mm: f32,
}

impl Default for PdfTicketRenderer {
    fn default() -> Self {
        Self {
            dpi: 150.0,
            margin_mm: 6.0,
        }
    }
}

/// Rectangle on the page, in points from the bottom-left corner.
#[derive(Debug, Clone, Copy)]
struct Frame {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl PdfTicketRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an asset into printpdf's raw RGB representation.
    fn raw_image(asset: &ImageAsset) -> Result<RawImage, TicketpressError> {
        let decoded = ::image::load_from_memory(&asset.bytes).map_err(|err| {
            TicketpressError::ImageError(format!("failed to decode image for page: {}", err))
        })?;
        let rgb = decoded.to_rgb8();
        Ok(RawImage {
            width: rgb.width() as usize,
            height: rgb.height() as usize,
            pixels: RawImageData::U8(rgb.into_raw()),
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        })
    }

    /// Place `asset` centred inside `frame`, scaled to fit.
    ///
    /// Undecodable assets are skipped: the record already carries a degraded
    /// notice and a ticket without artwork beats no ticket.
    fn place_image(
        &self,
        doc: &mut PdfDocument,
        ops: &mut Vec<Op>,
        asset: &ImageAsset,
        frame: Frame,
        label: &str,
    ) {
        let raw = match Self::raw_image(asset) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(label, %err, "Skipping image on page");
                return;
            }
        };
        if raw.width == 0 || raw.height == 0 {
            return;
        }

        let img_w_pt = raw.width as f32 / self.dpi * 72.0;
        let img_h_pt = raw.height as f32 / self.dpi * 72.0;
        let scale = (frame.width / img_w_pt).min(frame.height / img_h_pt);
        let rendered_w = img_w_pt * scale;
        let rendered_h = img_h_pt * scale;

        let xobject_id = doc.add_image(&raw);
        ops.push(Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(frame.x + (frame.width - rendered_w) / 2.0)),
                translate_y: Some(Pt(frame.y + (frame.height - rendered_h) / 2.0)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(self.dpi),
                rotate: None,
            },
        });
        debug!(label, rendered_w, rendered_h, scale, "Image placed on page");
    }
}

impl PageRenderer for PdfTicketRenderer {
    #[instrument(skip_all, fields(position = page.position, reference = %page.record.reference))]
    fn render(&self, page: &TicketPage) -> Result<RenderedPage, TicketpressError> {
        let record = &page.record;
        let (w_mm, h_mm) = page.paper_size.dimensions_mm();
        let (page_w, page_h) = (Mm(w_mm as f32), Mm(h_mm as f32));
        let page_w_pt = page_w.into_pt().0;
        let page_h_pt = page_h.into_pt().0;
        let margin_pt = Mm(self.margin_mm).into_pt().0;

        if page_w_pt <= 4.0 * margin_pt || page_h_pt <= 2.0 * margin_pt {
            return Err(TicketpressError::Render(format!(
                "page {}x{}mm is too small for the ticket layout",
                w_mm, h_mm
            )));
        }

        // Stub takes a third of the width, capped at 60 mm.
        let stub_w_pt = (page_w_pt / 3.0).min(Mm(60.0).into_pt().0);
        let main_w_pt = page_w_pt - stub_w_pt;
        let art_w_pt = if page.image.is_some() { main_w_pt * 0.35 } else { 0.0 };
        let text_w_pt = main_w_pt - art_w_pt - 2.0 * margin_pt;
        let text_x_pt = margin_pt + art_w_pt;

        let mut doc = PdfDocument::new(&format!("Ticket {}", record.reference));
        let mut ops: Vec<Op> = Vec::new();

        // -- Details ----------------------------------------------------------
        let mut lines: Vec<(f32, BuiltinFont, String)> = vec![
            (7.0, BuiltinFont::Helvetica, record.event_type.to_uppercase()),
            (15.0, BuiltinFont::HelveticaBold, record.title.clone()),
            (9.5, BuiltinFont::Helvetica, record.date_time.to_string()),
            (9.5, BuiltinFont::Helvetica, record.location.clone()),
        ];
        if let Some(address) = &record.address {
            lines.push((7.5, BuiltinFont::Helvetica, address.clone()));
        }
        lines.push((7.5, BuiltinFont::Helvetica, format!("Organised by {}", record.organizer)));
        lines.push((
            11.0,
            BuiltinFont::HelveticaBold,
            format!("{} - {}", record.ticket_type, record.price),
        ));
        lines.push((
            7.5,
            BuiltinFont::Helvetica,
            format!("Ticket {} / {}", record.sequence, record.batch_size),
        ));

        let mut cursor_y = page_h_pt - margin_pt;
        for (size, font, text) in lines {
            cursor_y -= size * 1.35;
            if cursor_y < margin_pt {
                warn!("Ticket details overflow the page, truncating");
                break;
            }
            write_line(&mut ops, text_x_pt, cursor_y, size, font, &fit_text(&text, text_w_pt, size));
        }

        write_line(
            &mut ops,
            margin_pt,
            margin_pt * 0.6,
            5.5,
            BuiltinFont::Helvetica,
            &format!("Generated {}", record.generated_at.format("%Y-%m-%d %H:%M UTC")),
        );

        // -- Artwork ----------------------------------------------------------
        if let Some(asset) = &page.image {
            let frame = Frame {
                x: margin_pt,
                y: margin_pt,
                width: (art_w_pt - margin_pt).max(1.0),
                height: page_h_pt - 2.0 * margin_pt,
            };
            self.place_image(&mut doc, &mut ops, asset, frame, "artwork");
        }

        // -- Stub: QR code and reference --------------------------------------
        let ref_size = 7.0;
        let qr_side = (stub_w_pt - 2.0 * margin_pt)
            .min(page_h_pt - 3.0 * margin_pt - ref_size)
            .max(0.0);
        match &page.qr_code {
            Some(_) if qr_side <= 0.0 => {
                warn!("No room for the QR code on this page size, leaving it out");
            }
            Some(asset) => {
                let frame = Frame {
                    x: main_w_pt + (stub_w_pt - qr_side) / 2.0,
                    y: page_h_pt - margin_pt - qr_side,
                    width: qr_side,
                    height: qr_side,
                };
                self.place_image(&mut doc, &mut ops, asset, frame, "qr_code");
            }
            None => {}
        }
        write_line(
            &mut ops,
            main_w_pt + margin_pt,
            margin_pt,
            ref_size,
            BuiltinFont::HelveticaBold,
            &fit_text(&record.reference, stub_w_pt - 2.0 * margin_pt, ref_size),
        );

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let pdf = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        if pdf.is_empty() {
            return Err(TicketpressError::Render("renderer produced no output".into()));
        }

        debug!(pdf_bytes = pdf.len(), "Ticket page rendered");
        Ok(RenderedPage {
            position: page.position,
            reference: record.reference.clone(),
            pdf,
        })
    }
}

// -- Text helpers -------------------------------------------------------------

fn write_line(ops: &mut Vec<Op>, x_pt: f32, y_pt: f32, size: f32, font: BuiltinFont, text: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x_pt),
            y: Pt(y_pt),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font: font.clone(),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text.to_owned())],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Truncate `text` to roughly fit `width_pt` at `size_pt`.
///
/// Helvetica's average glyph is about half the font size wide.
fn fit_text(text: &str, width_pt: f32, size_pt: f32) -> String {
    let max_chars = (width_pt / (0.5 * size_pt)).floor().max(4.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept.trim_end())
}
