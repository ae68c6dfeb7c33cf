// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document composer — merge single-page ticket renders into one PDF using
// the `lopdf` crate, name it and fingerprint it.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};
use ticketpress_core::error::{Result, TicketpressError};
use ticketpress_core::{ComposedDocument, RenderedPage};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page may inherit from its `/Pages` ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Merges rendered pages, in the order given, into one document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentComposer;

impl DocumentComposer {
    pub fn new() -> Self {
        Self
    }

    /// Concatenate `pages` into a single PDF.
    ///
    /// Page order is the order of `pages`; the caller sorts by position.
    /// Each input must be a one-page document (see [`inspect_page`]).
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn compose(&self, pages: Vec<RenderedPage>) -> Result<ComposedDocument> {
        let mut iter = pages.into_iter();
        let first = iter
            .next()
            .ok_or(TicketpressError::EmptyBatch { submitted: 0 })?;

        let mut merged = load(&first.pdf, first.position)?;
        let mut references = vec![first.reference];

        for page in iter {
            let source = load(&page.pdf, page.position)?;
            let source_pages = source.get_pages();
            let mut page_numbers: Vec<u32> = source_pages.keys().copied().collect();
            page_numbers.sort();
            for page_num in page_numbers {
                clone_page_into(&source, &mut merged, source_pages[&page_num])?;
            }
            references.push(page.reference);
        }

        let mut bytes = Vec::new();
        merged.save_to(&mut bytes).map_err(|err| {
            TicketpressError::PdfError(format!("failed to serialise composed PDF: {}", err))
        })?;

        let page_count = merged.get_pages().len();
        if page_count != references.len() {
            return Err(TicketpressError::PdfError(format!(
                "composed {} pages from {} renders",
                page_count,
                references.len()
            )));
        }

        let filename = document_filename(&references);
        let sha256 = hash_bytes(&bytes);
        info!(%filename, page_count, bytes_len = bytes.len(), "Document composed");

        Ok(ComposedDocument {
            filename,
            bytes,
            page_count,
            references,
            sha256,
        })
    }
}

/// Check that `pdf` parses and holds exactly one page.
pub fn inspect_page(pdf: &[u8]) -> Result<()> {
    let doc = Document::load_mem(pdf).map_err(|err| {
        TicketpressError::PdfError(format!("render is not a readable PDF: {}", err))
    })?;
    match doc.get_pages().len() {
        1 => Ok(()),
        n => Err(TicketpressError::PdfError(format!(
            "render produced {} pages, expected 1",
            n
        ))),
    }
}

/// `ticket_<ref>.pdf` for one page, `tickets_<first>_to_<last>.pdf` otherwise.
pub fn document_filename(references: &[String]) -> String {
    match references {
        [] => "tickets.pdf".to_string(),
        [only] => format!("ticket_{}.pdf", sanitize_reference(only)),
        [first, .., last] => format!(
            "tickets_{}_to_{}.pdf",
            sanitize_reference(first),
            sanitize_reference(last)
        ),
    }
}

/// Restrict a reference to `[A-Za-z0-9._-]` so it is safe in a filename.
pub fn sanitize_reference(reference: &str) -> String {
    let replaced: String = reference
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// SHA-256 of `data` as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn load(pdf: &[u8], position: usize) -> Result<Document> {
    Document::load_mem(pdf).map_err(|err| {
        TicketpressError::PdfError(format!("failed to load page for record {}: {}", position, err))
    })
}

/// Clone one page (and everything it references) from `source` into
/// `target`, appending it as the last page.
fn clone_page_into(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<()> {
    let page_dict = source
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|err| {
            TicketpressError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

    let mut memo = HashMap::new();
    let mut cloned = clone_dict(source, target, page_dict, &mut memo)?;

    // Attributes the page inherits from the source page tree must become its
    // own, since it gets a new parent.
    for key in INHERITABLE {
        if cloned.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(source, page_dict, key) {
            let value = deep_clone_object(source, target, value, &mut memo)?;
            cloned.set(key.to_vec(), value);
        }
    }

    let pages_id = pages_root(target)?;
    cloned.set("Parent", Object::Reference(pages_id));
    let cloned_id = target.add_object(Object::Dictionary(cloned));

    if let Ok(Object::Dictionary(pages_dict)) = target.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(cloned_id));
        }
        if let Ok(count_obj) = pages_dict.get_mut(b"Count")
            && let Object::Integer(count) = count_obj
        {
            *count += 1;
        }
    }

    debug!(?page_id, ?cloned_id, "Page appended");
    Ok(())
}

fn pages_root(target: &Document) -> Result<ObjectId> {
    let catalog = target
        .catalog()
        .map_err(|err| TicketpressError::PdfError(format!("no catalog: {}", err)))?;
    match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(TicketpressError::PdfError(
            "/Pages is not a reference".to_string(),
        )),
        Err(err) => Err(TicketpressError::PdfError(format!("no /Pages: {}", err))),
    }
}

/// Walk `/Parent` links looking for `key`.
fn inherited_attribute<'a>(
    source: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    // Bounded walk; a malformed tree may loop.
    for _ in 0..32 {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = source.get_object(parent_id).ok()?.as_dict().ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
    }
    None
}

/// Deep-clone `object` into `target`, following references.
///
/// `/Parent` is skipped (the caller patches it). `memo` maps source ids to
/// target ids so shared resources are copied once and cycles terminate.
fn deep_clone_object(
    source: &Document,
    target: &mut Document,
    object: &Object,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dict(source, target, dict, memo)?)),
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(deep_clone_object(source, target, item, memo)?);
            }
            Ok(Object::Array(new_arr))
        }
        Object::Reference(ref_id) => {
            if let Some(existing) = memo.get(ref_id) {
                return Ok(Object::Reference(*existing));
            }
            match source.get_object(*ref_id) {
                Ok(referenced) => {
                    let new_id = target.new_object_id();
                    memo.insert(*ref_id, new_id);
                    let cloned = deep_clone_object(source, target, referenced, memo)?;
                    target.objects.insert(new_id, cloned);
                    Ok(Object::Reference(new_id))
                }
                Err(err) => {
                    warn!(?ref_id, %err, "Cannot resolve reference, using Null");
                    Ok(Object::Null)
                }
            }
        }
        Object::Stream(stream) => {
            let dict = clone_dict(source, target, &stream.dict, memo)?;
            let mut cloned = Stream::new(dict, stream.content.clone());
            cloned.allows_compression = stream.allows_compression;
            Ok(Object::Stream(cloned))
        }
        other => Ok(other.clone()),
    }
}

fn clone_dict(
    source: &Document,
    target: &mut Document,
    dict: &Dictionary,
    memo: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        let cloned_value = deep_clone_object(source, target, value, memo)?;
        new_dict.set(key.clone(), cloned_value);
    }
    Ok(new_dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::renderer::{PageRenderer, PdfTicketRenderer};
    use chrono::Utc;
    use ticketpress_core::{EventTime, PaperSize, Price, TicketPage, TicketRecord};

    fn render(position: usize, reference: &str) -> RenderedPage {
        let page = TicketPage {
            position,
            record: TicketRecord {
                title: format!("Show {reference}"),
                date_time: EventTime::Text("2026-05-01 20:00".into()),
                location: "Main Hall".into(),
                reference: reference.into(),
                ticket_type: "General".into(),
                price: Price::Free,
                address: None,
                organizer: "Event Organizer".into(),
                event_type: "EVENT".into(),
                image: None,
                qr_code: None,
                sequence: position as u32,
                batch_size: 3,
                generated_at: Utc::now(),
            },
            image: None,
            qr_code: None,
            paper_size: PaperSize::Ticket,
        };
        PdfTicketRenderer::new().render(&page).unwrap()
    }

    #[test]
    fn compose_keeps_order_and_counts_pages() {
        let pages = vec![render(1, "A"), render(2, "B"), render(3, "C")];
        let doc = DocumentComposer::new().compose(pages).unwrap();

        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.references, vec!["A", "B", "C"]);
        assert_eq!(doc.filename, "tickets_A_to_C.pdf");
        assert_eq!(doc.sha256, hash_bytes(&doc.bytes));

        let reloaded = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 3);
    }

    #[test]
    fn single_page_document_uses_singular_name() {
        let doc = DocumentComposer::new()
            .compose(vec![render(1, "TKT-001")])
            .unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.filename, "ticket_TKT-001.pdf");
    }

    #[test]
    fn empty_input_is_empty_batch() {
        let err = DocumentComposer::new().compose(Vec::new()).unwrap_err();
        assert!(matches!(err, TicketpressError::EmptyBatch { .. }));
    }

    #[test]
    fn corrupt_page_is_pdf_error() {
        let bad = RenderedPage {
            position: 2,
            reference: "X".into(),
            pdf: b"not a pdf".to_vec(),
        };
        let err = DocumentComposer::new()
            .compose(vec![render(1, "A"), bad])
            .unwrap_err();
        assert!(matches!(err, TicketpressError::PdfError(_)));
    }

    #[test]
    fn inspect_accepts_one_page_only() {
        let one = render(1, "A");
        assert!(inspect_page(&one.pdf).is_ok());

        let two = DocumentComposer::new()
            .compose(vec![render(1, "A"), render(2, "B")])
            .unwrap();
        assert!(inspect_page(&two.bytes).is_err());
        assert!(inspect_page(b"garbage").is_err());
    }

    #[test]
    fn references_are_sanitized_for_filenames() {
        assert_eq!(sanitize_reference("AB/12 x"), "AB_12_x");
        assert_eq!(sanitize_reference("__ok__"), "ok");
        assert_eq!(sanitize_reference("../"), "unknown");
        assert_eq!(sanitize_reference("日本"), "unknown");
        assert_eq!(
            document_filename(&["a b".into(), "mid".into(), "c/d".into()]),
            "tickets_a_b_to_c_d.pdf"
        );
    }

    #[test]
    fn sha256_of_known_value() {
        assert_eq!(
            hash_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
