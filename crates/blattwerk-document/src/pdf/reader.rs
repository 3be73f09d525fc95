// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open, inspect, merge, split, rotate, compress, repair and
// watermark existing PDF documents using the `lopdf` crate.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use blattwerk_core::error::{BlattwerkError, Result};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];

/// Guard against cyclic /Parent chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Name under which the watermark form is registered in page resources.
const WATERMARK_XOBJECT: &[u8] = b"BwWatermark";

/// US Letter, used when a page carries no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Reads and manipulates existing PDF files.
///
/// Wraps `lopdf::Document`. Every transformation works on a clone and returns
/// the serialised result, so one reader can serve several operations.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = load(data)?;
        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub(crate) fn document(&self) -> &Document {
        &self.document
    }

    /// Concatenated text of all pages, in page order.
    #[instrument(skip(self))]
    pub fn extract_text(&self) -> Result<String> {
        let pages: Vec<u32> = self.document.get_pages().keys().copied().collect();
        self.document
            .extract_text(&pages)
            .map_err(|err| BlattwerkError::unsupported(format!("text extraction failed: {err}")))
    }

    /// Text of each page separately, in page order. Pages whose text cannot
    /// be decoded yield an empty string.
    pub fn page_texts(&self) -> Vec<String> {
        self.document
            .get_pages()
            .keys()
            .map(|page_number| {
                self.document
                    .extract_text(&[*page_number])
                    .unwrap_or_else(|err| {
                        warn!(page_number, %err, "page text not extractable");
                        String::new()
                    })
            })
            .collect()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract a single page (1-indexed) into a new standalone PDF document.
    #[instrument(skip(self), fields(page_number))]
    pub fn extract_page(&self, page_number: u32) -> Result<Vec<u8>> {
        let total = self.page_count() as u32;
        if page_number == 0 || page_number > total {
            return Err(BlattwerkError::unsupported_argument(format!(
                "page {page_number} out of range (document has {total} pages)"
            )));
        }

        let mut doc = self.document.clone();
        let others: Vec<u32> = (1..=total).filter(|p| *p != page_number).collect();
        doc.delete_pages(&others);
        doc.prune_objects();

        let output = save(&mut doc)?;
        debug!(page_number, output_bytes = output.len(), "Page extracted");
        Ok(output)
    }

    /// Split the document into one single-page PDF per page, in page order.
    #[instrument(skip(self))]
    pub fn split_pages(&self) -> Result<Vec<Vec<u8>>> {
        let total = self.page_count() as u32;
        info!(total, "Splitting PDF into single pages");
        (1..=total).map(|n| self.extract_page(n)).collect()
    }

    // -- Restructuring --------------------------------------------------------

    /// Merge this document with one or more other PDF byte-slices. Pages
    /// appear in the order: self, then each supplied document in order.
    #[instrument(skip_all, fields(additional_count = others.len()))]
    pub fn merge(&self, others: &[&[u8]]) -> Result<Vec<u8>> {
        info!(
            base_pages = self.page_count(),
            additional_documents = others.len(),
            "Merging PDFs"
        );

        let mut merged = self.document.clone();
        let root_pages = root_pages_id(&merged)?;

        for (index, other_bytes) in others.iter().enumerate() {
            let mut other = load(other_bytes).map_err(|err| match err {
                BlattwerkError::Handler { kind, message } => BlattwerkError::handler(
                    kind,
                    format!("additional PDF #{}: {}", index + 1, message),
                ),
                other => other,
            })?;
            // Shift every object id past the merged document's range.
            other.renumber_objects_with(merged.max_id + 1);

            // Pages leave their own tree, so inherited attributes must be
            // copied onto each page first.
            let page_ids: Vec<ObjectId> = other.get_pages().into_values().collect();
            let mut adopted = Vec::with_capacity(page_ids.len());
            for page_id in page_ids {
                let mut page = other
                    .get_dictionary(page_id)
                    .map_err(|err| {
                        BlattwerkError::corrupt(format!("cannot read page {page_id:?}: {err}"))
                    })?
                    .clone();
                for key in INHERITABLE {
                    if !page.has(key) {
                        if let Some(value) = inherited_attribute(&other, page_id, key) {
                            page.set(key.to_vec(), value);
                        }
                    }
                }
                page.set("Parent", Object::Reference(root_pages));
                adopted.push((page_id, page));
            }

            merged.max_id = merged.max_id.max(other.max_id);
            merged.objects.extend(std::mem::take(&mut other.objects));
            for (page_id, page) in adopted {
                merged.objects.insert(page_id, Object::Dictionary(page));
                append_kid(&mut merged, root_pages, page_id)?;
            }
        }

        // Drops the other documents' catalogs and page tree nodes.
        merged.prune_objects();

        let output = save(&mut merged)?;
        debug!(
            pages = merged.get_pages().len(),
            output_bytes = output.len(),
            "Merge complete"
        );
        Ok(output)
    }

    /// Rotate every page by `degrees` (must be a multiple of 90), on top of
    /// any rotation the page already carries.
    #[instrument(skip(self), fields(degrees))]
    pub fn rotate_all(&self, degrees: i32) -> Result<Vec<u8>> {
        if degrees % 90 != 0 {
            return Err(BlattwerkError::unsupported_argument(format!(
                "rotation must be a multiple of 90, got {degrees}"
            )));
        }

        let mut doc = self.document.clone();
        for (page_number, page_id) in doc.get_pages() {
            let existing_rotation = inherited_attribute(&doc, page_id, b"Rotate")
                .and_then(|value| value.as_i64().ok())
                .unwrap_or(0);
            // Both terms are reduced first; any i32 angle is accepted.
            let new_rotation = (existing_rotation.rem_euclid(360)
                + i64::from(degrees).rem_euclid(360))
            .rem_euclid(360);

            let page = doc.get_dictionary_mut(page_id).map_err(|err| {
                BlattwerkError::corrupt(format!("cannot update page {page_number}: {err}"))
            })?;
            page.set("Rotate", new_rotation);
            debug!(page_number, existing_rotation, new_rotation, "Page rotated");
        }

        save(&mut doc)
    }

    /// Drop unreferenced objects and empty streams, renumber, and
    /// Flate-compress every stream.
    #[instrument(skip(self))]
    pub fn compress(&self) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        let pruned = doc.prune_objects().len();
        let empty = doc.delete_zero_length_streams().len();
        doc.renumber_objects();
        doc.compress();

        let output = save(&mut doc)?;
        info!(pruned, empty, output_bytes = output.len(), "PDF compressed");
        Ok(output)
    }

    /// Rebuild a damaged document: recompute page-tree counts, drop orphaned
    /// objects, and write a fresh cross-reference table.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn repair(data: &[u8]) -> Result<Vec<u8>> {
        let mut doc = load(data)?;
        let root_pages = root_pages_id(&doc)?;
        let pages = recount_page_tree(&mut doc, root_pages, 0)?;
        if pages == 0 {
            return Err(BlattwerkError::corrupt("document has no recoverable pages"));
        }
        doc.prune_objects();
        doc.renumber_objects();

        let output = save(&mut doc)?;
        info!(pages, output_bytes = output.len(), "PDF repaired");
        Ok(output)
    }

    /// Stamp the first page of `stamp` onto every page of this document,
    /// scaled to fit and centred.
    #[instrument(skip_all, fields(stamp_len = stamp.len()))]
    pub fn watermark(&self, stamp: &[u8]) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        let mut stamp_doc = load(stamp)?;
        stamp_doc.renumber_objects_with(doc.max_id + 1);

        let (stamp_page_number, stamp_page) = stamp_doc
            .get_pages()
            .into_iter()
            .next()
            .ok_or_else(|| BlattwerkError::corrupt("watermark document has no pages"))?;
        debug!(stamp_page_number, "Using watermark page");

        let stamp_box = media_box(&stamp_doc, stamp_page);
        let stamp_content = stamp_doc.get_page_content(stamp_page).map_err(|err| {
            BlattwerkError::corrupt(format!("cannot read watermark content: {err}"))
        })?;
        let stamp_resources = effective_resources(&stamp_doc, stamp_page);

        doc.max_id = doc.max_id.max(stamp_doc.max_id);
        doc.objects.extend(std::mem::take(&mut stamp_doc.objects));

        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => stamp_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
                "Resources" => stamp_resources,
            },
            stamp_content,
        );
        let form_id = doc.add_object(form);

        let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

        for (page_number, page_id) in doc.get_pages() {
            let page_box = media_box(&doc, page_id);
            let placement = fit_transform(&stamp_box, &page_box);
            let tail = Content {
                operations: vec![
                    Operation::new("Q", vec![]),
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        placement.iter().map(|v| Object::Real(*v)).collect(),
                    ),
                    Operation::new("Do", vec![Object::Name(WATERMARK_XOBJECT.to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let tail_bytes = tail.encode().map_err(|err| {
                BlattwerkError::corrupt(format!("cannot encode watermark operators: {err}"))
            })?;
            let close_id = doc.add_object(Stream::new(dictionary! {}, tail_bytes));

            let mut resources = effective_resources(&doc, page_id);
            let mut xobjects = match resources.get(b"XObject") {
                Ok(value) => resolve(&doc, value)
                    .and_then(|o| o.as_dict().ok())
                    .cloned()
                    .unwrap_or_default(),
                Err(_) => Dictionary::new(),
            };
            xobjects.set(WATERMARK_XOBJECT.to_vec(), Object::Reference(form_id));
            resources.set("XObject", Object::Dictionary(xobjects));

            let page = doc.get_dictionary_mut(page_id).map_err(|err| {
                BlattwerkError::corrupt(format!("cannot update page {page_number}: {err}"))
            })?;
            let mut contents = vec![Object::Reference(open_id)];
            match page.get(b"Contents") {
                Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
                Ok(existing @ Object::Reference(_)) => contents.push(existing.clone()),
                _ => {}
            }
            contents.push(Object::Reference(close_id));
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Dictionary(resources));
        }

        doc.prune_objects();
        let output = save(&mut doc)?;
        info!(pages = self.page_count(), output_bytes = output.len(), "Watermark applied");
        Ok(output)
    }
}

// -- Shared helpers -----------------------------------------------------------

/// Parse PDF bytes, mapping parser failures to `Corrupt`.
pub(crate) fn load(data: &[u8]) -> Result<Document> {
    let doc = load_raw(data)?;
    if doc.is_encrypted() {
        return Err(BlattwerkError::auth_failed(
            "document is password protected and must be unlocked first",
        ));
    }
    Ok(doc)
}

/// Parse PDF bytes, leaving any encryption in place.
pub(crate) fn load_raw(data: &[u8]) -> Result<Document> {
    Document::load_mem(data)
        .map_err(|err| BlattwerkError::corrupt(format!("failed to load PDF: {err}")))
}

/// Serialise a document to bytes.
pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| BlattwerkError::corrupt(format!("failed to serialise PDF: {err}")))?;
    Ok(output)
}

/// Look `key` up on the page, then on each ancestor page-tree node.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(current).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Follow a single indirect reference.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Numeric value of an Integer or Real operand.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// The page's effective MediaBox as `[x0, y0, x1, y1]`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(value) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    let Some(Object::Array(items)) = resolve(doc, &value) else {
        return DEFAULT_MEDIA_BOX;
    };
    let numbers: Vec<f32> = items
        .iter()
        .filter_map(|item| resolve(doc, item).and_then(number))
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// A standalone copy of the page's effective resource dictionary.
pub(crate) fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .as_ref()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn root_pages_id(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .map_err(|err| BlattwerkError::corrupt(format!("no catalog: {err}")))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|err| BlattwerkError::corrupt(format!("no /Pages reference: {err}")))
}

fn append_kid(doc: &mut Document, pages_id: ObjectId, kid: ObjectId) -> Result<()> {
    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|err| BlattwerkError::corrupt(format!("page tree root unreadable: {err}")))?;
    match pages.get_mut(b"Kids") {
        Ok(Object::Array(kids)) => kids.push(Object::Reference(kid)),
        _ => return Err(BlattwerkError::corrupt("page tree root has no /Kids array")),
    }
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + 1);
    Ok(())
}

/// Recompute /Count for the subtree rooted at `node_id`, returning the
/// number of leaf pages. Kids that do not resolve to a dictionary are dropped.
fn recount_page_tree(doc: &mut Document, node_id: ObjectId, depth: usize) -> Result<u32> {
    if depth > MAX_TREE_DEPTH {
        return Err(BlattwerkError::corrupt("page tree is too deep or cyclic"));
    }
    let node = doc
        .get_dictionary(node_id)
        .map_err(|err| BlattwerkError::corrupt(format!("page tree node unreadable: {err}")))?;
    let is_leaf = node
        .get(b"Type")
        .and_then(Object::as_name)
        .map(|name| name == b"Page")
        .unwrap_or(false);
    if is_leaf {
        return Ok(1);
    }

    let kids: Vec<ObjectId> = node
        .get(b"Kids")
        .and_then(Object::as_array)
        .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();

    let mut total = 0;
    let mut live_kids = Vec::with_capacity(kids.len());
    for kid in kids {
        if doc.get_dictionary(kid).is_err() {
            warn!(?kid, "dropping unreadable page tree entry");
            continue;
        }
        total += recount_page_tree(doc, kid, depth + 1)?;
        live_kids.push(Object::Reference(kid));
    }

    let node = doc
        .get_dictionary_mut(node_id)
        .map_err(|err| BlattwerkError::corrupt(format!("page tree node unreadable: {err}")))?;
    node.set("Kids", Object::Array(live_kids));
    node.set("Count", i64::from(total));
    Ok(total)
}

/// Transformation matrix that scales `source` to fit inside `target`,
/// preserving aspect ratio, centred.
fn fit_transform(source: &[f32; 4], target: &[f32; 4]) -> [f32; 6] {
    let (sw, sh) = (source[2] - source[0], source[3] - source[1]);
    let (tw, th) = (target[2] - target[0], target[3] - target[1]);
    let scale = (tw / sw).min(th / sh);
    let tx = target[0] + (tw - sw * scale) / 2.0 - source[0] * scale;
    let ty = target[1] + (th - sh * scale) / 2.0 - source[1] * scale;
    [scale, 0.0, 0.0, scale, tx, ty]
}
