//! Stateful PDF modification over lopdf: load a document, look up pages,
//! embed raster overlays and serialize the result.

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
mod xobject;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use stroke_model::PdfDimensions;

/// Guards against malformed `Parent` cycles while walking the page tree.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF object error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("no PDF loaded; call load_pdf first")]
    NotInitialized,
    #[error("a PDF is already loaded; use a new modifier for another document")]
    AlreadyLoaded,
    #[error("failed to load PDF: {0}")]
    LoadFailed(String),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("page {page} not found (page_count={page_count})")]
    PageNotFound { page: u32, page_count: u32 },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("malformed page {page}: {reason}")]
    MalformedPage { page: u32, reason: String },
}

/// A page of the loaded document, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPage {
    pub number: u32,
    pub id: ObjectId,
    /// Lower-left corner of the MediaBox in user space.
    pub origin: (f32, f32),
    pub dimensions: PdfDimensions,
}

impl PdfPage {
    /// Placement covering the whole MediaBox.
    pub fn full_page(&self) -> Placement {
        Placement {
            x: self.origin.0,
            y: self.origin.1,
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }
}

/// Rectangle in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// An image XObject living in the loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

/// Wraps a single document. Every operation except [`load_pdf`](Self::load_pdf)
/// fails with [`PdfEngineError::NotInitialized`] until a document is loaded.
#[derive(Debug, Default)]
pub struct PdfModifier {
    document: Option<Document>,
}

impl PdfModifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn open(&mut self, source: OpenSource) -> Result<(), PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };
        self.load_pdf(&bytes)
    }

    pub fn load_pdf(&mut self, bytes: &[u8]) -> Result<(), PdfEngineError> {
        if self.document.is_some() {
            return Err(PdfEngineError::AlreadyLoaded);
        }

        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            // lopdf refuses encrypted files it cannot open with an empty password.
            Err(err) if declares_encryption(bytes) => {
                log::debug!("encrypted PDF could not be opened: {err}");
                return Err(PdfEngineError::EncryptedUnsupported);
            }
            Err(err) => return Err(PdfEngineError::LoadFailed(err.to_string())),
        };

        if document.trailer.has(b"Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(PdfEngineError::LoadFailed("document has no pages".to_owned()));
        }

        log::debug!("loaded PDF {} ({} bytes, {} pages)", document.version, bytes.len(), page_count);
        self.document = Some(document);
        Ok(())
    }

    pub fn page_count(&self) -> Result<u32, PdfEngineError> {
        Ok(self.document()?.get_pages().len() as u32)
    }

    pub fn get_page(&self, number: u32) -> Result<PdfPage, PdfEngineError> {
        let document = self.document()?;
        let pages = document.get_pages();
        let id = *pages.get(&number).ok_or(PdfEngineError::PageNotFound {
            page: number,
            page_count: pages.len() as u32,
        })?;

        let (origin, dimensions) = match media_box(document, id) {
            Some([x0, y0, x1, y1]) => (
                (x0.min(x1), y0.min(y1)),
                PdfDimensions::new((x1 - x0).abs(), (y1 - y0).abs()),
            ),
            None => {
                log::warn!("page {number} has no usable MediaBox, assuming US Letter");
                ((0.0, 0.0), PdfDimensions::LETTER)
            }
        };

        Ok(PdfPage { number, id, origin, dimensions })
    }

    pub fn embed_png(&mut self, png: &[u8]) -> Result<EmbeddedImage, PdfEngineError> {
        let document = self.document_mut()?;
        let decoded = xobject::decode_png(png)?;
        let streams = xobject::image_streams(&decoded)?;

        let mask_id = document.add_object(streams.alpha);
        let mut color = streams.color;
        color.dict.set("SMask", mask_id);
        let id = document.add_object(color);

        log::debug!("embedded {}x{} image as {:?}", streams.width, streams.height, id);
        Ok(EmbeddedImage { id, width: streams.width, height: streams.height })
    }

    /// Draws `image` over the page's existing content. The existing content is
    /// isolated in its own graphics state so leftover transforms cannot leak
    /// into the overlay.
    pub fn draw_image(
        &mut self,
        page: &PdfPage,
        image: &EmbeddedImage,
        placement: Placement,
        opacity: f32,
    ) -> Result<(), PdfEngineError> {
        let document = self.document_mut()?;
        let mut resources = page_resources(document, page)?;

        let image_name = unique_name(document, &resources, b"XObject", "InkOverlay")?;
        sub_dictionary(document, &mut resources, b"XObject")?.set(image_name.as_bytes(), image.id);

        let mut content = String::from("q\n");
        if opacity < 1.0 {
            let opacity = opacity.clamp(0.0, 1.0);
            let state_name = unique_name(document, &resources, b"ExtGState", "InkAlpha")?;
            let state_id = document.add_object(dictionary! {
                "Type" => "ExtGState",
                "CA" => opacity,
                "ca" => opacity,
            });
            sub_dictionary(document, &mut resources, b"ExtGState")?
                .set(state_name.as_bytes(), state_id);
            content.push_str(&format!("/{state_name} gs\n"));
        }
        content.push_str(&format!(
            "{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            placement.width, placement.height, placement.x, placement.y, image_name
        ));

        let page_dict = document.get_object_mut(page.id)?.as_dict_mut()?;
        page_dict.set("Resources", resources);

        append_isolated_content(document, page, content.into_bytes())
    }

    /// Serializes the document in full. Existing objects are written out
    /// again rather than appended as an incremental update.
    pub fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        let document = self.document_mut()?;
        let mut buffer = Vec::new();
        document.save_to(&mut buffer)?;
        log::debug!("serialized PDF ({} bytes)", buffer.len());
        Ok(buffer)
    }

    fn document(&self) -> Result<&Document, PdfEngineError> {
        self.document.as_ref().ok_or(PdfEngineError::NotInitialized)
    }

    fn document_mut(&mut self) -> Result<&mut Document, PdfEngineError> {
        self.document.as_mut().ok_or(PdfEngineError::NotInitialized)
    }
}

/// Follows a reference, or returns the object itself.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, PdfEngineError> {
    match object {
        Object::Reference(id) => Ok(document.get_object(*id)?),
        other => Ok(other),
    }
}

/// Looks `key` up on the page, then on its ancestors.
fn inherited<'a>(document: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);

    for _ in 0..MAX_INHERITANCE_DEPTH {
        let dict = document.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(document, value).ok();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    None
}

fn media_box(document: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let array = inherited(document, page_id, b"MediaBox")?.as_array().ok()?;
    let [x0, y0, x1, y1] = array.as_slice() else {
        return None;
    };

    let value = |object: &Object| resolve(document, object).ok()?.as_float().ok();
    Some([value(x0)?, value(y0)?, value(x1)?, value(y1)?])
}

/// Page-local copy of the (possibly inherited or shared) resource dictionary,
/// so additions never leak onto other pages.
fn page_resources(document: &Document, page: &PdfPage) -> Result<Dictionary, PdfEngineError> {
    match inherited(document, page.id, b"Resources") {
        Some(Object::Dictionary(dict)) => Ok(dict.clone()),
        Some(_) => Err(PdfEngineError::MalformedPage {
            page: page.number,
            reason: "Resources is not a dictionary".to_owned(),
        }),
        None => Ok(Dictionary::new()),
    }
}

/// Replaces `resources[key]` with an owned dictionary (resolving a reference
/// if needed) and returns it for editing.
fn sub_dictionary<'a>(
    document: &Document,
    resources: &'a mut Dictionary,
    key: &[u8],
) -> Result<&'a mut Dictionary, PdfEngineError> {
    let owned = match resources.get(key) {
        Ok(object) => resolve(document, object)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    resources.set(key, owned);
    Ok(resources.get_mut(key)?.as_dict_mut()?)
}

fn unique_name(
    document: &Document,
    resources: &Dictionary,
    category: &[u8],
    prefix: &str,
) -> Result<String, PdfEngineError> {
    let existing = match resources.get(category) {
        Ok(object) => Some(resolve(document, object)?.as_dict()?),
        Err(_) => None,
    };

    let taken = |name: &str| existing.is_some_and(|dict| dict.has(name.as_bytes()));
    let mut index = 0u32;
    loop {
        let candidate = format!("{prefix}{index}");
        if !taken(&candidate) {
            return Ok(candidate);
        }
        index += 1;
    }
}

/// Whether `/Encrypt` appears after the last `trailer` keyword. Files without
/// one keep their trailer in a cross-reference stream and are scanned whole.
fn declares_encryption(bytes: &[u8]) -> bool {
    let tail = bytes
        .windows(b"trailer".len())
        .rposition(|window| window == b"trailer")
        .map_or(bytes, |start| &bytes[start..]);
    tail.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

fn append_isolated_content(
    document: &mut Document,
    page: &PdfPage,
    overlay: Vec<u8>,
) -> Result<(), PdfEngineError> {
    let existing: Vec<Object> = {
        let page_dict = document.get_dictionary(page.id)?;
        match page_dict.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match document.get_object(*id)? {
                Object::Array(items) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(single) => vec![single.clone()],
            Err(_) => Vec::new(),
        }
    };

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        let open = document.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let close = document.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
        contents.push(Object::Reference(open));
        contents.extend(existing);
        contents.push(Object::Reference(close));
    }
    let overlay_id = document.add_object(Stream::new(dictionary! {}, overlay));
    contents.push(Object::Reference(overlay_id));

    let page_dict = document.get_object_mut(page.id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));
    Ok(())
}
