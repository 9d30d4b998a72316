//! In-memory fixture documents for tests across the workspace.

use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// Builds a PDF with one page per `(width, height)` entry. Pages share a
/// single Resources object and each shows the text "Page N".
pub fn sample_pdf(sizes: &[(f32, f32)]) -> Vec<u8> {
    build(sizes.len(), None, |index| Some(sizes[index]))
}

/// Builds a PDF whose pages carry no MediaBox of their own and inherit
/// `size` from the page tree root.
pub fn sample_pdf_with_inherited_media_box(pages: usize, size: (f32, f32)) -> Vec<u8> {
    build(pages, Some(size), |_| None)
}

/// Like [`sample_pdf`], but each page's Contents is a reference to an
/// array object holding the content stream reference.
pub fn sample_pdf_with_indirect_contents(sizes: &[(f32, f32)]) -> Vec<u8> {
    let mut document = reload(&sample_pdf(sizes));
    let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();

    for page_id in page_ids {
        let contents = document
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Contents"))
            .cloned()
            .expect("fixture page should have contents");
        let array_id = document.add_object(Object::Array(vec![contents]));
        document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page should exist")
            .set("Contents", array_id);
    }

    serialize(&mut document)
}

/// One Letter page whose trailer declares Standard security handler
/// encryption that no empty password unlocks.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut document = reload(&sample_pdf(&[(612.0, 792.0)]));
    let encrypt_id = document.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1i64,
        "R" => 2i64,
        "O" => Object::string_literal(vec![0x4fu8; 32]),
        "U" => Object::string_literal(vec![0x55u8; 32]),
        "P" => -44i64,
    });
    let file_id = Object::string_literal(vec![0x11u8; 16]);
    document.trailer.set("Encrypt", encrypt_id);
    document.trailer.set("ID", vec![file_id.clone(), file_id]);

    serialize(&mut document)
}

/// Opaque single-color PNG.
pub fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG fixture should encode");
    bytes
}

fn build(
    page_total: usize,
    root_media_box: Option<(f32, f32)>,
    page_media_box: impl Fn(usize) -> Option<(f32, f32)>,
) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = (0..page_total)
        .map(|index| {
            let page_id = add_page(&mut document, pages_id, resources_id, index + 1);
            if let Some((width, height)) = page_media_box(index) {
                let page = document
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .expect("page should exist");
                page.set("MediaBox", media_box(width, height));
            }
            page_id.into()
        })
        .collect();

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_total as i64,
    };
    if let Some((width, height)) = root_media_box {
        pages.set("MediaBox", media_box(width, height));
    }
    document.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    serialize(&mut document)
}

fn reload(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("fixture PDF should load")
}

fn serialize(document: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    document.save_to(&mut bytes).expect("fixture PDF should serialize");
    bytes
}

fn add_page(
    document: &mut Document,
    parent: ObjectId,
    resources: ObjectId,
    number: usize,
) -> ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24i64.into()]),
            Operation::new("Td", vec![72i64.into(), 700i64.into()]),
            Operation::new("Tj", vec![Object::string_literal(format!("Page {number}"))]),
            Operation::new("ET", vec![]),
        ],
    };
    let encoded = content.encode().expect("fixture content should encode");
    let content_id = document.add_object(Stream::new(dictionary! {}, encoded));

    document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
        "Resources" => resources,
    })
}

fn media_box(width: f32, height: f32) -> Object {
    vec![0i64.into(), 0i64.into(), width.into(), height.into()].into()
}
