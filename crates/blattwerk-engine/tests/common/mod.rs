// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::io::Cursor;

use blattwerk_core::{AppConfig, InputBlob, MediaType};
use blattwerk_engine::Dispatcher;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tempfile::TempDir;

/// A dispatcher whose scratch namespace lives in a fresh temp dir.
pub fn dispatcher() -> (TempDir, Dispatcher) {
    let tmp = TempDir::new().expect("temp dir");
    let config = AppConfig {
        scratch_dir: Some(tmp.path().join("scratch")),
        ..AppConfig::default()
    };
    let dispatcher = Dispatcher::new(config).expect("dispatcher");
    (tmp, dispatcher)
}

/// Assert that nothing is left in the scratch namespace.
pub fn assert_no_leaks(dispatcher: &Dispatcher) {
    let live = dispatcher.store().live_artifacts().expect("list scratch");
    assert!(live.is_empty(), "leaked artifacts: {live:?}");
}

/// A PDF of `pages` pages where page n shows `<label> <n>`.
pub fn pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages);
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("{label} {n}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture");
    out
}

pub fn pdf_input(name: &str, bytes: Vec<u8>) -> InputBlob {
    InputBlob::new(name, MediaType::Pdf, bytes)
}

/// Encode a solid-colour image in `format`.
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([20, 90, 160]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode image");
    out
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).expect("load result").get_pages().len()
}

/// Entry names of a zip archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("entry").name().to_string())
        .collect()
}

/// Raw bytes of one archive entry.
pub fn zip_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("open archive");
    let mut entry = archive.by_name(name).expect("entry");
    let mut out = Vec::new();
    entry.read_to_end(&mut out).expect("read entry");
    out
}
