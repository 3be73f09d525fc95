// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests for every registered operation, driven through the
// Dispatcher exactly as a front-end would.

mod common;

use blattwerk_core::{ErrorKind, InputBlob, MediaType, Request};
use image::ImageFormat;
use lopdf::Document;

use common::{assert_no_leaks, dispatcher, encoded_image, page_count, pdf, pdf_input, zip_entries, zip_entry};

fn page_text(bytes: &[u8], page: u32) -> String {
    Document::load_mem(bytes)
        .expect("load result")
        .extract_text(&[page])
        .expect("extract text")
}

// -- merge --------------------------------------------------------------------

#[test]
fn merge_concatenates_in_input_order() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("merge")
        .with_input(pdf_input("a.pdf", pdf("Alpha", 2)))
        .with_input(pdf_input("b.pdf", pdf("Beta", 3)));

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "merged.pdf");
    assert_eq!(delivery.media_type, MediaType::Pdf);
    assert_eq!(page_count(&delivery.bytes), 5);
    assert!(page_text(&delivery.bytes, 1).contains("Alpha 1"));
    assert!(page_text(&delivery.bytes, 3).contains("Beta 1"));
    assert_no_leaks(&dispatcher);
}

#[test]
fn merge_with_one_input_allocates_nothing() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("merge").with_input(pdf_input("a.pdf", pdf("Alpha", 1)));

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(dispatcher.store().allocation_count(), 0);
    assert_eq!(dispatcher.store().ledgers_opened(), 0);
}

#[test]
fn merge_rejects_non_pdf_inputs() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("merge")
        .with_input(pdf_input("a.pdf", pdf("Alpha", 1)))
        .with_input(InputBlob::new("b.png", MediaType::Png, encoded_image(4, 4, ImageFormat::Png)));

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(dispatcher.store().allocation_count(), 0);
}

#[test]
fn merge_of_corrupt_input_fails_without_leaks() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("merge")
        .with_input(pdf_input("a.pdf", pdf("Alpha", 1)))
        .with_input(pdf_input("b.pdf", b"%PDF-1.4 this is not a pdf".to_vec()));

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert!(dispatcher.store().allocation_count() >= 2);
    assert_no_leaks(&dispatcher);
}

// -- split --------------------------------------------------------------------

#[test]
fn split_yields_one_entry_per_page() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("split").with_input(pdf_input("doc.pdf", pdf("Page", 3)));

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "split_pages.zip");
    assert_eq!(delivery.media_type, MediaType::Zip);
    assert_eq!(
        zip_entries(&delivery.bytes),
        ["page_1.pdf", "page_2.pdf", "page_3.pdf"]
    );
    let second = zip_entry(&delivery.bytes, "page_2.pdf");
    assert_eq!(page_count(&second), 1);
    assert!(page_text(&second, 1).contains("Page 2"));
    assert_no_leaks(&dispatcher);
}

// -- rotate -------------------------------------------------------------------

#[test]
fn rotate_preserves_page_count() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("rotate")
        .with_input(pdf_input("doc.pdf", pdf("Page", 4)))
        .with_param("angle", "-90");

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "rotated.pdf");
    assert_eq!(page_count(&delivery.bytes), 4);

    let doc = Document::load_mem(&delivery.bytes).unwrap();
    for page_id in doc.get_pages().into_values() {
        let rotation = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap();
        assert_eq!(rotation, 270);
    }
    assert_no_leaks(&dispatcher);
}

#[test]
fn rotate_off_axis_is_unsupported_argument() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("rotate")
        .with_input(pdf_input("doc.pdf", pdf("Page", 1)))
        .with_param("angle", "45");

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedArgument);
    assert_eq!(dispatcher.store().allocation_count(), 0);
}

#[test]
fn rotate_requires_a_numeric_angle() {
    let (_tmp, dispatcher) = dispatcher();
    for request in [
        Request::new("rotate").with_input(pdf_input("doc.pdf", pdf("Page", 1))),
        Request::new("rotate")
            .with_input(pdf_input("doc.pdf", pdf("Page", 1)))
            .with_param("angle", "quarter"),
    ] {
        let err = dispatcher.dispatch(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(dispatcher.store().ledgers_opened(), 0);
}

#[test]
fn rotate_accepts_angles_near_the_integer_limit() {
    let (_tmp, dispatcher) = dispatcher();
    let quarter = dispatcher
        .dispatch(
            &Request::new("rotate")
                .with_input(pdf_input("doc.pdf", pdf("Page", 2)))
                .with_param("angle", "90"),
        )
        .unwrap();

    // 2147483610 = 90 * 23860929, so it lands another quarter turn on.
    let request = Request::new("rotate")
        .with_input(pdf_input("doc.pdf", quarter.bytes))
        .with_param("angle", "2147483610");
    let delivery = dispatcher.dispatch(&request).unwrap();

    let doc = Document::load_mem(&delivery.bytes).unwrap();
    for page_id in doc.get_pages().into_values() {
        let rotation = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Rotate")
            .unwrap()
            .as_i64()
            .unwrap();
        assert_eq!(rotation, 180);
    }
    assert_no_leaks(&dispatcher);
}

// -- protect / unlock ---------------------------------------------------------

fn protected(dispatcher: &blattwerk_engine::Dispatcher, password: &str) -> Vec<u8> {
    let request = Request::new("protect")
        .with_input(pdf_input("doc.pdf", pdf("Secret", 2)))
        .with_param("password", password);
    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "protected.pdf");
    delivery.bytes
}

#[test]
fn unlock_with_correct_password_restores_document() {
    let (_tmp, dispatcher) = dispatcher();
    let locked = protected(&dispatcher, "open sesame");

    let request = Request::new("unlock")
        .with_input(pdf_input("locked.pdf", locked))
        .with_param("password", "open sesame");
    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "unlocked.pdf");
    assert_eq!(page_count(&delivery.bytes), 2);
    assert_no_leaks(&dispatcher);
}

#[test]
fn unlock_with_wrong_password_delivers_nothing() {
    let (_tmp, dispatcher) = dispatcher();
    let locked = protected(&dispatcher, "right");

    let request = Request::new("unlock")
        .with_input(pdf_input("locked.pdf", locked))
        .with_param("password", "wrong");
    let mut sink = Vec::new();
    let err = dispatcher.dispatch_to(&request, &mut sink).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);
    assert!(sink.is_empty());
    assert_no_leaks(&dispatcher);
}

#[test]
fn operations_on_locked_documents_fail_auth() {
    let (_tmp, dispatcher) = dispatcher();
    let locked = protected(&dispatcher, "pw");

    let request = Request::new("compress").with_input(pdf_input("locked.pdf", locked));
    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthFailed);
    assert_no_leaks(&dispatcher);
}

#[test]
fn protect_requires_a_password() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("protect")
        .with_input(pdf_input("doc.pdf", pdf("Page", 1)))
        .with_param("password", "");

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(dispatcher.store().allocation_count(), 0);
}

// -- rasterisation round trip -------------------------------------------------

#[test]
fn pdf2img_then_img2pdf_preserves_page_count() {
    let (_tmp, dispatcher) = dispatcher();
    let images_pdf = {
        let request = Request::new("img2pdf")
            .with_input(InputBlob::new("a.png", MediaType::Png, encoded_image(60, 80, ImageFormat::Png)))
            .with_input(InputBlob::new("b.png", MediaType::Png, encoded_image(80, 60, ImageFormat::Png)))
            .with_input(InputBlob::new("c.png", MediaType::Png, encoded_image(50, 50, ImageFormat::Png)));
        dispatcher.dispatch(&request).unwrap().bytes
    };
    assert_eq!(page_count(&images_pdf), 3);

    let archive = dispatcher
        .dispatch(&Request::new("pdf2img").with_input(pdf_input("in.pdf", images_pdf)))
        .unwrap();
    assert_eq!(archive.suggested_filename, "images.zip");
    let entries = zip_entries(&archive.bytes);
    assert_eq!(entries, ["page_1.png", "page_2.png", "page_3.png"]);

    let mut rebuild = Request::new("img2pdf");
    for name in &entries {
        rebuild = rebuild.with_input(InputBlob::new(
            name.clone(),
            MediaType::Png,
            zip_entry(&archive.bytes, name),
        ));
    }
    let rebuilt = dispatcher.dispatch(&rebuild).unwrap();
    assert_eq!(rebuilt.suggested_filename, "images.pdf");
    assert_eq!(page_count(&rebuilt.bytes), 3);
    assert_no_leaks(&dispatcher);
}

#[test]
fn pdf2img_renders_text_only_pages_blank() {
    let (_tmp, dispatcher) = dispatcher();
    let archive = dispatcher
        .dispatch(&Request::new("pdf2img").with_input(pdf_input("in.pdf", pdf("Text", 2))))
        .unwrap();
    let first = image::load_from_memory(&zip_entry(&archive.bytes, "page_1.png")).unwrap();
    assert_eq!((first.width(), first.height()), (612, 792));
}

#[test]
fn img2pdf_accepts_every_image_type() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("img2pdf")
        .with_input(InputBlob::new("a.jpg", MediaType::Jpeg, encoded_image(30, 30, ImageFormat::Jpeg)))
        .with_input(InputBlob::new("b.bmp", MediaType::Bmp, encoded_image(30, 30, ImageFormat::Bmp)))
        .with_input(InputBlob::new("c.tiff", MediaType::Tiff, encoded_image(30, 30, ImageFormat::Tiff)));

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(page_count(&delivery.bytes), 3);
    assert_no_leaks(&dispatcher);
}

#[test]
fn img2pdf_reports_mislabelled_images_as_corrupt() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("img2pdf").with_input(InputBlob::new(
        "a.jpg",
        MediaType::Jpeg,
        encoded_image(10, 10, ImageFormat::Png),
    ));

    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupt);
    assert_no_leaks(&dispatcher);
}

// -- single-output transforms -------------------------------------------------

#[test]
fn extract_text_returns_plain_text() {
    let (_tmp, dispatcher) = dispatcher();
    let delivery = dispatcher
        .dispatch(&Request::new("extractText").with_input(pdf_input("doc.pdf", pdf("Line", 2))))
        .unwrap();
    assert_eq!(delivery.suggested_filename, "extracted.txt");
    assert_eq!(delivery.media_type, MediaType::PlainText);
    let text = String::from_utf8(delivery.bytes).unwrap();
    assert!(text.contains("Line 1"));
    assert!(text.contains("Line 2"));
    assert_no_leaks(&dispatcher);
}

#[test]
fn compress_and_repair_keep_every_page() {
    let (_tmp, dispatcher) = dispatcher();
    for (operation, filename) in [("compress", "compressed.pdf"), ("repair", "repaired.pdf")] {
        let delivery = dispatcher
            .dispatch(&Request::new(operation).with_input(pdf_input("doc.pdf", pdf("Page", 3))))
            .unwrap();
        assert_eq!(delivery.suggested_filename, filename);
        assert_eq!(page_count(&delivery.bytes), 3);
    }
    assert_no_leaks(&dispatcher);
}

#[test]
fn watermark_keeps_base_pages() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("watermark")
        .with_input(pdf_input("doc.pdf", pdf("Body", 3)))
        .with_input(pdf_input("stamp.pdf", pdf("DRAFT", 1)));

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(delivery.suggested_filename, "watermarked.pdf");
    assert_eq!(page_count(&delivery.bytes), 3);
    assert_no_leaks(&dispatcher);
}

#[test]
fn watermark_needs_exactly_two_inputs() {
    let (_tmp, dispatcher) = dispatcher();
    let request = Request::new("watermark").with_input(pdf_input("doc.pdf", pdf("Body", 1)));
    let err = dispatcher.dispatch(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn pdf2word_produces_a_docx_package() {
    let (_tmp, dispatcher) = dispatcher();
    let delivery = dispatcher
        .dispatch(&Request::new("pdf2word").with_input(pdf_input("doc.pdf", pdf("Para", 2))))
        .unwrap();
    assert_eq!(delivery.suggested_filename, "document.docx");
    assert_eq!(delivery.media_type, MediaType::Docx);
    assert!(zip_entries(&delivery.bytes).contains(&"word/document.xml".to_string()));
    assert_no_leaks(&dispatcher);
}

// -- lookup -------------------------------------------------------------------

#[test]
fn unknown_operation_is_not_found() {
    let (_tmp, dispatcher) = dispatcher();
    let err = dispatcher
        .dispatch(&Request::new("shred").with_input(pdf_input("doc.pdf", pdf("Page", 1))))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(dispatcher.store().ledgers_opened(), 0);
}

#[test]
fn failures_render_without_paths() {
    let (tmp, dispatcher) = dispatcher();
    let request = Request::new("split").with_input(pdf_input("../../etc/passwd", b"junk".to_vec()));
    let response = dispatcher.respond(&request);
    match response {
        blattwerk_core::Response::Failed(body) => {
            assert_eq!(body.kind, ErrorKind::Corrupt);
            let root = tmp.path().to_string_lossy().to_string();
            assert!(!body.message.contains(&root));
        }
        blattwerk_core::Response::Delivered(_) => panic!("junk input delivered"),
    }
    assert_no_leaks(&dispatcher);
}

// -- input edge cases ---------------------------------------------------------

#[test]
fn page_wise_operations_reject_documents_without_pages() {
    let (_tmp, dispatcher) = dispatcher();
    for operation in ["split", "pdf2img"] {
        let request = Request::new(operation).with_input(pdf_input("empty.pdf", pdf("Page", 0)));
        let err = dispatcher.dispatch(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported, "{operation}");
        assert!(!err.is_retryable(), "{operation}");
    }
    assert_no_leaks(&dispatcher);
}

#[test]
fn very_long_client_file_names_are_accepted() {
    let (_tmp, dispatcher) = dispatcher();
    let long_name = format!("{}.pdf", "a".repeat(300));
    let request = Request::new("merge")
        .with_input(pdf_input(&long_name, pdf("Alpha", 1)))
        .with_input(pdf_input(&long_name, pdf("Beta", 1)));

    let delivery = dispatcher.dispatch(&request).unwrap();
    assert_eq!(page_count(&delivery.bytes), 2);
    assert_no_leaks(&dispatcher);
}

#[test]
fn declared_media_types_are_echoed_printably() {
    let (_tmp, dispatcher) = dispatcher();
    let declared = format!("text/\u{1b}[31m{}", "x".repeat(500));
    let request = Request::new("split").with_input(InputBlob {
        name: "doc.pdf".into(),
        media_type: declared,
        bytes: pdf("Page", 1),
    });

    match dispatcher.respond(&request) {
        blattwerk_core::Response::Failed(body) => {
            assert_eq!(body.kind, ErrorKind::Validation);
            assert!(!body.message.chars().any(char::is_control), "{:?}", body.message);
            assert!(body.message.len() < 200, "{} bytes", body.message.len());
        }
        blattwerk_core::Response::Delivered(_) => panic!("unknown media type accepted"),
    }
    assert_eq!(dispatcher.store().allocation_count(), 0);
}
