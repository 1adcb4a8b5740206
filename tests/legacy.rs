//! End-to-end tests over synthetic legacy (original Supernote) files.

mod common;

use common::{NoteBuilder, PAGE_PIXELS, rle_page};
use std::io::Cursor;
use supernote::{Error, Notebook, PixelFormat, Policy, Renderer, parse_metadata};

const SIGNATURE: &str = "SN_FILE_ASA_20190529";

fn two_page_file() -> Vec<u8> {
    let mut builder = NoteBuilder::legacy(SIGNATURE);
    let first_bitmap = builder.block(&rle_page(0x61, 10));
    let first = builder.metadata(&format!("<DATA:{first_bitmap}><PROTOCOL:RATTA_RLE>"));
    let second_bitmap = builder.block(&rle_page(0x64, 5));
    let second = builder.metadata(&format!("<DATA:{second_bitmap}><PROTOCOL:RATTA_RLE>"));
    let header = builder.metadata("<FILE_TYPE:NOTE><APPLY_EQUIPMENT:N1>");
    let footer = builder.metadata(&format!(
        "<FILE_FEATURE:{header}><PAGE:{first}><PAGE:{second}>"
    ));
    builder.finish(footer)
}

#[test]
fn parses_repeated_page_keys() {
    let bytes = two_page_file();
    let metadata = parse_metadata(Cursor::new(&bytes), Policy::Strict).unwrap();
    assert_eq!(SIGNATURE, metadata.signature);
    assert_eq!(2, metadata.total_pages());
    assert!(!metadata.is_layer_supported(0).unwrap());
    assert_eq!(2, metadata.footer.params.get_all("PAGE").len());
}

#[test]
fn renders_flat_pages_with_the_page_decoder() {
    let bytes = two_page_file();
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    assert_eq!(2, notebook.total_pages());
    let page = notebook.page(0).unwrap();
    assert!(!page.has_layers());
    assert_eq!(Some("RATTA_RLE"), page.protocol());

    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!(PixelFormat::Gray8, image.format);
    assert_eq!(PAGE_PIXELS, image.pixels.len());
    assert_eq!(0x00, image.pixels[0]);
    assert_eq!(0xff, image.pixels[10]);
}

#[test]
fn page_without_content_renders_transparent() {
    let mut builder = NoteBuilder::legacy(SIGNATURE);
    let page = builder.metadata("<PROTOCOL:RATTA_RLE><NOTE:placeholder>");
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!(PixelFormat::Rgba8, image.format);
    assert!(image.pixels.iter().all(|&b| b == 0));
}

#[test]
fn strict_policy_rejects_future_firmware() {
    let mut builder = NoteBuilder::legacy("SN_FILE_ASA_20991231");
    let footer = builder.block(&[]);
    let bytes = builder.finish(footer);
    assert!(matches!(
        parse_metadata(Cursor::new(bytes), Policy::Strict).unwrap_err(),
        Error::UnsupportedFileFormat(_)
    ));
}

#[test]
fn loose_policy_accepts_future_firmware_as_latest() {
    let mut builder = NoteBuilder::legacy("SN_FILE_ASA_20991231");
    let footer = builder.block(&[]);
    let bytes = builder.finish(footer);
    let metadata = parse_metadata(Cursor::new(bytes), Policy::Loose).unwrap();
    assert_eq!(SIGNATURE, metadata.signature);
}
