//! End-to-end tests over synthetic X-series files.

mod common;

use common::{NoteBuilder, PAGE_PIXELS, rle_page};
use std::io::Cursor;
use supernote::{
    Error, LayerVisibility, Notebook, PAGE_HEIGHT, PAGE_WIDTH, PixelFormat, Policy, Renderer,
    VisibilityOverlay, parse_metadata,
};

const SIGNATURE: &str = "SN_FILE_VER_20220011";
const HIGHRES_SIGNATURE: &str = "SN_FILE_VER_20230015";

/// Builds a one-page file whose main layer starts with `lead` pixels of
/// `color_code` over a blank page.
fn single_page_file(signature: &str, color_code: u8, lead: usize) -> Vec<u8> {
    let mut builder = NoteBuilder::xseries(signature);
    let bitmap = builder.block(&rle_page(color_code, lead));
    let layer = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bitmap}>"
    ));
    let page = builder.metadata(&format!(
        "<MAINLAYER:{layer}><LAYERSEQ:MAINLAYER,BGLAYER><PAGESTYLE:style_white><PAGEID:P20240101>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE><APPLY_EQUIPMENT:N5><DEVICE_DPI:0>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    builder.finish(footer)
}

fn rgb_pixel(image: &supernote::Bitmap, index: usize) -> [u8; 3] {
    [
        image.pixels[index * 3],
        image.pixels[index * 3 + 1],
        image.pixels[index * 3 + 2],
    ]
}

#[test]
fn empty_footer_parses_to_zero_pages() {
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let footer = builder.block(&[]);
    let bytes = builder.finish(footer);

    let metadata = parse_metadata(Cursor::new(&bytes), Policy::Strict).unwrap();
    assert_eq!(0, metadata.total_pages());

    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    assert!(matches!(
        Renderer::new(&notebook).render(0).unwrap_err(),
        Error::PageOutOfRange { page: 0, total: 0 }
    ));
}

#[test]
fn parses_structure() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let metadata = parse_metadata(Cursor::new(&bytes), Policy::Strict).unwrap();
    assert_eq!(SIGNATURE, metadata.signature);
    assert_eq!("note", metadata.file_type);
    assert_eq!(Some("NOTE"), metadata.header.get("FILE_TYPE"));
    assert_eq!(1, metadata.total_pages());
    assert!(metadata.is_layer_supported(0).unwrap());

    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    let page = notebook.page(0).unwrap();
    assert!(page.has_layers());
    assert_eq!(Some("RATTA_RLE"), page.protocol());
    assert_eq!(Some("style_white"), page.style());
    assert_eq!(Some("P20240101"), page.page_id());
    assert_eq!(vec!["MAINLAYER", "BGLAYER"], page.layer_order());
    assert!(!notebook.supports_highres_grayscale());
}

#[test]
fn renders_over_a_white_canvas() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!(PAGE_WIDTH, image.width);
    assert_eq!(PAGE_HEIGHT, image.height);
    assert_eq!(PixelFormat::Rgb8, image.format);
    assert_eq!([0x00, 0x00, 0x00], rgb_pixel(&image, 0));
    assert_eq!([0x00, 0x00, 0x00], rgb_pixel(&image, 9));
    // background pixels are holes over the white canvas
    assert_eq!([0xff, 0xff, 0xff], rgb_pixel(&image, 10));
}

#[test]
fn json_round_trip_preserves_mapping_keys() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let metadata = parse_metadata(Cursor::new(bytes), Policy::Strict).unwrap();
    let text = metadata.to_json().unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();

    let mut footer_keys: Vec<&str> = json["__footer__"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    footer_keys.sort_unstable();
    let mut expected: Vec<&str> = metadata.footer.params.keys().collect();
    expected.sort_unstable();
    assert_eq!(expected, footer_keys);

    let mut header_keys: Vec<&str> = json["__header__"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    header_keys.sort_unstable();
    let mut expected: Vec<&str> = metadata.header.keys().collect();
    expected.sort_unstable();
    assert_eq!(expected, header_keys);

    // the serialized text itself keeps insertion order
    assert!(text.find("FILE_TYPE").unwrap() < text.find("APPLY_EQUIPMENT").unwrap());
    assert!(text.find("APPLY_EQUIPMENT").unwrap() < text.find("DEVICE_DPI").unwrap());

    let page = json["__pages__"][0].as_object().unwrap();
    assert!(page.contains_key("MAINLAYER"));
    assert!(page.contains_key("__layers__"));
    assert_eq!(SIGNATURE, json["__signature__"]);
}

#[test]
fn resolves_cover_keywords_titles_and_links() {
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let cover = builder.block(b"cover bytes");
    let keyword_content = builder.block("budget".as_bytes());
    // the raw KEYWORD token is truncated on purpose; the content block wins
    let keyword = builder.metadata(&format!(
        "<KEYWORD:bud><KEYWORDSITE:{keyword_content}><KEYWORDPAGE:1><KEYWORDRECT:0,100,50,20>"
    ));
    let title_content = builder.block(b"title bitmap");
    let title = builder.metadata(&format!(
        "<TITLEBITMAP:{title_content}><TITLERECTORI:10,42,100,30>"
    ));
    let link = builder.metadata(
        "<LINKINOUT:0><LINKTYPE:4><LINKRECT:1,2,3,4><FILEID:F20240101><PAGEID:P9>\
         <FILEPATH:aHR0cHM6Ly9leGFtcGxlLmNvbQ==>",
    );
    let bitmap = builder.block(&rle_page(0x61, 1));
    let layer = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bitmap}>"
    ));
    let page = builder.metadata(&format!("<MAINLAYER:{layer}><LAYERSEQ:MAINLAYER>"));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!(
        "<FILE_FEATURE:{header}><COVER_1:{cover}><KEYWORD_00010000:{keyword}>\
         <TITLE_00020000:{title}><LINKO_00010000:{link}><PAGE1:{page}>"
    ));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    assert_eq!(Some(b"cover bytes".as_slice()), notebook.cover().content());

    let keyword = &notebook.keywords()[0];
    assert_eq!(Some("budget"), keyword.keyword());
    assert_eq!(0, keyword.page_number());
    assert_eq!(100, keyword.position());
    assert_eq!(Some(b"budget".as_slice()), keyword.content());

    let title = &notebook.titles()[0];
    assert_eq!(1, title.page_number());
    assert_eq!(42, title.position());
    assert_eq!(Some(b"title bitmap".as_slice()), title.content());

    let link = &notebook.links()[0];
    assert_eq!(0, link.page_number());
    assert_eq!(supernote::LinkDirection::Out, link.direction());
    assert_eq!(supernote::LinkType::Web, link.link_type());
    assert_eq!([1, 2, 3, 4], link.rect().unwrap());
    assert_eq!(Some("F20240101"), link.file_id());
    assert_eq!(Some("P9"), link.target_page_id());
    assert_eq!(
        Some("https://example.com".to_string()),
        link.filepath().unwrap()
    );
}

#[test]
fn second_mainlayer_is_treated_as_background() {
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let main_bitmap = builder.block(&rle_page(0x61, 1));
    let main = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{main_bitmap}>"
    ));
    let bg_bitmap = builder.block(&rle_page(0x64, 1));
    let background = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bg_bitmap}>"
    ));
    let page = builder.metadata(&format!(
        "<MAINLAYER:{main}><BGLAYER:{background}><LAYERSEQ:MAINLAYER,BGLAYER>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    let page = notebook.page(0).unwrap();
    let names: Vec<_> = page.layers().iter().filter_map(|l| l.name()).collect();
    assert_eq!(vec!["MAINLAYER", "BGLAYER"], names);
}

#[test]
fn visible_layer_composites_over_invisible_main() {
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let main_bitmap = builder.block(&rle_page(0x64, 20)); // gray lead
    let main = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{main_bitmap}>"
    ));
    let layer1_bitmap = builder.block(&rle_page(0x61, 10)); // black lead
    let layer1 = builder.metadata(&format!(
        "<LAYERNAME:LAYER1><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{layer1_bitmap}>"
    ));
    let layer_info = "[{\"layerId\"#0,\"isBackgroundLayer\"#false,\"isVisible\"#false},\
                      {\"layerId\"#1,\"isBackgroundLayer\"#false,\"isVisible\"#true}]";
    let page = builder.metadata(&format!(
        "<MAINLAYER:{main}><LAYER1:{layer1}><LAYERSEQ:MAINLAYER,LAYER1,BGLAYER>\
         <LAYERINFO:{layer_info}>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    let image = Renderer::new(&notebook).render(0).unwrap();
    // LAYER1's black lead shows; MAINLAYER's gray lead is suppressed and its
    // transparent pixels reveal the white canvas
    assert_eq!([0x00, 0x00, 0x00], rgb_pixel(&image, 0));
    assert_eq!([0xff, 0xff, 0xff], rgb_pixel(&image, 10));
    assert_eq!([0xff, 0xff, 0xff], rgb_pixel(&image, 19));
}

#[test]
fn overlay_overrides_file_visibility() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    let overlay = VisibilityOverlay {
        main: LayerVisibility::Invisible,
        ..Default::default()
    };
    let image = Renderer::new(&notebook)
        .render_with_overlay(0, &overlay)
        .unwrap();
    assert_eq!([0xff, 0xff, 0xff], rgb_pixel(&image, 0));
}

#[test]
fn invisible_background_yields_transparent_pixels() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    let overlay = VisibilityOverlay {
        background: LayerVisibility::Invisible,
        ..Default::default()
    };
    let image = Renderer::new(&notebook)
        .render_with_overlay(0, &overlay)
        .unwrap();
    assert_eq!(PixelFormat::Rgba8, image.format);
    // ink keeps full alpha, uncovered canvas becomes transparent
    assert_eq!([0x00, 0x00, 0x00, 0xff], image.pixels[..4]);
    assert_eq!(0x00, image.pixels[10 * 4 + 3]);
}

#[test]
fn user_background_is_decoded_as_png() {
    let template = {
        let image = image::RgbaImage::from_pixel(
            PAGE_WIDTH,
            PAGE_HEIGHT,
            image::Rgba([0x12, 0x34, 0x56, 0xff]),
        );
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    };
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let bg_bitmap = builder.block(&template);
    let background = builder.metadata(&format!(
        "<LAYERNAME:BGLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bg_bitmap}>"
    ));
    let page = builder.metadata(&format!(
        "<BGLAYER:{background}><LAYERSEQ:MAINLAYER,BGLAYER><PAGESTYLE:user_grid>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!([0x12, 0x34, 0x56], rgb_pixel(&image, 0));
}

#[test]
fn undersized_user_background_is_rejected() {
    let template = {
        let image = image::RgbaImage::from_pixel(100, 100, image::Rgba([0, 0, 0, 0xff]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    };
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let bg_bitmap = builder.block(&template);
    let background = builder.metadata(&format!(
        "<LAYERNAME:BGLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bg_bitmap}>"
    ));
    let page = builder.metadata(&format!(
        "<BGLAYER:{background}><LAYERSEQ:BGLAYER><PAGESTYLE:user_grid>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    assert!(matches!(
        Renderer::new(&notebook).render(0).unwrap_err(),
        Error::BackgroundSize {
            width: 100,
            height: 100,
            ..
        }
    ));
}

#[test]
fn horizontal_orientation_swaps_the_canvas() {
    let mut builder = NoteBuilder::xseries(SIGNATURE);
    let bitmap = builder.block(&rle_page(0x61, 10));
    let layer = builder.metadata(&format!(
        "<LAYERNAME:MAINLAYER><LAYERPROTOCOL:RATTA_RLE><LAYERBITMAP:{bitmap}>"
    ));
    let page = builder.metadata(&format!(
        "<MAINLAYER:{layer}><LAYERSEQ:MAINLAYER><ORIENTATION:1090>"
    ));
    let header = builder.metadata("<FILE_TYPE:NOTE>");
    let footer = builder.metadata(&format!("<FILE_FEATURE:{header}><PAGE1:{page}>"));
    let notebook = Notebook::new(Cursor::new(builder.finish(footer))).unwrap();

    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!(PAGE_HEIGHT, image.width);
    assert_eq!(PAGE_WIDTH, image.height);
    assert_eq!(PAGE_PIXELS * 3, image.pixels.len());
}

#[test]
fn highres_signature_selects_the_compat_grays() {
    let bytes = single_page_file(HIGHRES_SIGNATURE, 0x63, 10);
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    assert!(notebook.supports_highres_grayscale());

    let image = Renderer::new(&notebook).render(0).unwrap();
    assert_eq!([0x30, 0x30, 0x30], rgb_pixel(&image, 0));

    // forcing the standard map restores the plain dark gray
    let image = Renderer::new(&notebook)
        .highres_grayscale(false)
        .render(0)
        .unwrap();
    assert_eq!([0x9d, 0x9d, 0x9d], rgb_pixel(&image, 0));
}

#[test]
fn color_masks_separate_tones() {
    let bytes = single_page_file(SIGNATURE, 0x61, 10);
    let notebook = Notebook::new(Cursor::new(bytes)).unwrap();
    let masks = Renderer::new(&notebook).color_masks(0).unwrap();
    assert_eq!(PAGE_WIDTH, masks.width);
    assert_eq!(4, masks.masks.len());

    let black = &masks.masks[0];
    assert_eq!(supernote::color::BLACK, black.color);
    assert_eq!(1, black.mask[0]);
    assert_eq!(1, black.mask[9]);
    assert_eq!(0, black.mask[10]);
    // nothing else contributes
    assert!(masks.masks[1..].iter().all(|m| m.mask.iter().all(|&p| p == 0)));
}
