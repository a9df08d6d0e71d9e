//! Minimal PPTX (Office Open XML) writer.
//!
//! Produces a self-contained presentation archive: content types, package
//! relationships, one slide master + layout + theme, and one title/body
//! slide per input [`Slide`]. Fixed parts are static strings; parts that
//! depend on the deck (content types, presentation, relationship lists,
//! slides) are built with `quick_xml::Writer` so text lands escaped.

use crate::error::{DeckError, Result};
use crate::model::Slide;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const XMLNS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const XMLNS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XMLNS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const XMLNS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const XMLNS_RELATIONSHIPS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

// 10 x 7.5 inch page, in EMU (914,400 per inch)
const PAGE_CX: u64 = 9_144_000;
const PAGE_CY: u64 = 6_858_000;

// Placeholder frames, EMU
const TITLE_OFF: (u64, u64) = (457_200, 274_638);
const TITLE_EXT: (u64, u64) = (8_229_600, 1_143_000);
const BODY_OFF: (u64, u64) = (457_200, 1_600_200);
const BODY_EXT: (u64, u64) = (8_229_600, 4_525_963);

static ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
</Relationships>"#;

static MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/>
</Relationships>"#;

static LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/>
</Relationships>"#;

static SLIDE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>
</Relationships>"#;

static SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>
<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>
<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>
</p:sldMaster>"#;

static SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld>
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>
</p:sldLayout>"#;

static THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office">
<a:themeElements>
<a:clrScheme name="Office">
<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
<a:dk2><a:srgbClr val="44546A"/></a:dk2>
<a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>
<a:accent1><a:srgbClr val="4472C4"/></a:accent1>
<a:accent2><a:srgbClr val="ED7D31"/></a:accent2>
<a:accent3><a:srgbClr val="A5A5A5"/></a:accent3>
<a:accent4><a:srgbClr val="FFC000"/></a:accent4>
<a:accent5><a:srgbClr val="5B9BD5"/></a:accent5>
<a:accent6><a:srgbClr val="70AD47"/></a:accent6>
<a:hlink><a:srgbClr val="0563C1"/></a:hlink>
<a:folHlink><a:srgbClr val="954F72"/></a:folHlink>
</a:clrScheme>
<a:fontScheme name="Office">
<a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface="Yu Gothic Light"/><a:cs typeface=""/></a:majorFont>
<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface="Yu Gothic"/><a:cs typeface=""/></a:minorFont>
</a:fontScheme>
<a:fmtScheme name="Office">
<a:fillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
</a:fillStyleLst>
<a:lnStyleLst>
<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
<a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
<a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
</a:lnStyleLst>
<a:effectStyleLst>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst/></a:effectStyle>
<a:effectStyle><a:effectLst/></a:effectStyle>
</a:effectStyleLst>
<a:bgFillStyleLst>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
</a:bgFillStyleLst>
</a:fmtScheme>
</a:themeElements>
</a:theme>"#;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Write a complete presentation archive to `writer`.
///
/// One slide per input; a slide with no bullets gets a title-only page.
pub fn write_pptx<W: Write + Seek>(writer: W, slides: &[Slide]) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types_xml(slides.len())?.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS.as_bytes())?;

    zip.start_file("ppt/presentation.xml", options)?;
    zip.write_all(presentation_xml(slides.len())?.as_bytes())?;

    zip.start_file("ppt/_rels/presentation.xml.rels", options)?;
    zip.write_all(presentation_rels_xml(slides.len())?.as_bytes())?;

    zip.start_file("ppt/slideMasters/slideMaster1.xml", options)?;
    zip.write_all(SLIDE_MASTER.as_bytes())?;

    zip.start_file("ppt/slideMasters/_rels/slideMaster1.xml.rels", options)?;
    zip.write_all(MASTER_RELS.as_bytes())?;

    zip.start_file("ppt/slideLayouts/slideLayout1.xml", options)?;
    zip.write_all(SLIDE_LAYOUT.as_bytes())?;

    zip.start_file("ppt/slideLayouts/_rels/slideLayout1.xml.rels", options)?;
    zip.write_all(LAYOUT_RELS.as_bytes())?;

    zip.start_file("ppt/theme/theme1.xml", options)?;
    zip.write_all(THEME.as_bytes())?;

    for (i, slide) in slides.iter().enumerate() {
        let number = i + 1;
        zip.start_file(format!("ppt/slides/slide{}.xml", number), options)?;
        zip.write_all(slide_xml(slide)?.as_bytes())?;

        zip.start_file(format!("ppt/slides/_rels/slide{}.xml.rels", number), options)?;
        zip.write_all(SLIDE_RELS.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn xml_err<E: std::fmt::Display>(e: E) -> DeckError {
    DeckError::Xml(e.to_string())
}

/// Build one XML document: declaration, then whatever `build` writes.
fn xml_doc<F>(build: F) -> Result<String>
where
    F: FnOnce(&mut XmlWriter) -> Result<()>,
{
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;
    build(&mut writer)?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| DeckError::Xml(e.to_string()))
}

fn start(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (key, value) in attrs {
        el.push_attribute((*key, *value));
    }
    w.write_event(Event::Empty(el)).map_err(xml_err)?;
    Ok(())
}

fn start_with(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (key, value) in attrs {
        el.push_attribute((*key, *value));
    }
    w.write_event(Event::Start(el)).map_err(xml_err)?;
    Ok(())
}

fn content_types_xml(slide_count: usize) -> Result<String> {
    xml_doc(|w| {
        start_with(w, "Types", &[("xmlns", XMLNS_CONTENT_TYPES)])?;

        empty(
            w,
            "Default",
            &[
                ("Extension", "rels"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-package.relationships+xml",
                ),
            ],
        )?;
        empty(
            w,
            "Default",
            &[("Extension", "xml"), ("ContentType", "application/xml")],
        )?;
        empty(
            w,
            "Override",
            &[
                ("PartName", "/ppt/presentation.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml",
                ),
            ],
        )?;
        empty(
            w,
            "Override",
            &[
                ("PartName", "/ppt/slideMasters/slideMaster1.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
                ),
            ],
        )?;
        empty(
            w,
            "Override",
            &[
                ("PartName", "/ppt/slideLayouts/slideLayout1.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
                ),
            ],
        )?;
        empty(
            w,
            "Override",
            &[
                ("PartName", "/ppt/theme/theme1.xml"),
                (
                    "ContentType",
                    "application/vnd.openxmlformats-officedocument.theme+xml",
                ),
            ],
        )?;
        for number in 1..=slide_count {
            let part = format!("/ppt/slides/slide{}.xml", number);
            empty(
                w,
                "Override",
                &[
                    ("PartName", part.as_str()),
                    (
                        "ContentType",
                        "application/vnd.openxmlformats-officedocument.presentationml.slide+xml",
                    ),
                ],
            )?;
        }

        end(w, "Types")
    })
}

fn presentation_xml(slide_count: usize) -> Result<String> {
    xml_doc(|w| {
        start_with(
            w,
            "p:presentation",
            &[("xmlns:a", XMLNS_A), ("xmlns:r", XMLNS_R), ("xmlns:p", XMLNS_P)],
        )?;

        start(w, "p:sldMasterIdLst")?;
        empty(
            w,
            "p:sldMasterId",
            &[("id", "2147483648"), ("r:id", "rId1")],
        )?;
        end(w, "p:sldMasterIdLst")?;

        start(w, "p:sldIdLst")?;
        for index in 0..slide_count {
            let id = (256 + index).to_string();
            let rid = format!("rId{}", index + 2);
            empty(w, "p:sldId", &[("id", id.as_str()), ("r:id", rid.as_str())])?;
        }
        end(w, "p:sldIdLst")?;

        let (cx, cy) = (PAGE_CX.to_string(), PAGE_CY.to_string());
        empty(w, "p:sldSz", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
        empty(w, "p:notesSz", &[("cx", cy.as_str()), ("cy", cx.as_str())])?;

        end(w, "p:presentation")
    })
}

fn presentation_rels_xml(slide_count: usize) -> Result<String> {
    xml_doc(|w| {
        start_with(w, "Relationships", &[("xmlns", XMLNS_RELATIONSHIPS)])?;

        empty(
            w,
            "Relationship",
            &[
                ("Id", "rId1"),
                ("Type", REL_SLIDE_MASTER),
                ("Target", "slideMasters/slideMaster1.xml"),
            ],
        )?;
        for number in 1..=slide_count {
            let rid = format!("rId{}", number + 1);
            let target = format!("slides/slide{}.xml", number);
            empty(
                w,
                "Relationship",
                &[
                    ("Id", rid.as_str()),
                    ("Type", REL_SLIDE),
                    ("Target", target.as_str()),
                ],
            )?;
        }

        end(w, "Relationships")
    })
}

enum Placeholder {
    Title,
    Body,
}

fn slide_xml(slide: &Slide) -> Result<String> {
    xml_doc(|w| {
        start_with(
            w,
            "p:sld",
            &[("xmlns:a", XMLNS_A), ("xmlns:r", XMLNS_R), ("xmlns:p", XMLNS_P)],
        )?;
        start(w, "p:cSld")?;
        start(w, "p:spTree")?;

        start(w, "p:nvGrpSpPr")?;
        empty(w, "p:cNvPr", &[("id", "1"), ("name", "")])?;
        empty(w, "p:cNvGrpSpPr", &[])?;
        empty(w, "p:nvPr", &[])?;
        end(w, "p:nvGrpSpPr")?;
        empty(w, "p:grpSpPr", &[])?;

        let title: &[(&str, bool)] = &[(slide.title.as_str(), false)];
        write_placeholder(w, Placeholder::Title, title)?;

        if !slide.bullets.is_empty() {
            // Message line lives at index 0 and renders bold
            let paragraphs: Vec<(&str, bool)> = slide
                .bullets
                .iter()
                .enumerate()
                .map(|(i, b)| (b.as_str(), i == 0))
                .collect();
            write_placeholder(w, Placeholder::Body, &paragraphs)?;
        }

        end(w, "p:spTree")?;
        end(w, "p:cSld")?;

        start(w, "p:clrMapOvr")?;
        empty(w, "a:masterClrMapping", &[])?;
        end(w, "p:clrMapOvr")?;

        end(w, "p:sld")
    })
}

fn write_placeholder(w: &mut XmlWriter, kind: Placeholder, paragraphs: &[(&str, bool)]) -> Result<()> {
    let (id, name, off, ext) = match kind {
        Placeholder::Title => ("2", "Title 1", TITLE_OFF, TITLE_EXT),
        Placeholder::Body => ("3", "Content Placeholder 2", BODY_OFF, BODY_EXT),
    };

    start(w, "p:sp")?;

    start(w, "p:nvSpPr")?;
    empty(w, "p:cNvPr", &[("id", id), ("name", name)])?;
    start(w, "p:cNvSpPr")?;
    empty(w, "a:spLocks", &[("noGrp", "1")])?;
    end(w, "p:cNvSpPr")?;
    start(w, "p:nvPr")?;
    match kind {
        Placeholder::Title => empty(w, "p:ph", &[("type", "title")])?,
        Placeholder::Body => empty(w, "p:ph", &[("idx", "1")])?,
    }
    end(w, "p:nvPr")?;
    end(w, "p:nvSpPr")?;

    start(w, "p:spPr")?;
    start(w, "a:xfrm")?;
    let (x, y) = (off.0.to_string(), off.1.to_string());
    let (cx, cy) = (ext.0.to_string(), ext.1.to_string());
    empty(w, "a:off", &[("x", x.as_str()), ("y", y.as_str())])?;
    empty(w, "a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    end(w, "a:xfrm")?;
    end(w, "p:spPr")?;

    start(w, "p:txBody")?;
    empty(w, "a:bodyPr", &[])?;
    empty(w, "a:lstStyle", &[])?;
    for (text, bold) in paragraphs {
        start(w, "a:p")?;
        start(w, "a:r")?;
        if *bold {
            empty(w, "a:rPr", &[("lang", "ja-JP"), ("b", "1"), ("dirty", "0")])?;
        } else {
            empty(w, "a:rPr", &[("lang", "ja-JP"), ("dirty", "0")])?;
        }
        start(w, "a:t")?;
        w.write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
        end(w, "a:t")?;
        end(w, "a:r")?;
        end(w, "a:p")?;
    }
    end(w, "p:txBody")?;

    end(w, "p:sp")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample_slide() -> Slide {
        Slide::new(
            "強み",
            vec![
                "困難でも周囲を巻き込み成果を出せる".to_string(),
                "サークルで意見対立を調整しイベントを成功させた".to_string(),
                "参加者数を前年の1.5倍にした".to_string(),
            ],
        )
    }

    #[test]
    fn test_content_types_lists_every_slide() {
        let xml = content_types_xml(3).unwrap();
        assert!(xml.contains(r#"PartName="/ppt/slides/slide1.xml""#));
        assert!(xml.contains(r#"PartName="/ppt/slides/slide3.xml""#));
        assert!(!xml.contains("slide4.xml"));
        assert!(xml.contains("/ppt/slideMasters/slideMaster1.xml"));
        assert!(xml.contains("/ppt/theme/theme1.xml"));
    }

    #[test]
    fn test_presentation_ids_follow_slide_count() {
        let xml = presentation_xml(2).unwrap();
        assert!(xml.contains(r#"<p:sldId id="256" r:id="rId2"/>"#));
        assert!(xml.contains(r#"<p:sldId id="257" r:id="rId3"/>"#));
        assert!(xml.contains(r#"<p:sldSz cx="9144000" cy="6858000"/>"#));
    }

    #[test]
    fn test_presentation_rels_map_slides_after_master() {
        let xml = presentation_rels_xml(2).unwrap();
        assert!(xml.contains(r#"Id="rId1""#));
        assert!(xml.contains("slideMasters/slideMaster1.xml"));
        assert!(xml.contains(r#"Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml""#));
        assert!(xml.contains(r#"Target="slides/slide2.xml""#));
    }

    #[test]
    fn test_slide_xml_bolds_first_bullet_only() {
        let xml = slide_xml(&sample_slide()).unwrap();
        assert_eq!(xml.matches(r#"b="1""#).count(), 1);
        let bold_pos = xml.find(r#"b="1""#).unwrap();
        let first_bullet_pos = xml.find("困難でも周囲を巻き込み成果を出せる").unwrap();
        assert!(bold_pos < first_bullet_pos);
    }

    #[test]
    fn test_slide_xml_contains_title_and_placeholders() {
        let xml = slide_xml(&sample_slide()).unwrap();
        assert!(xml.contains(r#"<p:ph type="title"/>"#));
        assert!(xml.contains(r#"<p:ph idx="1"/>"#));
        assert!(xml.contains("強み"));
        assert!(xml.contains(r#"<a:off x="457200" y="274638"/>"#));
    }

    #[test]
    fn test_slide_xml_empty_bullets_is_title_only() {
        let slide = Slide::new("タイトルのみ", Vec::new());
        let xml = slide_xml(&slide).unwrap();
        assert!(xml.contains(r#"<p:ph type="title"/>"#));
        assert!(!xml.contains(r#"<p:ph idx="1"/>"#));
        assert!(!xml.contains(r#"b="1""#));
    }

    #[test]
    fn test_slide_xml_escapes_markup_in_text() {
        let slide = Slide::new("A&B <成長>", vec!["利益 > 前年".to_string()]);
        let xml = slide_xml(&slide).unwrap();
        assert!(xml.contains("A&amp;B &lt;成長&gt;"));
        assert!(!xml.contains("A&B"));
    }

    #[test]
    fn test_write_pptx_archive_layout() {
        let slides = vec![sample_slide(), Slide::new("まとめ", Vec::new())];
        let mut buffer = Cursor::new(Vec::new());
        write_pptx(&mut buffer, &slides).unwrap();

        buffer.set_position(0);
        let mut archive = ZipArchive::new(buffer).unwrap();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/_rels/presentation.xml.rels",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/slides/slide2.xml",
        ] {
            assert!(archive.by_name(part).is_ok(), "missing {}", part);
        }
    }

    #[test]
    fn test_write_pptx_roundtrip_slide_content() {
        let slides = vec![sample_slide()];
        let mut buffer = Cursor::new(Vec::new());
        write_pptx(&mut buffer, &slides).unwrap();

        buffer.set_position(0);
        let mut archive = ZipArchive::new(buffer).unwrap();
        let mut xml = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();

        assert!(xml.contains("強み"));
        assert!(xml.contains(r#"b="1""#));
        assert!(xml.contains("参加者数を前年の1.5倍にした"));
    }
}
