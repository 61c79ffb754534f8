//! In-memory PPTX fixtures for tests.
//!
//! Builds the smallest package the deck loader accepts: content types,
//! presentation part with its relationships, and one part per slide.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const NS: &str = concat!(
    "xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" ",
    "xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" ",
    "xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\""
);

const SLIDE_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

/// Escape text for use inside fixture XML.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A plain paragraph with one bold run.
pub fn paragraph(text: &str) -> String {
    format!(
        "<a:p><a:r><a:rPr lang=\"en-US\" b=\"1\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
        escape(text)
    )
}

/// A bulleted paragraph at the given indentation level.
pub fn bullet_paragraph(text: &str, level: u32) -> String {
    let lvl = if level > 0 {
        format!(" lvl=\"{}\"", level)
    } else {
        String::new()
    };
    format!(
        "<a:p><a:pPr{}><a:buFont typeface=\"Arial\"/><a:buChar char=\"&#8226;\"/></a:pPr>\
         <a:r><a:rPr lang=\"en-US\" sz=\"1800\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>",
        lvl,
        escape(text)
    )
}

/// A shape with the given paragraphs in its text body.
pub fn shape(id: u32, paragraphs: &[String]) -> String {
    format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:xfrm><a:off x=\"0\" y=\"{y}\"/><a:ext cx=\"100\" cy=\"100\"/></a:xfrm></p:spPr>\
         <p:txBody><a:bodyPr wrap=\"square\"/><a:lstStyle/>{body}</p:txBody></p:sp>",
        id = id,
        y = id * 100,
        body = paragraphs.concat()
    )
}

/// A single-paragraph, single-run text shape.
pub fn text_shape(id: u32, text: &str) -> String {
    shape(id, &[paragraph(text)])
}

/// A list shape with one level-0 bulleted paragraph per item.
pub fn list_shape(id: u32, items: &[&str]) -> String {
    let paragraphs: Vec<String> = items.iter().map(|item| bullet_paragraph(item, 0)).collect();
    shape(id, &paragraphs)
}

/// A rectangle without a text body.
pub fn shape_without_text_body(id: u32) -> String {
    format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"Rectangle {id}\"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:sp>",
        id = id
    )
}

/// A group shape wrapping `inner`.
pub fn group(id: u32, inner: &str) -> String {
    format!(
        "<p:grpSp><p:nvGrpSpPr><p:cNvPr id=\"{id}\" name=\"Group {id}\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr/>{inner}</p:grpSp>",
        id = id,
        inner = inner
    )
}

/// A complete slide part around the given shape tree content.
pub fn slide_xml(sp_tree: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
         <p:sld {ns}><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr/>{tree}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>",
        ns = NS,
        tree = sp_tree
    )
}

/// Builder for a PPTX package.
#[derive(Debug, Default)]
pub struct DeckBuilder {
    slides: Vec<String>,
    reversed: bool,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide with the given shape tree content.
    pub fn slide(mut self, sp_tree: &str) -> Self {
        self.slides.push(slide_xml(sp_tree));
        self
    }

    /// List slides in `p:sldIdLst` in reverse part order.
    pub fn reversed_order(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Build the package bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        let mut add = |name: &str, content: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        };

        add("[Content_Types].xml", &self.content_types());
        add(
            "_rels/.rels",
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
             </Relationships>",
        );
        add("ppt/presentation.xml", &self.presentation());
        add("ppt/_rels/presentation.xml.rels", &self.presentation_rels());
        for (idx, slide) in self.slides.iter().enumerate() {
            add(&format!("ppt/slides/slide{}.xml", idx + 1), slide);
        }

        zip.finish().unwrap().into_inner()
    }

    fn content_types(&self) -> String {
        let overrides: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    "<Override PartName=\"/ppt/slides/slide{}.xml\" \
                     ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>",
                    n
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Override PartName=\"/ppt/presentation.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
             {}</Types>",
            overrides
        )
    }

    fn presentation(&self) -> String {
        let mut ids: Vec<usize> = (1..=self.slides.len()).collect();
        if self.reversed {
            ids.reverse();
        }
        let list: String = ids
            .iter()
            .map(|n| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 255 + n, n + 1))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <p:presentation {}><p:sldIdLst>{}</p:sldIdLst>\
             <p:sldSz cx=\"12192000\" cy=\"6858000\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>",
            NS, list
        )
    }

    fn presentation_rels(&self) -> String {
        let rels: String = (1..=self.slides.len())
            .map(|n| {
                format!(
                    "<Relationship Id=\"rId{}\" Type=\"{}\" Target=\"slides/slide{}.xml\"/>",
                    n + 1,
                    SLIDE_REL_TYPE,
                    n
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" \
             Target=\"slideMasters/slideMaster1.xml\"/>{}</Relationships>",
            rels
        )
    }
}

/// A one-slide deck with the given shape tree content.
pub fn single_slide_deck(sp_tree: &str) -> Vec<u8> {
    DeckBuilder::new().slide(sp_tree).build()
}
