//! Writing mapping values back into a template slide.
//!
//! Only the text of existing runs is changed where possible so run and
//! paragraph properties (fonts, sizes, bullets) carry over to the new
//! content. The template's own structure decides whether a shape takes
//! a list or a single string.

use deckfill_core::{Error, FillValue, Result, ValidatedMapping};
use std::collections::BTreeMap;

use crate::package::SlideDeck;
use crate::slide::{is_run, run_text, text_shapes, TextShape};
use crate::xml::{Element, Node};

/// Renders mappings into copies of a template deck.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a validated mapping into a fresh copy of `deck`.
    pub fn render(
        &self,
        deck: &SlideDeck,
        slide_index: usize,
        mapping: &ValidatedMapping,
    ) -> Result<SlideDeck> {
        // Coerce every value up front so a bad value fails before any write.
        let values = mapping
            .mapping()
            .iter()
            .map(|(key, value)| Ok((key.clone(), FillValue::from_json(key, value)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        self.render_values(deck, slide_index, &values)
    }

    /// Render already-coerced values into a fresh copy of `deck`.
    ///
    /// Values are written as given; no validation happens here.
    pub fn render_values(
        &self,
        deck: &SlideDeck,
        slide_index: usize,
        values: &BTreeMap<String, FillValue>,
    ) -> Result<SlideDeck> {
        let mut doc = deck.slide_xml(slide_index)?;

        let mut applied = 0;
        for shape in text_shapes(&doc.root) {
            let Some(value) = values.get(&shape.key) else {
                continue;
            };

            let body = doc
                .root
                .descend_mut(&shape.path)
                .and_then(|sp| sp.child_mut("txBody"))
                .ok_or_else(|| Error::RenderError {
                    key: shape.key.clone(),
                    reason: "shape text body not found".to_string(),
                })?;

            log::debug!("Replacing {:?} -> {:?}", shape.key, value);
            apply(body, &shape, value.clone());
            applied += 1;
        }

        if applied < values.len() {
            log::warn!(
                "{} mapping keys matched no shape on slide {}",
                values.len() - applied,
                slide_index
            );
        }
        log::info!("Rendered {} placeholders into slide {}", applied, slide_index);

        let mut rendered = deck.clone();
        rendered.set_slide_xml(slide_index, &doc)?;
        Ok(rendered)
    }
}

fn apply(body: &mut Element, shape: &TextShape, value: FillValue) {
    match value {
        FillValue::Empty => write_text(body, &shape.text, ""),
        value if shape.is_list_like() => write_list(body, &value.into_items()),
        value => write_text(body, &shape.text, &value.into_text().unwrap_or_default()),
    }
}

/// Replace runs carrying the whole placeholder text.
///
/// When the text is spread over several runs or paragraphs no single run
/// matches; the value then goes into the first run and the rest are blanked.
fn write_text(body: &mut Element, literal: &str, value: &str) {
    let mut replaced = 0;
    for paragraph in body.elements_mut().filter(|e| e.is("p")) {
        for run in paragraph.elements_mut().filter(|e| is_run(e)) {
            if run_text(run).trim() == literal {
                set_run_text(run, value);
                replaced += 1;
            }
        }
    }

    if replaced > 0 {
        return;
    }

    let mut written = false;
    for paragraph in body.elements_mut().filter(|e| e.is("p")) {
        remove_breaks(paragraph);
        for run in paragraph.elements_mut().filter(|e| is_run(e)) {
            if written {
                set_run_text(run, "");
            } else {
                set_run_text(run, value);
                written = true;
            }
        }
    }
}

/// One item per paragraph, appending level-0 paragraphs for extra items
/// and blanking paragraphs left over.
fn write_list(body: &mut Element, items: &[String]) {
    let paragraphs = body.child_indices(|e| e.is("p"));

    let mut run_properties: Option<Element> = None;
    for (n, &idx) in paragraphs.iter().enumerate() {
        let Some(paragraph) = body.element_at_mut(idx) else {
            continue;
        };
        match items.get(n) {
            Some(item) => {
                write_paragraph(paragraph, item);
                if let Some(rpr) = first_run_properties(paragraph) {
                    run_properties = Some(rpr);
                }
            }
            None => blank_paragraph(paragraph),
        }
    }

    if items.len() <= paragraphs.len() {
        return;
    }

    let paragraph_name = paragraphs
        .first()
        .and_then(|&idx| match &body.children[idx] {
            Node::Element(e) => Some(e.name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "a:p".to_string());
    let insert_at = paragraphs
        .last()
        .map(|&idx| idx + 1)
        .unwrap_or(body.children.len());

    for (offset, item) in items[paragraphs.len()..].iter().enumerate() {
        let paragraph = new_paragraph(&paragraph_name, item, run_properties.as_ref());
        body.children.insert(insert_at + offset, Node::Element(paragraph));
    }
}

fn write_paragraph(paragraph: &mut Element, item: &str) {
    remove_breaks(paragraph);

    let runs = paragraph.child_indices(is_run);
    match runs.split_first() {
        Some((&first, rest)) => {
            if let Some(run) = paragraph.element_at_mut(first) {
                set_run_text(run, item);
            }
            for &idx in rest {
                if let Some(run) = paragraph.element_at_mut(idx) {
                    set_run_text(run, "");
                }
            }
        }
        None => {
            // Empty paragraph: the run inherits the end-of-paragraph properties.
            let end_idx = paragraph.child_indices(|e| e.is("endParaRPr")).first().copied();
            let rpr = end_idx
                .and_then(|idx| match &paragraph.children[idx] {
                    Node::Element(end) => {
                        let mut rpr = end.clone();
                        rpr.name = Element::sibling_of(end, "rPr").name;
                        Some(rpr)
                    }
                    _ => None,
                });
            let run = new_run(paragraph, item, rpr.as_ref());
            match end_idx {
                Some(idx) => paragraph.children.insert(idx, Node::Element(run)),
                None => paragraph.children.push(Node::Element(run)),
            }
        }
    }
}

fn blank_paragraph(paragraph: &mut Element) {
    remove_breaks(paragraph);
    for run in paragraph.elements_mut().filter(|e| is_run(e)) {
        set_run_text(run, "");
    }
}

fn remove_breaks(paragraph: &mut Element) {
    paragraph
        .children
        .retain(|node| !matches!(node, Node::Element(e) if e.is("br")));
}

fn first_run_properties(paragraph: &Element) -> Option<Element> {
    paragraph
        .elements()
        .find(|e| e.is("r"))
        .and_then(|run| run.child("rPr"))
        .cloned()
}

fn set_run_text(run: &mut Element, text: &str) {
    match run.child_mut("t") {
        Some(t) => t.set_text(text),
        None => {
            let mut t = Element::sibling_of(run, "t");
            t.set_text(text);
            run.children.push(Node::Element(t));
        }
    }
}

fn new_run(paragraph: &Element, text: &str, properties: Option<&Element>) -> Element {
    let mut run = Element::sibling_of(paragraph, "r");
    if let Some(rpr) = properties {
        run.children.push(Node::Element(rpr.clone()));
    }
    let mut t = Element::sibling_of(paragraph, "t");
    t.set_text(text);
    run.children.push(Node::Element(t));
    run
}

fn new_paragraph(name: &str, text: &str, properties: Option<&Element>) -> Element {
    let mut paragraph = Element::new(name);
    let run = new_run(&paragraph, text, properties);
    paragraph.children.push(Node::Element(run));
    paragraph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlaceholderExtractor;
    use crate::fixture;
    use crate::xml::XmlDocument;
    use deckfill_core::{Mapping, PlaceholderKind, ResponseValidator};
    use serde_json::json;

    fn deck(tree: &str) -> SlideDeck {
        SlideDeck::from_bytes(&fixture::single_slide_deck(tree)).unwrap()
    }

    fn validated(deck: &SlideDeck, value: serde_json::Value) -> ValidatedMapping {
        let set = PlaceholderExtractor::new().extract(deck, 0).unwrap();
        let mapping = Mapping::from_reply(&value.to_string()).unwrap();
        ResponseValidator::new().validate(mapping, &set).unwrap()
    }

    fn render(deck: &SlideDeck, value: serde_json::Value) -> SlideDeck {
        let mapping = validated(deck, value);
        TemplateRenderer::new().render(deck, 0, &mapping).unwrap()
    }

    /// Text bodies of all shapes on the first slide, in order.
    fn bodies(deck: &SlideDeck) -> Vec<Element> {
        let doc = deck.slide_xml(0).unwrap();
        text_shapes(&doc.root)
            .into_iter()
            .map(|s| {
                let mut root = doc.root.clone();
                root.descend_mut(&s.path)
                    .and_then(|sp| sp.child_mut("txBody"))
                    .cloned()
                    .unwrap()
            })
            .collect()
    }

    fn paragraphs(body: &Element) -> Vec<&Element> {
        body.elements().filter(|e| e.is("p")).collect()
    }

    fn steps_tree() -> String {
        [
            fixture::text_shape(2, "Title"),
            fixture::list_shape(3, &["Step one", "Step two"]),
            fixture::text_shape(4, "Footer"),
        ]
        .concat()
    }

    #[test]
    fn test_scenario_title_and_steps() {
        let template = deck(&steps_tree());
        let rendered = render(
            &template,
            json!({"Title": "Q3 Review", "Step one\nStep two": ["Plan", "Execute"], "Footer": "Confidential"}),
        );

        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["Q3 Review", "Plan\nExecute", "Confidential"]
        );
        assert_eq!(set.get("Plan\nExecute").unwrap().kind, PlaceholderKind::Text);

        // Run and bullet properties survive.
        let before = bodies(&template);
        let after = bodies(&rendered);
        let run_props = |body: &Element| {
            paragraphs(body)[0].child("r").and_then(|r| r.child("rPr")).cloned()
        };
        assert_eq!(run_props(&before[0]), run_props(&after[0]));
        assert_eq!(
            paragraphs(&before[1])[1].child("pPr"),
            paragraphs(&after[1])[1].child("pPr")
        );
    }

    #[test]
    fn test_untouched_shapes_and_parts_are_identical() {
        let tree = [
            fixture::text_shape(2, "Title"),
            fixture::shape_without_text_body(3),
            fixture::text_shape(4, "Subtitle"),
        ]
        .concat();
        let template = deck(&tree);

        let mut values = BTreeMap::new();
        values.insert("Title".to_string(), FillValue::Text("Q3 Review".into()));
        let rendered = TemplateRenderer::new()
            .render_values(&template, 0, &values)
            .unwrap();

        assert_eq!(bodies(&template)[1], bodies(&rendered)[1]);
        assert_eq!(
            template.part("ppt/presentation.xml"),
            rendered.part("ppt/presentation.xml")
        );

        let original = XmlDocument::parse(template.part("ppt/slides/slide1.xml").unwrap()).unwrap();
        let changed = XmlDocument::parse(rendered.part("ppt/slides/slide1.xml").unwrap()).unwrap();
        let shape_tree = |doc: &XmlDocument| {
            doc.root.child("cSld").and_then(|c| c.child("spTree")).cloned().unwrap()
        };
        let (original, changed) = (shape_tree(&original), shape_tree(&changed));
        let rectangles = |tree: &Element| {
            tree.elements()
                .filter(|e| e.is("sp") && e.child("txBody").is_none())
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(rectangles(&original), rectangles(&changed));
    }

    #[test]
    fn test_extra_items_append_level_zero_paragraph() {
        let tree = fixture::shape(
            2,
            &[
                fixture::bullet_paragraph("First", 1),
                fixture::bullet_paragraph("Second", 1),
            ],
        );
        let template = deck(&tree);
        let rendered = render(&template, json!({"First\nSecond": ["One", "Two", "Three"]}));

        let body = &bodies(&rendered)[0];
        let paras = paragraphs(body);
        assert_eq!(paras.len(), 3);
        assert!(paras[2].child("pPr").is_none());
        assert_eq!(paras[1].child("pPr").and_then(|p| p.attr("lvl")), Some("1"));

        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["One\nTwo\nThree"]);
        assert_eq!(set.get("One\nTwo\nThree").unwrap().items, vec!["One", "Two", "Three"]);
    }

    #[test]
    fn test_leftover_paragraphs_are_blanked() {
        let template = deck(&fixture::list_shape(2, &["A", "B", "C"]));
        let rendered = render(&template, json!({"A\nB\nC": ["Only"]}));

        let body = &bodies(&rendered)[0];
        assert_eq!(paragraphs(body).len(), 3);
        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Only"]);
    }

    #[test]
    fn test_string_into_list_shape_becomes_single_item() {
        let template = deck(&fixture::list_shape(2, &["A", "B"]));
        let rendered = render(&template, json!({"A\nB": "Single"}));

        let body = &bodies(&rendered)[0];
        assert_eq!(paragraphs(body).len(), 2);
        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Single"]);
    }

    #[test]
    fn test_list_into_plain_shape_is_joined() {
        let template = deck(&fixture::text_shape(2, "Title"));
        let rendered = render(&template, json!({"Title": ["Plan", "Execute"]}));

        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Plan, Execute"]);
    }

    #[test]
    fn test_list_into_multi_paragraph_plain_shape_fills_paragraphs() {
        let tree = fixture::shape(2, &[fixture::paragraph("First"), fixture::paragraph("Second")]);
        let template = deck(&tree);
        let set = PlaceholderExtractor::new().extract(&template, 0).unwrap();
        assert_eq!(set.get("First\nSecond").unwrap().kind, PlaceholderKind::Text);

        let rendered = render(&template, json!({"First\nSecond": ["Alpha", "Beta"]}));

        let body = &bodies(&rendered)[0];
        assert_eq!(paragraphs(body).len(), 2);
        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Alpha\nBeta"]);
        // Each paragraph keeps its own bold run.
        let second_run = paragraphs(body)[1].child("r").unwrap();
        assert_eq!(second_run.child("rPr").and_then(|r| r.attr("b")), Some("1"));
    }

    #[test]
    fn test_markup_bullets_decide_over_oracle_kind() {
        // Bulleted by markup only: reported as text, written as a list.
        let template = deck(&fixture::list_shape(2, &["Agenda"]));
        let set = PlaceholderExtractor::new().extract(&template, 0).unwrap();
        assert_eq!(set.get("Agenda").unwrap().kind, PlaceholderKind::Text);

        let rendered = render(&template, json!({"Agenda": ["Intro", "Results"]}));
        assert_eq!(paragraphs(&bodies(&rendered)[0]).len(), 2);
    }

    #[test]
    fn test_split_runs_fall_back_to_first_run() {
        let tree = fixture::shape(
            2,
            &["<a:p><a:r><a:rPr b=\"1\"/><a:t>Company </a:t></a:r><a:r><a:rPr i=\"1\"/><a:t>Name</a:t></a:r></a:p>"
                .to_string()],
        );
        let template = deck(&tree);
        let rendered = render(&template, json!({"Company Name": "Acme Corp"}));

        let body = &bodies(&rendered)[0];
        let runs: Vec<_> = paragraphs(body)[0].elements().filter(|e| e.is("r")).collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(run_text(runs[0]), "Acme Corp");
        assert_eq!(runs[0].child("rPr").and_then(|r| r.attr("b")), Some("1"));
        assert_eq!(run_text(runs[1]), "");
    }

    #[test]
    fn test_matching_run_replaced_other_runs_kept() {
        let tree = fixture::shape(
            2,
            &[
                "<a:p><a:r><a:t>Heading</a:t></a:r></a:p>".to_string(),
                "<a:p><a:endParaRPr lang=\"en-US\"/></a:p>".to_string(),
            ],
        );
        let template = deck(&tree);
        let rendered = render(&template, json!({"Heading": "Results"}));

        let body = &bodies(&rendered)[0];
        let paras = paragraphs(body);
        assert_eq!(paras.len(), 2);
        assert!(paras[1].child("endParaRPr").is_some());
        assert_eq!(run_text(paras[0].child("r").unwrap()), "Results");
    }

    #[test]
    fn test_empty_value_clears_runs_keeping_structure() {
        let template = deck(&[fixture::text_shape(2, "Title"), fixture::text_shape(3, "Keep")].concat());

        let mut values = BTreeMap::new();
        values.insert("Title".to_string(), FillValue::Empty);
        let rendered = TemplateRenderer::new()
            .render_values(&template, 0, &values)
            .unwrap();

        let body = &bodies(&template)[0];
        let before_runs = paragraphs(body)[0].elements().filter(|e| e.is("r")).count();
        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Keep"]);

        let doc = rendered.slide_xml(0).unwrap();
        let tree = doc.root.child("cSld").and_then(|c| c.child("spTree")).unwrap();
        let cleared = tree.elements().find(|e| e.is("sp")).unwrap();
        let paragraph = cleared.child("txBody").and_then(|b| b.child("p")).unwrap();
        assert_eq!(paragraph.elements().filter(|e| e.is("r")).count(), before_runs);
    }

    #[test]
    fn test_paragraph_without_runs_gets_styled_run() {
        let tree = fixture::shape(
            2,
            &[
                fixture::bullet_paragraph("Point", 0),
                "<a:p><a:pPr><a:buChar char=\"-\"/></a:pPr><a:endParaRPr lang=\"en-US\" sz=\"2400\"/></a:p>"
                    .to_string(),
            ],
        );
        let template = deck(&tree);
        let rendered = render(&template, json!({"Point": ["First", "Second"]}));

        let body = &bodies(&rendered)[0];
        let second = paragraphs(body)[1];
        let run = second.child("r").unwrap();
        assert_eq!(run_text(run), "Second");
        assert_eq!(run.child("rPr").and_then(|r| r.attr("sz")), Some("2400"));
        // The new run sits before the end-of-paragraph properties.
        let names: Vec<_> = second.elements().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["pPr", "r", "endParaRPr"]);
    }

    #[test]
    fn test_wrapped_value_is_unwrapped() {
        let template = deck(&fixture::text_shape(2, "Title"));
        let rendered = render(&template, json!({"Title": {"value": "Q3 Review"}}));
        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Q3 Review"]);
    }

    #[test]
    fn test_unsupported_value_is_render_error() {
        let template = deck(&fixture::text_shape(2, "Year"));
        let mapping = validated(&template, json!({"Year": 2024}));
        let err = TemplateRenderer::new().render(&template, 0, &mapping).unwrap_err();
        assert!(matches!(err, Error::RenderError { ref key, .. } if key == "Year"));
    }

    #[test]
    fn test_duplicate_texts_address_their_own_shape() {
        let tree = [
            fixture::text_shape(2, "Lorem ipsum"),
            fixture::text_shape(3, "Lorem ipsum"),
        ]
        .concat();
        let template = deck(&tree);
        let rendered = render(&template, json!({"Lorem ipsum": "Left", "Lorem ipsum #2": "Right"}));

        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Left", "Right"]);
    }

    #[test]
    fn test_round_trip_reproduces_text_values() {
        let tree = [
            fixture::text_shape(2, "Title"),
            fixture::text_shape(3, "Subtitle"),
            fixture::text_shape(4, "01"),
        ]
        .concat();
        let template = deck(&tree);
        let values = json!({"Title": "R&D <Update>", "Subtitle": "  Spaced out ", "01": "01"});
        let rendered = render(&template, values);

        let set = PlaceholderExtractor::new().extract(&rendered, 0).unwrap();
        assert_eq!(
            set.keys().collect::<Vec<_>>(),
            vec!["R&D <Update>", "Spaced out", "01"]
        );

        // Values are trimmed on write, so the run holds exactly the key.
        let subtitle = &bodies(&rendered)[1];
        assert_eq!(run_text(paragraphs(subtitle)[0].child("r").unwrap()), "Spaced out");
    }

    #[test]
    fn test_rendering_is_deterministic_and_source_untouched() {
        let template = deck(&steps_tree());
        let before = template.to_bytes().unwrap();
        let mapping = validated(
            &template,
            json!({"Title": "Q3 Review", "Step one\nStep two": ["Plan", "Execute", "Review"], "Footer": "Internal"}),
        );

        let renderer = TemplateRenderer::new();
        let first = renderer.render(&template, 0, &mapping).unwrap().to_bytes().unwrap();
        let second = renderer.render(&template, 0, &mapping).unwrap().to_bytes().unwrap();

        assert_eq!(first, second);
        assert_eq!(before, template.to_bytes().unwrap());
        assert_ne!(before, first);
    }
}
