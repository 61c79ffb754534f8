//! Text shapes on a slide: traversal, text, structure and keys.

use deckfill_core::normalize::starts_with_bullet;
use deckfill_core::PlaceholderKind;
use std::collections::HashSet;

use crate::xml::{Element, Node};

/// Paragraph facts needed for list inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParagraphInfo {
    pub text: String,
    pub level: u32,
    pub has_bullet_markup: bool,
}

/// A shape with a non-empty text body.
#[derive(Debug, Clone)]
pub(crate) struct TextShape {
    /// Address as `children` indices from the slide root.
    pub path: Vec<usize>,
    /// Address of the shape in the placeholder set (qualified if duplicated).
    pub key: String,
    /// Trimmed literal text of the shape.
    pub text: String,
    pub paragraphs: Vec<ParagraphInfo>,
}

impl TextShape {
    /// Kind as reported to the oracle: indentation or typed bullet glyphs.
    pub fn inferred_kind(&self) -> PlaceholderKind {
        let is_list = self
            .paragraphs
            .iter()
            .any(|p| p.level > 0 || starts_with_bullet(&p.text));
        if is_list {
            PlaceholderKind::List
        } else {
            PlaceholderKind::Text
        }
    }

    /// Structural kind used when writing. Besides the inferred kind, bullet
    /// or auto-numbering markup and more than one non-empty paragraph make
    /// a shape list-like.
    pub fn is_list_like(&self) -> bool {
        self.inferred_kind() == PlaceholderKind::List
            || self.paragraphs.iter().any(|p| p.has_bullet_markup)
            || self.items().len() > 1
    }

    /// Trimmed non-empty paragraph texts.
    pub fn items(&self) -> Vec<String> {
        self.paragraphs
            .iter()
            .map(|p| p.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Collect text shapes in document order with their placeholder keys.
///
/// The first shape with a given text keeps it as key; later shapes with
/// the same text are qualified as `"<text> #2"`, `"<text> #3"`, ...
pub(crate) fn text_shapes(root: &Element) -> Vec<TextShape> {
    let mut shapes = Vec::new();

    let tree = root
        .children
        .iter()
        .enumerate()
        .find_map(|(idx, node)| match node {
            Node::Element(e) if e.is("cSld") => Some((idx, e)),
            _ => None,
        })
        .and_then(|(csld_idx, csld)| {
            csld.children
                .iter()
                .enumerate()
                .find_map(|(idx, node)| match node {
                    Node::Element(e) if e.is("spTree") => Some((vec![csld_idx, idx], e)),
                    _ => None,
                })
        });

    if let Some((path, tree)) = tree {
        collect_shapes(tree, path, &mut shapes);
    }

    assign_keys(&mut shapes);
    shapes
}

fn collect_shapes(container: &Element, path: Vec<usize>, out: &mut Vec<TextShape>) {
    for (idx, node) in container.children.iter().enumerate() {
        let Node::Element(element) = node else {
            continue;
        };

        let mut child_path = path.clone();
        child_path.push(idx);

        if element.is("grpSp") {
            collect_shapes(element, child_path, out);
            continue;
        }

        if !element.is("sp") {
            continue;
        }

        let Some(body) = element.child("txBody") else {
            continue;
        };

        let paragraphs: Vec<ParagraphInfo> = body
            .elements()
            .filter(|e| e.is("p"))
            .map(|p| ParagraphInfo {
                text: paragraph_text(p),
                level: paragraph_level(p),
                has_bullet_markup: has_bullet_markup(p),
            })
            .collect();

        let text = paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if text.is_empty() {
            continue;
        }

        out.push(TextShape {
            path: child_path,
            key: String::new(),
            text,
            paragraphs,
        });
    }
}

fn assign_keys(shapes: &mut [TextShape]) {
    let literals: HashSet<String> = shapes.iter().map(|s| s.text.clone()).collect();
    let mut taken: HashSet<String> = HashSet::new();

    for shape in shapes.iter_mut() {
        if taken.insert(shape.text.clone()) {
            shape.key = shape.text.clone();
            continue;
        }

        let mut n = 2;
        let key = loop {
            let candidate = format!("{} #{}", shape.text, n);
            if !literals.contains(&candidate) && !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        log::warn!("Duplicate placeholder text {:?}, addressing it as {:?}", shape.text, key);
        taken.insert(key.clone());
        shape.key = key;
    }
}

/// Whether an element is a text run (`a:r`) or text field (`a:fld`).
pub(crate) fn is_run(element: &Element) -> bool {
    element.is("r") || element.is("fld")
}

/// Text of a run or field.
pub(crate) fn run_text(run: &Element) -> String {
    run.child("t").map(Element::text).unwrap_or_default()
}

/// Paragraph text: runs and fields concatenated, line breaks as `\n`.
pub(crate) fn paragraph_text(paragraph: &Element) -> String {
    let mut text = String::new();
    for element in paragraph.elements() {
        if is_run(element) {
            text.push_str(&run_text(element));
        } else if element.is("br") {
            text.push('\n');
        }
    }
    text
}

fn paragraph_level(paragraph: &Element) -> u32 {
    paragraph
        .child("pPr")
        .and_then(|ppr| ppr.attr("lvl"))
        .and_then(|lvl| lvl.parse().ok())
        .unwrap_or(0)
}

fn has_bullet_markup(paragraph: &Element) -> bool {
    paragraph.child("pPr").is_some_and(|ppr| {
        ppr.elements()
            .any(|e| e.is("buChar") || e.is("buAutoNum") || e.is("buBlip"))
    })
}
