//! Document-shape classification.
//!
//! Only the layout of a note is inspected: headings, checkbox and list
//! density, fenced code, link density, and size. Words themselves are
//! ignored apart from a handful of section labels (`Agenda:`, `Attendees:`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{
    best_score, round3, scores_json, Category, ClassificationStrategy, MemoryClassification,
    Metadata, StrategyKind,
};

static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").expect("static regex"));
static CHECKBOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*+]\s+\[([ xX])\]").expect("static regex"));
static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").expect("static regex"));
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:```|~~~)").expect("static regex"));
static LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]+\]\([^)]+\)|\[\[[^\]]+\]\]|https?://\S+").expect("static regex")
});
static SECTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:#{1,6}\s*)?(?:agenda|attendees|participants|action items|decisions|minutes)\b")
        .expect("static regex")
});
static DATE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:#{1,6}\s*)?\d{4}-\d{2}-\d{2}\b").expect("static regex"));

/// Measured shape of a document.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub lines: usize,
    pub words: usize,
    pub headings: usize,
    pub list_items: usize,
    pub checkboxes: usize,
    pub checked: usize,
    pub code_blocks: usize,
    pub links: usize,
    pub link_density: f64,
    pub section_labels: usize,
    pub dated_title: bool,
}

impl Shape {
    pub fn measure(content: &str) -> Self {
        let mut shape = Shape::default();
        let mut fences = 0usize;
        let mut in_fence = false;
        let mut first_line_seen = false;

        for line in content.lines() {
            if FENCE.is_match(line) {
                fences += 1;
                in_fence = !in_fence;
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            shape.lines += 1;
            shape.words += line.split_whitespace().count();
            if in_fence {
                continue;
            }

            if !first_line_seen {
                shape.dated_title = DATE_TITLE.is_match(line.trim_start());
                first_line_seen = true;
            }
            if HEADING.is_match(line) {
                shape.headings += 1;
            }
            if let Some(caps) = CHECKBOX.captures(line) {
                shape.checkboxes += 1;
                if caps.get(1).is_some_and(|m| m.as_str() != " ") {
                    shape.checked += 1;
                }
            }
            if LIST_ITEM.is_match(line) {
                shape.list_items += 1;
            }
            if SECTION_LABEL.is_match(line.trim_start()) {
                shape.section_labels += 1;
            }
            shape.links += LINK.find_iter(line).count();
        }

        // An unterminated fence still opens a block.
        shape.code_blocks = fences.div_ceil(2);
        if shape.lines > 0 {
            shape.link_density = shape.links as f64 / shape.lines as f64;
        }
        shape
    }

    /// Score each category from the measured shape, in [`Category::KNOWN`] order.
    fn scores(&self) -> Vec<(Category, f64)> {
        let task = if self.checkboxes > 0 {
            let ratio = self.checkboxes as f64 / self.list_items.max(1) as f64;
            let bonus = if ratio >= 0.5 { 0.1 } else { 0.0 };
            (0.4 + 0.15 * self.checkboxes as f64 + bonus).min(0.95)
        } else {
            0.0
        };

        let code = if self.code_blocks > 0 {
            let bonus = if self.link_density >= 0.2 { 0.1 } else { 0.0 };
            (0.55 + 0.1 * self.code_blocks as f64).min(0.85) + bonus
        } else {
            0.0
        };

        let meeting = if self.section_labels > 0 {
            (0.5 + 0.15 * self.section_labels as f64).min(0.9)
        } else {
            0.0
        };

        let documentation = if self.headings >= 3 && self.words >= 200 {
            (0.5 + 0.05 * self.headings as f64).min(0.85)
        } else if self.headings >= 2 && self.words >= 80 {
            0.45
        } else {
            0.0
        };

        let note = if self.words > 0
            && self.words < 80
            && self.headings == 0
            && self.checkboxes == 0
            && self.code_blocks == 0
        {
            0.35
        } else {
            0.0
        };

        let journal = if self.dated_title { 0.6 } else { 0.0 };

        let reference = if self.links >= 3 && self.link_density >= 0.3 {
            (0.5 + 0.4 * self.link_density.min(1.0)).min(0.9)
        } else {
            0.0
        };

        vec![
            (Category::Meeting, meeting),
            (Category::Task, task),
            (Category::Code, code),
            (Category::Documentation, documentation),
            (Category::Note, note),
            (Category::Journal, journal),
            (Category::Reference, reference),
        ]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralStrategy;

impl StructuralStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl ClassificationStrategy for StructuralStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    fn classify(&self, content: &str, _metadata: Option<&Metadata>) -> MemoryClassification {
        let shape = Shape::measure(content);
        let scores = shape.scores();

        let Some((winner, score)) = best_score(&scores) else {
            return MemoryClassification::unknown(StrategyKind::Structural.as_str());
        };

        let mut attributes = serde_json::Map::new();
        attributes.insert("scores".into(), scores_json(&scores));
        attributes.insert(
            "shape".into(),
            serde_json::json!({
                "lines": shape.lines,
                "words": shape.words,
                "headings": shape.headings,
                "checkboxes": shape.checkboxes,
                "code_blocks": shape.code_blocks,
                "links": shape.links,
                "link_density": round3(shape.link_density),
            }),
        );

        MemoryClassification::new(winner, StrategyKind::Structural.as_str(), score, attributes)
    }
}
