//! Wheel summary of an assessment: one sector per category, one ring per question.

use std::f64::consts::PI;

use serde::Serialize;

use crate::{
    models::{AnswerOption, AssessmentQA},
    utils::grid::{CATEGORY_COUNT, FIRST_QUESTION_ORDER, QUESTIONS_PER_CATEGORY},
};

const SIZE: f64 = 400.0;
const INNER_RADIUS: f64 = 40.0;
const OUTER_RADIUS: f64 = 190.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentColor {
    Green,
    Yellow,
    Red,
    Other,
}

impl SegmentColor {
    pub fn from_answer(answer: Option<AnswerOption>) -> Self {
        match answer {
            Some(AnswerOption::Yes) => SegmentColor::Green,
            Some(AnswerOption::Mid) => SegmentColor::Yellow,
            Some(AnswerOption::No) => SegmentColor::Red,
            None => SegmentColor::Other,
        }
    }

    fn fill(&self) -> &'static str {
        match self {
            SegmentColor::Green => "#3fa34d",
            SegmentColor::Yellow => "#f2c230",
            SegmentColor::Red => "#d64541",
            SegmentColor::Other => "#d9d9d9",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WheelCategory {
    pub category_order: i32,
    pub name: String,
    pub segments: Vec<SegmentColor>, // indexed by question_order - 1
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WheelContext {
    pub categories: Vec<WheelCategory>,
}

/// Build the color context for the full grid.
///
/// Positions missing from `rows` render as `Other`.
pub fn prepare_context(rows: &[AssessmentQA]) -> WheelContext {
    let categories = (0..CATEGORY_COUNT)
        .map(|category_order| {
            let name = rows
                .iter()
                .find(|row| row.category_order == category_order)
                .map(|row| row.category_name.clone())
                .unwrap_or_default();

            let segments = (FIRST_QUESTION_ORDER..FIRST_QUESTION_ORDER + QUESTIONS_PER_CATEGORY)
                .map(|question_order| {
                    let answer = rows
                        .iter()
                        .find(|row| {
                            row.category_order == category_order
                                && row.question_order == question_order
                        })
                        .and_then(|row| row.answer_option);
                    SegmentColor::from_answer(answer)
                })
                .collect();

            WheelCategory {
                category_order,
                name,
                segments,
            }
        })
        .collect();

    WheelContext { categories }
}

fn point(angle: f64, radius: f64) -> (f64, f64) {
    let center = SIZE / 2.0;
    (center + radius * angle.cos(), center + radius * angle.sin())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Annular sector between two angles and two radii as an SVG path.
fn sector_path(start: f64, end: f64, inner: f64, outer: f64) -> String {
    let (x1, y1) = point(start, outer);
    let (x2, y2) = point(end, outer);
    let (x3, y3) = point(end, inner);
    let (x4, y4) = point(start, inner);
    format!(
        "M {:.2} {:.2} A {:.2} {:.2} 0 0 1 {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 0 0 {:.2} {:.2} Z",
        x1, y1, outer, outer, x2, y2, x3, y3, inner, inner, x4, y4
    )
}

/// Render the context as a standalone SVG document.
pub fn render_svg(context: &WheelContext) -> String {
    let sector_angle = 2.0 * PI / CATEGORY_COUNT as f64;
    let ring_width = (OUTER_RADIUS - INNER_RADIUS) / QUESTIONS_PER_CATEGORY as f64;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\" viewBox=\"0 0 {size} {size}\">\n",
        size = SIZE
    );

    for category in &context.categories {
        // start at twelve o'clock, clockwise
        let start = category.category_order as f64 * sector_angle - PI / 2.0;
        let end = start + sector_angle;

        svg.push_str(&format!(
            "  <g id=\"category-{}\"><title>{}</title>\n",
            category.category_order,
            escape(&category.name)
        ));
        for (ring, color) in category.segments.iter().enumerate() {
            let inner = INNER_RADIUS + ring as f64 * ring_width;
            svg.push_str(&format!(
                "    <path d=\"{}\" fill=\"{}\" stroke=\"#ffffff\" stroke-width=\"1\"/>\n",
                sector_path(start, end, inner, inner + ring_width),
                color.fill()
            ));
        }
        svg.push_str("  </g>\n");
    }

    svg.push_str("</svg>\n");
    svg
}
