//! Fixed 13x4 questionnaire grid: category orders 0..=12, question orders 1..=4.

use crate::{error::ServiceError, models::AssessmentQA};

pub const CATEGORY_COUNT: i32 = 13;
pub const QUESTIONS_PER_CATEGORY: i32 = 4;
pub const FIRST_QUESTION_ORDER: i32 = 1;

/// Every (category_order, question_order) pair in reading order.
pub fn positions() -> Vec<(i32, i32)> {
    (0..CATEGORY_COUNT)
        .flat_map(|category| {
            (FIRST_QUESTION_ORDER..FIRST_QUESTION_ORDER + QUESTIONS_PER_CATEGORY)
                .map(move |question| (category, question))
        })
        .collect()
}

fn find(rows: &[AssessmentQA], position: (i32, i32)) -> Option<&AssessmentQA> {
    rows.iter()
        .find(|row| (row.category_order, row.question_order) == position)
}

/// Row at the requested position.
pub fn current(
    rows: &[AssessmentQA],
    category_order: i32,
    question_order: i32,
) -> Result<&AssessmentQA, ServiceError> {
    find(rows, (category_order, question_order)).ok_or_else(|| {
        ServiceError::not_found(format!(
            "Question {} in category {} was not found.",
            question_order, category_order
        ))
    })
}

/// Previous and next rows around a position, `None` at either end of the grid.
pub fn neighbours(
    rows: &[AssessmentQA],
    category_order: i32,
    question_order: i32,
) -> Result<(Option<&AssessmentQA>, Option<&AssessmentQA>), ServiceError> {
    current(rows, category_order, question_order)?;

    let grid = positions();
    let index = grid
        .iter()
        .position(|p| *p == (category_order, question_order))
        .ok_or_else(|| {
            ServiceError::not_found(format!(
                "Position ({}, {}) is outside the questionnaire.",
                category_order, question_order
            ))
        })?;

    let previous = index
        .checked_sub(1)
        .and_then(|i| grid.get(i))
        .and_then(|p| find(rows, *p));
    let next = grid.get(index + 1).and_then(|p| find(rows, *p));

    Ok((previous, next))
}

/// The four rows of one category, in question order.
pub fn filter_by_category(rows: &[AssessmentQA], category_order: i32) -> Vec<&AssessmentQA> {
    let mut selected: Vec<&AssessmentQA> = rows
        .iter()
        .filter(|row| row.category_order == category_order)
        .collect();
    selected.sort_by_key(|row| row.question_order);
    selected
}

/// Previous and next category orders, `None` past the first or last category.
pub fn neighbouring_categories(category_order: i32) -> (Option<i32>, Option<i32>) {
    let previous = (category_order > 0 && category_order < CATEGORY_COUNT)
        .then(|| category_order - 1);
    let next = (category_order >= 0 && category_order < CATEGORY_COUNT - 1)
        .then(|| category_order + 1);
    (previous, next)
}
