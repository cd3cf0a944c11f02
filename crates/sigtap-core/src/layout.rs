//! Page layout reconstruction from positioned text fragments.
//!
//! The page source collaborator supplies text fragments with PDF-space
//! coordinates (y grows upward). This module rebuilds reading-order
//! lines from them and offers label-relative value lookups for fields
//! whose text alone is ambiguous.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// A positioned run of text on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

/// All text fragments of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_number: u32,
    pub fragments: Vec<TextFragment>,
}

/// A reconstructed reading-order line.
#[derive(Debug, Clone)]
pub struct Line {
    /// Rounded baseline y of the line.
    pub y: i64,
    /// Fragments in left-to-right order.
    pub fragments: Vec<TextFragment>,
}

impl Line {
    /// Line text with fragments joined by single spaces.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PageLayout {
    pub fn new(page_number: u32, fragments: Vec<TextFragment>) -> Self {
        Self {
            page_number,
            fragments,
        }
    }

    /// Validate that the page can be indexed at all.
    pub fn check(&self) -> Result<()> {
        if self.fragments.is_empty() {
            return Err(LayoutError::EmptyPage(self.page_number).into());
        }
        for fragment in &self.fragments {
            if !fragment.x.is_finite() || !fragment.y.is_finite() {
                return Err(LayoutError::InvalidCoordinates {
                    x: fragment.x,
                    y: fragment.y,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Group fragments into lines by rounded y, top of the page first.
    pub fn lines(&self) -> Vec<Line> {
        let mut by_y: std::collections::BTreeMap<i64, Vec<TextFragment>> =
            std::collections::BTreeMap::new();
        for fragment in &self.fragments {
            by_y
                .entry(fragment.y.round() as i64)
                .or_default()
                .push(fragment.clone());
        }

        // PDF y grows upward, so descending y is top-to-bottom.
        by_y.into_iter()
            .rev()
            .map(|(y, mut fragments)| {
                fragments.sort_by(|a, b| a.x.total_cmp(&b.x));
                Line { y, fragments }
            })
            .collect()
    }

    /// Full page text in reading order, one reconstructed line per row.
    pub fn full_text(&self) -> String {
        self.lines()
            .iter()
            .map(Line::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Geometry window for the below-the-label search.
const BELOW_MIN_DY: f32 = 10.0;
const BELOW_MAX_DY: f32 = 40.0;
const BELOW_MAX_DX: f32 = 100.0;

/// Geometry window for the right-of-the-label search.
const RIGHT_MIN_DX: f32 = 10.0;
const RIGHT_MAX_DX: f32 = 200.0;
const SAME_LINE_DY: f32 = 5.0;

/// Label-relative value lookup over a page's fragments.
pub struct PositionalIndex<'a> {
    fragments: &'a [TextFragment],
}

impl<'a> PositionalIndex<'a> {
    pub fn new(layout: &'a PageLayout) -> Self {
        Self {
            fragments: &layout.fragments,
        }
    }

    /// Find the value associated with a field label.
    ///
    /// Looks below the label first (tables print the value under the
    /// header), then to the right on the same line. Multiple candidates
    /// in the same window are joined with " / ". `accept` filters out
    /// fragments whose shape cannot be the value.
    pub fn value_for_label(
        &self,
        is_label: impl Fn(&str) -> bool,
        accept: impl Fn(&str) -> bool,
    ) -> Option<String> {
        let label = self
            .fragments
            .iter()
            .find(|f| is_label(f.text.trim()))?;

        let below = self.collect_candidates(label, &accept, |f| {
            let dy = label.y - f.y;
            let dx = (f.x - label.x).abs();
            (BELOW_MIN_DY..=BELOW_MAX_DY).contains(&dy) && dx < BELOW_MAX_DX
        });
        if !below.is_empty() {
            return Some(below.join(" / "));
        }

        let right = self.collect_candidates(label, &accept, |f| {
            let dx = f.x - label.x;
            let dy = (f.y - label.y).abs();
            (RIGHT_MIN_DX..=RIGHT_MAX_DX).contains(&dx) && dy <= SAME_LINE_DY
        });
        if !right.is_empty() {
            return Some(right.join(" / "));
        }

        None
    }

    fn collect_candidates(
        &self,
        label: &TextFragment,
        accept: &impl Fn(&str) -> bool,
        window: impl Fn(&TextFragment) -> bool,
    ) -> Vec<String> {
        let mut candidates: Vec<&TextFragment> = self
            .fragments
            .iter()
            .filter(|f| !std::ptr::eq(*f, label))
            .filter(|f| window(f))
            .filter(|f| {
                let trimmed = f.text.trim();
                !trimmed.is_empty() && accept(trimmed)
            })
            .collect();
        candidates.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
        candidates
            .into_iter()
            .map(|f| f.text.trim().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(fragments: Vec<TextFragment>) -> PageLayout {
        PageLayout::new(1, fragments)
    }

    #[test]
    fn test_lines_are_top_to_bottom_left_to_right() {
        let layout = page(vec![
            TextFragment::new("world", 120.0, 700.0),
            TextFragment::new("hello", 50.0, 700.0),
            TextFragment::new("second line", 50.0, 680.0),
        ]);
        let lines = layout.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "hello world");
        assert_eq!(lines[1].text(), "second line");
    }

    #[test]
    fn test_fragments_on_nearly_equal_y_share_a_line() {
        let layout = page(vec![
            TextFragment::new("a", 10.0, 500.2),
            TextFragment::new("b", 60.0, 499.8),
        ]);
        assert_eq!(layout.full_text(), "a b");
    }

    #[test]
    fn test_value_below_label_wins_over_right() {
        let layout = page(vec![
            TextFragment::new("Modalidade:", 100.0, 600.0),
            TextFragment::new("02 - Hospitalar", 105.0, 580.0),
            TextFragment::new("01 - Ambulatorial", 180.0, 600.0),
        ]);
        let index = PositionalIndex::new(&layout);
        let value = index.value_for_label(|t| t.starts_with("Modalidade"), |_| true);
        assert_eq!(value.as_deref(), Some("02 - Hospitalar"));
    }

    #[test]
    fn test_falls_back_to_right_of_label() {
        let layout = page(vec![
            TextFragment::new("Origem:", 100.0, 600.0),
            TextFragment::new("H.32013035", 180.0, 600.0),
        ]);
        let index = PositionalIndex::new(&layout);
        let value = index.value_for_label(|t| t.starts_with("Origem"), |_| true);
        assert_eq!(value.as_deref(), Some("H.32013035"));
    }

    #[test]
    fn test_multiple_candidates_are_joined() {
        let layout = page(vec![
            TextFragment::new("Instrumento:", 100.0, 600.0),
            TextFragment::new("03 - AIH", 100.0, 580.0),
            TextFragment::new("06 - APAC", 150.0, 580.0),
        ]);
        let index = PositionalIndex::new(&layout);
        let value = index.value_for_label(|t| t.starts_with("Instrumento"), |_| true);
        assert_eq!(value.as_deref(), Some("03 - AIH / 06 - APAC"));
    }

    #[test]
    fn test_shape_filter_rejects_noise() {
        let layout = page(vec![
            TextFragment::new("Modalidade:", 100.0, 600.0),
            TextFragment::new("página 3", 105.0, 580.0),
        ]);
        let index = PositionalIndex::new(&layout);
        let value = index.value_for_label(
            |t| t.starts_with("Modalidade"),
            |v| v.chars().next().is_some_and(|c| c.is_ascii_digit()) && v.contains('-'),
        );
        assert_eq!(value, None);
    }

    #[test]
    fn test_empty_page_is_rejected() {
        let layout = page(vec![]);
        assert!(layout.check().is_err());
    }
}
