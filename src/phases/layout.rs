// Text layout: greedy word wrap and vertical centering inside a region box
//
// Pure geometry over a TextMeasure so the rules can be checked without fonts.

use crate::core::errors::RenderResult;
use crate::core::types::{RecognizedWord, TextAlign};

/// Line advance as a multiple of the font size
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Width of a single rendered line under some resolved font
pub trait TextMeasure {
    fn measure(&mut self, text: &str) -> RenderResult<f32>;
}

impl<F> TextMeasure for F
where
    F: FnMut(&str) -> RenderResult<f32>,
{
    fn measure(&mut self, text: &str) -> RenderResult<f32> {
        self(text)
    }
}

/// Wrap `text` into lines no wider than `max_width`.
///
/// Explicit newlines always break. Inside a segment tokens are split on
/// single spaces and accumulated greedily; a candidate line is measured
/// before a token is appended, and when it would exceed `max_width` the
/// current line is committed and the token starts the next one. A token is
/// never split, so a lone long token may exceed `max_width`. An empty
/// segment produces one empty line.
pub fn wrap_text<M>(measure: &mut M, text: &str, max_width: f32) -> RenderResult<Vec<String>>
where
    M: TextMeasure + ?Sized,
{
    let mut lines = Vec::new();

    for segment in text.split('\n') {
        let mut tokens = segment.split(' ');
        let mut current = tokens.next().unwrap_or_default().to_string();

        for token in tokens {
            let candidate = format!("{current} {token}");
            if measure.measure(&candidate)? > max_width {
                lines.push(std::mem::replace(&mut current, token.to_string()));
            } else {
                current = candidate;
            }
        }

        lines.push(current);
    }

    Ok(lines)
}

/// Wrapped lines of one region and where to draw them
#[derive(Debug, Clone, PartialEq)]
pub struct RegionLayout {
    pub lines: Vec<String>,
    pub align: TextAlign,
    /// x the alignment refers to: line start, middle or end
    pub anchor_x: f32,
    /// Vertical middle of the first line
    pub first_baseline: f32,
    pub line_height: f32,
}

impl RegionLayout {
    pub fn baselines(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.lines.len()).map(move |i| self.first_baseline + i as f32 * self.line_height)
    }

    /// Left edge of a line of the given measured width
    pub fn line_left(&self, line_width: f32) -> f32 {
        match self.align {
            TextAlign::Left => self.anchor_x,
            TextAlign::Center => self.anchor_x - line_width / 2.0,
            TextAlign::Right => self.anchor_x - line_width,
        }
    }
}

/// Lay out the display text of `word` inside its box, or None if there is
/// nothing to draw.
pub fn layout_region<M>(measure: &mut M, word: &RecognizedWord) -> RenderResult<Option<RegionLayout>>
where
    M: TextMeasure + ?Sized,
{
    let text = word.display_text();
    if text.trim().is_empty() {
        return Ok(None);
    }

    let style = &word.style;
    let bbox = &word.bbox;
    let padding = style.padding.max(0.0);

    let anchor_x = match style.text_align {
        TextAlign::Left => bbox.x0 as f32 + padding,
        TextAlign::Right => bbox.x1 as f32 - padding,
        TextAlign::Center => bbox.center_x(),
    };

    let max_width = bbox.width() as f32 - padding * 2.0;
    let lines = wrap_text(measure, text, max_width)?;

    let line_height = style.font_size * LINE_HEIGHT_FACTOR;
    let total_height = lines.len() as f32 * line_height;
    let first_baseline = bbox.center_y() - total_height / 2.0 + line_height / 2.0;

    Ok(Some(RegionLayout {
        lines,
        align: style.text_align,
        anchor_x,
        first_baseline,
        line_height,
    }))
}
