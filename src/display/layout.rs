//! Text geometry for the matrix.
//!
//! All functions here are pure; the renderer owns the resulting [`LayoutState`] and
//! mutates only its scroll fields between messages.

use std::time::Duration;

/// Fixed-pitch font cell in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontCell {
    pub width: u32,
    pub height: u32,
}

/// Panel size plus the font cell used to draw on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub cell: FontCell,
}

/// Where and how big the current text is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutState {
    pub scale: u32,
    pub x: i32,
    pub y: i32,
    pub scroll_position: u32,
    pub scroll_active: bool,
    /// Rendered width of the text at `scale`.
    pub text_width: u32,
    /// Length of one scroll loop: text width plus display width.
    pub cycle: u32,
}

/// Rendered width of `text` at `scale`, one cell per character.
pub fn text_pixel_width(text: &str, cell_width: u32, scale: u32) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    chars.saturating_mul(cell_width).saturating_mul(scale)
}

/// Largest legible scale for `text`.
///
/// The panel height always bounds the scale. The width bound only matters when the
/// unscaled text fits; text that is wider than the panel at scale 1 stays at scale 1
/// and scrolls instead of shrinking.
pub fn compute_scale(
    text: &str,
    cell_width: u32,
    cell_height: u32,
    display_width: u32,
    display_height: u32,
) -> u32 {
    let height_bound = (display_height / cell_height.max(1)).max(1);

    let unscaled = text_pixel_width(text, cell_width, 1);
    if unscaled == 0 {
        return height_bound;
    }
    let width_bound = display_width / unscaled;

    height_bound.min(width_bound).max(1)
}

/// Positions `text` at `scale` on the panel, starting a fresh scroll loop.
pub fn layout(text: &str, scale: u32, geometry: &Geometry) -> LayoutState {
    let block = geometry.cell.height.saturating_mul(scale) as i32;
    let y = (geometry.height as i32 - block) / 2 + block / 2;

    let text_width = text_pixel_width(text, geometry.cell.width, scale);
    let scroll_active = text_width > geometry.width;
    let x = if scroll_active {
        0
    } else {
        ((geometry.width - text_width) / 2) as i32
    };

    LayoutState {
        scale,
        x,
        y,
        scroll_position: 0,
        scroll_active,
        text_width,
        cycle: text_width.saturating_add(geometry.width),
    }
}

impl LayoutState {
    /// Moves the text left by `step` pixels once `period` has elapsed.
    ///
    /// Returns whether the position changed. Non-scrolling layouts never move.
    pub fn advance_scroll(&mut self, elapsed: Duration, period: Duration, step: u32) -> bool {
        if !self.scroll_active || elapsed < period || self.cycle == 0 {
            return false;
        }
        self.scroll_position = (self.scroll_position + step % self.cycle) % self.cycle;
        self.x = -(self.scroll_position as i32);
        true
    }
}
