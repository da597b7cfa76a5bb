//! # Dot-Matrix Display
//!
//! Everything needed to put the current notification on a fixed-resolution matrix.
//!
//! ```text
//! display/
//! ├── layout.rs    - Pure geometry: scale, position and scroll maths
//! ├── renderer.rs  - DisplayRenderer, owns the layout and scroll clock
//! ├── terminal.rs  - Truecolour stdout emulation of the matrix
//! └── headless.rs  - Backend that only logs draw calls
//! ```
//!
//! The renderer talks to hardware exclusively through the [`Display`] trait, so the
//! layout rules can be exercised against a recording fake.

pub mod headless;
pub mod layout;
pub mod renderer;
pub mod terminal;

pub use headless::HeadlessDisplay;
pub use layout::{compute_scale, layout, text_pixel_width, FontCell, Geometry, LayoutState};
pub use renderer::{DisplayRenderer, RenderError};
pub use terminal::TerminalDisplay;

use crate::color::Rgb;
use thiserror::Error;

/// Failures reported by a display backend.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("display rejected draw call: {0}")]
    Rejected(String),
}

/// Narrow interface to the matrix hardware.
pub trait Display {
    /// Blank the whole panel.
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Draw `text` with its top-left cell anchored at `x` and vertically centred on `y`.
    ///
    /// `x` may be negative while text scrolls off the left edge.
    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        scale: u32,
        color: Rgb,
    ) -> Result<(), DisplayError>;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Fixed-pitch font cell in pixels.
    fn font_cell(&self) -> FontCell;

    fn geometry(&self) -> Geometry {
        Geometry {
            width: self.width(),
            height: self.height(),
            cell: self.font_cell(),
        }
    }
}
