use super::{Display, DisplayError, FontCell};
use crate::color::Rgb;
use tracing::debug;

/// Display backend without a panel; every call ends up in the log.
pub struct HeadlessDisplay {
    width: u32,
    height: u32,
    cell: FontCell,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32, cell: FontCell) -> Self {
        Self {
            width,
            height,
            cell,
        }
    }
}

impl Display for HeadlessDisplay {
    fn clear(&mut self) -> Result<(), DisplayError> {
        debug!("display: clear");
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        y: i32,
        scale: u32,
        color: Rgb,
    ) -> Result<(), DisplayError> {
        debug!("display: {:?} at ({}, {}) x{} in {}", text, x, y, scale, color);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn font_cell(&self) -> FontCell {
        self.cell
    }
}
