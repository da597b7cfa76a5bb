//! Console emulation of the matrix.
//!
//! Renders one row of character cells, each `cell.width * scale` pixels wide, in
//! truecolour. Useful on a desktop or over SSH when no panel is attached.

use super::{Display, DisplayError, FontCell};
use crate::color::Rgb;
use color_eyre::owo_colors::OwoColorize;
use std::io::{Stdout, Write};

pub struct TerminalDisplay<W: Write = Stdout> {
    width: u32,
    height: u32,
    cell: FontCell,
    row: Vec<char>,
    out: W,
}

impl TerminalDisplay {
    /// Panel on stdout. Log output must go elsewhere or it tears the row.
    pub fn new(width: u32, height: u32, cell: FontCell) -> Self {
        Self::with_output(width, height, cell, std::io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn with_output(width: u32, height: u32, cell: FontCell, out: W) -> Self {
        Self {
            width,
            height,
            cell,
            row: Vec::new(),
            out,
        }
    }

    /// Characters visible in a `width`-pixel window with text starting at `x`.
    fn visible(&self, text: &str, x: i32, scale: u32) -> Vec<char> {
        let pitch = (self.cell.width * scale.max(1)).max(1) as i32;
        let columns = (self.width as i32 + pitch - 1) / pitch;
        let first = x.div_euclid(pitch);

        let mut row = vec![' '; columns as usize];
        for (i, ch) in text.chars().enumerate() {
            let col = first + i as i32;
            if (0..columns).contains(&col) {
                row[col as usize] = ch;
            }
        }
        row
    }

    fn flush(&mut self, color: Rgb) -> Result<(), DisplayError> {
        let line: String = self.row.iter().collect();
        write!(self.out, "\r[{}]", line.truecolor(color.r, color.g, color.b))?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn clear(&mut self) -> Result<(), DisplayError> {
        let blank = (self.width / self.cell.width.max(1)) as usize;
        self.row = vec![' '; blank];
        self.flush(Rgb::BLACK)
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        _y: i32,
        scale: u32,
        color: Rgb,
    ) -> Result<(), DisplayError> {
        if scale == 0 {
            return Err(DisplayError::Rejected(format!("scale 0 for {text:?}")));
        }
        self.row = self.visible(text, x, scale);
        self.flush(color)
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
