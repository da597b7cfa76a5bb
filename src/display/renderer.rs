use super::layout::{compute_scale, layout, LayoutState};
use super::{Display, DisplayError};
use crate::color::Rgb;
use crate::message::Message;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("display update failed: {0}")]
    Display(#[from] DisplayError),
}

/// Scroll animation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    pub step_px: u32,
    pub period: Duration,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            step_px: 1,
            period: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    text: String,
    color: Rgb,
    layout: LayoutState,
}

/// Keeps the layout of the current message and redraws it on the display.
///
/// The animation is driven by wall time passed in by the caller, so the scroll
/// speed does not depend on how often the main loop comes around.
#[derive(Debug)]
pub struct DisplayRenderer {
    scroll: ScrollSettings,
    frame: Option<Frame>,
    last_scroll: Instant,
    // Set when the last draw failed so the next tick retries it.
    dirty: bool,
}

impl DisplayRenderer {
    pub fn new(scroll: ScrollSettings, now: Instant) -> Self {
        Self {
            scroll,
            frame: None,
            last_scroll: now,
            dirty: false,
        }
    }

    /// Current layout, `None` while the panel is blank.
    pub fn layout(&self) -> Option<&LayoutState> {
        self.frame.as_ref().map(|f| &f.layout)
    }

    /// Scroll period while the current text is animating.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.layout()
            .filter(|l| l.scroll_active)
            .map(|_| self.scroll.period)
    }

    /// Lays out a new current message and redraws the panel.
    ///
    /// `None` blanks the display. The layout is kept even when drawing fails.
    pub fn show(
        &mut self,
        display: &mut dyn Display,
        message: Option<&Message>,
        now: Instant,
    ) -> Result<(), RenderError> {
        let geometry = display.geometry();
        self.frame = message.map(|message| {
            let text = message.text();
            let scale = compute_scale(
                text,
                geometry.cell.width,
                geometry.cell.height,
                geometry.width,
                geometry.height,
            );
            let layout = layout(text, scale, &geometry);
            debug!(
                "Layout for {:?}: {}px at scale {}, x {}, y {}, scrolling {}",
                text, layout.text_width, layout.scale, layout.x, layout.y, layout.scroll_active
            );
            Frame {
                text: text.to_string(),
                color: message.color(),
                layout,
            }
        });
        self.last_scroll = now;
        self.render(display)
    }

    /// Advances the scroll animation if due and redraws.
    ///
    /// Returns whether anything was drawn.
    pub fn tick(&mut self, display: &mut dyn Display, now: Instant) -> Result<bool, RenderError> {
        let elapsed = now.saturating_duration_since(self.last_scroll);
        let advanced = match self.frame.as_mut() {
            Some(frame) => {
                frame
                    .layout
                    .advance_scroll(elapsed, self.scroll.period, self.scroll.step_px)
            }
            None => false,
        };
        if advanced {
            self.last_scroll = now;
            if let Some(frame) = &self.frame {
                trace!("Scroll position {}", frame.layout.scroll_position);
            }
        }

        if advanced || self.dirty {
            self.render(display)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn render(&mut self, display: &mut dyn Display) -> Result<(), RenderError> {
        self.dirty = true;
        display.clear()?;
        if let Some(frame) = &self.frame {
            let l = &frame.layout;
            display.draw_text(&frame.text, l.x, l.y, l.scale, frame.color)?;
        }
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Priority;
    use crate::testing::{DrawCall, RecordingDisplay};

    fn renderer(now: Instant) -> DisplayRenderer {
        DisplayRenderer::new(ScrollSettings::default(), now)
    }

    #[test]
    fn new_message_clears_then_draws_once() {
        let now = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(now);

        let msg = Message::new("HELLO", Priority::High);
        r.show(&mut display, Some(&msg), now).unwrap();

        assert_eq!(
            display.take_calls(),
            vec![
                DrawCall::Clear,
                DrawCall::Text {
                    text: "HELLO".into(),
                    x: 2,
                    y: 16,
                    scale: 2,
                    color: Rgb::RED,
                },
            ]
        );
    }

    #[test]
    fn absent_message_only_clears() {
        let now = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(now);

        r.show(&mut display, None, now).unwrap();
        assert_eq!(display.take_calls(), vec![DrawCall::Clear]);
        assert!(r.layout().is_none());
        assert!(!r.tick(&mut display, now + Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn static_text_is_not_redrawn_on_tick() {
        let now = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(now);
        r.show(&mut display, Some(&Message::plain("HI")), now).unwrap();
        display.take_calls();

        assert!(!r.tick(&mut display, now + Duration::from_secs(5)).unwrap());
        assert!(display.take_calls().is_empty());
    }

    #[test]
    fn scroll_tick_redraws_with_new_x_only() {
        let start = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(start);
        let msg = Message::new("THIS IS A VERY LONG NOTIFICATION", Priority::Low);
        r.show(&mut display, Some(&msg), start).unwrap();
        display.take_calls();

        assert!(!r.tick(&mut display, start + Duration::from_millis(50)).unwrap());
        assert!(r.tick(&mut display, start + Duration::from_millis(100)).unwrap());
        assert!(r.tick(&mut display, start + Duration::from_millis(200)).unwrap());

        let xs: Vec<i32> = display
            .take_calls()
            .into_iter()
            .filter_map(|call| match call {
                DrawCall::Text {
                    x, scale, color, ..
                } => {
                    assert_eq!(scale, 1);
                    assert_eq!(color, Rgb::GREEN);
                    Some(x)
                }
                DrawCall::Clear => None,
            })
            .collect();
        assert_eq!(xs, vec![-1, -2]);
    }

    #[test]
    fn scroll_advances_one_step_per_tick_even_after_long_stall() {
        let start = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(start);
        let msg = Message::plain("THIS IS A VERY LONG NOTIFICATION");
        r.show(&mut display, Some(&msg), start).unwrap();

        r.tick(&mut display, start + Duration::from_secs(2)).unwrap();
        assert_eq!(r.layout().map(|l| l.scroll_position), Some(1));
    }

    #[test]
    fn only_scrolling_text_has_a_frame_interval() {
        let now = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(now);
        assert_eq!(r.frame_interval(), None);

        r.show(&mut display, Some(&Message::plain("HI")), now).unwrap();
        assert_eq!(r.frame_interval(), None);

        let long = Message::plain("THIS IS A VERY LONG NOTIFICATION");
        r.show(&mut display, Some(&long), now).unwrap();
        assert_eq!(r.frame_interval(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn new_message_resets_scroll() {
        let start = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(start);
        let long = Message::plain("THIS IS A VERY LONG NOTIFICATION");
        r.show(&mut display, Some(&long), start).unwrap();
        r.tick(&mut display, start + Duration::from_millis(100)).unwrap();

        r.show(&mut display, Some(&long), start + Duration::from_millis(150))
            .unwrap();
        assert_eq!(r.layout().map(|l| l.scroll_position), Some(0));
    }

    #[test]
    fn failed_draw_is_retried_on_next_tick() {
        let now = Instant::now();
        let mut display = RecordingDisplay::panel_64x32();
        let mut r = renderer(now);

        display.fail_next_draw();
        let msg = Message::plain("HI");
        assert!(r.show(&mut display, Some(&msg), now).is_err());
        assert!(r.layout().is_some());
        display.take_calls();

        assert!(r.tick(&mut display, now).unwrap());
        assert!(display
            .take_calls()
            .iter()
            .any(|c| matches!(c, DrawCall::Text { text, .. } if text == "HI")));
    }
}
