//! Stage geometry for the chat page, in percent of the viewport.

use serde::Serialize;
use std::f64::consts::PI;
use std::time::Duration;

/// Viewports narrower than this many pixels use the mobile arrangement.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

pub const ENTRANCE_STAGGER: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where each of `count` characters stands.
///
/// Three characters get hand-placed spots; any other count is spread over a
/// circle starting from the top.
pub fn character_positions(count: usize, mobile: bool) -> Vec<Position> {
    if count == 3 {
        return if mobile {
            vec![
                Position::new(50.0, 25.0),
                Position::new(50.0, 50.0),
                Position::new(50.0, 75.0),
            ]
        } else {
            vec![
                Position::new(20.0, 50.0),
                Position::new(50.0, 40.0),
                Position::new(80.0, 50.0),
            ]
        };
    }

    let radius = if mobile { 25.0 } else { 30.0 };
    (0..count)
        .map(|i| {
            let angle = (i as f64 / count as f64) * 2.0 * PI - PI / 2.0;
            Position::new(50.0 + radius * angle.cos(), 50.0 + radius * angle.sin())
        })
        .collect()
}

/// Speech bubble anchor for a character: above it on desktop, beside it on mobile.
pub fn bubble_position(character: Position, mobile: bool) -> Position {
    if mobile {
        let x = if character.x < 50.0 {
            character.x + 25.0
        } else {
            character.x - 25.0
        };
        Position::new(x, character.y)
    } else {
        Position::new(character.x, character.y - 20.0)
    }
}

pub fn entrance_delay(index: usize) -> Duration {
    ENTRANCE_STAGGER * u32::try_from(index).unwrap_or(u32::MAX)
}
