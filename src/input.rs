use crate::sim::WorldEvent;
use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum InputEvent {
    Key { code: KeyCode, mods: KeyModifiers },
    PointerDown { col: u16, row: u16 },
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    // poll with a tiny timeout so we stay responsive
    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        match event::read()? {
            Event::Key(k) => {
                if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                    out.push(InputEvent::Key {
                        code: k.code,
                        mods: k.modifiers,
                    });
                }
            }
            Event::Mouse(m) => {
                if let MouseEventKind::Down(MouseButton::Left) = m.kind {
                    out.push(InputEvent::PointerDown {
                        col: m.column,
                        row: m.row,
                    });
                }
            }
            _ => {}
        }
        if out.len() >= 32 {
            break;
        }
    }
    Ok(out)
}

/// Maps terminal cells onto world pixels. Rows below `hud_rows` are the tank
/// viewport; the HUD itself is not clickable.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ScreenMap {
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) hud_rows: u16,
    pub(crate) world_w: f32,
    pub(crate) world_h: f32,
}

impl ScreenMap {
    pub(crate) fn cell_to_world(&self, col: u16, row: u16) -> Option<(f32, f32)> {
        if col >= self.cols || row < self.hud_rows || row >= self.rows {
            return None;
        }
        let view_rows = (self.rows - self.hud_rows).max(1) as f32;
        let x = (col as f32 + 0.5) / self.cols.max(1) as f32 * self.world_w;
        let y = ((row - self.hud_rows) as f32 + 0.5) / view_rows * self.world_h;
        Some((x, y))
    }
}

/// Pure translation from terminal input to world events. Returns None for
/// input the world does not care about (the app handles those, e.g. the HUD
/// toggle).
pub(crate) fn map_event(ev: InputEvent, map: &ScreenMap) -> Option<WorldEvent> {
    match ev {
        InputEvent::Key { code, mods } => match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(WorldEvent::Quit),
            KeyCode::Char('c') if mods.contains(KeyModifiers::CONTROL) => Some(WorldEvent::Quit),
            KeyCode::Right => Some(WorldEvent::BackgroundNext),
            KeyCode::Left => Some(WorldEvent::BackgroundPrev),
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                Some(WorldEvent::SelectFood(ch as usize - '0' as usize))
            }
            _ => None,
        },
        InputEvent::PointerDown { col, row } => map
            .cell_to_world(col, row)
            .map(|(x, y)| WorldEvent::PointerDown { x, y }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ScreenMap {
        ScreenMap {
            cols: 90,
            rows: 31,
            hud_rows: 1,
            world_w: 900.0,
            world_h: 600.0,
        }
    }

    fn key(code: KeyCode) -> InputEvent {
        InputEvent::Key {
            code,
            mods: KeyModifiers::NONE,
        }
    }

    #[test]
    fn keys_map_to_world_events() {
        let m = map();
        assert_eq!(map_event(key(KeyCode::Right), &m), Some(WorldEvent::BackgroundNext));
        assert_eq!(map_event(key(KeyCode::Left), &m), Some(WorldEvent::BackgroundPrev));
        assert_eq!(map_event(key(KeyCode::Char('q')), &m), Some(WorldEvent::Quit));
        assert_eq!(map_event(key(KeyCode::Esc), &m), Some(WorldEvent::Quit));
        assert_eq!(
            map_event(key(KeyCode::Char('7')), &m),
            Some(WorldEvent::SelectFood(7))
        );
        assert_eq!(map_event(key(KeyCode::Char('h')), &m), None);
    }

    #[test]
    fn ctrl_c_quits() {
        let ev = InputEvent::Key {
            code: KeyCode::Char('c'),
            mods: KeyModifiers::CONTROL,
        };
        assert_eq!(map_event(ev, &map()), Some(WorldEvent::Quit));
    }

    #[test]
    fn clicks_map_into_world_space() {
        let m = map();
        // 90 cols over 900 px: one cell is 10 px, centers land on halves.
        let ev = map_event(InputEvent::PointerDown { col: 45, row: 16 }, &m).unwrap();
        match ev {
            WorldEvent::PointerDown { x, y } => {
                assert!((x - 455.0).abs() < 1e-3);
                // 30 viewport rows over 600 px: row 16 is the 15th view row.
                assert!((y - 310.0).abs() < 1e-3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn hud_row_is_not_clickable() {
        let m = map();
        assert_eq!(map_event(InputEvent::PointerDown { col: 3, row: 0 }, &m), None);
        assert_eq!(
            map_event(InputEvent::PointerDown { col: 200, row: 5 }, &m),
            None
        );
    }
}
