use crate::assets::Sprite;
use crate::input::ScreenMap;
use crate::model::{Bubble, World, FALLBACK_FILL, FOOD_DISPLAY_SIZE};
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }

    pub(crate) fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);

        // Braille: 2×4 pixels per cell
        let canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

// Restore the terminal however the loop ends, error paths included.
impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = queue!(
            self.out,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            DisableMouseCapture,
            LeaveAlternateScreen
        );
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

/// Collapse the canvas into braille cells. `cell_bg` supplies the background
/// color per terminal cell (row-major, one entry per cell of `out`).
pub(crate) fn canvas_to_cells(canvas: &PixelCanvas, out: &mut CellBuffer, cell_bg: &[Color]) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let px0 = cx * 2;
            let py0 = cy * 4;

            let mut mask: u8 = 0;
            let mut sum_r: u32 = 0;
            let mut sum_g: u32 = 0;
            let mut sum_b: u32 = 0;
            let mut ink_count: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = px0 + dx;
                    let y = py0 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    let a = p.a as u32;

                    // threshold: treat alpha as ink
                    if a >= 32 {
                        mask |= braille_bit(dx, dy);
                        sum_r += p.r as u32;
                        sum_g += p.g as u32;
                        sum_b += p.b as u32;
                        ink_count += 1;
                    }
                }
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');

            let fg = if ink_count > 0 {
                let r = (sum_r / ink_count) as u8;
                let g = (sum_g / ink_count) as u8;
                let b = (sum_b / ink_count) as u8;
                Color::Rgb { r, g, b }
            } else {
                Color::White
            };

            let bg = cell_bg[(cy * cols + cx) as usize];
            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

/* -----------------------------
   World pass: background colors + entity ink
------------------------------ */

/// World pixel -> canvas subpixel. The viewport is everything below the HUD
/// rows, at 2×4 subpixels per cell.
fn world_to_canvas(map: &ScreenMap, x: f32, y: f32) -> (f32, f32) {
    let view_rows = map.rows.saturating_sub(map.hud_rows).max(1) as f32;
    let sx = x / map.world_w * (map.cols.max(1) as f32 * 2.0);
    let sy = map.hud_rows as f32 * 4.0 + y / map.world_h * (view_rows * 4.0);
    (sx, sy)
}

/// Per-cell background colors for the whole buffer: the current background
/// sprite sampled at each viewport cell, composited over the fallback fill.
/// HUD rows get a plain black strip.
pub(crate) fn background_colors(world: &World, map: &ScreenMap) -> Vec<Color> {
    let (fr, fg_, fb) = FALLBACK_FILL;
    let fallback = Color::Rgb {
        r: fr,
        g: fg_,
        b: fb,
    };
    let cols = map.cols as usize;
    let rows = map.rows as usize;
    let view_rows = map.rows.saturating_sub(map.hud_rows).max(1) as f32;

    let mut out = vec![Color::Black; cols * rows];
    for row in map.hud_rows..map.rows {
        for col in 0..map.cols {
            let color = match world.background() {
                Some(sprite) => {
                    let u = (col as f32 + 0.5) / map.cols.max(1) as f32;
                    let v = ((row - map.hud_rows) as f32 + 0.5) / view_rows;
                    let p = sprite.sample(u.min(0.9999), v.min(0.9999));
                    // composite over the fallback so partial alpha still
                    // reads as water
                    let t = p.a as f32 / 255.0;
                    let mix = |s: u8, f: u8| (s as f32 * t + f as f32 * (1.0 - t) + 0.5) as u8;
                    Color::Rgb {
                        r: mix(p.r, fr),
                        g: mix(p.g, fg_),
                        b: mix(p.b, fb),
                    }
                }
                None => fallback,
            };
            out[row as usize * cols + col as usize] = color;
        }
    }
    out
}

/// A sprite stretched over a world-space rectangle, nearest-sampled per
/// canvas subpixel. `alpha` scales the sprite's own alpha (fading food);
/// `flipped` mirrors horizontally (fish facing).
fn draw_sprite(
    canvas: &mut PixelCanvas,
    map: &ScreenMap,
    sprite: &Sprite,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    alpha: u8,
    flipped: bool,
) {
    let (x0, y0) = world_to_canvas(map, x, y);
    let (x1, y1) = world_to_canvas(map, x + w, y + h);
    if x1 - x0 < 1e-3 || y1 - y0 < 1e-3 {
        return;
    }

    for py in y0.floor() as i32..y1.ceil() as i32 {
        for px in x0.floor() as i32..x1.ceil() as i32 {
            let u = ((px as f32 + 0.5) - x0) / (x1 - x0);
            let v = ((py as f32 + 0.5) - y0) / (y1 - y0);
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let u = if flipped { 1.0 - u } else { u };
            let mut p = sprite.sample(u.min(0.9999), v);
            if p.a == 0 {
                continue;
            }
            p.a = ((p.a as u32 * alpha as u32) / 255) as u8;
            canvas.blend_over(px, py, p);
        }
    }
}

fn draw_bubble(canvas: &mut PixelCanvas, map: &ScreenMap, b: &Bubble) {
    let body = Pixel {
        r: 180,
        g: 220,
        b: 255,
        a: 140,
    };
    let shine = Pixel {
        r: 240,
        g: 250,
        b: 255,
        a: 90,
    };
    let (cx, cy) = world_to_canvas(map, b.x, b.y);
    let (ex, ey) = world_to_canvas(map, b.x + b.radius, b.y + b.radius);
    let (rx, ry) = ((ex - cx).max(0.5), (ey - cy).max(0.5));

    for py in (cy - ry).floor() as i32..=(cy + ry).ceil() as i32 {
        for px in (cx - rx).floor() as i32..=(cx + rx).ceil() as i32 {
            let nx = (px as f32 + 0.5 - cx) / rx;
            let ny = (py as f32 + 0.5 - cy) / ry;
            let d2 = nx * nx + ny * ny;
            if d2 > 1.0 {
                continue;
            }
            canvas.blend_over(px, py, body);
            // highlight in the upper-left quadrant
            if d2 < 0.25 && nx < 0.0 && ny < 0.0 {
                canvas.blend_over(px, py, shine);
            }
        }
    }
}

/// Entity ink for one frame, back to front: bubbles, then food at its
/// current fade alpha, then fish.
pub(crate) fn draw_world(world: &World, canvas: &mut PixelCanvas, map: &ScreenMap) {
    for b in &world.bubbles {
        draw_bubble(canvas, map, b);
    }

    for item in &world.food {
        if let Some(sprite) = world.food_sprites.get(item.kind) {
            draw_sprite(
                canvas,
                map,
                sprite,
                item.x,
                item.y,
                FOOD_DISPLAY_SIZE.0,
                FOOD_DISPLAY_SIZE.1,
                item.alpha,
                false,
            );
        }
    }

    for fish in &world.fish {
        draw_sprite(
            canvas, map, &fish.sprite, fish.x, fish.y, fish.w, fish.h, 255, fish.flipped,
        );
    }
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testutil::test_world;

    fn map(cols: u16, rows: u16, hud_rows: u16) -> ScreenMap {
        ScreenMap {
            cols,
            rows,
            hud_rows,
            world_w: 900.0,
            world_h: 600.0,
        }
    }

    #[test]
    fn blend_over_opaque_replaces() {
        let mut c = PixelCanvas::new(4, 4);
        let red = Pixel {
            r: 255,
            g: 0,
            b: 0,
            a: 255,
        };
        c.blend_over(1, 1, red);
        assert_eq!(c.px[c.idx(1, 1)], red);
        // off-canvas writes are dropped
        c.blend_over(-1, 0, red);
        c.blend_over(4, 0, red);
        assert_eq!(c.px[c.idx(0, 0)].a, 0);
    }

    #[test]
    fn blend_over_half_alpha_mixes() {
        let mut c = PixelCanvas::new(1, 1);
        c.blend_over(
            0,
            0,
            Pixel {
                r: 0,
                g: 0,
                b: 200,
                a: 255,
            },
        );
        c.blend_over(
            0,
            0,
            Pixel {
                r: 200,
                g: 0,
                b: 0,
                a: 128,
            },
        );
        let p = c.px[0];
        assert!(p.r > 80 && p.r < 120);
        assert!(p.b > 80 && p.b < 120);
        assert_eq!(p.a, 255);
    }

    #[test]
    fn braille_mask_covers_all_dots() {
        let mut c = PixelCanvas::new(2, 4);
        for y in 0..4 {
            for x in 0..2 {
                c.blend_over(
                    x,
                    y,
                    Pixel {
                        r: 255,
                        g: 255,
                        b: 255,
                        a: 255,
                    },
                );
            }
        }
        let mut buf = CellBuffer::new(1, 1);
        canvas_to_cells(&c, &mut buf, &[Color::Black]);
        assert_eq!(buf.cells[0].ch, '\u{28FF}'); // all eight dots
    }

    #[test]
    fn empty_canvas_yields_blank_braille() {
        let c = PixelCanvas::new(2, 4);
        let mut buf = CellBuffer::new(1, 1);
        canvas_to_cells(&c, &mut buf, &[Color::Blue]);
        assert_eq!(buf.cells[0].ch, '\u{2800}');
        assert_eq!(buf.cells[0].bg, Color::Blue);
    }

    #[test]
    fn fallback_fill_without_backgrounds() {
        let world = test_world(1, 0, 0);
        let m = map(10, 6, 1);
        let colors = background_colors(&world, &m);
        assert_eq!(colors.len(), 60);
        // HUD row stays black, viewport gets the fill
        assert_eq!(colors[0], Color::Black);
        assert_eq!(
            colors[10],
            Color::Rgb {
                r: 0,
                g: 100,
                b: 150
            }
        );
    }

    #[test]
    fn background_sprite_colors_the_viewport() {
        let world = test_world(1, 1, 0);
        let m = map(8, 5, 1);
        let colors = background_colors(&world, &m);
        // testutil background is a solid opaque color
        assert_eq!(
            colors[8],
            Color::Rgb {
                r: 200,
                g: 180,
                b: 90
            }
        );
    }

    #[test]
    fn draw_world_inks_the_fish() {
        let mut world = test_world(1, 0, 0);
        world.fish[0].x = 390.0;
        world.fish[0].y = 260.0;
        let m = map(90, 31, 1);
        let mut canvas = PixelCanvas::new(180, 124);
        draw_world(&world, &mut canvas, &m);
        assert!(canvas.px.iter().any(|p| p.a > 0));
    }

    #[test]
    fn faded_food_draws_fainter_than_fresh() {
        let mut world = test_world(1, 0, 1);
        world.fish.clear();
        world.food.push(crate::model::Food::new(400.0, 300.0, 0));
        let m = map(90, 31, 1);

        let mut fresh = PixelCanvas::new(180, 124);
        draw_world(&world, &mut fresh, &m);
        let max_fresh = fresh.px.iter().map(|p| p.a).max().unwrap();

        world.food[0].alpha = 64;
        let mut faded = PixelCanvas::new(180, 124);
        draw_world(&world, &mut faded, &m);
        let max_faded = faded.px.iter().map(|p| p.a).max().unwrap();

        assert_eq!(max_fresh, 255);
        assert!(max_faded < 80 && max_faded > 0);
    }

    #[test]
    fn draw_text_clips_at_the_edge() {
        let mut buf = CellBuffer::new(5, 2);
        draw_text(&mut buf, 3, 0, "abcd", Color::White, Color::Black);
        assert_eq!(buf.cells[buf.idx(3, 0)].ch, 'a');
        assert_eq!(buf.cells[buf.idx(4, 0)].ch, 'b');
        // 'c' and 'd' fell off; row 1 untouched
        assert_eq!(buf.cells[buf.idx(0, 1)].ch, ' ');
    }
}
