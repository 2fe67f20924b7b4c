use crate::assets;
use crate::config::{load_settings, Settings};
use crate::input::{collect_input_nonblocking, map_event, InputEvent, ScreenMap};
use crate::model::World;
use crate::render::{background_colors, canvas_to_cells, draw_text, draw_world, Terminal};
use anyhow::Result;
use crossterm::event::KeyCode;
use crossterm::style::Color;
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const TICK_RATE: u32 = 60;

// A stall (suspend, huge resize) must not turn into a tick avalanche.
const MAX_TICK_BACKLOG: Duration = Duration::from_millis(250);

struct App {
    world: World,
    hud: bool,
    fps_cap: u32,
}

/// Load the manifest and every sprite it names, then hand the terminal over
/// to the tank loop. All fallible setup happens before the terminal enters
/// raw mode, so startup errors print as plain text.
pub(crate) fn run() -> Result<()> {
    let manifest = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tank.json"));
    let settings = load_settings(&manifest)?;
    let loaded = assets::load(&settings)?;
    let rng = StdRng::seed_from_u64(settings.seed);
    let world = World::new(
        loaded,
        settings.world_w as f32,
        settings.world_h as f32,
        rng,
    )?;

    App {
        world,
        hud: settings.hud,
        fps_cap: settings.fps_cap,
    }
    .run(&settings)
}

impl App {
    fn run(mut self, settings: &Settings) -> Result<()> {
        let mut term = Terminal::begin()?;

        let fps = self.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);
        let tick_dt = Duration::from_secs_f32(1.0 / TICK_RATE as f32);

        let mut last_frame = Instant::now();
        let mut sim_accum = Duration::ZERO;

        let mut fps_acc = Duration::ZERO;
        let mut fps_frames = 0u32;
        let mut fps_est = fps as f32;

        while self.world.running {
            let resized = term.resize_if_needed()?;
            let map = ScreenMap {
                cols: term.cols,
                rows: term.rows,
                hud_rows: if self.hud { 1 } else { 0 },
                world_w: self.world.w,
                world_h: self.world.h,
            };

            // input
            for ev in collect_input_nonblocking(frame_dt)? {
                if let InputEvent::Key {
                    code: KeyCode::Char('h') | KeyCode::Char('H'),
                    ..
                } = ev
                {
                    self.hud = !self.hud;
                    continue;
                }
                if let Some(wev) = map_event(ev, &map) {
                    self.world.handle_event(wev);
                    if !self.world.running {
                        break;
                    }
                }
            }

            // sim fixed-step
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            sim_accum = sim_accum.saturating_add(real_dt);
            if sim_accum > MAX_TICK_BACKLOG {
                sim_accum = MAX_TICK_BACKLOG;
            }
            while sim_accum >= tick_dt {
                self.world.tick();
                sim_accum -= tick_dt;
            }

            // fps estimate over half-second windows
            fps_acc = fps_acc.saturating_add(real_dt);
            fps_frames += 1;
            if fps_acc >= Duration::from_millis(500) {
                fps_est = fps_frames as f32 / fps_acc.as_secs_f32();
                fps_acc = Duration::ZERO;
                fps_frames = 0;
            }

            // render
            self.render_frame(&mut term, &map, settings, fps_est)?;
            term.present(!resized)?;

            // frame cap
            spin_sleep(frame_dt, last_frame);
        }

        Ok(())
    }

    fn render_frame(
        &mut self,
        term: &mut Terminal,
        map: &ScreenMap,
        settings: &Settings,
        fps_est: f32,
    ) -> Result<()> {
        let bg = background_colors(&self.world, map);
        term.canvas.clear();
        draw_world(&self.world, &mut term.canvas, map);
        canvas_to_cells(&term.canvas, &mut term.cur, &bg);

        if self.hud && term.rows > 0 {
            let bg_name = self
                .world
                .background()
                .map(|s| s.name.as_str())
                .unwrap_or("none");
            let food_name = self
                .world
                .food_sprites
                .get(self.world.selected_food)
                .map(|s| s.name.as_str())
                .unwrap_or("none");
            let line = format!(
                " {}x{} tank | bg: {} | food: {} | fish: {} | {:.0} fps | q quit  \u{2190}/\u{2192} bg  0-9 food  click feed  h hud ",
                settings.world_w,
                settings.world_h,
                bg_name,
                food_name,
                self.world.fish.len(),
                fps_est
            );
            for x in 0..term.cols {
                term.cur.set(
                    x,
                    0,
                    crate::render::Cell {
                        ch: ' ',
                        fg: Color::White,
                        bg: Color::Black,
                    },
                );
            }
            draw_text(&mut term.cur, 0, 0, &line, Color::White, Color::Black);
        }

        Ok(())
    }
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, frame_start: Instant) {
    let end = frame_start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
