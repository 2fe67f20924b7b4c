use crate::assets::{Assets, Sprite};
use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng};

// Behavior constants, shared by sim and render.
pub(crate) const FISH_SPEED_SCALE: f32 = 0.5; // scales all fish speeds
pub(crate) const FISH_DISPLAY_SIZE: (f32, f32) = (120.0, 80.0);
pub(crate) const FOOD_DISPLAY_SIZE: (f32, f32) = (50.0, 50.0);
pub(crate) const EAT_RADIUS_FACTOR: f32 = 0.35;
pub(crate) const MIN_SEEK_DISTANCE: f32 = 0.01;
pub(crate) const WANDER_PERIOD: u32 = 120; // ticks without food before a new random heading
pub(crate) const FADE_STEP: u8 = 8; // alpha lost per tick once eaten
pub(crate) const BUBBLE_SPAWN_PERIOD: u32 = 12; // ticks between bubble batches
pub(crate) const BUBBLE_SPEED_RANGE: (f32, f32) = (0.6, 1.6);
pub(crate) const BUBBLE_DRIFT_RANGE: (f32, f32) = (-0.4, 0.4);
pub(crate) const BUBBLE_RADIUS_RANGE: (u32, u32) = (3, 8);
pub(crate) const BUBBLE_SIDE_MARGIN: f32 = 50.0;
pub(crate) const FALLBACK_FILL: (u8, u8, u8) = (0, 100, 150);
// Fish spawn 50 px in from the walls and bubbles 20 px; anything smaller
// than this leaves no room to place them.
pub(crate) const MIN_WORLD_SIZE: f32 = 200.0;

pub(crate) struct Fish {
    pub(crate) sprite: Sprite,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) dx: f32,
    pub(crate) dy: f32,
    pub(crate) w: f32,
    pub(crate) h: f32,
    pub(crate) speed: f32,
    pub(crate) flipped: bool,
    pub(crate) wander_ticks: u32,
}

impl Fish {
    pub(crate) fn new(
        sprite: Sprite,
        speed_setting: u32,
        world_w: f32,
        world_h: f32,
        rng: &mut StdRng,
    ) -> Fish {
        let speed = speed_setting as f32 * FISH_SPEED_SCALE;
        let (w, h) = (sprite.w, sprite.h);
        Fish {
            sprite,
            // Sampled like the original (50 px inset), then kept inside the
            // bounds invariant even for wide sprites.
            x: rng.gen_range(50.0..world_w - 50.0).min(world_w - w),
            y: rng.gen_range(50.0..world_h - 50.0).min(world_h - h),
            dx: if rng.gen_bool(0.5) { speed } else { -speed },
            dy: if rng.gen_bool(0.5) { speed } else { -speed },
            w,
            h,
            speed,
            flipped: false,
            wander_ticks: 0,
        }
    }

    pub(crate) fn center(&self) -> (f32, f32) {
        (self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub(crate) fn eat_radius(&self) -> f32 {
        self.w.min(self.h) * EAT_RADIUS_FACTOR
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FoodState {
    Active,
    Fading,
}

pub(crate) struct Food {
    pub(crate) x: f32,
    pub(crate) y: f32,
    /// Index into `World::food_sprites`.
    pub(crate) kind: usize,
    pub(crate) alpha: u8,
    pub(crate) state: FoodState,
}

impl Food {
    pub(crate) fn new(x: f32, y: f32, kind: usize) -> Food {
        Food {
            x,
            y,
            kind,
            alpha: 255,
            state: FoodState::Active,
        }
    }

    pub(crate) fn center(&self) -> (f32, f32) {
        (
            self.x + FOOD_DISPLAY_SIZE.0 * 0.5,
            self.y + FOOD_DISPLAY_SIZE.1 * 0.5,
        )
    }
}

pub(crate) struct Bubble {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) radius: f32,
    pub(crate) speed: f32,
    pub(crate) drift: f32,
}

impl Bubble {
    pub(crate) fn new(x: f32, y: f32, rng: &mut StdRng) -> Bubble {
        Bubble {
            x,
            y,
            radius: rng.gen_range(BUBBLE_RADIUS_RANGE.0..=BUBBLE_RADIUS_RANGE.1) as f32,
            speed: rng.gen_range(BUBBLE_SPEED_RANGE.0..BUBBLE_SPEED_RANGE.1),
            drift: rng.gen_range(BUBBLE_DRIFT_RANGE.0..BUBBLE_DRIFT_RANGE.1),
        }
    }
}

/// The tank itself. Owns every entity collection and the seeded RNG; entities
/// hold no reference back to it.
pub(crate) struct World {
    pub(crate) w: f32,
    pub(crate) h: f32,
    pub(crate) backgrounds: Vec<Sprite>,
    pub(crate) bg_index: usize,
    pub(crate) food_sprites: Vec<Sprite>,
    pub(crate) selected_food: usize,
    pub(crate) fish: Vec<Fish>,
    pub(crate) food: Vec<Food>,
    pub(crate) bubbles: Vec<Bubble>,
    pub(crate) bubble_timer: u32,
    pub(crate) running: bool,
    pub(crate) rng: StdRng,
}

impl World {
    pub(crate) fn new(assets: Assets, w: f32, h: f32, mut rng: StdRng) -> Result<World> {
        if assets.fish.is_empty() {
            bail!("no fish sprites loaded; the tank needs at least one fish");
        }
        if w < MIN_WORLD_SIZE || h < MIN_WORLD_SIZE {
            bail!(
                "world {}x{} too small; the tank must be at least {}x{}",
                w,
                h,
                MIN_WORLD_SIZE,
                MIN_WORLD_SIZE
            );
        }

        let mut fish = Vec::with_capacity(assets.fish.len());
        for f in assets.fish {
            if !(1..=5).contains(&f.speed) {
                bail!(
                    "fish {}: speed {} out of range (must be 1..=5)",
                    f.sprite.name,
                    f.speed
                );
            }
            fish.push(Fish::new(f.sprite, f.speed, w, h, &mut rng));
        }

        Ok(World {
            w,
            h,
            backgrounds: assets.backgrounds,
            bg_index: 0,
            food_sprites: assets.food,
            selected_food: 0,
            fish,
            food: Vec::new(),
            bubbles: Vec::new(),
            bubble_timer: 0,
            running: true,
            rng,
        })
    }

    pub(crate) fn background(&self) -> Option<&Sprite> {
        self.backgrounds.get(self.bg_index)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use rand::SeedableRng;

    pub(crate) fn sprite(name: &str, display: (f32, f32)) -> Sprite {
        Sprite::parse(name, "= x 200 180 90\nxx\nxx\n", display).unwrap()
    }

    pub(crate) fn test_world(n_fish: usize, n_bg: usize, n_food: usize) -> World {
        let assets = Assets {
            fish: (0..n_fish)
                .map(|i| crate::assets::FishAsset {
                    sprite: sprite(&format!("fish{i}"), FISH_DISPLAY_SIZE),
                    speed: 2,
                })
                .collect(),
            backgrounds: (0..n_bg)
                .map(|i| sprite(&format!("bg{i}"), (900.0, 600.0)))
                .collect(),
            food: (0..n_food)
                .map(|i| sprite(&format!("food{i}"), FOOD_DISPLAY_SIZE))
                .collect(),
        };
        World::new(assets, 900.0, 600.0, StdRng::seed_from_u64(42)).unwrap()
    }
}
