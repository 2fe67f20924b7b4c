use crate::model::{
    Bubble, Fish, Food, FoodState, World, BUBBLE_SIDE_MARGIN, BUBBLE_SPAWN_PERIOD, FADE_STEP,
    MIN_SEEK_DISTANCE, WANDER_PERIOD,
};
use rand::{rngs::StdRng, Rng};

/// Input events as the world sees them: already translated to world
/// coordinates and stripped of terminal details.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum WorldEvent {
    PointerDown { x: f32, y: f32 },
    BackgroundNext,
    BackgroundPrev,
    SelectFood(usize),
    Quit,
}

impl Fish {
    /// One tick: seek the nearest food, eat it at contact range, or wander
    /// when the tank is empty. Food that is already fading still counts as
    /// present. Mutates only this fish, plus the one eaten food item.
    pub(crate) fn advance(
        &mut self,
        food: &mut [Food],
        world_w: f32,
        world_h: f32,
        rng: &mut StdRng,
    ) {
        if food.is_empty() {
            self.wander_ticks += 1;
            if self.wander_ticks >= WANDER_PERIOD {
                self.dx = if rng.gen_bool(0.5) { self.speed } else { -self.speed };
                self.dy = if rng.gen_bool(0.5) { self.speed } else { -self.speed };
                self.wander_ticks = 0;
            }
        } else {
            // A new random heading needs 120 *continuous* food-free ticks.
            self.wander_ticks = 0;

            let (cx, cy) = self.center();
            let mut target = 0;
            let mut best_d2 = f32::INFINITY;
            for (i, f) in food.iter().enumerate() {
                let (fx, fy) = f.center();
                let d2 = (fx - cx).powi(2) + (fy - cy).powi(2);
                if d2 < best_d2 {
                    best_d2 = d2;
                    target = i;
                }
            }

            let dist = best_d2.sqrt().max(MIN_SEEK_DISTANCE);
            if dist < self.eat_radius() {
                food[target].mark_eaten();
                return; // no movement on the tick the fish eats
            }

            // Seek: constant speed, direction pinned at the food center.
            let (fx, fy) = food[target].center();
            self.dx = self.speed * (fx - cx) / dist;
            self.dy = self.speed * (fy - cy) / dist;
        }

        self.x += self.dx;
        self.y += self.dy;
        self.resolve_bounds(world_w, world_h);
    }

    /// Bounce off tank walls; both axes may trigger in the same tick. Only a
    /// horizontal bounce flips the sprite.
    fn resolve_bounds(&mut self, world_w: f32, world_h: f32) {
        if self.x < 0.0 || self.x > world_w - self.w {
            self.dx = -self.dx;
            self.flipped = !self.flipped;
            self.x = self.x.clamp(0.0, world_w - self.w);
        }
        if self.y < 0.0 || self.y > world_h - self.h {
            self.dy = -self.dy;
            self.y = self.y.clamp(0.0, world_h - self.h);
        }
    }
}

impl Food {
    /// Idempotent: eating already-fading food does not restart the fade.
    pub(crate) fn mark_eaten(&mut self) {
        self.state = FoodState::Fading;
    }

    /// Returns whether the item is still alive; the world drops dead food.
    pub(crate) fn advance(&mut self) -> bool {
        if self.state == FoodState::Fading {
            self.alpha = self.alpha.saturating_sub(FADE_STEP);
        }
        self.alpha > 0
    }
}

impl Bubble {
    /// Returns whether the bubble is still in play. Only the width bounds
    /// matter horizontally; vertically a bubble dies once fully above the
    /// surface.
    pub(crate) fn advance(&mut self, world_w: f32, _world_h: f32) -> bool {
        self.y -= self.speed;
        self.x += self.drift;
        self.y + self.radius > 0.0
            && self.x > -BUBBLE_SIDE_MARGIN
            && self.x < world_w + BUBBLE_SIDE_MARGIN
    }
}

impl World {
    pub(crate) fn handle_event(&mut self, ev: WorldEvent) {
        match ev {
            WorldEvent::PointerDown { x, y } => {
                // With no food sprites loaded there is nothing to spawn;
                // reject the press instead of indexing into nothing.
                if !self.food_sprites.is_empty() {
                    self.food.push(Food::new(x, y, self.selected_food));
                }
            }
            WorldEvent::BackgroundNext => {
                if !self.backgrounds.is_empty() {
                    self.bg_index = (self.bg_index + 1) % self.backgrounds.len();
                }
            }
            WorldEvent::BackgroundPrev => {
                if !self.backgrounds.is_empty() {
                    let n = self.backgrounds.len();
                    self.bg_index = (self.bg_index + n - 1) % n;
                }
            }
            WorldEvent::SelectFood(i) => {
                if i < self.food_sprites.len() {
                    self.selected_food = i;
                }
            }
            WorldEvent::Quit => self.running = false,
        }
    }

    /// One fixed simulation step: spawn bubbles, advance bubbles and food
    /// (dropping dead ones), then advance every fish against the surviving
    /// food so nothing targets an item that expired this tick.
    pub(crate) fn tick(&mut self) {
        self.bubble_timer += 1;
        if self.bubble_timer >= BUBBLE_SPAWN_PERIOD {
            let batch = self.rng.gen_range(1..=3);
            for _ in 0..batch {
                let x = self.rng.gen_range(20.0..self.w - 20.0);
                self.bubbles.push(Bubble::new(x, self.h - 10.0, &mut self.rng));
            }
            self.bubble_timer = 0;
        }

        let (w, h) = (self.w, self.h);
        self.bubbles.retain_mut(|b| b.advance(w, h));
        self.food.retain_mut(|f| f.advance());

        for fish in &mut self.fish {
            fish.advance(&mut self.food, w, h, &mut self.rng);
        }
    }
}
