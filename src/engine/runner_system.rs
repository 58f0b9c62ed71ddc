use super::*;

impl GameEngine {
    /// Faces the runner along `dir` and moves it one tile when the tile is
    /// open. Returns true when the new position is an intersection.
    pub(super) fn move_runner(&mut self, dir: Direction) -> bool {
        self.runner.dir = dir;
        let next = self.grid.step(self.runner.pos, dir);
        if self.grid.is_passable(next) {
            self.runner.pos = next;
        }
        perpendiculars(dir)
            .into_iter()
            .filter(|side| *side != Direction::None)
            .any(|side| self.grid.is_passable(self.grid.step(self.runner.pos, side)))
    }

    pub(super) fn fruit_cells(&self) -> Option<(Vec2, Vec2)> {
        self.fruit_spawn
            .map(|spawn| (spawn, self.grid.step(spawn, Direction::Right)))
    }

    /// Returns true when the runner ate the fruit this sub-step.
    pub(super) fn update_fruit(&mut self) -> bool {
        if self.fruit_turns_left == 0 {
            return false;
        }
        let Some((left, right)) = self.fruit_cells() else {
            self.fruit_turns_left = 0;
            return false;
        };
        if self.runner.pos == left || self.runner.pos == right {
            let bonus = if self.remaining > self.fruit_thresholds[1] {
                self.config.fruit_bonus_high
            } else {
                self.config.fruit_bonus_low
            };
            self.score += bonus;
            self.fruit_turns_left = 0;
            self.events.push(TurnEvent::FruitEaten { bonus });
            return true;
        }
        self.fruit_turns_left -= 1;
        false
    }

    /// Eats whatever consumable sits under the runner. Returns true when it
    /// was a power pellet.
    pub(super) fn apply_pickup(&mut self) -> bool {
        let pos = self.runner.pos;
        let tile = self.grid.tile_at(pos);
        if !tile.is_consumable() {
            return false;
        }
        self.grid.set_tile(pos, tile.eaten());
        self.remaining = self.remaining.saturating_sub(1);
        self.arm_fruit();

        let power = tile == Tile::PowerPellet;
        if power {
            self.score += self.config.power_pellet_score;
            self.runner.power_turns += self.config.power_duration;
            for hunter in &mut self.hunters {
                hunter.mode = HunterMode::Frightened;
                hunter.reverse_pending = false;
            }
            self.events.push(TurnEvent::PowerPelletEaten {
                x: pos.x,
                y: pos.y,
                power_turns: self.runner.power_turns,
            });
        } else {
            self.score += self.config.pellet_score;
            self.events.push(TurnEvent::PelletEaten { x: pos.x, y: pos.y });
        }

        if self.remaining == 0 {
            self.status = GameStatus::Win;
            self.events.push(TurnEvent::Won);
        }
        power
    }

    fn arm_fruit(&mut self) {
        if self.fruit_spawn.is_none() || self.remaining == 0 {
            return;
        }
        if !self.fruit_thresholds.contains(&self.remaining) {
            return;
        }
        let turns_left = self
            .rng
            .range(self.config.fruit_min_turns, self.config.fruit_max_turns);
        self.fruit_turns_left = turns_left;
        self.events.push(TurnEvent::FruitSpawned { turns_left });
    }

    /// Counts power down. On expiry every hunter outside the den drops
    /// Frightened at once and owes a reversal; den hunters keep it until
    /// their own next step.
    pub(super) fn tick_power(&mut self) {
        if self.runner.power_turns == 0 {
            return;
        }
        self.runner.power_turns -= 1;
        if self.runner.power_turns > 0 {
            return;
        }
        self.runner.capture_streak = 0;
        let mode = mode_at(self.turn);
        for hunter in &mut self.hunters {
            if hunter.mode == HunterMode::Frightened && hunter.pause_turns == 0 {
                hunter.mode = mode;
                hunter.reverse_pending = true;
            }
        }
    }
}
