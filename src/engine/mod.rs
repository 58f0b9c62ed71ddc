use crate::constants::MAX_HUNTERS;
use crate::rng::Rng;
use crate::types::{
    Direction, FruitView, GameConfig, GameStatus, Hunter, HunterMode, HunterType, HunterView,
    Runner, RunnerView, Snapshot, Tile, TurnEvent, TurnInput, Vec2,
};
use crate::world::{load_default_map, load_map, Grid, LoadedMap, MapError};

mod hunter_system;
mod runner_system;
mod saved_game;
mod schedule;
mod utils;

pub use self::hunter_system::{choose_direction, target_for, HunterContext};
pub use self::saved_game::{RestoreError, SavedGame, SAVE_VERSION};
pub use self::schedule::{is_mode_boundary, mode_at};

use self::hunter_system::step_hunter;
use self::utils::{capture_score, now_ms, perpendiculars};

const FRIGHTENED_GLYPH: char = 'v';
const RUNNER_GLYPH: char = 'P';

/// Result of one `apply_input` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    pub sub_steps: u32,
    /// State changed and the game is still running; the owner should persist it.
    pub checkpoint_due: bool,
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub config: GameConfig,

    grid: Grid,
    rng: Rng,
    runner: Runner,
    hunters: Vec<Hunter>,
    fruit_spawn: Option<Vec2>,
    fruit_turns_left: u32,
    fruit_thresholds: [u32; 2],
    events: Vec<TurnEvent>,

    turn: u32,
    score: i32,
    last_score: i32,
    total_consumables: u32,
    remaining: u32,
    last_input: Option<TurnInput>,
    fast_forward: bool,
    help_shown: bool,
    status: GameStatus,
    last_played_ms: u64,
}

impl GameEngine {
    /// Starts a game on `map`, or on the built-in board when `None`.
    pub fn new(map: Option<&str>, seed: u32, config: GameConfig) -> Result<Self, MapError> {
        let loaded = match map {
            Some(text) => load_map(text)?,
            None => load_default_map()?,
        };
        Ok(Self::from_loaded(loaded, Rng::new(seed), config))
    }

    fn from_loaded(loaded: LoadedMap, rng: Rng, config: GameConfig) -> Self {
        let LoadedMap {
            grid,
            runner_spawn,
            fruit_spawn,
            hunter_spawns,
        } = loaded;
        let total_consumables = grid.count_consumables();
        let fruit_thresholds = config
            .fruit_threshold_ratios
            .map(|ratio| (total_consumables as f32 * ratio) as u32);
        let hunters = hunter_spawns
            .into_iter()
            .take(MAX_HUNTERS)
            .map(|spawn| Hunter {
                hunter_type: spawn.hunter_type,
                origin: spawn.pos,
                home_corner: spawn.home_corner,
                pos: spawn.pos,
                dir: Direction::None,
                mode: mode_at(0),
                pause_turns: config.hunter_start_pauses[spawn.hunter_type.index()],
                exit_right: false,
                reverse_pending: false,
            })
            .collect();

        Self {
            config,
            grid,
            rng,
            runner: Runner::new(runner_spawn),
            hunters,
            fruit_spawn,
            fruit_turns_left: 0,
            fruit_thresholds,
            events: Vec::new(),
            turn: 0,
            score: 0,
            last_score: 0,
            total_consumables,
            remaining: total_consumables,
            last_input: None,
            fast_forward: false,
            help_shown: false,
            status: GameStatus::Active,
            last_played_ms: now_ms(),
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.status != GameStatus::Active
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total_consumables(&self) -> u32 {
        self.total_consumables
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn hunters(&self) -> &[Hunter] {
        &self.hunters
    }

    pub fn fast_forward(&self) -> bool {
        self.fast_forward
    }

    pub fn help_shown(&self) -> bool {
        self.help_shown
    }

    pub fn last_input(&self) -> Option<TurnInput> {
        self.last_input
    }

    pub fn last_played_ms(&self) -> u64 {
        self.last_played_ms
    }

    /// Board without entities, one string per row.
    pub fn board_rows(&self) -> Vec<String> {
        self.grid.rows()
    }

    pub fn cancel(&mut self) {
        if self.status == GameStatus::Active {
            self.status = GameStatus::Cancelled;
        }
    }

    pub fn is_idle_expired(&self, now_ms: u64, idle_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_played_ms) >= idle_ms
    }

    /// Applies one player input. Finished games ignore every call.
    pub fn apply_input(&mut self, input: TurnInput) -> TurnOutcome {
        if self.status != GameStatus::Active {
            return TurnOutcome::default();
        }
        self.last_played_ms = now_ms();

        if input == TurnInput::ToggleFastForward {
            self.fast_forward = !self.fast_forward;
            return self.outcome(0);
        }
        if self.help_shown {
            self.help_shown = false;
            return self.outcome(0);
        }
        let Some(dir) = input.direction() else {
            self.help_shown = true;
            return self.outcome(0);
        };

        self.last_input = Some(input);
        self.last_score = self.score;
        let mut sub_steps = 0;
        loop {
            sub_steps += 1;
            let stop = self.run_sub_step(dir);
            if stop
                || !self.fast_forward
                || self.status != GameStatus::Active
                || sub_steps >= self.config.max_sub_steps
            {
                break;
            }
        }
        self.outcome(sub_steps)
    }

    fn outcome(&self, sub_steps: u32) -> TurnOutcome {
        TurnOutcome {
            sub_steps,
            checkpoint_due: self.status == GameStatus::Active,
        }
    }

    /// One simulated turn. Returns true when fast-forward has to stop here.
    fn run_sub_step(&mut self, dir: Direction) -> bool {
        self.turn += 1;
        let mut stop = self.move_runner(dir);
        stop |= self.update_fruit();
        let power_eaten = self.apply_pickup();
        stop |= power_eaten;
        if self.status == GameStatus::Active {
            stop |= self.update_hunters();
        }
        if !power_eaten {
            self.tick_power();
        }
        stop || self.status != GameStatus::Active
    }

    fn update_hunters(&mut self) -> bool {
        let mut collided = false;
        for idx in 0..self.hunters.len() {
            if self.status != GameStatus::Active {
                break;
            }
            if self.hunters[idx].pos == self.runner.pos {
                self.resolve_collision(idx);
                collided = true;
                continue;
            }

            let chaser_pos = self
                .hunters
                .iter()
                .find(|hunter| hunter.hunter_type == HunterType::Chaser)
                .map(|hunter| hunter.pos);
            let ctx = HunterContext {
                grid: &self.grid,
                runner: &self.runner,
                chaser_pos,
                turn: self.turn,
                power_duration: self.config.power_duration,
            };
            step_hunter(&mut self.hunters[idx], &ctx, &mut self.rng);

            if self.hunters[idx].pos == self.runner.pos {
                self.resolve_collision(idx);
                collided = true;
            }
        }
        collided
    }

    fn resolve_collision(&mut self, idx: usize) {
        let hunter_type = self.hunters[idx].hunter_type;
        let vulnerable =
            self.hunters[idx].mode == HunterMode::Frightened && self.runner.power_turns > 0;
        if !vulnerable {
            self.status = GameStatus::Lose;
            self.events.push(TurnEvent::RunnerCaught {
                hunter: hunter_type,
            });
            return;
        }

        let score = capture_score(self.config.capture_base_score, self.runner.capture_streak);
        self.score += score;
        self.runner.capture_streak += 1;
        let turn = self.turn;
        let pause = self.config.capture_pause_turns;
        let hunter = &mut self.hunters[idx];
        hunter.pos = hunter.origin;
        hunter.dir = Direction::None;
        hunter.mode = mode_at(turn);
        hunter.pause_turns = pause;
        hunter.exit_right = false;
        hunter.reverse_pending = false;
        self.events.push(TurnEvent::HunterCaptured {
            hunter: hunter_type,
            score,
        });
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let runner = &self.runner;
        let fruit = self.fruit_spawn.map(|spawn| FruitView {
            active: self.fruit_turns_left > 0,
            x: spawn.x,
            y: spawn.y,
            turns_left: self.fruit_turns_left,
        });
        let snapshot = Snapshot {
            turn: self.turn,
            score: self.score,
            score_delta: self.score - self.last_score,
            status: self.status,
            width: self.grid.width(),
            height: self.grid.height(),
            board: self.render_board(),
            remaining: self.remaining,
            runner: RunnerView {
                x: runner.pos.x,
                y: runner.pos.y,
                dir: runner.dir,
                power_turns: runner.power_turns,
                capture_streak: runner.capture_streak,
            },
            hunters: self
                .hunters
                .iter()
                .map(|hunter| HunterView {
                    hunter_type: hunter.hunter_type,
                    glyph: hunter_glyph(hunter),
                    x: hunter.pos.x,
                    y: hunter.pos.y,
                    dir: hunter.dir,
                    mode: hunter.mode,
                    paused: hunter.pause_turns > 0,
                })
                .collect(),
            fruit,
            power_turns_left: runner.power_turns,
            help_shown: self.help_shown,
            fast_forward: self.fast_forward,
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    /// Tiles with the fruit, hunters and runner drawn on top, in that order.
    fn render_board(&self) -> Vec<String> {
        let mut cells: Vec<Vec<char>> = self
            .grid
            .rows()
            .into_iter()
            .map(|row| row.chars().collect())
            .collect();
        let mut put = |pos: Vec2, glyph: char| {
            let pos = self.grid.wrap(pos);
            if let Some(cell) = cells
                .get_mut(pos.y as usize)
                .and_then(|row| row.get_mut(pos.x as usize))
            {
                *cell = glyph;
            }
        };

        if self.fruit_turns_left > 0 {
            if let Some((left, right)) = self.fruit_cells() {
                put(left, Tile::FruitLeft.to_map_char());
                put(right, Tile::FruitRight.to_map_char());
            }
        }
        for hunter in &self.hunters {
            put(hunter.pos, hunter_glyph(hunter));
        }
        put(self.runner.pos, RUNNER_GLYPH);

        cells
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect()
    }
}

fn hunter_glyph(hunter: &Hunter) -> char {
    if hunter.mode == HunterMode::Frightened {
        FRIGHTENED_GLYPH
    } else {
        hunter.hunter_type.glyph()
    }
}
