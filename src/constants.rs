use crate::types::{GameConfig, HunterType, Vec2};

pub const MAX_MAP_LENGTH: usize = 2_000;
pub const MAX_HUNTERS: usize = 4;

pub const MODE_CYCLE_TURNS: u32 = 100;
pub const MODE_CYCLE_COUNT: u32 = 4;
pub const SCATTER_TURNS_EARLY: u32 = 30;
pub const SCATTER_TURNS_LATE: u32 = 20;
pub const EARLY_CYCLES: u32 = 2;

pub const AMBUSH_LEAD_TILES: i32 = 4;
pub const FLANK_LEAD_TILES: i32 = 2;
pub const SKITTISH_RETREAT_DISTANCE: f64 = 8.0;

pub const PELLET_SCORE: i32 = 10;
pub const POWER_PELLET_SCORE: i32 = 50;
pub const CAPTURE_BASE_SCORE: i32 = 200;
pub const POWER_DURATION_TURNS: u32 = 20;

pub const FRUIT_BONUS_HIGH: i32 = 300;
pub const FRUIT_BONUS_LOW: i32 = 100;
pub const FRUIT_MIN_TURNS: u32 = 18;
pub const FRUIT_MAX_TURNS: u32 = 24;
pub const FRUIT_THRESHOLD_RATIOS: [f32; 2] = [0.7, 0.3];

pub const HUNTER_START_PAUSES: [u32; 4] = [0, 6, 12, 18];
pub const CAPTURE_PAUSE_TURNS: u32 = 3;
pub const MAX_SUB_STEPS: u32 = 20;

pub const IDLE_EXPIRY_MS: u64 = 15 * 60 * 1000;

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pellet_score: PELLET_SCORE,
            power_pellet_score: POWER_PELLET_SCORE,
            capture_base_score: CAPTURE_BASE_SCORE,
            power_duration: POWER_DURATION_TURNS,
            fruit_bonus_high: FRUIT_BONUS_HIGH,
            fruit_bonus_low: FRUIT_BONUS_LOW,
            fruit_min_turns: FRUIT_MIN_TURNS,
            fruit_max_turns: FRUIT_MAX_TURNS,
            fruit_threshold_ratios: FRUIT_THRESHOLD_RATIOS,
            hunter_start_pauses: HUNTER_START_PAUSES,
            capture_pause_turns: CAPTURE_PAUSE_TURNS,
            max_sub_steps: MAX_SUB_STEPS,
        }
    }
}

/// Defaults overridden by `MAZE_*` environment variables. Unparseable values
/// keep the default.
pub fn game_config_from_env() -> GameConfig {
    game_config_from_lookup(|name| std::env::var(name).ok())
}

pub fn game_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GameConfig {
    let defaults = GameConfig::default();
    let int = |name: &str, default: i32| {
        lookup(name)
            .and_then(|value| value.trim().parse::<i32>().ok())
            .unwrap_or(default)
    };
    let turns = |name: &str, default: u32| {
        lookup(name)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(default)
    };
    let ratio = |name: &str, default: f32| {
        lookup(name)
            .and_then(|value| value.trim().parse::<f32>().ok())
            .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
            .unwrap_or(default)
    };

    let fruit_min_turns = turns("MAZE_FRUIT_MIN_TURNS", defaults.fruit_min_turns);
    GameConfig {
        pellet_score: int("MAZE_PELLET_SCORE", defaults.pellet_score),
        power_pellet_score: int("MAZE_POWER_PELLET_SCORE", defaults.power_pellet_score),
        capture_base_score: int("MAZE_CAPTURE_BASE_SCORE", defaults.capture_base_score),
        power_duration: turns("MAZE_POWER_DURATION", defaults.power_duration),
        fruit_bonus_high: int("MAZE_FRUIT_BONUS_HIGH", defaults.fruit_bonus_high),
        fruit_bonus_low: int("MAZE_FRUIT_BONUS_LOW", defaults.fruit_bonus_low),
        fruit_min_turns,
        fruit_max_turns: turns("MAZE_FRUIT_MAX_TURNS", defaults.fruit_max_turns)
            .max(fruit_min_turns),
        fruit_threshold_ratios: [
            ratio("MAZE_FRUIT_FIRST_RATIO", defaults.fruit_threshold_ratios[0]),
            ratio("MAZE_FRUIT_SECOND_RATIO", defaults.fruit_threshold_ratios[1]),
        ],
        hunter_start_pauses: defaults.hunter_start_pauses,
        capture_pause_turns: turns("MAZE_CAPTURE_PAUSE_TURNS", defaults.capture_pause_turns),
        max_sub_steps: turns("MAZE_MAX_SUB_STEPS", defaults.max_sub_steps).clamp(1, 100),
    }
}

/// Scatter targets sit just outside the four grid corners.
pub fn home_corner(hunter_type: HunterType, width: i32, height: i32) -> Vec2 {
    match hunter_type {
        HunterType::Chaser => Vec2::new(width, -1),
        HunterType::Ambusher => Vec2::new(-1, -1),
        HunterType::Flanker => Vec2::new(width, height),
        HunterType::Skittish => Vec2::new(-1, height),
    }
}
