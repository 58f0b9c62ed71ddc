use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Hunter preference order; also the tie-break order.
    pub const MOVES: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::None => (0, 0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Unwrapped offset; callers that need a grid cell go through `Grid::wrap`.
    pub fn offset(self, dir: Direction, tiles: i32) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx * tiles,
            y: self.y + dy * tiles,
        }
    }

    pub fn distance(self, other: Vec2) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tile {
    Empty,
    Wall,
    SoftWall,
    Pellet,
    PowerPellet,
    SoftWallPellet,
    Door,
    // Overlay values used only when drawing a board; never stored in a grid.
    FruitLeft,
    FruitRight,
}

impl Tile {
    /// Markers and unknown characters are handled by the map loader; here
    /// markers read as Empty and anything unrecognised as Wall.
    pub fn from_map_char(c: char) -> Self {
        match c {
            ' ' | 'P' | 'F' | 'G' => Self::Empty,
            '-' => Self::SoftWall,
            '~' => Self::SoftWallPellet,
            '.' => Self::Pellet,
            'o' => Self::PowerPellet,
            '=' => Self::Door,
            _ => Self::Wall,
        }
    }

    pub fn to_map_char(self) -> char {
        match self {
            Self::Empty => ' ',
            Self::Wall => '#',
            Self::SoftWall => '-',
            Self::SoftWallPellet => '~',
            Self::Pellet => '.',
            Self::PowerPellet => 'o',
            Self::Door => '=',
            Self::FruitLeft => '%',
            Self::FruitRight => '&',
        }
    }

    pub fn is_passable(self) -> bool {
        matches!(
            self,
            Self::Empty | Self::SoftWall | Self::Pellet | Self::PowerPellet | Self::SoftWallPellet
        )
    }

    pub fn is_soft_wall(self) -> bool {
        matches!(self, Self::SoftWall | Self::SoftWallPellet)
    }

    pub fn is_consumable(self) -> bool {
        matches!(self, Self::Pellet | Self::PowerPellet | Self::SoftWallPellet)
    }

    /// What a consumable tile turns into once eaten.
    pub fn eaten(self) -> Self {
        match self {
            Self::SoftWallPellet => Self::SoftWall,
            Self::Pellet | Self::PowerPellet => Self::Empty,
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunterType {
    Chaser,
    Ambusher,
    Flanker,
    Skittish,
}

impl HunterType {
    pub const ALL: [HunterType; 4] = [
        HunterType::Chaser,
        HunterType::Ambusher,
        HunterType::Flanker,
        HunterType::Skittish,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Chaser => 0,
            Self::Ambusher => 1,
            Self::Flanker => 2,
            Self::Skittish => 3,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Chaser => 'A',
            Self::Ambusher => 'B',
            Self::Flanker => 'C',
            Self::Skittish => 'D',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunterMode {
    Chase,
    Scatter,
    Frightened,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Win,
    Lose,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnInput {
    Up,
    Down,
    Left,
    Right,
    ToggleFastForward,
    ToggleHelp,
}

impl TurnInput {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::Up => Some(Direction::Up),
            Self::Down => Some(Direction::Down),
            Self::Left => Some(Direction::Left),
            Self::Right => Some(Direction::Right),
            Self::ToggleFastForward | Self::ToggleHelp => None,
        }
    }
}

/// Tunable gameplay values. Defaults live in `constants.rs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(rename = "pelletScore")]
    pub pellet_score: i32,
    #[serde(rename = "powerPelletScore")]
    pub power_pellet_score: i32,
    #[serde(rename = "captureBaseScore")]
    pub capture_base_score: i32,
    #[serde(rename = "powerDuration")]
    pub power_duration: u32,
    #[serde(rename = "fruitBonusHigh")]
    pub fruit_bonus_high: i32,
    #[serde(rename = "fruitBonusLow")]
    pub fruit_bonus_low: i32,
    #[serde(rename = "fruitMinTurns")]
    pub fruit_min_turns: u32,
    #[serde(rename = "fruitMaxTurns")]
    pub fruit_max_turns: u32,
    #[serde(rename = "fruitThresholdRatios")]
    pub fruit_threshold_ratios: [f32; 2],
    #[serde(rename = "hunterStartPauses")]
    pub hunter_start_pauses: [u32; 4],
    #[serde(rename = "capturePauseTurns")]
    pub capture_pause_turns: u32,
    #[serde(rename = "maxSubSteps")]
    pub max_sub_steps: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    pub origin: Vec2,
    pub pos: Vec2,
    pub dir: Direction,
    #[serde(rename = "powerTurns")]
    pub power_turns: u32,
    #[serde(rename = "captureStreak")]
    pub capture_streak: u32,
}

impl Runner {
    pub fn new(origin: Vec2) -> Self {
        Self {
            origin,
            pos: origin,
            dir: Direction::None,
            power_turns: 0,
            capture_streak: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunter {
    #[serde(rename = "type")]
    pub hunter_type: HunterType,
    pub origin: Vec2,
    #[serde(rename = "homeCorner")]
    pub home_corner: Vec2,
    pub pos: Vec2,
    pub dir: Direction,
    pub mode: HunterMode,
    #[serde(rename = "pauseTurns")]
    pub pause_turns: u32,
    #[serde(rename = "exitRight")]
    pub exit_right: bool,
    /// Frightened ended while this hunter was out of the den; its next step
    /// reverses.
    #[serde(rename = "reversePending", default)]
    pub reverse_pending: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunnerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    #[serde(rename = "powerTurns")]
    pub power_turns: u32,
    #[serde(rename = "captureStreak")]
    pub capture_streak: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct HunterView {
    #[serde(rename = "type")]
    pub hunter_type: HunterType,
    pub glyph: char,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub mode: HunterMode,
    pub paused: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FruitView {
    pub active: bool,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "turnsLeft")]
    pub turns_left: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    PelletEaten {
        x: i32,
        y: i32,
    },
    PowerPelletEaten {
        x: i32,
        y: i32,
        #[serde(rename = "powerTurns")]
        power_turns: u32,
    },
    FruitSpawned {
        #[serde(rename = "turnsLeft")]
        turns_left: u32,
    },
    FruitEaten {
        bonus: i32,
    },
    HunterCaptured {
        hunter: HunterType,
        score: i32,
    },
    RunnerCaught {
        hunter: HunterType,
    },
    Won,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub turn: u32,
    pub score: i32,
    #[serde(rename = "scoreDelta")]
    pub score_delta: i32,
    pub status: GameStatus,
    pub width: i32,
    pub height: i32,
    pub board: Vec<String>,
    pub remaining: u32,
    pub runner: RunnerView,
    pub hunters: Vec<HunterView>,
    pub fruit: Option<FruitView>,
    #[serde(rename = "powerTurnsLeft")]
    pub power_turns_left: u32,
    #[serde(rename = "helpShown")]
    pub help_shown: bool,
    #[serde(rename = "fastForward")]
    pub fast_forward: bool,
    pub events: Vec<TurnEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_total_and_involutive() {
        for dir in [
            Direction::None,
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ] {
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::None.opposite(), Direction::None);
    }

    #[test]
    fn map_chars_round_trip_for_stored_tiles() {
        for tile in [
            Tile::Empty,
            Tile::Wall,
            Tile::SoftWall,
            Tile::SoftWallPellet,
            Tile::Pellet,
            Tile::PowerPellet,
            Tile::Door,
        ] {
            assert_eq!(Tile::from_map_char(tile.to_map_char()), tile);
        }
        assert_eq!(Tile::from_map_char('X'), Tile::Wall);
    }

    #[test]
    fn door_and_walls_block_while_soft_walls_pass() {
        assert!(!Tile::Wall.is_passable());
        assert!(!Tile::Door.is_passable());
        assert!(Tile::SoftWall.is_passable());
        assert!(Tile::SoftWallPellet.is_passable());
        assert_eq!(Tile::SoftWallPellet.eaten(), Tile::SoftWall);
        assert_eq!(Tile::PowerPellet.eaten(), Tile::Empty);
    }

    #[test]
    fn turn_event_serializes_with_type_tag() {
        let text = serde_json::to_string(&TurnEvent::FruitEaten { bonus: 300 })
            .expect("event should serialize");
        assert_eq!(text, r#"{"type":"fruit_eaten","bonus":300}"#);
    }
}
