use thiserror::Error;

use crate::constants::{home_corner, MAX_HUNTERS, MAX_MAP_LENGTH};
use crate::types::{Direction, HunterType, Tile, Vec2};

pub const DEFAULT_MAP: &str = concat!(
    "#####################\n",
    "#.........#.........#\n",
    "#o##.###.#.#.###.##o#\n",
    "#...................#\n",
    "#.##.#.#######.#.##.#\n",
    "#....#....#....#....#\n",
    "####.# ####### #.####\n",
    "####.#  -----  #.####\n",
    "####.# #=====# #.####\n",
    "    .  #GG GG#  .    \n",
    "####.# ####### #.####\n",
    "####.#    F    #.####\n",
    "####.# ####### #.####\n",
    "#.........#.........#\n",
    "#.##.###.###.###.##.#\n",
    "#o.#......P......#.o#\n",
    "##.#.#.#######.#.#.##\n",
    "#....#....#....#....#\n",
    "#.#######.#.#######.#\n",
    "#...................#\n",
    "#####################",
);

const RUNNER_MARKER: char = 'P';
const FRUIT_MARKER: char = 'F';
const HUNTER_MARKER: char = 'G';

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("map is too large: {length} characters, the limit is {limit}")]
    TooLarge { length: usize, limit: usize },
    #[error("map is completely solid: it needs at least one open or pellet tile")]
    CompletelySolid,
    #[error("map is not rectangular: line {line} has {found} characters but the first line has {expected}")]
    NotRectangular {
        line: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    /// Builds a grid from already-rectangular rows of map characters.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, MapError> {
        let expected = rows
            .first()
            .map(|row| row.as_ref().chars().count())
            .unwrap_or(0);
        if rows.iter().all(|row| row.as_ref().is_empty()) {
            return Err(MapError::CompletelySolid);
        }
        let mut tiles = Vec::with_capacity(expected * rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let found = row.as_ref().chars().count();
            if found != expected {
                return Err(MapError::NotRectangular {
                    line: idx + 1,
                    expected,
                    found,
                });
            }
            tiles.extend(row.as_ref().chars().map(Tile::from_map_char));
        }
        Ok(Self {
            width: expected as i32,
            height: rows.len() as i32,
            tiles,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn wrap(&self, pos: Vec2) -> Vec2 {
        Vec2 {
            x: pos.x.rem_euclid(self.width),
            y: pos.y.rem_euclid(self.height),
        }
    }

    /// One tile in `dir`, wrapped.
    pub fn step(&self, pos: Vec2, dir: Direction) -> Vec2 {
        self.wrap(pos.offset(dir, 1))
    }

    pub fn tile_at(&self, pos: Vec2) -> Tile {
        self.tiles[self.index_of(pos)]
    }

    pub fn set_tile(&mut self, pos: Vec2, tile: Tile) {
        let idx = self.index_of(pos);
        self.tiles[idx] = tile;
    }

    pub fn is_passable(&self, pos: Vec2) -> bool {
        self.tile_at(pos).is_passable()
    }

    pub fn count_consumables(&self) -> u32 {
        self.tiles.iter().filter(|tile| tile.is_consumable()).count() as u32
    }

    pub fn rows(&self) -> Vec<String> {
        self.tiles
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|tile| tile.to_map_char()).collect())
            .collect()
    }

    fn index_of(&self, pos: Vec2) -> usize {
        let pos = self.wrap(pos);
        (pos.y * self.width + pos.x) as usize
    }
}

#[derive(Clone, Debug)]
pub struct HunterSpawn {
    pub hunter_type: HunterType,
    pub pos: Vec2,
    pub home_corner: Vec2,
}

#[derive(Clone, Debug)]
pub struct LoadedMap {
    pub grid: Grid,
    pub runner_spawn: Vec2,
    pub fruit_spawn: Option<Vec2>,
    pub hunter_spawns: Vec<HunterSpawn>,
}

pub fn load_default_map() -> Result<LoadedMap, MapError> {
    load_map(DEFAULT_MAP)
}

pub fn load_map(text: &str) -> Result<LoadedMap, MapError> {
    let length = text.chars().count();
    if length > MAX_MAP_LENGTH {
        return Err(MapError::TooLarge {
            length,
            limit: MAX_MAP_LENGTH,
        });
    }

    let lines: Vec<&str> = text.trim_end_matches(['\n', '\r']).lines().collect();
    let has_open_tile = lines
        .iter()
        .any(|line| line.chars().any(|c| Tile::from_map_char(c).is_passable() && !is_marker(c)));
    if !has_open_tile {
        return Err(MapError::CompletelySolid);
    }

    let mut grid = Grid::from_rows(&lines)?;
    let mut runner_spawn = None;
    let mut fruit_spawn = None;
    let mut hunter_positions = Vec::new();

    for (y, line) in lines.iter().enumerate() {
        for (x, c) in line.chars().enumerate() {
            let pos = Vec2::new(x as i32, y as i32);
            match c {
                RUNNER_MARKER if runner_spawn.is_none() => runner_spawn = Some(pos),
                FRUIT_MARKER if fruit_spawn.is_none() => fruit_spawn = Some(pos),
                HUNTER_MARKER if hunter_positions.len() < MAX_HUNTERS => {
                    hunter_positions.push(pos)
                }
                _ => {}
            }
        }
    }

    if let Some(fruit) = fruit_spawn {
        let neighbour = grid.step(fruit, Direction::Right);
        grid.set_tile(neighbour, Tile::Empty);
    }

    let runner_spawn = runner_spawn
        .or_else(|| first_open_tile(&grid))
        .unwrap_or_default();
    let hunter_spawns = hunter_positions
        .into_iter()
        .zip(HunterType::ALL)
        .map(|(pos, hunter_type)| HunterSpawn {
            hunter_type,
            pos,
            home_corner: home_corner(hunter_type, grid.width(), grid.height()),
        })
        .collect();

    Ok(LoadedMap {
        grid,
        runner_spawn,
        fruit_spawn,
        hunter_spawns,
    })
}

fn is_marker(c: char) -> bool {
    matches!(c, RUNNER_MARKER | FRUIT_MARKER | HUNTER_MARKER)
}

fn first_open_tile(grid: &Grid) -> Option<Vec2> {
    (0..grid.height())
        .flat_map(|y| (0..grid.width()).map(move |x| Vec2::new(x, y)))
        .find(|pos| grid.tile_at(*pos) == Tile::Empty)
        .or_else(|| {
            (0..grid.height())
                .flat_map(|y| (0..grid.width()).map(move |x| Vec2::new(x, y)))
                .find(|pos| grid.is_passable(*pos))
        })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;

    fn reachable_from(grid: &Grid, start: Vec2) -> HashSet<Vec2> {
        let mut out = HashSet::new();
        let mut queue = VecDeque::new();
        out.insert(start);
        queue.push_back(start);
        while let Some(pos) = queue.pop_front() {
            for dir in Direction::MOVES {
                let next = grid.step(pos, dir);
                if grid.is_passable(next) && out.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out
    }

    #[test]
    fn default_map_loads_with_all_markers() {
        let map = load_default_map().expect("default map is valid");
        assert_eq!(map.grid.width(), 21);
        assert_eq!(map.grid.height(), 21);
        assert_eq!(map.runner_spawn, Vec2::new(10, 15));
        assert_eq!(map.fruit_spawn, Some(Vec2::new(10, 11)));
        assert_eq!(map.hunter_spawns.len(), 4);
        let types: Vec<HunterType> = map.hunter_spawns.iter().map(|h| h.hunter_type).collect();
        assert_eq!(types, HunterType::ALL.to_vec());
        assert_eq!(map.hunter_spawns[0].pos, Vec2::new(8, 9));
        assert_eq!(map.hunter_spawns[3].pos, Vec2::new(12, 9));
        assert_eq!(map.grid.tile_at(Vec2::new(11, 11)), Tile::Empty);
        for spawn in &map.hunter_spawns {
            let above = map.grid.step(spawn.pos, Direction::Up);
            assert_eq!(map.grid.tile_at(above), Tile::Door);
        }
    }

    #[test]
    fn default_map_consumables_are_reachable_from_runner() {
        let map = load_default_map().expect("default map is valid");
        let reachable = reachable_from(&map.grid, map.runner_spawn);
        let mut consumables = 0;
        for y in 0..map.grid.height() {
            for x in 0..map.grid.width() {
                let pos = Vec2::new(x, y);
                if map.grid.tile_at(pos).is_consumable() {
                    consumables += 1;
                    assert!(reachable.contains(&pos), "unreachable pellet at ({x},{y})");
                }
            }
        }
        assert_eq!(consumables, map.grid.count_consumables());
        assert!(reachable.contains(&map.fruit_spawn.expect("fruit spawn")));
    }

    #[test]
    fn markers_are_cleared_after_extraction() {
        let map = load_map("######\n#PGF #\n#.G  #\n######").expect("valid map");
        let rows = map.grid.rows();
        assert_eq!(rows[1], "#    #");
        assert_eq!(rows[2], "#.   #");
        assert_eq!(map.hunter_spawns.len(), 2);
        assert_eq!(map.hunter_spawns[1].hunter_type, HunterType::Ambusher);
        assert_eq!(map.hunter_spawns[1].home_corner, Vec2::new(-1, -1));
    }

    #[test]
    fn fruit_reserves_its_right_neighbour_with_wraparound() {
        let map = load_map("..F\n###").expect("valid map");
        assert_eq!(map.fruit_spawn, Some(Vec2::new(2, 0)));
        assert_eq!(map.grid.tile_at(Vec2::new(0, 0)), Tile::Empty);
        assert_eq!(map.grid.tile_at(Vec2::new(1, 0)), Tile::Pellet);
    }

    #[test]
    fn extra_hunter_markers_become_empty() {
        let map = load_map("GGGGG.\n######").expect("valid map");
        assert_eq!(map.hunter_spawns.len(), 4);
        assert_eq!(map.grid.tile_at(Vec2::new(4, 0)), Tile::Empty);
    }

    #[test]
    fn rejects_oversized_map_before_other_checks() {
        let text = "#".repeat(MAX_MAP_LENGTH + 1);
        assert_eq!(
            load_map(&text).unwrap_err(),
            MapError::TooLarge {
                length: MAX_MAP_LENGTH + 1,
                limit: MAX_MAP_LENGTH
            }
        );
    }

    #[test]
    fn rejects_all_wall_map_as_completely_solid() {
        assert_eq!(load_map("###\n###\n###").unwrap_err(), MapError::CompletelySolid);
        assert_eq!(load_map("").unwrap_err(), MapError::CompletelySolid);
        assert_eq!(load_map("#P#\n#G#").unwrap_err(), MapError::CompletelySolid);
    }

    #[test]
    fn rejects_mismatched_rows_as_non_rectangular() {
        let err = load_map("#####\n#P .#\n###\n").unwrap_err();
        assert_eq!(
            err,
            MapError::NotRectangular {
                line: 3,
                expected: 5,
                found: 3
            }
        );
        assert!(err.to_string().contains("not rectangular"));

        assert_eq!(
            load_map("\n . \n").unwrap_err(),
            MapError::NotRectangular {
                line: 2,
                expected: 0,
                found: 3
            }
        );
    }

    #[test]
    fn error_reasons_are_distinct() {
        let messages: HashSet<String> = [
            MapError::TooLarge {
                length: 1,
                limit: 0,
            },
            MapError::CompletelySolid,
            MapError::NotRectangular {
                line: 2,
                expected: 1,
                found: 2,
            },
        ]
        .iter()
        .map(|err| err.to_string())
        .collect();
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn accepts_crlf_and_trailing_newlines() {
        let map = load_map("#####\r\n#P. #\r\n#####\n\n").expect("valid map");
        assert_eq!(map.grid.height(), 3);
        assert_eq!(map.grid.width(), 5);
    }

    #[test]
    fn missing_runner_marker_falls_back_to_first_open_tile() {
        let map = load_map("####\n#. #\n####").expect("valid map");
        assert_eq!(map.runner_spawn, Vec2::new(2, 1));
    }

    #[test]
    fn wrap_normalizes_every_coordinate() {
        let map = load_map("#. \n   ").expect("valid map");
        let grid = &map.grid;
        assert_eq!(grid.wrap(Vec2::new(-1, -1)), Vec2::new(2, 1));
        assert_eq!(grid.wrap(Vec2::new(3, 2)), Vec2::new(0, 0));
        assert_eq!(grid.wrap(Vec2::new(-7, 5)), Vec2::new(2, 1));
        assert_eq!(grid.step(Vec2::new(0, 0), Direction::Left), Vec2::new(2, 0));
        assert_eq!(grid.tile_at(Vec2::new(-3, -2)), Tile::Wall);
    }

    #[test]
    fn rows_round_trip_through_from_rows() {
        let map = load_default_map().expect("default map is valid");
        let rebuilt = Grid::from_rows(&map.grid.rows()).expect("rows are rectangular");
        assert_eq!(rebuilt, map.grid);
    }
}
