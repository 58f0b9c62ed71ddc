use crate::constants::{AMBUSH_LEAD_TILES, FLANK_LEAD_TILES, SKITTISH_RETREAT_DISTANCE};
use crate::rng::Rng;
use crate::types::{Direction, Hunter, HunterMode, HunterType, Runner, Tile, Vec2};
use crate::world::Grid;

use super::schedule::{full_check, resolve_mode};

/// Read-only view of the game a hunter decides from.
#[derive(Clone, Copy, Debug)]
pub struct HunterContext<'a> {
    pub grid: &'a Grid,
    pub runner: &'a Runner,
    pub chaser_pos: Option<Vec2>,
    pub turn: u32,
    pub power_duration: u32,
}

/// Runner position pushed `tiles` ahead of its facing. Facing up also shifts
/// the point the same distance left, as in the arcade original.
fn lead_point(runner: &Runner, tiles: i32) -> Vec2 {
    let ahead = runner.pos.offset(runner.dir, tiles);
    if runner.dir == Direction::Up {
        ahead.offset(Direction::Left, tiles)
    } else {
        ahead
    }
}

pub fn chase_target(hunter: &Hunter, ctx: &HunterContext) -> Vec2 {
    let runner = ctx.runner;
    match hunter.hunter_type {
        HunterType::Chaser => runner.pos,
        HunterType::Ambusher => lead_point(runner, AMBUSH_LEAD_TILES),
        HunterType::Flanker => {
            let pivot = lead_point(runner, FLANK_LEAD_TILES);
            let anchor = ctx.chaser_pos.unwrap_or(pivot);
            Vec2::new(pivot.x * 2 - anchor.x, pivot.y * 2 - anchor.y)
        }
        HunterType::Skittish => {
            if hunter.pos.distance(runner.pos) > SKITTISH_RETREAT_DISTANCE {
                runner.pos
            } else {
                hunter.home_corner
            }
        }
    }
}

/// `None` while Frightened: those moves are random.
pub fn target_for(hunter: &Hunter, ctx: &HunterContext) -> Option<Vec2> {
    match hunter.mode {
        HunterMode::Chase => Some(chase_target(hunter, ctx)),
        HunterMode::Scatter => Some(hunter.home_corner),
        HunterMode::Frightened => None,
    }
}

fn leaving_den(hunter: &Hunter, grid: &Grid) -> bool {
    hunter.dir == Direction::Up && grid.tile_at(grid.step(hunter.pos, Direction::Down)) == Tile::Door
}

/// Picks the next facing for an unpaused hunter. `None` means hold position
/// this turn.
pub fn choose_direction(
    hunter: &Hunter,
    target: Option<Vec2>,
    just_changed: bool,
    ctx: &HunterContext,
    rng: &mut Rng,
) -> Option<Direction> {
    let grid = ctx.grid;
    let pos = hunter.pos;
    let above = grid.tile_at(grid.step(pos, Direction::Up));

    if grid.tile_at(pos) == Tile::Door || above == Tile::Door {
        return Some(Direction::Up);
    }
    if leaving_den(hunter, grid) {
        return Some(if hunter.exit_right {
            Direction::Right
        } else {
            Direction::Left
        });
    }
    if just_changed {
        return Some(hunter.dir.opposite());
    }

    let reverse = hunter.dir.opposite();
    if hunter.mode == HunterMode::Frightened {
        if ctx.turn % 2 == 1 {
            return None;
        }
        let options: Vec<Direction> = Direction::MOVES
            .into_iter()
            .filter(|dir| *dir != reverse && grid.is_passable(grid.step(pos, *dir)))
            .collect();
        if options.is_empty() {
            return fallback_direction(hunter, grid);
        }
        return Some(options[rng.pick_index(options.len())]);
    }

    let Some(target) = target else {
        return fallback_direction(hunter, grid);
    };
    let mut best: Option<(f64, Direction)> = None;
    for dir in Direction::MOVES {
        if dir == reverse {
            continue;
        }
        if dir == Direction::Up && above.is_soft_wall() {
            continue;
        }
        let next = grid.step(pos, dir);
        if !grid.is_passable(next) {
            continue;
        }
        let distance = next.distance(target);
        if best.map(|(best_distance, _)| distance < best_distance).unwrap_or(true) {
            best = Some((distance, dir));
        }
    }
    match best {
        Some((_, dir)) => Some(dir),
        None => fallback_direction(hunter, grid),
    }
}

/// Dead end: turn around if that is open, otherwise wait.
fn fallback_direction(hunter: &Hunter, grid: &Grid) -> Option<Direction> {
    let reverse = hunter.dir.opposite();
    if reverse != Direction::None && grid.is_passable(grid.step(hunter.pos, reverse)) {
        Some(reverse)
    } else {
        None
    }
}

fn can_enter(grid: &Grid, pos: Vec2) -> bool {
    let tile = grid.tile_at(pos);
    tile.is_passable() || tile == Tile::Door
}

/// One AI step: mode bookkeeping, den pause, steering and the move itself.
pub fn step_hunter(hunter: &mut Hunter, ctx: &HunterContext, rng: &mut Rng) {
    let mut update = resolve_mode(hunter.mode, ctx.runner.power_turns, ctx.turn);
    hunter.mode = update.mode;
    if hunter.reverse_pending {
        hunter.reverse_pending = false;
        update.just_changed = true;
    }

    if hunter.pause_turns > 0 {
        hunter.pos = hunter.origin;
        hunter.dir = Direction::None;
        hunter.pause_turns -= 1;
        if full_check(update, ctx.runner.power_turns, ctx.power_duration) {
            hunter.exit_right = true;
        }
        return;
    }

    let target = target_for(hunter, ctx);
    let exiting = leaving_den(hunter, ctx.grid);
    let Some(dir) = choose_direction(hunter, target, update.just_changed, ctx, rng) else {
        return;
    };
    if exiting {
        hunter.exit_right = false;
    }
    hunter.dir = dir;
    let next = ctx.grid.step(hunter.pos, dir);
    if dir != Direction::None && can_enter(ctx.grid, next) {
        hunter.pos = next;
    }
}
