use crate::constants::{
    EARLY_CYCLES, MODE_CYCLE_COUNT, MODE_CYCLE_TURNS, SCATTER_TURNS_EARLY, SCATTER_TURNS_LATE,
};
use crate::types::HunterMode;

const SCHEDULE_END_TURN: u32 = MODE_CYCLE_TURNS * MODE_CYCLE_COUNT;

fn scatter_turns(cycle: u32) -> u32 {
    if cycle < EARLY_CYCLES {
        SCATTER_TURNS_EARLY
    } else {
        SCATTER_TURNS_LATE
    }
}

/// Schedule-derived mode; never Frightened.
pub fn mode_at(turn: u32) -> HunterMode {
    if turn >= SCHEDULE_END_TURN {
        return HunterMode::Chase;
    }
    let cycle = turn / MODE_CYCLE_TURNS;
    let phase = turn % MODE_CYCLE_TURNS;
    if phase < scatter_turns(cycle) {
        HunterMode::Scatter
    } else {
        HunterMode::Chase
    }
}

/// True on every turn where `mode_at` starts a new phase.
pub fn is_mode_boundary(turn: u32) -> bool {
    if turn >= SCHEDULE_END_TURN {
        return false;
    }
    let cycle = turn / MODE_CYCLE_TURNS;
    let phase = turn % MODE_CYCLE_TURNS;
    phase == 0 || phase == scatter_turns(cycle)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeUpdate {
    pub mode: HunterMode,
    pub just_changed: bool,
}

/// Frightened persists while power is active. A hunter still carrying it once
/// power is gone (only den hunters do) drops it here, and that drop counts as
/// a change. Schedule boundaries count even under Frightened.
pub fn resolve_mode(current: HunterMode, power_turns: u32, turn: u32) -> ModeUpdate {
    if current == HunterMode::Frightened {
        if power_turns > 0 {
            return ModeUpdate {
                mode: HunterMode::Frightened,
                just_changed: is_mode_boundary(turn),
            };
        }
        return ModeUpdate {
            mode: mode_at(turn),
            just_changed: true,
        };
    }
    ModeUpdate {
        mode: mode_at(turn),
        just_changed: is_mode_boundary(turn),
    }
}

/// Variant used for hunters still waiting in the den: a power pellet eaten
/// this very step also counts.
pub fn full_check(update: ModeUpdate, power_turns: u32, power_duration: u32) -> bool {
    update.just_changed || (power_duration > 0 && power_turns == power_duration)
}
