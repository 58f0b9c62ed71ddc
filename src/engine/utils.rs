use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Direction;

pub(super) fn now_ms() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    now as u64
}

/// The two facings at right angles to `dir`.
pub(super) fn perpendiculars(dir: Direction) -> [Direction; 2] {
    match dir {
        Direction::Up | Direction::Down => [Direction::Left, Direction::Right],
        Direction::Left | Direction::Right => [Direction::Up, Direction::Down],
        Direction::None => [Direction::None, Direction::None],
    }
}

/// `base * 2^streak`, saturating instead of overflowing on absurd streaks.
pub(super) fn capture_score(base: i32, streak: u32) -> i32 {
    let factor = 1i32.checked_shl(streak.min(30)).unwrap_or(i32::MAX);
    base.saturating_mul(factor)
}
