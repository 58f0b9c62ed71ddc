use serde_json::Value;

use crate::types::TurnInput;

#[derive(Debug, PartialEq, Eq)]
pub enum ParsedClientMessage {
    Start { map: Option<String>, seed: Option<u32> },
    Input { input: TurnInput },
    Cancel,
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "start" => {
            let map = match object.get("map") {
                None | Some(Value::Null) => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            let seed = match parse_optional_i64(object.get("seed"))? {
                None => None,
                Some(number) => Some(u32::try_from(number).ok()?),
            };
            Some(ParsedClientMessage::Start { map, seed })
        }
        "input" => {
            let input = parse_turn_input(object.get("input")?.as_str()?)?;
            Some(ParsedClientMessage::Input { input })
        }
        "cancel" => Some(ParsedClientMessage::Cancel),
        _ => None,
    }
}

/// Accepts the loose spellings players type or react with.
pub fn parse_turn_input(text: &str) -> Option<TurnInput> {
    let normalized = text.trim().to_lowercase();
    let input = match normalized.as_str() {
        "u" | "up" | "w" | "⬆" | "⬆\u{fe0f}" | "↑" => TurnInput::Up,
        "d" | "down" | "s" | "⬇" | "⬇\u{fe0f}" | "↓" => TurnInput::Down,
        "l" | "left" | "a" | "⬅" | "⬅\u{fe0f}" | "←" => TurnInput::Left,
        "r" | "right" | "➡" | "➡\u{fe0f}" | "→" => TurnInput::Right,
        "ff" | "fast" | "fastforward" | "fast_forward" | "toggle_fast_forward" | "⏩" => {
            TurnInput::ToggleFastForward
        }
        "h" | "?" | "help" | "toggle_help" | "❓" => TurnInput::ToggleHelp,
        _ => return None,
    };
    Some(input)
}

fn parse_optional_i64(value: Option<&Value>) -> Option<Option<i64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if value.is_null() {
        return Some(None);
    }
    if let Some(number) = value.as_i64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_u64() {
        return i64::try_from(number).ok().map(Some);
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored.abs() > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as i64));
        }
    }
    None
}
