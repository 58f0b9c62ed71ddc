use clap::Parser;
use maze_chase_server::constants::game_config_from_env;
use maze_chase_server::engine::GameEngine;
use maze_chase_server::input_protocol::parse_turn_input;
use maze_chase_server::rng::Rng;
use maze_chase_server::types::{GameStatus, Snapshot, Tile, TurnEvent, TurnInput};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

const RANDOM_INPUTS: [TurnInput; 5] = [
    TurnInput::Up,
    TurnInput::Down,
    TurnInput::Left,
    TurnInput::Right,
    TurnInput::ToggleFastForward,
];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Custom map file; the built-in board is used when omitted.
    #[arg(long)]
    map: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Scripted inputs, e.g. `rrul` or `r,r,ff,up`.
    #[arg(long)]
    inputs: Option<String>,
    /// Number of random inputs per scenario when no script is given.
    #[arg(long)]
    turns: Option<u32>,
    #[arg(long)]
    fast_forward: bool,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u32,
    #[serde(skip)]
    map: Option<String>,
    #[serde(rename = "fastForward")]
    fast_forward: bool,
    #[serde(rename = "inputLimit")]
    input_limit: u32,
    #[serde(skip)]
    script: Option<Vec<TurnInput>>,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    status: GameStatus,
    turns: u32,
    #[serde(rename = "inputsApplied")]
    inputs_applied: u32,
    score: i32,
    remaining: u32,
    #[serde(rename = "pelletsEaten")]
    pellets_eaten: u32,
    #[serde(rename = "powerPellets")]
    power_pellets: u32,
    fruits: u32,
    captures: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    turn: u32,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageScore")]
    average_score: i64,
    #[serde(rename = "statusCounts")]
    status_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    turn: Option<u32>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let scenarios = match resolve_scenarios(&cli) {
        Ok(value) => value,
        Err(error) => {
            emit_log(
                "error",
                "invalid_arguments",
                "-",
                None,
                None,
                None,
                json!({ "error": error }),
            );
            std::process::exit(2);
        }
    };
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "customMap": scenario.map.is_some(),
                "fastForward": scenario.fast_forward,
                "inputLimit": scenario.input_limit,
            }),
        );
        let scenario_run = match run_scenario(&scenario) {
            Ok(value) => value,
            Err(error) => {
                emit_log(
                    "error",
                    "map_rejected",
                    &match_id,
                    Some(&scenario.name),
                    Some(scenario.seed),
                    None,
                    json!({ "error": error }),
                );
                std::process::exit(2);
            }
        };

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.turn),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        *status_counts
            .entry(status_key(scenario_run.result.status))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.result.turns),
            json!({
                "status": scenario_run.result.status,
                "score": scenario_run.result.score,
                "remaining": scenario_run.result.remaining,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => eprintln!("[simulate] failed to serialize scenario result: {error}"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        now_ms(),
        scenario_results,
        status_counts,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageScore": summary.average_score,
            "statusCounts": summary.status_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> Result<ScenarioRunResult, String> {
    let config = game_config_from_env();
    let max_sub_steps = config.max_sub_steps;
    let mut engine = GameEngine::new(scenario.map.as_deref(), scenario.seed, config)
        .map_err(|error| error.to_string())?;
    if scenario.fast_forward {
        engine.apply_input(TurnInput::ToggleFastForward);
    }

    let mut picker = Rng::new(scenario.seed ^ 0x9e37_79b9);
    let mut pellets_eaten = 0;
    let mut power_pellets = 0;
    let mut fruits = 0;
    let mut captures = 0;
    let mut inputs_applied = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut previous = engine.build_snapshot(true);

    while !engine.is_ended() && inputs_applied < scenario.input_limit {
        let input = match &scenario.script {
            Some(script) => match script.get(inputs_applied as usize) {
                Some(input) => *input,
                None => break,
            },
            None => RANDOM_INPUTS[picker.pick_index(RANDOM_INPUTS.len())],
        };
        let outcome = engine.apply_input(input);
        inputs_applied += 1;

        let snapshot = engine.build_snapshot(true);
        let mut messages = collect_snapshot_anomalies(&previous, &snapshot);
        if outcome.sub_steps > max_sub_steps {
            messages.push(format!(
                "sub-step bound exceeded: {} > {max_sub_steps}",
                outcome.sub_steps
            ));
        }
        if let Some(message) = runner_tile_anomaly(&engine, &snapshot) {
            messages.push(message);
        }
        for message in messages {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.turn,
                message,
            );
        }

        for event in &snapshot.events {
            match event {
                TurnEvent::PelletEaten { .. } => pellets_eaten += 1,
                TurnEvent::PowerPelletEaten { .. } => power_pellets += 1,
                TurnEvent::FruitEaten { .. } => fruits += 1,
                TurnEvent::HunterCaptured { .. } => captures += 1,
                _ => {}
            }
        }
        previous = snapshot;
    }

    Ok(ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            status: previous.status,
            turns: previous.turn,
            inputs_applied,
            score: previous.score,
            remaining: previous.remaining,
            pellets_eaten,
            power_pellets,
            fruits,
            captures,
            anomalies,
        },
        anomaly_records,
    })
}

fn collect_snapshot_anomalies(previous: &Snapshot, snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    if snapshot.remaining > previous.remaining {
        anomalies.push(format!(
            "remaining increased: {} -> {}",
            previous.remaining, snapshot.remaining
        ));
    }
    if (snapshot.remaining == 0) != (snapshot.status == GameStatus::Win) {
        anomalies.push(format!(
            "status {:?} with {} consumables left",
            snapshot.status, snapshot.remaining
        ));
    }
    if snapshot.score < previous.score {
        anomalies.push(format!(
            "score decreased: {} -> {}",
            previous.score, snapshot.score
        ));
    }
    if snapshot.turn < previous.turn {
        anomalies.push(format!(
            "turn counter went back: {} -> {}",
            previous.turn, snapshot.turn
        ));
    }
    if snapshot.runner.power_turns == 0 && snapshot.runner.capture_streak > 0 {
        anomalies.push("capture streak survived the end of power".to_string());
    }

    let in_bounds =
        |x: i32, y: i32| (0..snapshot.width).contains(&x) && (0..snapshot.height).contains(&y);
    if !in_bounds(snapshot.runner.x, snapshot.runner.y) {
        anomalies.push(format!(
            "runner out of bounds: ({}, {})",
            snapshot.runner.x, snapshot.runner.y
        ));
    }
    for hunter in &snapshot.hunters {
        if !in_bounds(hunter.x, hunter.y) {
            anomalies.push(format!(
                "hunter {} out of bounds: ({}, {})",
                hunter.glyph, hunter.x, hunter.y
            ));
        }
    }
    anomalies
}

fn runner_tile_anomaly(engine: &GameEngine, snapshot: &Snapshot) -> Option<String> {
    let rows = engine.board_rows();
    let tile = rows
        .get(snapshot.runner.y as usize)
        .and_then(|row| row.chars().nth(snapshot.runner.x as usize))
        .map(Tile::from_map_char)?;
    if tile.is_passable() {
        None
    } else {
        Some(format!(
            "runner stands on impassable tile {:?} at ({}, {})",
            tile, snapshot.runner.x, snapshot.runner.y
        ))
    }
}

fn resolve_scenarios(cli: &Cli) -> Result<Vec<Scenario>, String> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    let map = match cli.map.as_ref() {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|error| format!("failed to read {}: {error}", path.display()))?,
        ),
        None => None,
    };
    let script = cli.inputs.as_deref().map(parse_input_script).transpose()?;

    if map.is_some() || script.is_some() || cli.turns.is_some() || cli.fast_forward {
        let input_limit = match &script {
            Some(inputs) => inputs.len() as u32,
            None => cli.turns.unwrap_or(500).clamp(1, 100_000),
        };
        return Ok(vec![Scenario {
            name: if script.is_some() {
                "scripted".to_string()
            } else {
                format!("custom-random{input_limit}")
            },
            seed,
            map,
            fast_forward: cli.fast_forward,
            input_limit,
            script,
        }]);
    }

    Ok(vec![
        Scenario {
            name: "default-random".to_string(),
            seed,
            map: None,
            fast_forward: false,
            input_limit: 1_000,
            script: None,
        },
        Scenario {
            name: "default-fast-forward".to_string(),
            seed: normalize_seed(seed as u64 + 1),
            map: None,
            fast_forward: true,
            input_limit: 1_000,
            script: None,
        },
    ])
}

/// Comma or whitespace separated tokens, or one character per input.
fn parse_input_script(text: &str) -> Result<Vec<TurnInput>, String> {
    let tokens: Vec<String> = if text.contains(',') || text.trim().contains(char::is_whitespace) {
        text.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        text.trim().chars().map(|c| c.to_string()).collect()
    };
    tokens
        .iter()
        .map(|token| parse_turn_input(token).ok_or_else(|| format!("unknown input '{token}'")))
        .collect()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    turn: u32,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        turn,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    status_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let total_score: i64 = scenarios.iter().map(|s| s.score as i64).sum();
    let average_score = if scenario_count == 0 {
        0
    } else {
        total_score / scenario_count as i64
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_score,
        status_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    turn: Option<u32>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        turn,
        details,
    };
    match serde_json::to_string(&log_line) {
        Ok(line) => eprintln!("{line}"),
        Err(error) => eprintln!("[simulate] failed to serialize log line: {error}"),
    }
}

fn status_key(status: GameStatus) -> String {
    match status {
        GameStatus::Active => "active",
        GameStatus::Win => "win",
        GameStatus::Lose => "lose",
        GameStatus::Cancelled => "cancelled",
    }
    .to_string()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(status: GameStatus, score: i32) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            status,
            turns: 10,
            inputs_applied: 10,
            score,
            remaining: 5,
            pellets_eaten: 0,
            power_pellets: 0,
            fruits: 0,
            captures: 0,
            anomalies: Vec::new(),
        }
    }

    fn scenario(name: &str, map: Option<&str>, script: Option<Vec<TurnInput>>) -> Scenario {
        Scenario {
            name: name.to_string(),
            seed: 17,
            map: map.map(str::to_string),
            fast_forward: false,
            input_limit: script.as_ref().map(|s| s.len() as u32).unwrap_or(400),
            script,
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_score() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result(GameStatus::Lose, 300),
                make_scenario_result(GameStatus::Win, 900),
            ],
            BTreeMap::from([("lose".to_string(), 1usize), ("win".to_string(), 1usize)]),
            1,
        );
        assert_eq!(summary.average_score, 600);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("maze-chase-missing-{}", rand::random::<u32>()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result(GameStatus::Lose, 10)],
            BTreeMap::from([("lose".to_string(), 1usize)]),
            0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].turn, 11);
    }

    #[test]
    fn input_script_accepts_letters_and_tokens() {
        assert_eq!(
            parse_input_script("rrul").expect("letters parse"),
            vec![
                TurnInput::Right,
                TurnInput::Right,
                TurnInput::Up,
                TurnInput::Left
            ]
        );
        assert_eq!(
            parse_input_script("r, ff ,help").expect("tokens parse"),
            vec![
                TurnInput::Right,
                TurnInput::ToggleFastForward,
                TurnInput::ToggleHelp
            ]
        );
        assert!(parse_input_script("rxq").is_err());
    }

    #[test]
    fn scripted_scenario_wins_small_map() {
        let run = run_scenario(&scenario(
            "win",
            Some("#####\n#P..#\n#####"),
            Some(vec![TurnInput::Right, TurnInput::Right]),
        ))
        .expect("map is valid");
        assert_eq!(run.result.status, GameStatus::Win);
        assert_eq!(run.result.pellets_eaten, 2);
        assert_eq!(run.result.score, 20);
        assert!(run.result.anomalies.is_empty());
    }

    #[test]
    fn random_play_on_default_map_has_no_anomalies() {
        let run = run_scenario(&scenario("random", None, None)).expect("default map loads");
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert!(run.result.inputs_applied > 0);
    }

    #[test]
    fn invalid_custom_map_is_reported() {
        let error = run_scenario(&scenario("bad", Some("###\n###"), None)).unwrap_err();
        assert!(error.contains("completely solid"));
    }
}
