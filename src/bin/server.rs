use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use maze_chase_server::constants::{game_config_from_env, IDLE_EXPIRY_MS};
use maze_chase_server::engine::GameEngine;
use maze_chase_server::input_protocol::{parse_client_message, parse_turn_input, ParsedClientMessage};
use maze_chase_server::session_store::SessionStore;
use maze_chase_server::types::{GameConfig, TurnInput};
use serde_json::{json, Value};
use tokio::sync::Mutex;

const IDLE_SWEEP_INTERVAL_MS: u64 = 60_000;

type SharedState = Arc<Mutex<ServerState>>;
type Reply = (StatusCode, Value);

struct ServerState {
    games: HashMap<String, GameEngine>,
    session_store: SessionStore,
    config: GameConfig,
    idle_expiry_ms: u64,
}

impl ServerState {
    fn new(session_store: SessionStore, config: GameConfig, idle_expiry_ms: u64) -> Self {
        Self {
            games: HashMap::new(),
            session_store,
            config,
            idle_expiry_ms,
        }
    }

    /// Brings back every game that was still running at the last checkpoint.
    fn resume_saved_games(&mut self) -> usize {
        for channel in self.session_store.channels() {
            if let Some(engine) = self.session_store.restore(&channel) {
                self.games.insert(channel, engine);
            }
        }
        self.games.len()
    }
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let session_path = std::env::var("SESSION_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/sessions.json"));
    let idle_expiry_ms = parse_idle_expiry_ms(std::env::var("IDLE_EXPIRY_MS").ok().as_deref());

    let mut server_state = ServerState::new(
        SessionStore::new(session_path),
        game_config_from_env(),
        idle_expiry_ms,
    );
    let resumed = server_state.resume_saved_games();
    println!("[server] resumed {resumed} saved game(s)");

    let state = Arc::new(Mutex::new(server_state));
    start_idle_sweep(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/games/{channel}",
            get(game_handler).post(start_handler).delete(cancel_handler),
        )
        .route("/games/{channel}/input", post(input_handler))
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn parse_idle_expiry_ms(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(IDLE_EXPIRY_MS)
}

async fn healthz(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!({ "ok": true, "games": guard.games.len() }))
}

async fn game_handler(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let (status, body) = show_game(&mut guard, &channel);
    (status, Json(body))
}

async fn start_handler(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    body: String,
) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let (status, body) = start_game(&mut guard, &channel, &body);
    (status, Json(body))
}

async fn input_handler(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    body: String,
) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let (status, body) = match parse_input_body(&body) {
        Some(ParsedClientMessage::Input { input }) => apply_input(&mut guard, &channel, input),
        Some(ParsedClientMessage::Cancel) => cancel_game(&mut guard, &channel),
        Some(ParsedClientMessage::Start { .. }) | None => {
            error_reply(StatusCode::BAD_REQUEST, "invalid input")
        }
    };
    (status, Json(body))
}

async fn cancel_handler(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
) -> impl IntoResponse {
    let mut guard = state.lock().await;
    let (status, body) = cancel_game(&mut guard, &channel);
    (status, Json(body))
}

/// JSON messages first, then bare words like `up` or `ff`.
fn parse_input_body(raw: &str) -> Option<ParsedClientMessage> {
    parse_client_message(raw).or_else(|| {
        parse_turn_input(raw).map(|input| ParsedClientMessage::Input { input })
    })
}

fn error_reply(status: StatusCode, message: &str) -> Reply {
    (status, json!({ "type": "error", "message": message }))
}

fn show_game(state: &mut ServerState, channel: &str) -> Reply {
    let Some(engine) = state.games.get_mut(channel) else {
        return error_reply(StatusCode::NOT_FOUND, "no game in this channel");
    };
    (
        StatusCode::OK,
        json!({ "type": "state", "snapshot": engine.build_snapshot(false) }),
    )
}

fn start_game(state: &mut ServerState, channel: &str, raw: &str) -> Reply {
    let (map, seed) = if raw.trim().is_empty() {
        (None, None)
    } else {
        match parse_client_message(raw) {
            Some(ParsedClientMessage::Start { map, seed }) => (map, seed),
            _ => return error_reply(StatusCode::BAD_REQUEST, "invalid start message"),
        }
    };
    if state
        .games
        .get(channel)
        .is_some_and(|engine| !engine.is_ended())
    {
        return error_reply(StatusCode::CONFLICT, "a game is already running here");
    }

    let seed = seed.unwrap_or_else(rand::random::<u32>);
    let mut engine = match GameEngine::new(map.as_deref(), seed, state.config.clone()) {
        Ok(engine) => engine,
        Err(error) => return error_reply(StatusCode::BAD_REQUEST, &error.to_string()),
    };
    println!(
        "[server] game started in '{channel}' (seed {seed}, custom map: {})",
        map.is_some()
    );
    state.session_store.checkpoint(channel, &engine);
    let snapshot = engine.build_snapshot(true);
    state.games.insert(channel.to_string(), engine);
    (
        StatusCode::CREATED,
        json!({ "type": "state", "seed": seed, "snapshot": snapshot }),
    )
}

fn apply_input(state: &mut ServerState, channel: &str, input: TurnInput) -> Reply {
    let Some(engine) = state.games.get_mut(channel) else {
        return error_reply(StatusCode::NOT_FOUND, "no game in this channel");
    };
    let outcome = engine.apply_input(input);
    let snapshot = engine.build_snapshot(true);
    if outcome.checkpoint_due {
        state.session_store.checkpoint(channel, engine);
    } else if engine.is_ended() && state.session_store.get(channel).is_some() {
        println!(
            "[server] game in '{channel}' finished: {:?} with {} points",
            snapshot.status, snapshot.score
        );
        // The ended engine stays until the idle sweep so repeated inputs are no-ops.
        state.session_store.checkpoint(channel, engine);
    }
    (
        StatusCode::OK,
        json!({
            "type": "state",
            "subSteps": outcome.sub_steps,
            "snapshot": snapshot,
        }),
    )
}

fn cancel_game(state: &mut ServerState, channel: &str) -> Reply {
    let Some(engine) = state.games.get_mut(channel) else {
        return error_reply(StatusCode::NOT_FOUND, "no game in this channel");
    };
    if !engine.is_ended() {
        engine.cancel();
        state.session_store.checkpoint(channel, engine);
        println!("[server] game in '{channel}' cancelled");
    }
    (
        StatusCode::OK,
        json!({ "type": "state", "snapshot": engine.build_snapshot(true) }),
    )
}

fn start_idle_sweep(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(IDLE_SWEEP_INTERVAL_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            let expired = sweep_idle_games(&mut guard, now_ms());
            if !expired.is_empty() {
                println!("[server] expired idle games: {}", expired.join(", "));
            }
        }
    });
}

fn sweep_idle_games(state: &mut ServerState, now_ms: u64) -> Vec<String> {
    let idle_ms = state.idle_expiry_ms;
    let mut expired: Vec<String> = state
        .games
        .iter()
        .filter(|(_, engine)| engine.is_idle_expired(now_ms, idle_ms))
        .map(|(channel, _)| channel.clone())
        .collect();
    for channel in &expired {
        state.games.remove(channel);
        state.session_store.remove(channel);
    }
    for channel in state.session_store.expire_idle(now_ms, idle_ms) {
        if !expired.contains(&channel) {
            expired.push(channel);
        }
    }
    expired.sort();
    expired
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use maze_chase_server::types::GameStatus;

    fn test_state(name: &str) -> ServerState {
        let path = std::env::temp_dir()
            .join(format!("{name}-{}-{}", std::process::id(), rand::random::<u32>()))
            .join("sessions.json");
        ServerState::new(SessionStore::new(path), GameConfig::default(), 1_000)
    }

    #[test]
    fn idle_expiry_parsing_falls_back_to_default() {
        assert_eq!(parse_idle_expiry_ms(Some("5000")), 5_000);
        assert_eq!(parse_idle_expiry_ms(Some("0")), IDLE_EXPIRY_MS);
        assert_eq!(parse_idle_expiry_ms(Some("soon")), IDLE_EXPIRY_MS);
        assert_eq!(parse_idle_expiry_ms(None), IDLE_EXPIRY_MS);
    }

    #[test]
    fn input_body_accepts_json_and_bare_words() {
        assert_eq!(
            parse_input_body(r#"{"type":"input","input":"left"}"#),
            Some(ParsedClientMessage::Input {
                input: TurnInput::Left
            })
        );
        assert_eq!(
            parse_input_body("ff"),
            Some(ParsedClientMessage::Input {
                input: TurnInput::ToggleFastForward
            })
        );
        assert_eq!(parse_input_body("jump"), None);
    }

    #[test]
    fn custom_map_errors_are_surfaced_verbatim() {
        let mut state = test_state("server-bad-map");
        let (status, body) = start_game(&mut state, "c1", r####"{"type":"start","map":"###\n#"}"####);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["message"].as_str().unwrap_or_default();
        assert!(message.contains("completely solid"), "{message}");
        assert!(state.games.is_empty());
    }

    #[test]
    fn finished_game_answers_no_ops_until_restarted() {
        let mut state = test_state("server-lifecycle");
        let start = r######"{"type":"start","map":"#####\n#P..#\n#####","seed":3}"######;
        let (status, _) = start_game(&mut state, "c1", start);
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = start_game(&mut state, "c1", start);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(state.session_store.channels(), vec!["c1".to_string()]);

        apply_input(&mut state, "c1", TurnInput::Right);
        let (status, body) = apply_input(&mut state, "c1", TurnInput::Right);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["status"], json!(GameStatus::Win));
        assert!(state.games["c1"].is_ended());
        assert!(state.session_store.channels().is_empty());

        let (status, body) = apply_input(&mut state, "c1", TurnInput::Right);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subSteps"], json!(0));
        assert_eq!(body["snapshot"]["status"], json!(GameStatus::Win));
        assert!(state.session_store.get("c1").is_none());

        let (status, _) = start_game(&mut state, "c1", start);
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn cancelled_game_lingers_until_idle_sweep() {
        let mut state = test_state("server-cancel");
        start_game(&mut state, "c1", "");
        let (status, body) = cancel_game(&mut state, "c1");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["status"], json!("cancelled"));
        assert!(state.session_store.channels().is_empty());

        let (status, body) = cancel_game(&mut state, "c1");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["status"], json!("cancelled"));
        let (_, body) = apply_input(&mut state, "c1", TurnInput::Left);
        assert_eq!(body["snapshot"]["turn"], json!(0));

        let played = state.games["c1"].last_played_ms();
        assert_eq!(
            sweep_idle_games(&mut state, played + 5_000),
            vec!["c1".to_string()]
        );
        assert!(state.games.is_empty());
    }

    #[test]
    fn idle_sweep_expires_quiet_games() {
        let mut state = test_state("server-idle");
        start_game(&mut state, "c1", "");
        let played = state.games["c1"].last_played_ms();

        assert!(sweep_idle_games(&mut state, played + 10).is_empty());
        assert_eq!(
            sweep_idle_games(&mut state, played + 5_000),
            vec!["c1".to_string()]
        );
        assert!(state.games.is_empty());
        assert!(state.session_store.channels().is_empty());
    }

    #[test]
    fn saved_games_resume_on_startup() {
        let mut state = test_state("server-resume");
        start_game(&mut state, "c1", r#"{"type":"start","seed":9}"#);
        apply_input(&mut state, "c1", TurnInput::Left);
        let turn = state.games["c1"].turn();

        state.games.clear();
        assert_eq!(state.resume_saved_games(), 1);
        assert_eq!(state.games["c1"].turn(), turn);
    }
}
