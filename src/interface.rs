//! JSON request/response translation.
//!
//! A request describes a position:
//!
//! ```json
//! {"data": [["?", " ", "K", "p"], ...8 columns], "hidden_pieces": ["P", "c"], "next_player": "RED"}
//! ```
//!
//! `data[x][y]` holds one piece code per square. The answer is the chosen
//! action as `{"from": [x, y], "to": [x, y], "piece": "K"}`, or `null` when
//! the request cannot be served. Every problem in a request is collected
//! before giving up, so the error log shows all of them at once.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::config::DriverConfig;
use crate::constants::{BOARD_HEIGHT, BOARD_SIZE, BOARD_WIDTH, INITIAL_RANK_COUNTS};
use crate::driver::do_search;
use crate::hidden::HiddenPieceCounter;
use crate::piece::{Location, PieceType, Player};
use crate::state::{Action, GameResult, GameState};

/// Response sent when no decision can be made.
pub const NULL_RESPONSE: &str = "null";

/// A problem found in a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request is not an object")]
    NotObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("`data` must be an array of 8 columns")]
    BadBoard,
    #[error("column {0} must be an array of 4 squares")]
    BadColumn(usize),
    #[error("unknown piece code {0}")]
    UnknownPiece(String),
    #[error("unknown player tag {0}")]
    UnknownPlayer(String),
    #[error("`hidden_pieces` must be an array of revealed piece codes")]
    BadHiddenList,
    #[error("{count} {piece:?} on the board and hidden, at most {max} exist")]
    TooMany {
        piece: PieceType,
        count: u32,
        max: u32,
    },
    #[error("{face_down} face-down squares but only {hidden} hidden pieces")]
    TooFewHidden { face_down: u32, hidden: u32 },
    #[error("game is already decided: {0}")]
    GameOver(GameResult),
}

#[derive(Debug, Serialize)]
struct ActionJson {
    from: [usize; 2],
    to: [usize; 2],
    piece: String,
}

fn piece_from_json(value: &Value, errors: &mut Vec<RequestError>) -> Option<PieceType> {
    let mut chars = value.as_str().unwrap_or_default().chars();
    let piece = match (chars.next(), chars.next()) {
        (Some(c), None) => PieceType::from_code(c),
        _ => None,
    };
    if piece.is_none() {
        errors.push(RequestError::UnknownPiece(value.to_string()));
    }
    piece
}

fn player_from_json(value: &Value, errors: &mut Vec<RequestError>) -> Player {
    match value.as_str() {
        Some("RED") => Player::Red,
        Some("BLACK") => Player::Black,
        _ => {
            errors.push(RequestError::UnknownPlayer(value.to_string()));
            Player::Red
        }
    }
}

/// Decode a position. All problems are reported together.
pub fn json_to_state(json: &Value) -> Result<GameState, Vec<RequestError>> {
    let mut errors = Vec::new();
    let Some(obj) = json.as_object() else {
        return Err(vec![RequestError::NotObject]);
    };

    let mut squares = [PieceType::Empty; BOARD_SIZE];
    match obj.get("data") {
        None => errors.push(RequestError::MissingField("data")),
        Some(Value::Array(columns)) if columns.len() == BOARD_WIDTH => {
            for (x, column) in columns.iter().enumerate() {
                match column.as_array() {
                    Some(cells) if cells.len() == BOARD_HEIGHT => {
                        for (y, cell) in cells.iter().enumerate() {
                            squares[Location::from_xy(x, y).index()] =
                                piece_from_json(cell, &mut errors).unwrap_or(PieceType::Empty);
                        }
                    }
                    _ => errors.push(RequestError::BadColumn(x)),
                }
            }
        }
        Some(_) => errors.push(RequestError::BadBoard),
    }

    let mut hidden = Vec::new();
    match obj.get("hidden_pieces") {
        None => errors.push(RequestError::MissingField("hidden_pieces")),
        Some(Value::Array(items)) => {
            for item in items {
                match piece_from_json(item, &mut errors) {
                    Some(p) if p.is_revealed() => hidden.push(p),
                    Some(_) => errors.push(RequestError::BadHiddenList),
                    None => {}
                }
            }
        }
        Some(_) => errors.push(RequestError::BadHiddenList),
    }

    let next_player = match obj.get("next_player") {
        None => {
            errors.push(RequestError::MissingField("next_player"));
            Player::Red
        }
        Some(v) => player_from_json(v, &mut errors),
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    for piece in PieceType::colored() {
        let max = piece.rank().map_or(0, |r| INITIAL_RANK_COUNTS[r as usize]) as u32;
        let count = squares.iter().chain(&hidden).filter(|&&p| p == piece).count() as u32;
        if count > max {
            errors.push(RequestError::TooMany { piece, count, max });
        }
    }
    let face_down = squares.iter().filter(|p| p.is_face_down()).count() as u32;
    if face_down > hidden.len() as u32 {
        errors.push(RequestError::TooFewHidden {
            face_down,
            hidden: hidden.len() as u32,
        });
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let hidden = HiddenPieceCounter::from_pieces(hidden);
    let state = GameState::from_squares(&squares, hidden, next_player);
    match state.result() {
        GameResult::Unfinished => Ok(state),
        result => Err(vec![RequestError::GameOver(result)]),
    }
}

/// Parse and decode a request string.
pub fn parse_request(request: &str) -> Result<GameState, Vec<RequestError>> {
    let json: Value = serde_json::from_str(request).map_err(|e| vec![RequestError::from(e)])?;
    json_to_state(&json)
}

/// Encode a position in request form. A pending flip is written as a
/// face-down square.
pub fn state_to_json(state: &GameState) -> Value {
    let code = |p: PieceType| {
        if p.is_face_down() {
            PieceType::Unknown.code().to_string()
        } else {
            p.code().to_string()
        }
    };
    let data: Vec<Vec<String>> = (0..BOARD_WIDTH)
        .map(|x| {
            (0..BOARD_HEIGHT)
                .map(|y| code(state.piece_at(Location::from_xy(x, y))))
                .collect()
        })
        .collect();
    let hidden: Vec<String> = state
        .hidden_pieces()
        .iter()
        .flat_map(|(p, n)| std::iter::repeat_n(p.code().to_string(), n as usize))
        .collect();
    json!({
        "data": data,
        "hidden_pieces": hidden,
        "next_player": state.next_player().name(),
    })
}

/// Encode an action as a response. The piece of a flip request is not known
/// yet and is sent as `?`.
pub fn action_to_json(action: &Action) -> Value {
    let piece = if action.piece.is_face_down() {
        PieceType::Unknown
    } else {
        action.piece
    };
    let encoded = ActionJson {
        from: [action.source.x(), action.source.y()],
        to: [action.dest.x(), action.dest.y()],
        piece: piece.code().to_string(),
    };
    serde_json::to_value(encoded).unwrap_or(Value::Null)
}

/// Optional append-only logs of served and rejected requests.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    pub request_dir: Option<PathBuf>,
    pub error_dir: Option<PathBuf>,
}

impl RequestLog {
    const REQUEST_FILE: &'static str = "requests.log";
    const ERROR_FILE: &'static str = "errors.log";

    fn append(dir: &Path, file: &str, text: &str) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
        let path = dir.join(file);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        writeln!(f, "[{stamp}] {text}").with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn record_request(&self, request: &str) -> Result<()> {
        match &self.request_dir {
            Some(dir) => Self::append(dir, Self::REQUEST_FILE, request.trim()),
            None => Ok(()),
        }
    }

    pub fn record_errors(&self, request: &str, errors: &[RequestError]) -> Result<()> {
        let Some(dir) = &self.error_dir else {
            return Ok(());
        };
        let mut text = request.trim().to_string();
        for e in errors {
            text.push_str("\n    ");
            text.push_str(&e.to_string());
        }
        Self::append(dir, Self::ERROR_FILE, &text)
    }
}

/// Serve one request: decode, search, encode. Never fails; a rejected
/// request gets [`NULL_RESPONSE`].
pub fn respond(request: &str, config: &DriverConfig, log: &RequestLog) -> String {
    if let Err(e) = log.record_request(request) {
        warn!("request log: {e:#}");
    }
    match parse_request(request) {
        Ok(state) => action_to_json(&do_search(&state, config)).to_string(),
        Err(errors) => {
            for e in &errors {
                warn!(error = %e, "rejected request");
            }
            if let Err(e) = log.record_errors(request, &errors) {
                warn!("error log: {e:#}");
            }
            NULL_RESPONSE.to_string()
        }
    }
}
