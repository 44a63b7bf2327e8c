/// Outcome of a game as written in its `Result` tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    NoResult,
}

impl GameResult {
    pub fn from_tag(value: &str) -> GameResult {
        match value.trim() {
            "1-0" => GameResult::WhiteWin,
            "0-1" => GameResult::BlackWin,
            "1/2-1/2" => GameResult::Draw,
            _ => GameResult::NoResult,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::NoResult => "*",
        }
    }
}

/// One parsed game, ready to be written to storage.
///
/// Built by the extractor from a single game's tag pairs and move text,
/// consumed exactly once by the database writer. Elo fields are 0 when the
/// tag is absent, `round` is -1 when absent or non-numeric.
#[derive(Debug)]
pub struct GameRecord {
    pub event: String,
    pub white: String,
    pub black: String,
    pub site: Option<String>,
    pub time_control: Option<String>,
    pub date: Option<String>,
    pub eco: Option<String>,
    pub fen: Option<String>,
    pub round: i32,
    pub white_elo: i32,
    pub black_elo: i32,
    pub ply_count: u32,
    pub result: GameResult,
    pub moves: String,
}
