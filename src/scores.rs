//! Period-by-period scores recovered from a game page.
//!
//! ESPN ships the box score as JSON inside inline `<script>` blocks, but the
//! surrounding structure moves around between page revisions. Extraction is
//! an ordered chain of text strategies, each pure over the script text:
//!
//! 1. every `"linescores"` array, with the team name and final score found
//!    in a window of text around it;
//! 2. the `"competitors"` array, one top-level object per team;
//! 3. `<meta>` descriptions carrying "final score X-Y" (finals only).
//!
//! Scanning stops once two teams are known. A page yielding nothing is a
//! soft failure reported in the payload, not an error.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ScrapeResult;
use crate::http_client::PageSource;
use crate::periods::TeamLine;

pub const EXTRACTION_FAILED: &str = "Could not extract game data";

/// Two-team contests only; scanning stops here.
const EXPECTED_TEAMS: usize = 2;
const WINDOW_BEFORE: usize = 1000;
const WINDOW_AFTER: usize = 500;

static LINESCORES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""linescores"\s*:\s*(\[[^\]]+\])"#).expect("linescores pattern")
});
static LINESCORES_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""linescores"\s*:\s*\["#).expect("linescores open pattern"));
static COMPETITORS_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""competitors"\s*:\s*\["#).expect("competitors pattern"));
static DISPLAY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""displayName"\s*:\s*"([^"]+)""#).expect("displayName pattern"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).expect("name pattern"));
static ABBREVIATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""abbreviation"\s*:\s*"([^"]+)""#).expect("abbreviation pattern"));
static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""score"\s*:\s*"?(\d+)"?"#).expect("score pattern"));
static FINAL_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)-(\d+)").expect("final pair pattern"));

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("script selector"));
static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[content]").expect("meta selector"));

/// Team name to line score. Insertion order is kept; re-inserting a name
/// replaces its line in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameScores {
    teams: Vec<(String, TeamLine)>,
}

impl GameScores {
    pub fn upsert(&mut self, name: String, line: TeamLine) {
        match self.teams.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = line,
            None => self.teams.push((name, line)),
        }
    }

    pub fn insert_if_absent(&mut self, name: String, line: TeamLine) {
        if self.get(&name).is_none() {
            self.teams.push((name, line));
        }
    }

    pub fn get(&self, name: &str) -> Option<&TeamLine> {
        self.teams.iter().find(|(n, _)| n == name).map(|(_, l)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TeamLine)> {
        self.teams.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

impl Serialize for GameScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.teams.len()))?;
        for (name, line) in &self.teams {
            map.serialize_entry(name, line)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScoreOutcome {
    Teams { teams: GameScores },
    Failed { error: String, url: String },
}

impl ScoreOutcome {
    pub fn teams(&self) -> Option<&GameScores> {
        match self {
            ScoreOutcome::Teams { teams } => Some(teams),
            ScoreOutcome::Failed { .. } => None,
        }
    }
}

pub fn game_url(sport: &str, game_id: &str) -> String {
    format!("https://www.espn.com/{sport}/game/_/gameId/{game_id}/")
}

pub fn scrape_game_scores<P: PageSource + ?Sized>(
    source: &P,
    url: &str,
) -> ScrapeResult<ScoreOutcome> {
    let html = source.fetch_page(url)?;
    Ok(extract_game_scores(&html, url))
}

pub fn extract_game_scores(html: &str, url: &str) -> ScoreOutcome {
    let document = Html::parse_document(html);
    let mut teams = GameScores::default();

    for script in document.select(&SCRIPT_SELECTOR) {
        let content = script.text().collect::<String>();
        if content.trim().is_empty() {
            continue;
        }

        for (name, line) in linescore_candidates(&content) {
            teams.upsert(name, line);
        }
        if teams.len() >= EXPECTED_TEAMS {
            break;
        }

        if content.to_lowercase().contains("competitors") {
            for (name, line) in competitor_candidates(&content) {
                teams.upsert(name, line);
            }
        }
    }

    if teams.len() < EXPECTED_TEAMS {
        let contents = document
            .select(&META_SELECTOR)
            .filter_map(|meta| meta.value().attr("content"));
        for (name, line) in meta_final_scores(contents) {
            teams.insert_if_absent(name, line);
        }
    }

    if teams.is_empty() {
        info!(url, "no team data found on page");
        return ScoreOutcome::Failed {
            error: EXTRACTION_FAILED.to_string(),
            url: url.to_string(),
        };
    }

    info!(url, teams = teams.len(), "extracted game scores");
    ScoreOutcome::Teams { teams }
}

/// Every `"linescores"` array in the script, paired with the team name and
/// final score found in the text window around it.
pub fn linescore_candidates(script: &str) -> Vec<(String, TeamLine)> {
    let mut found = Vec::new();

    for caps in LINESCORES_RE.captures_iter(script) {
        let (Some(whole), Some(array)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let (lo, hi) = window_bounds(script, whole.start(), whole.end());
        let window = &script[lo..hi];

        let Some(values) = parse_linescores(array.as_str()) else {
            debug!("skipping malformed linescores array");
            continue;
        };
        let Some(team) = team_name(window) else {
            continue;
        };
        let final_score = enclosing_score(window, whole.start() - lo, whole.end() - lo)
            .or_else(|| capture(&SCORE_RE, window));

        if let Some(line) = TeamLine::from_periods(&values, final_score.as_deref()) {
            found.push((team, line));
        }
    }

    found
}

/// One entry per top-level object of the `"competitors"` array.
pub fn competitor_candidates(script: &str) -> Vec<(String, TeamLine)> {
    let Some(open) = COMPETITORS_OPEN_RE.find(script) else {
        return Vec::new();
    };
    let bracket = open.end() - 1;
    let Some(close) = balanced_end(script, bracket) else {
        debug!("competitors array is not terminated");
        return Vec::new();
    };

    top_level_objects(&script[bracket + 1..close])
        .into_iter()
        .filter_map(competitor_from_chunk)
        .collect()
}

fn competitor_from_chunk(chunk: &str) -> Option<(String, TeamLine)> {
    let name = capture(&DISPLAY_NAME_RE, chunk)?;
    let raw = linescores_array(chunk)?;
    let values = parse_linescores(raw)?;
    let score = capture(&SCORE_RE, chunk);
    let line = TeamLine::from_periods(&values, score.as_deref())?;
    Some((name, line))
}

/// Meta descriptions shaped like "Away Team vs Home Team ... final score 24-17".
/// Yields final-only lines for the last word before `vs` and the first
/// word after it.
pub fn meta_final_scores<'a, I>(contents: I) -> Vec<(String, TeamLine)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found = Vec::new();
    for content in contents {
        if !content.to_lowercase().contains("final score") {
            continue;
        }
        let parts: Vec<&str> = content.split("vs").collect();
        let [left, right] = parts.as_slice() else {
            continue;
        };
        let (Some(first), Some(second)) = (
            left.split_whitespace().last(),
            right.split_whitespace().next(),
        ) else {
            continue;
        };
        let Some(pair) = FINAL_PAIR_RE.captures(right) else {
            continue;
        };
        let (Some(a), Some(b)) = (pair.get(1), pair.get(2)) else {
            continue;
        };
        found.push((first.to_string(), TeamLine::final_only(a.as_str())));
        found.push((second.to_string(), TeamLine::final_only(b.as_str())));
    }
    found
}

/// Period values from a linescores array literal: `displayValue`, else
/// `value`, else `"0"`. `None` when the literal is not a JSON array.
pub fn parse_linescores(raw: &str) -> Option<Vec<String>> {
    let items: Vec<Value> = serde_json::from_str(raw).ok()?;
    let values = items
        .iter()
        .map(|item| match item {
            Value::Object(map) => map
                .get("displayValue")
                .and_then(scalar_to_string)
                .or_else(|| map.get("value").and_then(scalar_to_string))
                .unwrap_or_else(|| "0".to_string()),
            other => scalar_to_string(other).unwrap_or_else(|| other.to_string()),
        })
        .collect();
    Some(values)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn team_name(window: &str) -> Option<String> {
    capture(&DISPLAY_NAME_RE, window)
        .or_else(|| capture(&NAME_RE, window))
        .or_else(|| capture(&ABBREVIATION_RE, window))
}

/// Score inside the object that most tightly wraps `start..end`: from the
/// last `{` before the match to the first `}` after it.
fn enclosing_score(window: &str, start: usize, end: usize) -> Option<String> {
    let obj_start = window[..start].rfind('{')?;
    let obj_end = window[end..].find('}')? + end;
    capture(&SCORE_RE, &window[obj_start..obj_end])
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn window_bounds(text: &str, start: usize, end: usize) -> (usize, usize) {
    let mut lo = start.saturating_sub(WINDOW_BEFORE);
    while !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = end.saturating_add(WINDOW_AFTER).min(text.len());
    while !text.is_char_boundary(hi) {
        hi += 1;
    }
    (lo, hi)
}

fn linescores_array(chunk: &str) -> Option<&str> {
    let open = LINESCORES_OPEN_RE.find(chunk)?;
    let bracket = open.end() - 1;
    let close = balanced_end(chunk, bracket)?;
    Some(&chunk[bracket..=close])
}

/// Index of the bracket closing the one at `open`, skipping over string
/// literals. `None` if the text ends first.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn top_level_objects(body: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut from = 0;
    while let Some(rel) = body[from..].find('{') {
        let open = from + rel;
        let Some(close) = balanced_end(body, open) else {
            break;
        };
        objects.push(&body[open..=close]);
        from = close + 1;
    }
    objects
}
