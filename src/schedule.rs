use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ScrapeError, ScrapeResult};
use crate::http_client::PageSource;

pub const DEFAULT_TEAM_SLUG: &str = "min";
pub const DEFAULT_TEAM_NAME_LONG: &str = "minnesota-vikings";
pub const DEFAULT_TEAM_NAME: &str = "Minnesota";
pub const NO_SCHEDULE_TABLE: &str = "Could not find schedule table with TIME column (upcoming games)";

static GAME_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/gameId/(\d+)").expect("gameId pattern"));
static URL_TEAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/name/[^/]+/([^/]+)").expect("team slug pattern"));

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("table"));
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("tr"));
static HEADER_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("th, td"));
static DATA_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("td"));
static SPAN_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("span"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// One upcoming game as listed on a team schedule page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    #[serde(rename = "WK", skip_serializing_if = "Option::is_none")]
    pub week: Option<String>,
    #[serde(rename = "DATE", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "MATCH_UP", skip_serializing_if = "Option::is_none")]
    pub match_up: Option<String>,
    #[serde(rename = "TIME", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "GAME_ID", skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(rename = "TV", skip_serializing_if = "Option::is_none")]
    pub tv: Option<String>,
}

impl ScheduleEntry {
    pub fn is_empty(&self) -> bool {
        self.week.is_none()
            && self.date.is_none()
            && self.match_up.is_none()
            && self.time.is_none()
            && self.game_id.is_none()
            && self.tv.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Week,
    Date,
    Opponent,
    Time,
    Tv,
    Result,
}

impl Column {
    fn classify(header_upper: &str) -> Option<Self> {
        let has = |token: &str| header_upper.contains(token);
        if has("WK") || has("WEEK") {
            Some(Column::Week)
        } else if has("DATE") {
            Some(Column::Date)
        } else if has("OPPONENT") || has("OPP") {
            Some(Column::Opponent)
        } else if has("TIME") {
            Some(Column::Time)
        } else if has("TV") {
            Some(Column::Tv)
        } else if has("RESULT") {
            Some(Column::Result)
        } else {
            None
        }
    }
}

/// Cell index per schedule role, read from the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub week: Option<usize>,
    pub date: Option<usize>,
    pub opponent: Option<usize>,
    pub time: Option<usize>,
    pub tv: Option<usize>,
    pub result: Option<usize>,
}

impl ColumnMap {
    /// The first cell claiming a role keeps it.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let text = header.as_ref().trim().to_uppercase();
            let Some(column) = Column::classify(&text) else {
                continue;
            };
            let slot = match column {
                Column::Week => &mut map.week,
                Column::Date => &mut map.date,
                Column::Opponent => &mut map.opponent,
                Column::Time => &mut map.time,
                Column::Tv => &mut map.tv,
                Column::Result => &mut map.result,
            };
            slot.get_or_insert(idx);
        }
        map
    }

    pub fn max_index(&self) -> Option<usize> {
        [
            self.week,
            self.date,
            self.opponent,
            self.time,
            self.tv,
            self.result,
        ]
        .into_iter()
        .flatten()
        .max()
    }
}

/// A header row for upcoming games names a time column and no result column.
pub fn is_upcoming_header<S: AsRef<str>>(texts: &[S]) -> bool {
    let has_time = texts.iter().any(|t| t.as_ref().contains("TIME"));
    let has_result = texts.iter().any(|t| t.as_ref().contains("RESULT"));
    has_time && !has_result
}

pub fn schedule_url(team_slug: &str, team_name_long: &str) -> String {
    format!("https://www.espn.com/nfl/team/schedule/_/name/{team_slug}/{team_name_long}")
}

/// "minnesota-vikings" -> "Minnesota". Without a long name the slug after
/// `/name/<abbr>/` in the URL is used instead.
pub fn team_display_name(team_name_long: Option<&str>, url: &str) -> String {
    let source = team_name_long
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            URL_TEAM_RE
                .captures(url)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });

    match source {
        Some(long) => capitalize(long.split('-').next().unwrap_or_default()),
        None => DEFAULT_TEAM_NAME.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `@SEA` -> `Minnesota @ SEA`, `vsDAL` -> `Minnesota VS DAL`.
pub fn format_match_up(team_name: &str, opponent: &str) -> String {
    let opponent = opponent.trim();
    let formatted = if let Some(rest) = opponent.strip_prefix('@') {
        format!("@ {rest}")
    } else if let Some(rest) = opponent.strip_prefix("vs") {
        format!("VS {rest}")
    } else {
        opponent.to_string()
    };
    format!("{team_name} {formatted}")
}

pub fn format_time(raw: &str) -> String {
    if raw.eq_ignore_ascii_case("TBD") {
        raw.to_string()
    } else {
        format!("{raw} EST")
    }
}

/// Results (`W 27-24`, `L`, `T`) rather than kickoff times. `TBD` is upcoming.
pub fn is_completed_marker(time_text: &str) -> bool {
    let upper = time_text.trim().to_uppercase();
    if upper == "TBD" {
        return false;
    }
    upper.starts_with('W') || upper.starts_with('L') || upper.starts_with('T')
}

pub fn scrape_schedule<P: PageSource + ?Sized>(
    source: &P,
    url: &str,
    team_name_long: Option<&str>,
) -> ScrapeResult<Vec<ScheduleEntry>> {
    let team_name = team_display_name(team_name_long, url);
    let html = source.fetch_page(url)?;
    let games = extract_schedule(&html, &team_name)?;
    info!(url, count = games.len(), "extracted upcoming games");
    Ok(games)
}

pub fn extract_schedule(html: &str, team_name: &str) -> ScrapeResult<Vec<ScheduleEntry>> {
    let document = Html::parse_document(html);
    let (table, header_row) = locate_schedule_table(&document)?;

    let headers: Vec<String> = header_row
        .select(&HEADER_CELL_SELECTOR)
        .map(cell_text)
        .collect();
    let columns = ColumnMap::from_headers(&headers);
    let (Some(time_idx), Some(max_idx)) = (columns.time, columns.max_index()) else {
        return Ok(Vec::new());
    };

    let mut games = Vec::new();
    for row in table.select(&ROW_SELECTOR) {
        if row.id() == header_row.id() {
            continue;
        }
        let cells: Vec<ElementRef> = row.select(&DATA_CELL_SELECTOR).collect();
        if cells.len() <= max_idx {
            continue;
        }

        if let Some(idx) = columns.week {
            let week = cell_text(cells[idx]).to_uppercase();
            if week == "WK" || week == "WEEK" {
                continue;
            }
        }

        let time_cell = cells[time_idx];
        let time_text = cell_text(time_cell);
        if is_completed_marker(&time_text) {
            debug!(time = %time_text, "skipping completed game");
            continue;
        }

        let entry = entry_from_row(&cells, &columns, time_cell, team_name);
        if !entry.is_empty() {
            games.push(entry);
        }
    }

    Ok(games)
}

/// First table, in document order, with an upcoming-games header row.
pub fn locate_schedule_table(document: &Html) -> ScrapeResult<(ElementRef<'_>, ElementRef<'_>)> {
    for table in document.select(&TABLE_SELECTOR) {
        for row in table.select(&ROW_SELECTOR) {
            let texts: Vec<String> = row
                .select(&HEADER_CELL_SELECTOR)
                .map(|cell| cell_text(cell).to_uppercase())
                .collect();
            if is_upcoming_header(&texts) {
                return Ok((table, row));
            }
        }
    }
    Err(ScrapeError::StructureNotFound(NO_SCHEDULE_TABLE.to_string()))
}

fn entry_from_row(
    cells: &[ElementRef],
    columns: &ColumnMap,
    time_cell: ElementRef,
    team_name: &str,
) -> ScheduleEntry {
    let text_at = |idx: Option<usize>| idx.map(|i| cell_text(cells[i]));

    let time = time_cell
        .select(&SPAN_SELECTOR)
        .next()
        .map(cell_text)
        .unwrap_or_else(|| cell_text(time_cell));

    ScheduleEntry {
        week: text_at(columns.week),
        date: text_at(columns.date),
        match_up: text_at(columns.opponent).map(|opp| format_match_up(team_name, &opp)),
        time: Some(format_time(&time)),
        game_id: game_id_in(time_cell),
        tv: text_at(columns.tv),
    }
}

fn game_id_in(cell: ElementRef) -> Option<String> {
    cell.select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| {
            GAME_ID_RE
                .captures(href)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Text nodes trimmed individually and concatenated, dropping empties.
fn cell_text(el: ElementRef) -> String {
    el.text().map(str::trim).filter(|s| !s.is_empty()).collect()
}
