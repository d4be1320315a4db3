//! Request/response boundary shared by the serverless entry point, the
//! development server and the tests.
//!
//! Every outcome, including scrape failures and panics inside extraction,
//! leaves here as a [`LambdaResponse`] with a JSON body.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{ScrapeError, ScrapeResult};
use crate::http_client::PageSource;
use crate::params::{ApiRequest, BodyField, Params, extract_params, param};
use crate::schedule::{self, DEFAULT_TEAM_NAME_LONG, DEFAULT_TEAM_SLUG, ScheduleEntry};
use crate::scores::{self, ScoreOutcome};

const SCORE_BODY_FIELDS: &[BodyField] = &[
    BodyField::new("sport", "sport"),
    BodyField::new("gameId", "gameid"),
    BodyField::new("game_id", "game_id"),
];

const SCHEDULE_BODY_FIELDS: &[BodyField] = &[
    BodyField::new("team_slug", "team_slug"),
    BodyField::new("teamSlug", "team_slug"),
    BodyField::new("team_name_long", "team_name_long"),
    BodyField::new("teamNameLong", "team_name_long"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl LambdaResponse {
    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        let (status_code, body) = match serde_json::to_string(payload) {
            Ok(body) => (status_code, body),
            Err(err) => {
                error!(error = %err, "failed to serialize response payload");
                (500, r#"{"message":"Internal server error"}"#.to_string())
            }
        };
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body,
        }
    }

    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Scores,
    Schedule,
}

impl Endpoint {
    pub fn handle<P: PageSource + ?Sized>(self, request: &ApiRequest, source: &P) -> LambdaResponse {
        match self {
            Endpoint::Scores => handle_scores(request, source),
            Endpoint::Schedule => handle_schedule(request, source),
        }
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scores" | "score" => Ok(Endpoint::Scores),
            "schedule" => Ok(Endpoint::Schedule),
            other => Err(format!("unknown endpoint: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreQuery {
    pub sport: String,
    pub game_id: String,
}

impl ScoreQuery {
    pub fn from_params(params: &Params) -> ScrapeResult<Self> {
        let sport = param(params, &["sport"]);
        let game_id = param(params, &["gameid", "game_id"]);
        match (sport, game_id) {
            (Some(sport), Some(game_id)) => Ok(Self {
                sport: sport.to_string(),
                game_id: game_id.to_string(),
            }),
            (sport, game_id) => {
                let mut missing = Vec::new();
                if sport.is_none() {
                    missing.push("sport");
                }
                if game_id.is_none() {
                    missing.push("gameId");
                }
                Err(ScrapeError::Validation { missing })
            }
        }
    }

    pub fn url(&self) -> String {
        scores::game_url(&self.sport, &self.game_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleQuery {
    pub team_slug: String,
    pub team_name_long: String,
}

impl ScheduleQuery {
    pub fn from_params(params: &Params) -> Self {
        Self {
            team_slug: param(params, &["team_slug"])
                .unwrap_or(DEFAULT_TEAM_SLUG)
                .to_string(),
            team_name_long: param(params, &["team_name_long"])
                .unwrap_or(DEFAULT_TEAM_NAME_LONG)
                .to_string(),
        }
    }

    pub fn url(&self) -> String {
        schedule::schedule_url(&self.team_slug, &self.team_name_long)
    }
}

#[derive(Debug, Serialize)]
struct ScoreSuccess<'a> {
    sport: &'a str,
    #[serde(rename = "gameId")]
    game_id: &'a str,
    #[serde(rename = "sourceUrl")]
    source_url: &'a str,
    data: &'a ScoreOutcome,
}

#[derive(Debug, Serialize)]
struct MissingParams {
    message: &'static str,
    required: RequiredParams,
}

#[derive(Debug, Serialize)]
struct RequiredParams {
    sport: &'static str,
    #[serde(rename = "gameId")]
    game_id: &'static str,
}

#[derive(Debug, Serialize)]
struct ScheduleSuccess<'a> {
    team_slug: &'a str,
    team_name_long: &'a str,
    #[serde(rename = "sourceUrl")]
    source_url: &'a str,
    games: &'a [ScheduleEntry],
    count: usize,
}

#[derive(Debug, Serialize)]
struct ScrapeFailure<'a> {
    message: &'static str,
    detail: String,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_slug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_name_long: Option<&'a str>,
}

pub fn handle_scores<P: PageSource + ?Sized>(request: &ApiRequest, source: &P) -> LambdaResponse {
    debug!(?request, "received scores event");
    let params = extract_params(request, SCORE_BODY_FIELDS);

    let query = match ScoreQuery::from_params(&params) {
        Ok(query) => query,
        Err(err) => {
            info!(error = %err, "rejecting scores request");
            return LambdaResponse::json(
                err.status_code(),
                &MissingParams {
                    message: "Missing required parameters.",
                    required: RequiredParams {
                        sport: "e.g. nfl",
                        game_id: "e.g. 401772834",
                    },
                },
            );
        }
    };

    let url = query.url();
    match guarded(|| scores::scrape_game_scores(source, &url)) {
        Ok(data) => LambdaResponse::json(
            200,
            &ScoreSuccess {
                sport: &query.sport,
                game_id: &query.game_id,
                source_url: &url,
                data: &data,
            },
        ),
        Err(detail) => {
            error!(url = %url, detail = %detail, "failed to scrape scores");
            LambdaResponse::json(
                502,
                &ScrapeFailure {
                    message: "Unable to retrieve game data from ESPN.",
                    detail,
                    url: &url,
                    team_slug: None,
                    team_name_long: None,
                },
            )
        }
    }
}

pub fn handle_schedule<P: PageSource + ?Sized>(
    request: &ApiRequest,
    source: &P,
) -> LambdaResponse {
    debug!(?request, "received schedule event");
    let params = extract_params(request, SCHEDULE_BODY_FIELDS);
    let query = ScheduleQuery::from_params(&params);
    let url = query.url();

    match guarded(|| schedule::scrape_schedule(source, &url, Some(&query.team_name_long))) {
        Ok(games) => LambdaResponse::json(
            200,
            &ScheduleSuccess {
                team_slug: &query.team_slug,
                team_name_long: &query.team_name_long,
                source_url: &url,
                games: &games,
                count: games.len(),
            },
        ),
        Err(detail) => {
            error!(url = %url, detail = %detail, "failed to scrape schedule");
            LambdaResponse::json(
                502,
                &ScrapeFailure {
                    message: "Unable to retrieve schedule data from ESPN.",
                    detail,
                    url: &url,
                    team_slug: Some(&query.team_slug),
                    team_name_long: Some(&query.team_name_long),
                },
            )
        }
    }
}

/// Runs a scrape, turning both errors and panics into a detail string.
fn guarded<T, F>(scrape: F) -> Result<T, String>
where
    F: FnOnce() -> ScrapeResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(scrape)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("internal error: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("internal error: {s}")
    } else {
        "internal error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_query_reports_every_missing_param() {
        let err = ScoreQuery::from_params(&Params::new()).expect_err("nothing supplied");
        match err {
            ScrapeError::Validation { missing } => assert_eq!(missing, ["sport", "gameId"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn score_query_accepts_snake_case_game_id() {
        let mut params = Params::new();
        params.insert("sport".into(), "nba".into());
        params.insert("game_id".into(), "401".into());
        let query = ScoreQuery::from_params(&params).expect("complete");
        assert_eq!(query.url(), "https://www.espn.com/nba/game/_/gameId/401/");
    }

    #[test]
    fn schedule_query_defaults() {
        let query = ScheduleQuery::from_params(&Params::new());
        assert_eq!(query.team_slug, "min");
        assert_eq!(query.team_name_long, "minnesota-vikings");
        assert_eq!(
            query.url(),
            "https://www.espn.com/nfl/team/schedule/_/name/min/minnesota-vikings"
        );
    }

    #[test]
    fn panics_become_details() {
        let result: Result<(), String> = guarded(|| panic!("boom"));
        assert_eq!(result, Err("internal error: boom".to_string()));
    }

    #[test]
    fn endpoints_parse_from_names() {
        assert_eq!("Scores".parse::<Endpoint>(), Ok(Endpoint::Scores));
        assert_eq!("schedule".parse::<Endpoint>(), Ok(Endpoint::Schedule));
        assert!("standings".parse::<Endpoint>().is_err());
    }
}
