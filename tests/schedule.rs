use std::fs;
use std::path::PathBuf;

use espn_scrape::error::ScrapeError;
use espn_scrape::schedule::{NO_SCHEDULE_TABLE, ScheduleEntry, extract_schedule, scrape_schedule};

const URL: &str = "https://www.espn.com/nfl/team/schedule/_/name/min/minnesota-vikings";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn single_row_table_yields_one_entry() {
    let html = r#"<table>
        <tr><th>WK</th><th>DATE</th><th>OPPONENT</th><th>TIME</th><th>TV</th></tr>
        <tr><td>1</td><td>Sun, Sep 7</td><td>@SEA</td><td><a href="/nfl/game/_/gameId/401772896/">1:00 PM</a></td><td>FOX</td></tr>
    </table>"#;
    let games = extract_schedule(html, "Minnesota").expect("table present");
    assert_eq!(
        games,
        [ScheduleEntry {
            week: Some("1".to_string()),
            date: Some("Sun, Sep 7".to_string()),
            match_up: Some("Minnesota @ SEA".to_string()),
            time: Some("1:00 PM EST".to_string()),
            game_id: Some("401772896".to_string()),
            tv: Some("FOX".to_string()),
        }]
    );
}

#[test]
fn fixture_skips_results_table_and_completed_rows() {
    let games = extract_schedule(&read_fixture("schedule_page.html"), "Minnesota")
        .expect("upcoming table present");
    assert_eq!(games.len(), 2);

    assert_eq!(games[0].week.as_deref(), Some("1"));
    assert_eq!(games[0].time.as_deref(), Some("1:00 PM EST"));
    assert_eq!(games[0].game_id.as_deref(), Some("401772896"));
    assert_eq!(games[0].match_up.as_deref(), Some("Minnesota @ SEA"));

    assert_eq!(games[1].week.as_deref(), Some("3"));
    assert_eq!(games[1].time.as_deref(), Some("TBD"));
    assert_eq!(games[1].match_up.as_deref(), Some("Minnesota VS DAL"));
    assert_eq!(games[1].game_id, None);
}

#[test]
fn entries_serialize_with_upper_case_keys() {
    let games = extract_schedule(&read_fixture("schedule_page.html"), "Minnesota")
        .expect("upcoming table present");
    let value = serde_json::to_value(&games[0]).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({
            "WK": "1",
            "DATE": "Sun, Sep 7",
            "MATCH_UP": "Minnesota @ SEA",
            "TIME": "1:00 PM EST",
            "GAME_ID": "401772896",
            "TV": "FOX"
        })
    );
}

#[test]
fn team_name_comes_from_the_long_name() {
    let page = read_fixture("schedule_page.html");
    let source = |_: &str| -> espn_scrape::ScrapeResult<String> { Ok(page.clone()) };
    let url = "https://www.espn.com/nfl/team/schedule/_/name/dal/dallas-cowboys";

    let games = scrape_schedule(&source, url, Some("dallas-cowboys")).expect("fixture");
    assert_eq!(games[0].match_up.as_deref(), Some("Dallas @ SEA"));

    let games = scrape_schedule(&source, url, None).expect("fixture");
    assert_eq!(games[0].match_up.as_deref(), Some("Dallas @ SEA"));
}

#[test]
fn page_without_time_column_is_structure_not_found() {
    let err = extract_schedule(&read_fixture("empty_page.html"), "Minnesota")
        .expect_err("no schedule table");
    match &err {
        ScrapeError::StructureNotFound(msg) => assert_eq!(msg, NO_SCHEDULE_TABLE),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 502);
}

#[test]
fn fetch_failures_propagate() {
    let source = |url: &str| -> espn_scrape::ScrapeResult<String> {
        Err(ScrapeError::fetch(url, "timed out"))
    };
    let err = scrape_schedule(&source, URL, None).expect_err("offline");
    assert_eq!(err.to_string(), "Failed to fetch the webpage: timed out");
}
