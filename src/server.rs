//! Local development server wrapping the handlers.
//!
//! Plain HTTP/1.1 over a blocking `TcpListener`, one connection at a time,
//! `Connection: close` on every response. Each request is turned into the
//! same event shape a serverless gateway would deliver.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::Lazy;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use crate::handler::{Endpoint, LambdaResponse};
use crate::http_client::{HttpSource, PageSource};
use crate::params::ApiRequest;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

const IO_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_BODY_BYTES: usize = 1 << 20;

static BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost/").expect("static base url"));

/// The parts of an incoming request the router looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    fn json(status: u16, payload: &Value) -> Self {
        Self {
            status,
            body: payload.to_string(),
        }
    }
}

pub fn serve(host: &str, port: u16) -> Result<()> {
    serve_with(host, port, &HttpSource)
}

pub fn serve_with<P: PageSource + ?Sized>(host: &str, port: u16, source: &P) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!(host, port, "development server listening");
    eprintln!("{}", banner(host, port));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = handle_connection(stream, source) {
                    warn!(error = %err, "connection failed");
                }
            }
            Err(err) => warn!(error = %err, "accept failed"),
        }
    }
    Ok(())
}

fn banner(host: &str, port: u16) -> String {
    let rule = "=".repeat(80);
    let base = format!("http://{host}:{port}");
    format!(
        "\n{rule}\nLocal ESPN Scraper Server\n{rule}\nServer running at: {base}\n\nEndpoints:\n  \
         GET/POST {base}/schedule?team_slug=min&team_name_long=minnesota-vikings\n  \
         GET/POST {base}/schedule/<team_slug>/<team_name_long>\n  \
         GET/POST {base}/scores?sport=nfl&gameId=401772834\n  \
         GET/POST {base}/scores/<sport>/<gameId>\n  \
         GET      {base}/health\n{rule}\n"
    )
}

fn handle_connection<P: PageSource + ?Sized>(stream: TcpStream, source: &P) -> Result<()> {
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut reader = BufReader::new(&stream);
    let reply = match read_request(&mut reader) {
        Ok(request) => {
            let reply = route(&request, source);
            info!(method = %request.method, target = %request.target, status = reply.status, "request served");
            reply
        }
        Err(err) => {
            debug!(error = %err, "malformed request");
            HttpReply::json(400, &json!({"message": "Bad request", "detail": err.to_string()}))
        }
    };

    let mut stream = &stream;
    write_reply(&mut stream, &reply)
}

pub fn read_request<R: BufRead>(reader: &mut R) -> Result<HttpRequest> {
    let mut line = String::new();
    reader.read_line(&mut line).context("reading request line")?;
    let mut parts = line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        bail!("malformed request line: {:?}", line.trim_end());
    };
    let method = method.to_ascii_uppercase();
    let target = target.to_string();

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).context("reading headers")? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid content-length: {}", value.trim()))?;
        }
    }
    if content_length > MAX_BODY_BYTES {
        bail!("request body too large: {content_length} bytes");
    }

    let body = if content_length == 0 {
        None
    } else {
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).context("reading body")?;
        String::from_utf8(buf).ok()
    };

    Ok(HttpRequest {
        method,
        target,
        body,
    })
}

pub fn route<P: PageSource + ?Sized>(request: &HttpRequest, source: &P) -> HttpReply {
    let url = match BASE_URL.join(&request.target) {
        Ok(url) => url,
        Err(err) => {
            return HttpReply::json(400, &json!({"message": "Bad request", "detail": err.to_string()}));
        }
    };
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let is_get = request.method == "GET";
    if !is_get && request.method != "POST" {
        return HttpReply::json(405, &json!({"message": "Method not allowed"}));
    }

    let (endpoint, path_params) = match segments.as_slice() {
        ["health"] if is_get => return HttpReply::json(200, &json!({"status": "healthy"})),
        ["health"] => return HttpReply::json(405, &json!({"message": "Method not allowed"})),
        [] | ["schedule"] => (Endpoint::Schedule, None),
        ["schedule", team_slug, team_name_long] => (
            Endpoint::Schedule,
            Some(path_map(&[("team_slug", team_slug), ("team_name_long", team_name_long)])),
        ),
        ["scores"] => (Endpoint::Scores, None),
        ["scores", sport, game_id] => (
            Endpoint::Scores,
            Some(path_map(&[("sport", sport), ("gameId", game_id)])),
        ),
        _ => return HttpReply::json(404, &json!({"message": "Not found"})),
    };

    let event = event_from(request, &url, path_params);
    relay(endpoint.handle(&event, source))
}

fn path_map(pairs: &[(&str, &&str)]) -> HashMap<String, Option<String>> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

fn event_from(
    request: &HttpRequest,
    url: &Url,
    path_parameters: Option<HashMap<String, Option<String>>>,
) -> ApiRequest {
    let mut single: HashMap<String, Option<String>> = HashMap::new();
    let mut multi: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url.query_pairs() {
        single
            .entry(key.to_string())
            .or_insert_with(|| Some(value.to_string()));
        multi.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    let has_query = !single.is_empty();

    ApiRequest {
        http_method: Some(request.method.clone()),
        path: Some(url.path().to_string()),
        query_string_parameters: has_query.then_some(single),
        multi_value_query_string_parameters: has_query.then_some(multi),
        path_parameters,
        body: request.body.clone().map(Value::String),
        is_base64_encoded: Some(false),
    }
}

fn relay(response: LambdaResponse) -> HttpReply {
    match response.body_json() {
        Ok(_) => HttpReply {
            status: response.status_code,
            body: response.body,
        },
        Err(err) => {
            warn!(error = %err, "handler returned a non-JSON body");
            HttpReply::json(
                500,
                &json!({"message": "Internal server error", "detail": err.to_string()}),
            )
        }
    }
}

fn write_reply<W: Write>(out: &mut W, reply: &HttpReply) -> Result<()> {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason_phrase(reply.status),
        reply.body.len()
    );
    out.write_all(head.as_bytes())?;
    out.write_all(reply.body.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;

    use super::*;
    use crate::error::{ScrapeError, ScrapeResult};

    fn get(target: &str) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            target: target.to_string(),
            body: None,
        }
    }

    fn unreachable_source(url: &str) -> ScrapeResult<String> {
        Err(ScrapeError::fetch(url, "offline"))
    }

    #[test]
    fn reads_request_line_headers_and_body() {
        let raw = "POST /scores HTTP/1.1\r\nHost: x\r\nContent-Length: 16\r\n\r\n{\"sport\":\"nfl\"}\n";
        let request = read_request(&mut Cursor::new(raw)).expect("request");
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/scores");
        assert_eq!(request.body.as_deref(), Some("{\"sport\":\"nfl\"}\n"));
    }

    #[test]
    fn rejects_garbage_request_line() {
        assert!(read_request(&mut Cursor::new("\r\n")).is_err());
    }

    #[test]
    fn health_reports_healthy() {
        let reply = route(&get("/health"), &unreachable_source);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, r#"{"status":"healthy"}"#);
    }

    #[test]
    fn health_only_answers_get() {
        let request = HttpRequest {
            method: "POST".to_string(),
            target: "/health".to_string(),
            body: None,
        };
        let reply = route(&request, &unreachable_source);
        assert_eq!(reply.status, 405);
        assert_eq!(reply.body, r#"{"message":"Method not allowed"}"#);
    }

    #[test]
    fn unknown_routes_are_not_found() {
        assert_eq!(route(&get("/standings"), &unreachable_source).status, 404);
        assert_eq!(route(&get("/schedule/min"), &unreachable_source).status, 404);
    }

    #[test]
    fn path_segments_become_path_parameters() {
        let seen = Mutex::new(Vec::new());
        let source = |url: &str| -> ScrapeResult<String> {
            seen.lock().expect("lock").push(url.to_string());
            Err(ScrapeError::fetch(url, "offline"))
        };
        let reply = route(&get("/schedule/dal/dallas-cowboys"), &source);
        assert_eq!(reply.status, 502);
        assert_eq!(
            seen.lock().expect("lock").as_slice(),
            ["https://www.espn.com/nfl/team/schedule/_/name/dal/dallas-cowboys"]
        );
    }

    #[test]
    fn scores_query_without_game_id_is_bad_request() {
        let reply = route(&get("/scores?sport=nfl"), &unreachable_source);
        assert_eq!(reply.status, 400);
        let body: Value = serde_json::from_str(&reply.body).expect("json");
        assert!(body.get("required").is_some());
    }

    #[test]
    fn query_string_reaches_the_scores_handler() {
        let seen = Mutex::new(String::new());
        let source = |url: &str| -> ScrapeResult<String> {
            *seen.lock().expect("lock") = url.to_string();
            Ok("<html></html>".to_string())
        };
        let reply = route(&get("/scores?sport=nba&gameId=42&gameId=43"), &source);
        assert_eq!(reply.status, 200);
        assert_eq!(
            seen.lock().expect("lock").as_str(),
            "https://www.espn.com/nba/game/_/gameId/42/"
        );
    }

    #[test]
    fn writes_status_line_and_length() {
        let mut out = Vec::new();
        let reply = HttpReply::json(404, &json!({"message": "Not found"}));
        write_reply(&mut out, &reply).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 23\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"message\":\"Not found\"}"));
    }
}
