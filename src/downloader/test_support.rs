// In-process HTTP server honouring Range requests, for tests

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// 206 for satisfiable ranges, 416 past the end
    Standard,
    /// 206 with an empty body past the end
    EmptyPastEnd,
    /// Always 200 with the full body
    IgnoreRange,
    /// 500 for the first n requests to each path, then `Standard`
    FailFirst(usize),
    /// 200 with the full body sent in `pieces` parts, `gap_ms` apart
    Trickle { pieces: usize, gap_ms: u64 },
}

struct ServerState {
    resources: HashMap<String, Vec<u8>>,
    mode: ServerMode,
    requests: Mutex<Vec<(String, String)>>,
}

pub struct RangeServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl RangeServer {
    pub async fn start(resources: Vec<(&str, Vec<u8>)>) -> Self {
        Self::start_with_mode(resources, ServerMode::Standard).await
    }

    pub async fn start_with_mode(resources: Vec<(&str, Vec<u8>)>, mode: ServerMode) -> Self {
        let state = Arc::new(ServerState {
            resources: resources
                .into_iter()
                .map(|(path, body)| (path.to_string(), body))
                .collect(),
            mode,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(serve).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Range headers received for `path`, in order ("" when absent)
    pub fn ranges(&self, path: &str) -> Vec<String> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, range)| range.clone())
            .collect()
    }
}

async fn serve(State(state): State<Arc<ServerState>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let previous = {
        let mut requests = state.requests.lock().unwrap();
        let previous = requests.iter().filter(|(p, _)| *p == path).count();
        requests.push((path.clone(), range.clone()));
        previous
    };

    let Some(body) = state.resources.get(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if let ServerMode::FailFirst(n) = state.mode {
        if previous < n {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let ServerMode::Trickle { pieces, gap_ms } = state.mode {
        return (StatusCode::OK, trickle(body.clone(), pieces, gap_ms)).into_response();
    }

    let parsed = parse_range(&range);
    let (start, end) = match (state.mode, parsed) {
        (ServerMode::IgnoreRange, _) | (_, None) => {
            return (StatusCode::OK, body.clone()).into_response();
        }
        (_, Some(bounds)) => bounds,
    };

    let len = body.len();
    if start >= len {
        return match state.mode {
            ServerMode::EmptyPastEnd => (StatusCode::PARTIAL_CONTENT, Vec::<u8>::new()).into_response(),
            _ => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{}", len))],
            )
                .into_response(),
        };
    }

    let end = end.min(len - 1);
    (
        StatusCode::PARTIAL_CONTENT,
        [(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, len),
        )],
        body[start..=end].to_vec(),
    )
        .into_response()
}

fn trickle(body: Vec<u8>, pieces: usize, gap_ms: u64) -> Body {
    let size = body.len().div_ceil(pieces.max(1)).max(1);
    let parts: Vec<Vec<u8>> = body.chunks(size).map(<[u8]>::to_vec).collect();

    let stream = futures::stream::unfold((parts.into_iter(), true), move |(mut parts, first)| async move {
        let part = parts.next()?;
        if !first {
            tokio::time::sleep(Duration::from_millis(gap_ms)).await;
        }
        Some((Ok::<_, Infallible>(part), (parts, false)))
    });
    Body::from_stream(stream)
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    let bounds = value.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Deterministic payload that makes duplicated or dropped chunks visible
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
