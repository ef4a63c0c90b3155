//! Target service for exercising bomber end to end.
use axum::{
    debug_handler,
    extract::Path,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use lazy_static::lazy_static;
use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info};

pub const BAR_COUNT: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub id: u64,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarsResponse {
    pub bars: Vec<Bar>,
}

pub fn router() -> Router {
    Router::new()
        .route("/bars", get(bars))
        .route("/bars-static", get(bars_static))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/flaky/:percent", get(flaky))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    serve(listener).await
}

/// Freshly generated and serialized on every request.
#[debug_handler]
pub async fn bars() -> Json<BarsResponse> {
    hit("bars");
    Json(generate_bars(&mut rand::thread_rng()))
}

lazy_static! {
    static ref BARS_STATIC: String = serde_json::to_string(&generate_bars(&mut rand::thread_rng()))
        .unwrap_or_else(|_| String::from("{\"bars\":[]}"));
}

/// Serialized once at first use.
#[debug_handler]
pub async fn bars_static() -> impl IntoResponse {
    hit("bars_static");
    (
        [(header::CONTENT_TYPE, "application/json")],
        BARS_STATIC.as_str(),
    )
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    hit("delay");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

/// Fails roughly `percent` percent of requests.
#[debug_handler]
pub async fn flaky(Path(percent): Path<u8>) -> StatusCode {
    hit("flaky");
    if rand::thread_rng().gen_range(0..100) < percent {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

pub fn generate_bars<R: Rng>(rng: &mut R) -> BarsResponse {
    let bars = (0..BAR_COUNT as u64)
        .map(|id| {
            let open: f64 = rng.gen_range(10.0..500.0);
            let close = open * rng.gen_range(0.95..1.05);
            Bar {
                id,
                symbol: format!("BAR{id:03}"),
                open,
                high: open.max(close) * rng.gen_range(1.0..1.02),
                low: open.min(close) * rng.gen_range(0.98..1.0),
                close,
                volume: rng.gen_range(1_000..1_000_000),
            }
        })
        .collect();
    BarsResponse { bars }
}

static REQUESTS: AtomicU64 = AtomicU64::new(0);

fn hit(route: &'static str) {
    counter!("mock_service_requests", "route" => route).increment(1);
    REQUESTS.fetch_add(1, Ordering::Relaxed);
}

/// Log the request rate once a second.
pub async fn rps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = REQUESTS.swap(0, Ordering::Relaxed);
        if requests > 0 {
            info!("{requests} RPS");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn bars_are_well_formed() {
        let base = spawn().await;
        let res: BarsResponse = reqwest::get(format!("{base}/bars"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(res.bars.len(), BAR_COUNT);
        assert!(res.bars.iter().all(|b| b.low <= b.high));
    }

    #[tokio::test]
    async fn bars_static_is_stable() {
        let base = spawn().await;
        let first = reqwest::get(format!("{base}/bars-static"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let second = reqwest::get(format!("{base}/bars-static"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(first, second);
        let parsed: BarsResponse = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed.bars.len(), BAR_COUNT);
    }

    #[tokio::test]
    async fn flaky_extremes() {
        let base = spawn().await;
        let ok = reqwest::get(format!("{base}/flaky/0")).await.unwrap();
        assert_eq!(ok.status(), reqwest::StatusCode::OK);
        let fail = reqwest::get(format!("{base}/flaky/100")).await.unwrap();
        assert_eq!(fail.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn only_bars_delay_and_flaky_are_routed() {
        let base = spawn().await;
        let res = reqwest::get(format!("{base}/limited/1/name/burst")).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
        let res = reqwest::get(format!("{base}/delay/ms/1")).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
    }
}
