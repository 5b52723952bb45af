#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const FAILING_DEVICE: u32 = 500;
pub const MALFORMED_DEVICE: u32 = 498;
pub const SLOW_DEVICE: u32 = 777;

/// In-process stand-in for the consumption API.
pub struct Upstream {
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Runs on its own thread and runtime so it outlives any single test.
pub fn spawn_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream");
    listener.set_nonblocking(true).expect("nonblocking upstream");
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("upstream runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("upstream listener");
            let app = Router::new().route("/dados", get(dados)).with_state(counter);
            axum::serve(listener, app).await.expect("upstream server");
        });
    });

    Upstream {
        url: format!("http://{addr}/dados"),
        hits,
    }
}

async fn dados(
    State(hits): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let device = params
        .get("device_id")
        .and_then(|id| id.parse::<u32>().ok())
        .unwrap_or_default();

    match device {
        FAILING_DEVICE => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        MALFORMED_DEVICE => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        SLOW_DEVICE => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Json(json!({ "consumo_mensal": [1, 1, 1] })).into_response()
        }
        33 => Json(json!({
            "consumo_mensal": [100, 200, 0, 150],
            "consumo_diario_mes_corrente": [10, 20],
            "minutos_desligado_mensal": [600, 0, 0, 0],
            "minutos_desligado_diario": [30, 0],
            "potencias": [[3000, 1700000000], [1000, 1700000030]]
        }))
        .into_response(),
        36 => Json(json!({
            "consumo_mensal": [10, 20],
            "consumo_sem_sistema_mensal": [40, 0],
            "consumo_diario_mes_corrente": [1, null]
        }))
        .into_response(),
        _ => Json(json!({})).into_response(),
    }
}
