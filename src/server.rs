//! HTTP server lifecycle: serve until stopped, then drain the aggregator

use anyhow::Context;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::routes::metrics::Metrics;
use crate::shutdown::Shutdown;
use crate::store::ClickStore;
use crate::tasks::flush;

/// Serve `app` until `shutdown` trips, then run the final flush.
///
/// The flush task listens on its own latch, which is only tripped after the
/// server has finished every in-flight request. A click acknowledged during
/// graceful shutdown is therefore part of the final drain.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    aggregator: Arc<Aggregator>,
    store: Arc<dyn ClickStore>,
    metrics: Arc<Metrics>,
    flush_interval: Duration,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let drain = Shutdown::new();
    let flush_handle = tokio::spawn(flush::flush_task(
        aggregator,
        store,
        metrics,
        flush_interval,
        drain.clone(),
    ));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.wait_owned())
        .await;

    info!("Server stopped, running final flush");
    drain.trigger();
    flush_handle.await.context("Flush task panicked")?;
    served.context("Server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes;
    use crate::state::AppState;
    use crate::store::MemoryStore;
    use axum::{http::StatusCode, routing::get};
    use chrono::Utc;
    use tokio::sync::Notify;

    struct Harness {
        aggregator: Arc<Aggregator>,
        store: Arc<MemoryStore>,
        metrics: Arc<Metrics>,
        shutdown: Shutdown,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                aggregator: Arc::new(Aggregator::new()),
                store: Arc::new(MemoryStore::new()),
                metrics: Arc::new(Metrics::new()),
                shutdown: Shutdown::new(),
            }
        }

        fn state(&self) -> AppState {
            AppState::new(
                self.aggregator.clone(),
                self.store.clone(),
                self.metrics.clone(),
            )
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_click_during_graceful_shutdown_is_flushed() {
        let h = Harness::new();
        let entered = Arc::new(Notify::new());
        let clicked_at = Utc::now();

        // Handler that accepts its click only after shutdown has started
        let slow_click = {
            let entered = entered.clone();
            let shutdown = h.shutdown.clone();
            let aggregator = h.aggregator.clone();
            move || {
                let entered = entered.clone();
                let shutdown = shutdown.clone();
                let aggregator = aggregator.clone();
                async move {
                    entered.notify_one();
                    shutdown.wait().await;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    aggregator.increment(42, clicked_at);
                    StatusCode::NO_CONTENT
                }
            }
        };
        let app = routes::router(h.state()).route("/slow-click", get(slow_click));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(
            listener,
            app,
            h.aggregator.clone(),
            h.store.clone(),
            h.metrics.clone(),
            Duration::from_secs(3600),
            h.shutdown.clone(),
        ));

        let request = tokio::spawn(reqwest::get(format!("http://{}/slow-click", addr)));
        entered.notified().await;
        h.shutdown.trigger();

        let resp = request.await.unwrap().unwrap();
        assert_eq!(resp.status().as_u16(), 204);

        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(h.store.upsert_calls(), 1);
        assert_eq!(h.store.stored(42, clicked_at), 1);
        assert!(h.aggregator.is_empty());
    }

    #[tokio::test]
    async fn test_serve_drains_pending_clicks_on_stop() {
        let h = Harness::new();
        h.aggregator.increment(7, Utc::now());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = tokio::spawn(serve(
            listener,
            routes::router(h.state()),
            h.aggregator.clone(),
            h.store.clone(),
            h.metrics.clone(),
            Duration::from_secs(3600),
            h.shutdown.clone(),
        ));

        h.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(h.store.upsert_calls(), 1);
        assert!(h.aggregator.is_empty());
    }
}
