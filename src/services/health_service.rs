use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` while the progress document can still be read back.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let check = state.phases().lock().await.check_store();
    match check {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "progress store health check failed");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::{JsonFileStore, MemoryDocumentStore},
        phase::testing::StubWorldManager,
        state::{AppState, Backends, testing::test_state},
    };

    #[tokio::test]
    async fn healthy_store_reports_ok() {
        let state = test_state();
        assert_eq!(health_status(&state).await.status, "ok");
    }

    #[tokio::test]
    async fn unreadable_store_reports_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_json(r#"{"admin_token": "t"}"#).unwrap();
        let progress = JsonFileStore::new(dir.path().join("progress.json"));
        let state = AppState::bootstrap(
            &config,
            Backends {
                progress: Arc::new(progress),
                locations: Arc::new(MemoryDocumentStore::new()),
                worlds: Arc::new(StubWorldManager::new()),
            },
        )
        .unwrap();
        assert_eq!(health_status(&state).await.status, "ok");

        // A directory in place of the document cannot be read as a file.
        std::fs::create_dir(dir.path().join("progress.json")).unwrap();
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
