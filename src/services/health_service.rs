use std::sync::Arc;

use crate::database::ExamStore;
use crate::dto::catalog_dto::HealthResponse;
use crate::services::inference_service::TextGenerator;

fn status(ok: bool) -> String {
    if ok { "ok" } else { "error" }.to_string()
}

#[derive(Clone)]
pub struct HealthService {
    store: Arc<dyn ExamStore>,
    generator: Arc<dyn TextGenerator>,
}

impl HealthService {
    pub fn new(store: Arc<dyn ExamStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    pub async fn check(&self) -> HealthResponse {
        let (database, ollama) = tokio::join!(self.store.ping(), self.generator.is_healthy());
        HealthResponse {
            backend: status(true),
            database: status(database),
            ollama: status(ollama),
        }
    }
}
