pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::ExamStore;
use crate::services::{
    exam_service::ExamService, health_service::HealthService, inference_service::TextGenerator,
};

#[derive(Clone)]
pub struct AppState {
    pub exam_service: ExamService,
    pub health_service: HealthService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn ExamStore>, generator: Arc<dyn TextGenerator>, config: Config) -> Self {
        let exam_service = ExamService::new(store.clone(), generator.clone(), &config);
        let health_service = HealthService::new(store, generator);

        Self {
            exam_service,
            health_service,
            config: Arc::new(config),
        }
    }
}
