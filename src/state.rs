use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, engine::SessionManager, store::QuizCatalog};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionManager>,
    pub catalog: Arc<dyn QuizCatalog>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<SessionManager> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Arc<dyn QuizCatalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
