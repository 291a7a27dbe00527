//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub knowledge: KnowledgeCheck,
    pub market: MarketCheck,
}

#[derive(Serialize)]
pub struct KnowledgeCheck {
    pub concepts: usize,
    pub rules: usize,
}

#[derive(Serialize)]
pub struct MarketCheck {
    pub providers: Vec<String>,
    pub cached_quotes: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: fingraph_common::VERSION.to_string(),
    })
}

/// Readiness probe - ready once a knowledge base is loaded and at least one
/// market data provider is enabled
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let graph = state.pipeline.graph();
    let knowledge = KnowledgeCheck {
        concepts: graph.store().len(),
        rules: graph.rules().len(),
    };
    let market = MarketCheck {
        providers: state
            .market
            .provider_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        cached_quotes: state.market.cache().len(),
    };

    let ready = knowledge.concepts > 0 && !market.providers.is_empty();

    Json(ReadyResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        checks: ReadyChecks { knowledge, market },
    })
}
