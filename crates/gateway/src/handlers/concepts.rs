//! Concept lookup handlers

use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fingraph_common::{
    errors::{AppError, Result},
    knowledge::Concept,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ConceptFilter {
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct ConceptSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct ConceptListResponse {
    pub concepts: Vec<ConceptSummary>,
    pub total: usize,
}

/// `GET /v1/concepts/{id}`
pub async fn get_concept(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Concept>> {
    let store = state.pipeline.graph().store();
    let id = id.trim();
    store
        .get(id)
        .or_else(|| store.get(&id.to_lowercase()))
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::ConceptNotFound { id: id.to_string() })
}

/// `GET /v1/concepts?category=`
pub async fn list_concepts(
    State(state): State<AppState>,
    Query(filter): Query<ConceptFilter>,
) -> Json<ConceptListResponse> {
    let store = state.pipeline.graph().store();
    let selected: Vec<&Concept> = match filter.category.as_deref() {
        Some(category) => store.by_category(category),
        None => store.all().iter().collect(),
    };

    let concepts: Vec<ConceptSummary> = selected
        .into_iter()
        .map(|c| ConceptSummary {
            id: c.id.clone(),
            name: c.name().to_string(),
            category: c.category().map(str::to_string),
        })
        .collect();

    Json(ConceptListResponse {
        total: concepts.len(),
        concepts,
    })
}
