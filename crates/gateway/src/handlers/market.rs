//! Market data handler

use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fingraph_common::{errors::Result, MarketData, MarketKind};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct MarketQuery {
    /// Provider to try first
    pub provider: Option<String>,
}

/// `GET /v1/market/{kind}/{symbol}`
pub async fn get_market_data(
    State(state): State<AppState>,
    Path((kind, symbol)): Path<(String, String)>,
    Query(query): Query<MarketQuery>,
) -> Result<Json<MarketData>> {
    let kind: MarketKind = kind.parse()?;
    let data = state
        .market
        .get_market_data(kind, &symbol, query.provider.as_deref())
        .await?;
    Ok(Json(data))
}
