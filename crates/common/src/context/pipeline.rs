//! Response Pipeline - query → graph → context → live data → language model
//!
//! Stages run strictly in order for one request. Graph stages never fail;
//! market lookups degrade to "unavailable" lines; a language model failure
//! becomes an apology reply rather than an error.

use super::assembler::{ContextAssembler, ContextAssemblerConfig, GroundingContext, Source};
use super::synthesizer::{ChatMessage, LanguageModel};
use crate::errors::{AppError, Result};
use crate::knowledge::{ConceptStore, GraphQueryEngine, GraphRetrieval};
use crate::market::{MarketData, MarketDataService, MarketKind};
use crate::metrics;
use futures::future::join_all;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Most live quotes fetched for one query
pub const MAX_LIVE_SYMBOLS: usize = 3;

pub const APOLOGY: &str = "I apologize, but I'm having trouble generating a response right now. \
    Please try again in a moment.";

const SYSTEM_PROMPT: &str = "You are FinGraph, a knowledgeable financial assistant. \
Answer questions about finance, investing, markets and cryptocurrencies accurately and concisely. \
When numbered facts are provided below, ground your answer in them and cite them as [1], [2]. \
If they do not cover the question, say so before answering from general knowledge. \
Do not give personalised investment advice.";

/// Reply to one chat query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<Source>,
    /// Grounding facts from the knowledge graph were supplied to the model
    pub used_kg: bool,
}

/// Finds symbols a query wants live prices for
struct LiveDataDetector {
    ticker: Regex,
    price_words: Regex,
}

impl LiveDataDetector {
    fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| AppError::Internal {
                message: format!("invalid pattern {}: {}", pattern, e),
            })
        };

        Ok(Self {
            ticker: compile(r"\$([A-Za-z^][A-Za-z0-9.\-]{0,11})")?,
            price_words: compile(r"(?i)\b(price|prices|trading|worth|quote|quotes|cost|value)\b")?,
        })
    }

    /// `$TICKER` mentions, then entities with a `symbol` attribute when the
    /// query asks about price; deduplicated and capped
    fn detect(&self, text: &str, store: &ConceptStore, retrieval: &GraphRetrieval) -> Vec<(MarketKind, String)> {
        let mut found: Vec<(MarketKind, String)> = Vec::new();
        let mut push = |kind: MarketKind, symbol: String| {
            if !found.iter().any(|(k, s)| *k == kind && *s == symbol) {
                found.push((kind, symbol));
            }
        };

        for caps in self.ticker.captures_iter(text) {
            let symbol = caps[1].trim_end_matches(['.', '-']).to_uppercase();
            let kind = store
                .all()
                .iter()
                .find(|c| c.attribute_str("symbol").is_some_and(|s| s.eq_ignore_ascii_case(&symbol)))
                .and_then(|c| c.attribute_str("market"))
                .and_then(|m| m.parse().ok())
                .unwrap_or(MarketKind::Stock);
            push(kind, symbol);
        }

        if self.price_words.is_match(text) {
            for entity in &retrieval.entities {
                let Some(concept) = store.get(&entity.concept_id) else {
                    continue;
                };
                if let Some(symbol) = concept.attribute_str("symbol") {
                    let kind = concept
                        .attribute_str("market")
                        .and_then(|m| m.parse().ok())
                        .unwrap_or(MarketKind::Stock);
                    push(kind, symbol.to_uppercase());
                }
            }
        }

        found.truncate(MAX_LIVE_SYMBOLS);
        found
    }
}

pub struct ResponsePipeline {
    graph: Arc<GraphQueryEngine>,
    assembler: ContextAssembler,
    market: Option<Arc<MarketDataService>>,
    model: Arc<dyn LanguageModel>,
    detector: LiveDataDetector,
}

impl ResponsePipeline {
    pub fn new(
        graph: Arc<GraphQueryEngine>,
        assembler_config: ContextAssemblerConfig,
        market: Option<Arc<MarketDataService>>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        Ok(Self {
            graph,
            assembler: ContextAssembler::new(assembler_config),
            market,
            model,
            detector: LiveDataDetector::new()?,
        })
    }

    pub fn graph(&self) -> &GraphQueryEngine {
        &self.graph
    }

    /// Answer `text` given prior turns
    #[instrument(skip_all, fields(query_len = text.len(), history = history.len()))]
    pub async fn handle_query(&self, text: &str, history: &[ChatMessage]) -> Result<ChatReply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation {
                message: "message must not be empty".to_string(),
                field: Some("message".to_string()),
            });
        }

        let started = Instant::now();

        let retrieval = self.graph.retrieve(text);
        let context = self.assembler.assemble(self.graph.store(), &retrieval);
        debug!(
            entities = retrieval.entities.len(),
            facts = context.facts.len(),
            dropped = context.dropped,
            budget_exceeded = retrieval.inference.budget_exceeded,
            "Grounding context assembled"
        );

        let live = self.live_data(text, &retrieval).await;
        let system_context = build_system_context(&context, &live);

        let response = match self.model.complete(&system_context, history, text).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, model = self.model.model_name(), "Language model failed, replying with apology");
                APOLOGY.to_string()
            }
        };

        let used_kg = !context.is_empty();
        metrics::record_query(started.elapsed(), retrieval.entities.len(), used_kg);
        info!(
            used_kg,
            sources = context.sources.len(),
            live_quotes = live.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query answered"
        );

        Ok(ChatReply {
            response,
            sources: context.sources,
            used_kg,
        })
    }

    async fn live_data(&self, text: &str, retrieval: &GraphRetrieval) -> Vec<LiveQuote> {
        let Some(market) = &self.market else {
            return Vec::new();
        };

        let symbols = self.detector.detect(text, self.graph.store(), retrieval);
        if symbols.is_empty() {
            return Vec::new();
        }

        let fetches = symbols.into_iter().map(|(kind, symbol)| async move {
            let result = market.get_market_data(kind, &symbol, None).await;
            LiveQuote { kind, symbol, result }
        });
        join_all(fetches).await
    }
}

struct LiveQuote {
    kind: MarketKind,
    symbol: String,
    result: Result<MarketData>,
}

fn build_system_context(context: &GroundingContext, live: &[LiveQuote]) -> String {
    let mut out = String::from(SYSTEM_PROMPT);

    if !context.is_empty() {
        out.push_str("\n\n");
        out.push_str(&context.render());
    }

    if !live.is_empty() {
        out.push_str("\n\n## Live Market Data\n");
        for quote in live {
            let _ = match &quote.result {
                Ok(data) => {
                    let mut line = format!("- {} ({}): {:.2} USD", quote.symbol, quote.kind, data.quote.price);
                    if let Some(change) = data.quote.change_percent {
                        let _ = write!(line, ", {:+.2}% change", change);
                    }
                    let _ = write!(line, " [{} at {}]", data.quote.provider, data.fetched_at.format("%Y-%m-%d %H:%M UTC"));
                    if data.stale {
                        line.push_str(" (stale: latest refresh failed)");
                    }
                    writeln!(out, "{}", line)
                }
                Err(e) => writeln!(out, "- {} ({}): unavailable ({})", quote.symbol, quote.kind, e),
            };
        }
    }

    out
}
