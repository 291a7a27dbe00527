//! Context and response layer
//!
//! Turns graph retrievals into bounded grounding context and runs the
//! request pipeline:
//! - Context assembly (ranking, truncation, sources)
//! - Language model clients
//! - Response pipeline with live market data

mod assembler;
mod pipeline;
mod synthesizer;

pub use assembler::{ContextAssembler, ContextAssemblerConfig, ContextFact, FactOrigin, GroundingContext, Source};
pub use pipeline::{ChatReply, ResponsePipeline, APOLOGY, MAX_LIVE_SYMBOLS};
pub use synthesizer::{create_language_model, ChatMessage, ChatRole, LanguageModel, OfflineModel, OpenAiChatModel};
