//! AI enrichment bridge for Lumis
//!
//! Providers produce unit summaries, embeddings and conflict explanations;
//! the gateway bounds every call with a timeout and an optional token budget
//! and turns failures into "no result".

pub mod bridge;
pub mod budget;
pub mod gateway;
pub mod prompt;
pub mod providers;


pub use bridge::{AIProvider, Enrichment, UnitView};
pub use budget::{BudgetLevel, Charge, TokenBudget};
pub use gateway::EnrichmentGateway;
pub use prompt::FALLBACK_EXPLANATION;
pub use providers::create_provider;
