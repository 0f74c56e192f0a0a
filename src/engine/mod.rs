//! # Query Engine
//!
//! Turns raw user input into a formatted answer:
//! classify -> resolve (explorer + token registry) -> format.
//!
//! Free text is not answered here; callers route it to a [`SessionManager`].
//! The execute path lives in [`execution`] and is independent of the
//! read-only pipeline.

pub mod aggregator;
pub mod classifier;
pub mod execution;
pub mod formatter;
pub mod registry;
pub mod session;

use std::sync::Arc;

use serde::Serialize;

pub use aggregator::{AddressReport, QueryAggregator, QueryResult};
pub use classifier::{classify, ClassifiedInput};
pub use execution::{
    ExecutionFailure, ExecutionState, ExecutionUpdate, FailureReason, TransactionDescriptor,
    TransactionExecutor,
};
pub use formatter::{format_chz, ResponseFormatter};
pub use registry::{TokenRegistry, TOKEN_REGISTRY};
pub use session::{SessionError, SessionManager, SessionState};

use crate::blockchain::client::ExplorerSource;
use crate::config::Config;

/// One answered query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    /// Classification of the input (`address`, `token`, ...).
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    /// Markdown rendering of `result`.
    pub text: String,
}

#[derive(Clone)]
pub struct QueryEngine {
    registry: &'static TokenRegistry,
    aggregator: QueryAggregator,
    formatter: ResponseFormatter,
}

impl QueryEngine {
    pub fn new(explorer: Arc<dyn ExplorerSource>, config: &Config) -> Self {
        let registry: &'static TokenRegistry = &TOKEN_REGISTRY;
        Self {
            registry,
            aggregator: QueryAggregator::new(explorer, registry, config.lookup_attempts),
            formatter: ResponseFormatter::new(&config.explorer_web_url, registry),
        }
    }

    pub fn classify(&self, input: &str) -> ClassifiedInput {
        classify(input, self.registry)
    }

    pub fn registry(&self) -> &'static TokenRegistry {
        self.registry
    }

    /// Answers `input` without any conversational context. Free text gets
    /// the not-found message.
    pub async fn answer(&self, input: &str) -> QueryAnswer {
        let classified = self.classify(input);
        self.answer_classified(&classified, input).await
    }

    pub async fn answer_classified(&self, classified: &ClassifiedInput, original: &str) -> QueryAnswer {
        let result = self.aggregator.resolve(classified).await;
        let text = self.formatter.format(result.as_ref(), original);
        QueryAnswer {
            kind: classified.kind(),
            result,
            text,
        }
    }
}
