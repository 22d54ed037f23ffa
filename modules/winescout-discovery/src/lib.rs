pub mod breaker;
pub mod budget;
pub mod confidence;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod legacy;
pub mod metrics;
pub mod orchestrator;
pub mod producer;
pub mod scoring;
pub mod search;
pub mod sources;
pub mod spa;
pub mod tokens;

pub use breaker::CircuitBreaker;
pub use budget::Budget;
pub use dedup::Deduplicator;
pub use extract::{CachedExtractor, StructuredExtractor};
pub use fetcher::{FetchOutcome, PageFetcher, PageTransport, ReqwestTransport};
pub use metrics::CoverageMetrics;
pub use orchestrator::{DiscoveryEngine, DiscoveryOutcome};
pub use producer::ProducerSearch;
pub use scoring::Candidate;
pub use search::{BrightDataSerp, SearchClient, SearchOutcome, SerpProvider};
pub use tokens::IdentityTokens;
