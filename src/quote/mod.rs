pub mod engine;
pub mod fallback;

pub use engine::{QuoteEngine, QuoteError, QuotePolicy};
pub use fallback::FallbackPolicy;
