pub mod trade_executor;
pub mod validation;

pub use trade_executor::{ExecutorConfig, TradeError, TradeExecutor};
pub use validation::{AccountSnapshot, TradeLimits};
