pub mod engine;
pub mod event;

pub use engine::{InsightEngine, run_result_subscriber};
pub use event::{InsightValue, ParseError, RESULT_TOPICS};
