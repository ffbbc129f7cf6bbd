mod fraud_alert;
mod insight;
mod round;

pub use fraud_alert::FraudAlert;
pub use insight::{Insight, InsightCategory, InsightSeverity};
pub use round::InterviewRound;
