pub mod detector;
pub mod types;

pub use detector::ArbitrageDetector;
pub use types::{ArbitrageCycle, DetectorConfig};
