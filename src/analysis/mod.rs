pub mod momentum;
pub mod spread;
pub mod valuation;

pub use momentum::SignalAnalyzer;
pub use spread::SpreadAnalyzer;
pub use valuation::IntrinsicValueCalculator;
