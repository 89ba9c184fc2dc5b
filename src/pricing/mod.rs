pub mod aggregator;
pub mod mint;

pub use aggregator::{PriceAggregator, SourceSnapshot};
pub use mint::MintCalculator;
