pub mod scorer;

pub use scorer::ImpactScorer;
