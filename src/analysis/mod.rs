pub mod pipeline;

pub use pipeline::{ImpactAnalyzer, ReleaseAnalysis, MIN_RELEASES_FOR_OVERALL};
