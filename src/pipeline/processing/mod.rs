// Pipeline processing: normalization, aggregation, linkage, and enrichment

pub mod aggregate;
pub mod conflation;
pub mod enrich;
pub mod normalize;
