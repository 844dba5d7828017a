// Pipeline ingestion: reading facility tables from disk

pub mod csv_source;
