// Pipeline storage: writing artifacts

pub mod csv_sink;
