// Domain layer: records, taxonomy, match results and the ports the jobs talk through.

pub mod model;
pub mod ports;
