// Domain layer: catalog models, raw export records and ports (interfaces).

pub mod model;
pub mod ports;
pub mod raw;
