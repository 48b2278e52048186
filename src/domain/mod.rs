pub mod batch;
pub mod context;
pub mod ports;
