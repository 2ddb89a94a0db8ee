pub mod config;
pub mod engine;
pub mod gateway;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod scheduler;
pub mod wal;
pub mod wire;
