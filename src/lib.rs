pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod metrics;
pub mod metrics_push;
pub mod normalize;
pub mod parquet_out;
pub mod pipeline;
pub mod storage;
pub mod types;

// Clients for external stores (object storage, Supabase metadata)
pub mod gateway;
