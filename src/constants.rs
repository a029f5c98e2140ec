//! Environment variable names, kept in one place so the binary, the flow and
//! the clients agree on them.

// News ingest flow
pub const NEWS_API_URL_ENV: &str = "NEWS_API_URL";
pub const NEWS_API_TIMEOUT_ENV: &str = "NEWS_API_TIMEOUT_SECS";
pub const NEWS_BUCKET_ENV: &str = "TREE_OF_ALPHA_NEWS_BUCKET";
pub const NEWS_PREFIX_ENV: &str = "TREE_OF_ALPHA_NEWS_PREFIX";
pub const NEWS_DB_CONN_ENV: &str = "NEON_CONN";

// Credential prefixes for S3-compatible stores: <PREFIX>_ACCESS_KEY etc.
pub const NEWS_OBJECT_STORE_PREFIX: &str = "R2";
pub const STORAGE_OBJECT_STORE_PREFIX: &str = "AWS";

// Metadata store (Supabase / PostgREST)
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_KEY";

pub const STORAGE_CONFIG_ENV: &str = "NEWS_ETL_STORAGE_CONFIG";
pub const DEFAULT_STORAGE_CONFIG_PATH: &str = "storage/storage_config.toml";
pub const DEFAULT_TEMP_PATH: &str = "storage/temp";

pub const PUSHGATEWAY_URL_ENV: &str = "NEWS_ETL_PUSHGATEWAY_URL";
