pub mod s3;
pub mod supabase;

pub use self::s3::{ObjectStoreClient, S3Credentials};
pub use self::supabase::SupabaseClient;
