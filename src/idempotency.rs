use sha2::{Digest, Sha256};

/// Identity for a news item the feed did not assign one to.
///
/// Hex SHA-256 of `title + "-" + url`, absent parts counted as empty, so the
/// same content always maps to the same id across runs.
pub fn deterministic_id(title: Option<&str>, url: Option<&str>) -> String {
    let mut s = String::new();
    s.push_str(title.unwrap_or(""));
    s.push('-');
    s.push_str(url.unwrap_or(""));

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
