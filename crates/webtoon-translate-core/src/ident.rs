//! Identifier minting and quota key construction.
//!
//! IDs are short prefixed hex strings (`upload_a1b2c3d4`). They end up in
//! storage keys and URLs, so the validators double as the path traversal
//! guard: anything that is not exactly prefix + 8 lowercase hex is rejected
//! before it reaches a filesystem path.

use chrono::{DateTime, Datelike, Duration, Utc};
use uuid::Uuid;

const UPLOAD_PREFIX: &str = "upload_";
const TRANSLATE_PREFIX: &str = "tr_";
const BATCH_PREFIX: &str = "batch_";
const ID_SUFFIX_LEN: usize = 8;

fn new_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..ID_SUFFIX_LEN].to_string()
}

/// Mint a new upload identifier (`upload_` + 8 hex chars).
pub fn new_upload_id() -> String {
    format!("{}{}", UPLOAD_PREFIX, new_suffix())
}

/// Mint a new translation job identifier (`tr_` + 8 hex chars).
pub fn new_translate_id() -> String {
    format!("{}{}", TRANSLATE_PREFIX, new_suffix())
}

/// Mint a new batch identifier (`batch_` + 8 hex chars).
pub fn new_batch_id() -> String {
    format!("{}{}", BATCH_PREFIX, new_suffix())
}

fn valid_suffix(suffix: &str) -> bool {
    suffix.len() == ID_SUFFIX_LEN
        && suffix
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

fn valid_id(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix).is_some_and(valid_suffix)
}

/// Check the shape of an upload identifier.
pub fn is_valid_upload_id(id: &str) -> bool {
    valid_id(id, UPLOAD_PREFIX)
}

/// Check the shape of a translation job identifier.
pub fn is_valid_translate_id(id: &str) -> bool {
    valid_id(id, TRANSLATE_PREFIX)
}

/// Check the shape of a batch identifier.
pub fn is_valid_batch_id(id: &str) -> bool {
    valid_id(id, BATCH_PREFIX)
}

/// Pseudonymize a client IP with a keyed hash, truncated to 16 hex chars.
///
/// Raw addresses are never stored or logged; the hash is the only client
/// identity the service keeps.
pub fn hash_client_ip(secret: &str, ip: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(ip.as_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// Weekly quota key for a client: `usage:images:{hashed_ip}:{year}-W{week:02}`.
///
/// The ISO week number rolls the key over every Monday, so expiry on the
/// counter row is belt and braces rather than the reset mechanism.
pub fn weekly_quota_key(secret: &str, ip: &str, now: DateTime<Utc>) -> String {
    let week = now.iso_week();
    format!(
        "usage:images:{}:{}-W{:02}",
        hash_client_ip(secret, ip),
        week.year(),
        week.week()
    )
}

/// The next Monday 00:00:00 UTC strictly after `now`.
pub fn next_weekly_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let days_ahead = (7 - today.weekday().num_days_from_monday()) % 7;
    let mut reset = (today + Duration::days(days_ahead as i64))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    if reset <= now {
        reset += Duration::days(7);
    }
    reset
}

/// Seconds until the next weekly reset, at least 1.
pub fn weekly_reset_ttl_secs(now: DateTime<Utc>) -> u64 {
    (next_weekly_reset(now) - now).num_seconds().max(1) as u64
}
