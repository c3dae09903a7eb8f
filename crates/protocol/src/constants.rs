use std::time::Duration;

/// Header carrying the session key on chunk uploads.
pub const HEADER_SESSION_KEY: &str = "x-session-key";

/// Header carrying the zero-based chunk index.
pub const HEADER_CHUNK_INDEX: &str = "x-chunk-index";

/// Header carrying the hex digest of the chunk body.
pub const HEADER_CHUNK_DIGEST: &str = "x-chunk-digest";

/// Header carrying the chunk body length in bytes.
pub const HEADER_CHUNK_SIZE: &str = "x-chunk-size";

/// Envelope `code` value meaning success.
pub const CODE_OK: i32 = 0;

/// Number of chunk indices packed into one resume bitmap word.
pub const BITMAP_WORD_BITS: u64 = 16;

/// Default delay between completion polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Timeout for JSON request/response calls (open, complete).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single chunk upload.
///
/// Chunk bodies can be tens of megabytes, so this is considerably longer
/// than [`REQUEST_TIMEOUT`].
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
