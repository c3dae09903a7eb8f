use std::collections::BTreeSet;

/// A negotiated upload session. Immutable once opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    session_key: String,
    chunk_size: u64,
    total_size: u64,
    endpoints: Vec<String>,
    reuse_existing: bool,
    existing_object_id: Option<String>,
    uploaded: BTreeSet<u64>,
}

impl UploadSession {
    /// A session that needs chunk uploads.
    pub fn new(
        session_key: impl Into<String>,
        chunk_size: u64,
        total_size: u64,
        endpoints: Vec<String>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            chunk_size,
            total_size,
            endpoints,
            reuse_existing: false,
            existing_object_id: None,
            uploaded: BTreeSet::new(),
        }
    }

    /// A dedup hit: the remote already holds the content.
    pub fn reused(
        session_key: impl Into<String>,
        total_size: u64,
        existing_object_id: Option<String>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            chunk_size: 0,
            total_size,
            endpoints: Vec::new(),
            reuse_existing: true,
            existing_object_id,
            uploaded: BTreeSet::new(),
        }
    }

    /// Marks chunk indices the remote reports as already accepted.
    pub fn with_uploaded(mut self, uploaded: BTreeSet<u64>) -> Self {
        self.uploaded = uploaded;
        self
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The endpoint at `index`, or the first one if `index` is out of range.
    pub fn endpoint(&self, index: usize) -> Option<&str> {
        self.endpoints
            .get(index)
            .or_else(|| self.endpoints.first())
            .map(String::as_str)
    }

    pub fn reuse_existing(&self) -> bool {
        self.reuse_existing
    }

    pub fn existing_object_id(&self) -> Option<&str> {
        self.existing_object_id.as_deref()
    }

    pub fn uploaded(&self) -> &BTreeSet<u64> {
        &self.uploaded
    }
}
