fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use cloudmux_protocol::{
        ApiResponse, ChunkAck, CompleteUploadRequest, CompleteUploadResponse, HashAlgorithm,
        ObjectMeta, OpenSessionRequest, OpenSessionResponse,
    };
    use cloudmux_upload::EngineConfig;

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  ours: {reserialized}"
        );
        parsed
    }

    // --- Requests ---

    #[test]
    fn fixture_open_session_request() {
        let req = roundtrip_test::<OpenSessionRequest>("open_session_request.json");
        assert_eq!(req.size, 262_144_000);
    }

    #[test]
    fn fixture_complete_upload_request() {
        roundtrip_test::<CompleteUploadRequest>("complete_upload_request.json");
    }

    // --- Responses ---

    #[test]
    fn fixture_open_session_response() {
        let resp = roundtrip_test::<ApiResponse<OpenSessionResponse>>("open_session_response.json");
        let data = resp.into_data().unwrap();
        assert_eq!(data.endpoints.len(), 2);
        let uploaded = data.uploaded_bitmap.unwrap().decode().unwrap();
        // Word 0 is all ones, word 1 marks 16 and 17.
        assert_eq!(uploaded.len(), 18);
        assert!(uploaded.contains(&17));
        assert!(!uploaded.contains(&18));
    }

    #[test]
    fn fixture_open_session_response_dedup() {
        let resp =
            roundtrip_test::<ApiResponse<OpenSessionResponse>>("open_session_response_dedup.json");
        let data = resp.into_data().unwrap();
        assert!(data.reuse_existing);
        assert_eq!(data.existing_object_id.as_deref(), Some("obj-77120"));
        assert!(data.endpoints.is_empty());
    }

    #[test]
    fn fixture_chunk_ack() {
        let ack = roundtrip_test::<ApiResponse<ChunkAck>>("chunk_ack.json")
            .into_data()
            .unwrap();
        assert!(ack.accepted);
        assert_eq!(ack.assembly_key.as_deref(), Some("asm-4410"));
    }

    #[test]
    fn fixture_complete_upload_states() {
        let pending = roundtrip_test::<ApiResponse<CompleteUploadResponse>>("complete_upload_pending.json")
            .into_data()
            .unwrap();
        assert_eq!(pending, CompleteUploadResponse::pending());

        let done = roundtrip_test::<ApiResponse<CompleteUploadResponse>>("complete_upload_finalized.json")
            .into_data()
            .unwrap();
        assert_eq!(done, CompleteUploadResponse::finalized("obj-90121"));

        let failed = roundtrip_test::<ApiResponse<CompleteUploadResponse>>("complete_upload_failed.json")
            .into_data()
            .unwrap();
        assert_eq!(failed, CompleteUploadResponse::failed(20103, "slice 7 missing"));
    }

    #[test]
    fn fixture_error_envelope() {
        let resp = roundtrip_test::<ApiResponse<ChunkAck>>("error_envelope.json");
        let err = resp.api_error().unwrap();
        assert_eq!(err.code, 401);
        assert_eq!(err.message, "access token expired");
    }

    // --- Metadata and configuration ---

    #[test]
    fn fixture_object_meta() {
        let meta = roundtrip_test::<ObjectMeta>("object_meta.json");
        assert!(!meta.is_folder);
        assert!(meta.modified.is_none());
    }

    #[test]
    fn fixture_engine_config() {
        let cfg = roundtrip_test::<EngineConfig>("engine_config.json");
        assert_eq!(cfg.effective_concurrency(), 8);
        assert_eq!(cfg.hash_algorithm, Some(HashAlgorithm::Sha256));
    }

    #[test]
    fn empty_engine_config_is_default() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }
}
