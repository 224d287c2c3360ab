fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use moments_protocol::{
        CreateVideoResponse, UploadPhase, UploadProgress, VideoRecord, VideoSummary,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes numbers so that `7` and `7.0` compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON
    /// values (order-independent, number-normalized).
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
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
        parsed
    }

    #[test]
    fn fixture_vimeo_create_response() {
        let resp =
            roundtrip_test::<moments_vimeo::CreateVideoResponse>("vimeo_create_response.json");
        assert_eq!(resp.upload.approach, "tus");
        assert_eq!(resp.upload.size, Some(12_582_912));
    }

    #[test]
    fn fixture_video_record() {
        let record = roundtrip_test::<VideoRecord>("video_record.json");
        assert_eq!(record.comments.len(), 1);
        assert!(record.is_public);
    }

    #[test]
    fn video_record_uses_storage_field_names() {
        let fixture = load_fixture("video_record.json");
        let keys: Vec<&str> = fixture
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        for key in [
            "video_id",
            "user_id",
            "video_url",
            "title",
            "description",
            "is_public",
            "upload_time",
            "view_count",
            "likes",
            "comments",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn fixture_create_video_response() {
        let resp = roundtrip_test::<CreateVideoResponse>("create_video_response.json");
        assert_eq!(resp.video_id, "2b7e0c4e-8f3a-4d2b-9c1e-5a6b7c8d9e0f");
    }

    #[test]
    fn fixture_video_summary() {
        let summary = roundtrip_test::<VideoSummary>("video_summary.json");
        assert_eq!(summary.view_count, 17);
    }

    #[test]
    fn fixture_upload_progress() {
        let progress = roundtrip_test::<UploadProgress>("upload_progress.json");
        assert_eq!(progress.phase, UploadPhase::Transferring);
        assert!((progress.percentage() - 41.666).abs() < 0.01);
    }
}
