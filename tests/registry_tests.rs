//! Integration tests for the encoding preference registry

use std::sync::Arc;

use codec_prefs::{
    AvailableCatalog, DEFAULT_PROPERTY_PREFIX, EncodingConfiguration, KeyValueStore, MediaFormat,
    JsonFileStore, MediaKind, MemoryStore, StaticCatalog, format::VIDEO_CLOCK_RATE,
};
use tempfile::TempDir;

fn default_registry() -> EncodingConfiguration {
    EncodingConfiguration::new(
        Arc::new(StaticCatalog::builtin()),
        Arc::new(MemoryStore::new()),
    )
}

fn registry_with(store: Arc<dyn KeyValueStore>) -> EncodingConfiguration {
    EncodingConfiguration::new(Arc::new(StaticCatalog::builtin()), store)
}

fn key(name: &str) -> String {
    format!("{DEFAULT_PROPERTY_PREFIX}.sdp{name}")
}

fn assert_ordered(config: &EncodingConfiguration, formats: &[MediaFormat]) {
    let priorities: Vec<i32> = formats.iter().map(|f| config.priority(f)).collect();
    assert!(
        priorities.iter().all(|p| *p > 0),
        "disabled format in {priorities:?}"
    );
    assert!(
        priorities.windows(2).all(|w| w[0] >= w[1]),
        "priorities not descending: {priorities:?}"
    );
}

#[test]
fn test_default_video_order() {
    let config = default_registry();
    let video = config.supported_encodings(MediaKind::Video);
    let expected = [("H264", 1100), ("H263", 1000), ("JPEG", 950), ("H261", 800)];

    assert_eq!(video.len(), expected.len());
    for (format, (name, priority)) in video.iter().zip(expected) {
        assert_eq!(format.encoding, name);
        assert_eq!(format.clock_rate, VIDEO_CLOCK_RATE);
        assert_eq!(config.priority(format), priority);
    }
}

#[test]
fn test_disabling_removes_from_supported() {
    let config = default_registry();
    let g729 = MediaFormat::audio("G729", 8000.0);
    assert!(config.supported_encodings(MediaKind::Audio).contains(&g729));

    config.set_priority(&g729, 0);

    assert!(!config.supported_encodings(MediaKind::Audio).contains(&g729));
    assert!(!config.supported_encodings(MediaKind::Video).contains(&g729));
}

#[test]
fn test_persisted_override_wins() {
    let store: MemoryStore = [(key("PCMU/8000"), "700")].into_iter().collect();
    let config = registry_with(Arc::new(store));

    assert_eq!(config.priority(&MediaFormat::audio("PCMU", 8000.0)), 700);
}

#[test]
fn test_update_encodings_orders_candidates() {
    let config = default_registry();
    let pcma = MediaFormat::audio("PCMA", 8000.0);
    let g728 = MediaFormat::audio("G728", 8000.0);

    assert_eq!(
        config.update_encodings(&[g728.clone(), pcma.clone()]),
        vec![pcma.clone(), g728.clone()]
    );
    assert_eq!(
        config.update_encodings(&[pcma.clone(), g728.clone()]),
        vec![pcma, g728]
    );
}

#[test]
fn test_malformed_persisted_values_are_skipped() {
    let store: MemoryStore = [
        (key("H264/bad"), "notanumber"),
        (key("H264/90000"), "notanumber"),
        (key("H263/fast"), "5"),
        (key("/8000"), "5"),
        (key("PCMA/8000"), "610"),
    ]
    .into_iter()
    .collect();
    let config = registry_with(Arc::new(store));

    assert_eq!(config.priority(&MediaFormat::video("H264")), 1100);
    assert_eq!(config.priority(&MediaFormat::video("H263")), 1000);
    assert_eq!(config.priority(&MediaFormat::audio("PCMA", 8000.0)), 610);
}

#[test]
fn test_supported_sets_are_ordered_and_filtered() {
    let config = default_registry();
    let catalog = StaticCatalog::builtin();
    let audio = catalog.available_encodings(MediaKind::Audio);

    // deterministic grid of assignments, zeros and negatives included
    for round in 0..8i32 {
        for (i, format) in audio.iter().enumerate() {
            let i = i as i32;
            let priority = ((i * 37 + round * 11) % 9) - 2;
            config.set_priority(format, priority);
        }

        for kind in MediaKind::ALL {
            let supported = config.supported_encodings(kind);
            assert_ordered(&config, &supported);
            assert!(supported.iter().all(|f| f.kind == kind));
        }

        for format in &audio {
            if config.priority(format) <= 0 {
                assert!(!config.supported_encodings(MediaKind::Audio).contains(format));
            } else {
                assert!(config.supported_encodings(MediaKind::Audio).contains(format));
            }
        }
    }
}

#[test]
fn test_set_then_get_round_trip() {
    let config = default_registry();
    let formats = [
        MediaFormat::audio("speex", 32000.0),
        MediaFormat::video("JPEG"),
        MediaFormat::audio("opus", 48000.0),
    ];
    for p in [0, 1, 42, 650, i32::MAX] {
        for format in &formats {
            config.set_priority(format, p);
            assert_eq!(config.priority(format), p);
        }
    }
}

#[test]
fn test_unknown_format_has_zero_priority() {
    let config = default_registry();
    assert_eq!(config.priority(&MediaFormat::audio("AMR", 8000.0)), 0);
    assert_eq!(config.priority(&MediaFormat::audio("speex", 48000.0)), 0);
}

#[test]
fn test_persistence_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("restart.json");
    let speex = MediaFormat::audio("speex", 16000.0);
    let h261 = MediaFormat::video("H261");

    {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        let config = registry_with(store);
        config.set_priority(&speex, 1234);
        config.set_priority(&h261, 0);
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let written: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(written[key("speex/16000")], "1234");

    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    let config = registry_with(store);
    assert_eq!(config.priority(&speex), 1234);
    assert_eq!(config.priority(&h261), 0);
    assert_eq!(config.supported_encodings(MediaKind::Audio)[0], speex);
    assert!(!config.supported_encodings(MediaKind::Video).contains(&h261));
}

#[test]
fn test_odd_encoding_names_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.json");
    let formats = [
        (MediaFormat::audio("x=y", 8000.0), 777),
        (MediaFormat::audio("a:b", 16000.0), 555),
        (MediaFormat::audio("multi\nline", 8000.0), 333),
    ];

    {
        let config = registry_with(Arc::new(JsonFileStore::open(&path).unwrap()));
        for (format, priority) in &formats {
            config.set_priority(format, *priority);
        }
    }

    let config = registry_with(Arc::new(JsonFileStore::open(&path).unwrap()));
    for (format, priority) in &formats {
        assert_eq!(config.priority(format), *priority, "{format}");
    }
    assert_eq!(config.priority(&MediaFormat::audio("x", 8000.0)), 0);
}

#[test]
fn test_update_encodings_only_returns_candidates() {
    let config = default_registry();
    let candidates = vec![
        MediaFormat::audio("G723", 8000.0),
        MediaFormat::audio("opus", 48000.0),
        MediaFormat::audio("PCMU", 8000.0),
        MediaFormat::audio("telephone-event", 8000.0),
        MediaFormat::audio("speex", 16000.0),
    ];
    config.set_priority(&candidates[0], 0);

    let result = config.update_encodings(&candidates);

    assert_eq!(
        result,
        vec![
            MediaFormat::audio("PCMU", 8000.0),
            MediaFormat::audio("speex", 16000.0),
        ]
    );
    assert!(result.iter().all(|f| candidates.contains(f)));
    assert_ordered(&config, &result);
    assert!(config.update_encodings(&[]).is_empty());
}

#[test]
fn test_custom_prefix() {
    let store = Arc::new(MemoryStore::new());
    let config = EncodingConfiguration::with_prefix(
        Arc::new(StaticCatalog::builtin()),
        store.clone(),
        "app.codecs",
    );
    config.set_priority(&MediaFormat::audio("GSM", 8000.0), 999);

    assert_eq!(store.get_string("app.codecs.sdpGSM/8000").as_deref(), Some("999"));

    let reloaded = EncodingConfiguration::with_prefix(
        Arc::new(StaticCatalog::builtin()),
        store,
        "app.codecs",
    );
    assert_eq!(reloaded.priority(&MediaFormat::audio("GSM", 8000.0)), 999);
}

#[test]
fn test_concurrent_set_priority() {
    let config = Arc::new(default_registry());
    let formats = StaticCatalog::builtin().available_encodings(MediaKind::Audio);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let config = Arc::clone(&config);
            let formats = formats.clone();
            std::thread::spawn(move || {
                for round in 0..50 {
                    let format = &formats[(t + round) % formats.len()];
                    config.set_priority(format, ((t * 31 + round) % 7) as i32);
                    // other threads may change priorities after this read
                    let supported = config.supported_encodings(MediaKind::Audio);
                    assert!(supported.iter().all(|f| f.kind == MediaKind::Audio));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_ordered(&config, &config.supported_encodings(MediaKind::Audio));
}
