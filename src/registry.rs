use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, error, info, warn};

use crate::{
    catalog::AvailableCatalog,
    codec::{AUDIO_CODEC_PRIORITY, CUSTOM_CODECS, CUSTOM_PACKAGES, VIDEO_CODEC_PRIORITY},
    format::{MediaFormat, MediaKind, parse_encoding_key, preference_key},
    store::KeyValueStore,
};

/// Key prefix under which priorities are persisted.
pub const DEFAULT_PROPERTY_PREFIX: &str =
    "net.java.sip.communicator.impl.neomedia.codec.EncodingConfiguration";

/// Receiver of codec plugin identifiers, implemented by the media engine glue.
pub trait PluginRegistry {
    fn is_registered(&self, identifier: &str) -> bool;

    /// Returns whether the plugin was accepted.
    fn register_plugin(
        &mut self,
        identifier: &str,
        inputs: &[MediaFormat],
        outputs: &[MediaFormat],
    ) -> bool;

    /// Returns whether the prefix was new.
    fn add_package_prefix(&mut self, prefix: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Default)]
struct State {
    // `NAME/RATE` -> priority
    priorities: HashMap<String, i32>,
    supported_audio: Option<Vec<MediaFormat>>,
    supported_video: Option<Vec<MediaFormat>>,
}

impl State {
    fn priority(&self, format: &MediaFormat) -> i32 {
        self.priorities
            .get(&format.preference_key())
            .copied()
            .unwrap_or(0)
    }

    fn invalidate(&mut self) {
        self.supported_audio = None;
        self.supported_video = None;
    }

    /// Formats with priority > 0, highest first, ties keeping input order.
    fn order(&self, formats: impl IntoIterator<Item = MediaFormat>) -> Vec<MediaFormat> {
        let mut ranked: Vec<(i32, MediaFormat)> = formats
            .into_iter()
            .map(|f| (self.priority(&f), f))
            .filter(|(priority, _)| *priority > 0)
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, f)| f).collect()
    }
}

/// Codec priorities, and the supported encodings derived from them.
pub struct EncodingConfiguration {
    catalog: Arc<dyn AvailableCatalog>,
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    state: Mutex<State>,
}

impl EncodingConfiguration {
    /// Builds a registry with the built-in defaults overridden by whatever
    /// `store` holds under [`DEFAULT_PROPERTY_PREFIX`].
    pub fn new(catalog: Arc<dyn AvailableCatalog>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(catalog, store, DEFAULT_PROPERTY_PREFIX)
    }

    pub fn with_prefix(
        catalog: Arc<dyn AvailableCatalog>,
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
    ) -> Self {
        let config = Self {
            catalog,
            store,
            prefix: prefix.into(),
            state: Mutex::new(State::default()),
        };
        config.initialize_format_preferences();
        config
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets priorities to the built-in table, then applies persisted
    /// overrides. Unparseable entries are logged and skipped.
    pub fn initialize_format_preferences(&self) {
        let mut state = self.lock();
        state.priorities.clear();

        for (encoding, clock_rate, priority) in VIDEO_CODEC_PRIORITY.iter().chain(AUDIO_CODEC_PRIORITY) {
            state
                .priorities
                .insert(preference_key(encoding, *clock_rate), *priority);
        }

        let key_prefix = format!("{}.", self.prefix);
        let mut overrides = 0;
        for name in self.store.property_names_by_prefix(&key_prefix) {
            let Some(value) = self.store.get_string(&name) else {
                continue;
            };
            let fmt_name = &name[key_prefix.len()..];

            let fmt_name = match fmt_name.strip_prefix("sdp") {
                Some(stripped) => stripped,
                None => {
                    // legacy form, shadowed by the `sdp` one when both exist
                    let current = format!("{key_prefix}sdp{fmt_name}");
                    if self.store.get_string(&current).is_some() {
                        continue;
                    }
                    fmt_name
                }
            };

            let priority = match value.trim().parse::<i32>() {
                Ok(priority) => priority,
                Err(e) => {
                    warn!(
                        "Failed to parse preference ({}) of format ({}): {}",
                        value, fmt_name, e
                    );
                    continue;
                }
            };
            let (encoding, clock_rate) = match parse_encoding_key(fmt_name) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Failed to parse format ({}): {}", fmt_name, e);
                    continue;
                }
            };

            let key = preference_key(&encoding, clock_rate);
            debug!("Persisted preference {} = {}", key, priority);
            state.priorities.insert(key, priority);
            overrides += 1;
        }

        state.invalidate();
        info!(
            "Initialized {} encoding preferences ({} persisted overrides)",
            state.priorities.len(),
            overrides
        );
    }

    /// Stored priority of `format`, 0 when it has none.
    pub fn priority(&self, format: &MediaFormat) -> i32 {
        self.lock().priority(format)
    }

    /// Sets and persists the priority of `format`. 0 or less disables it.
    pub fn set_priority(&self, format: &MediaFormat, priority: i32) {
        let mut state = self.lock();
        self.set_priority_locked(&mut state, format, priority);
        state.invalidate();
    }

    fn set_priority_locked(&self, state: &mut State, format: &MediaFormat, priority: i32) {
        if priority < 0 {
            debug!("Negative priority {} for {} disables it", priority, format);
        }
        state.priorities.insert(format.preference_key(), priority);

        let key = self.property_name(format);
        if let Err(e) = self.store.set_property(&key, &priority.to_string()) {
            error!("Failed to persist priority of {}: {}", format, e);
        }
    }

    /// Persisted property name for `format`.
    pub fn property_name(&self, format: &MediaFormat) -> String {
        format!("{}.sdp{}", self.prefix, format.preference_key())
    }

    /// Everything the catalog offers for `kind`, regardless of priority.
    pub fn available_encodings(&self, kind: MediaKind) -> Vec<MediaFormat> {
        self.catalog.available_encodings(kind)
    }

    /// Enabled available formats of `kind`, highest priority first.
    pub fn supported_encodings(&self, kind: MediaKind) -> Vec<MediaFormat> {
        let mut state = self.lock();
        self.supported_locked(&mut state, kind)
    }

    fn supported_locked(&self, state: &mut State, kind: MediaKind) -> Vec<MediaFormat> {
        let cached = match kind {
            MediaKind::Audio => &state.supported_audio,
            MediaKind::Video => &state.supported_video,
        };
        if let Some(supported) = cached {
            return supported.clone();
        }

        let supported = state.order(self.catalog.available_encodings(kind));
        match kind {
            MediaKind::Audio => state.supported_audio = Some(supported.clone()),
            MediaKind::Video => state.supported_video = Some(supported.clone()),
        }
        supported
    }

    /// The enabled subset of `candidates`, reordered by local priority.
    /// Candidates of equal priority keep their offered order.
    pub fn update_encodings(&self, candidates: &[MediaFormat]) -> Vec<MediaFormat> {
        self.lock().order(candidates.iter().cloned())
    }

    /// All available formats of `kind` in display order: enabled ones by
    /// priority, then disabled ones in catalog order.
    pub fn ordered_encodings(&self, kind: MediaKind) -> Vec<(MediaFormat, i32)> {
        let mut state = self.lock();
        self.ordered_locked(&mut state, kind)
    }

    fn ordered_locked(&self, state: &mut State, kind: MediaKind) -> Vec<(MediaFormat, i32)> {
        let mut ordered: Vec<(MediaFormat, i32)> = self
            .supported_locked(state, kind)
            .into_iter()
            .map(|f| {
                let priority = state.priority(&f);
                (f, priority)
            })
            .collect();
        for format in self.catalog.available_encodings(kind) {
            let priority = state.priority(&format);
            if priority <= 0 {
                ordered.push((format, priority));
            }
        }
        ordered
    }

    /// Swaps an enabled `format` with its enabled neighbour in
    /// [`Self::ordered_encodings`] and renumbers the enabled entries so the
    /// new order sticks. Returns the new index, or `None` if `format` is
    /// unknown, disabled or has no enabled neighbour in that direction.
    pub fn move_encoding(
        &self,
        kind: MediaKind,
        format: &MediaFormat,
        direction: MoveDirection,
    ) -> Option<usize> {
        let mut state = self.lock();
        let mut ordered = self.ordered_locked(&mut state, kind);

        let index = ordered.iter().position(|(f, _)| f == format)?;
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1)?,
            MoveDirection::Down => Some(index + 1).filter(|i| *i < ordered.len())?,
        };
        if ordered[index].1 <= 0 || ordered[target].1 <= 0 {
            return None;
        }
        ordered.swap(index, target);

        let count = ordered.len();
        for (i, (f, priority)) in ordered.iter().enumerate() {
            if *priority <= 0 {
                continue;
            }
            let renumbered = i32::try_from(count - i).unwrap_or(i32::MAX);
            if renumbered != *priority {
                self.set_priority_locked(&mut state, f, renumbered);
            }
        }
        state.invalidate();

        debug!("Moved {} {:?} to index {}", format, direction, target);
        Some(target)
    }

    /// Hands [`CUSTOM_CODECS`] to `registry`, skipping those already known.
    /// Returns how many were newly registered.
    pub fn register_custom_codecs(&self, registry: &mut dyn PluginRegistry) -> usize {
        let mut registered = 0;
        for identifier in CUSTOM_CODECS {
            if registry.is_registered(identifier) {
                debug!("Codec {} is already registered", identifier);
                continue;
            }

            let kind = if identifier.starts_with("codec.video.") {
                MediaKind::Video
            } else {
                MediaKind::Audio
            };
            let formats = self.catalog.available_encodings(kind);
            if registry.register_plugin(identifier, &formats, &formats) {
                debug!("Codec {} is successfully registered", identifier);
                registered += 1;
            } else {
                debug!("Codec {} is NOT successfully registered", identifier);
            }
        }
        registered
    }

    /// Adds [`CUSTOM_PACKAGES`] to `registry`'s package prefix list.
    pub fn register_custom_packages(&self, registry: &mut dyn PluginRegistry) {
        for prefix in CUSTOM_PACKAGES {
            if registry.add_package_prefix(prefix) {
                debug!("Adding package: {}", prefix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::StaticCatalog, store::MemoryStore};

    fn registry() -> EncodingConfiguration {
        EncodingConfiguration::new(
            Arc::new(StaticCatalog::builtin()),
            Arc::new(MemoryStore::new()),
        )
    }

    fn names(formats: &[MediaFormat]) -> Vec<String> {
        formats.iter().map(|f| f.preference_key()).collect()
    }

    #[test]
    fn test_defaults_video_order() {
        let config = registry();
        assert_eq!(
            names(&config.supported_encodings(MediaKind::Video)),
            vec!["H264/90000", "H263/90000", "JPEG/90000", "H261/90000"]
        );
    }

    #[test]
    fn test_defaults_exclude_unranked_catalog_entries() {
        let config = registry();
        let audio = config.supported_encodings(MediaKind::Audio);
        assert!(!audio.contains(&MediaFormat::audio("G722", 8000.0)));
        assert!(!audio.contains(&MediaFormat::audio("telephone-event", 8000.0)));
        assert_eq!(audio.first(), Some(&MediaFormat::audio("PCMU", 8000.0)));
        assert_eq!(audio.last(), Some(&MediaFormat::audio("G729", 8000.0)));
    }

    #[test]
    fn test_set_priority_reorders_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let config = EncodingConfiguration::new(Arc::new(StaticCatalog::builtin()), store.clone());

        let h261 = MediaFormat::video("H261");
        config.set_priority(&h261, 2000);

        assert_eq!(config.supported_encodings(MediaKind::Video)[0], h261);
        assert_eq!(
            store
                .get_string(&format!("{DEFAULT_PROPERTY_PREFIX}.sdpH261/90000"))
                .as_deref(),
            Some("2000")
        );
    }

    #[test]
    fn test_negative_priority_disables() {
        let config = registry();
        let pcmu = MediaFormat::audio("PCMU", 8000.0);
        config.set_priority(&pcmu, -5);

        assert_eq!(config.priority(&pcmu), -5);
        assert!(!config.supported_encodings(MediaKind::Audio).contains(&pcmu));
    }

    #[test]
    fn test_unknown_format_is_stored_but_not_supported() {
        let config = registry();
        let opus = MediaFormat::audio("opus", 48000.0);
        config.set_priority(&opus, 900);

        assert_eq!(config.priority(&opus), 900);
        assert!(!config.supported_encodings(MediaKind::Audio).contains(&opus));
        assert_eq!(config.update_encodings(&[opus.clone()]), vec![opus]);
    }

    #[test]
    fn test_legacy_key_is_shadowed() {
        let store: MemoryStore = [
            (format!("{DEFAULT_PROPERTY_PREFIX}.PCMA/8000"), "10".to_owned()),
            (format!("{DEFAULT_PROPERTY_PREFIX}.sdpPCMA/8000"), "20".to_owned()),
            (format!("{DEFAULT_PROPERTY_PREFIX}.GSM/8000"), "30".to_owned()),
        ]
        .into_iter()
        .collect();
        let config = EncodingConfiguration::new(Arc::new(StaticCatalog::builtin()), Arc::new(store));

        assert_eq!(config.priority(&MediaFormat::audio("PCMA", 8000.0)), 20);
        assert_eq!(config.priority(&MediaFormat::audio("GSM", 8000.0)), 30);
    }

    #[test]
    fn test_equal_priorities_keep_catalog_order() {
        let config = registry();
        let gsm = MediaFormat::audio("GSM", 8000.0);
        let g723 = MediaFormat::audio("G723", 8000.0);
        config.set_priority(&gsm, 1000);
        config.set_priority(&g723, 1000);

        // builtin catalog lists G723 before GSM
        let audio = config.supported_encodings(MediaKind::Audio);
        assert_eq!(names(&audio[..2]), vec!["G723/8000", "GSM/8000"]);
    }

    #[test]
    fn test_move_encoding() {
        let config = registry();
        let jpeg = MediaFormat::video("JPEG");

        assert_eq!(config.move_encoding(MediaKind::Video, &jpeg, MoveDirection::Up), Some(1));
        assert_eq!(
            names(&config.supported_encodings(MediaKind::Video)),
            vec!["H264/90000", "JPEG/90000", "H263/90000", "H261/90000"]
        );
        assert_eq!(config.priority(&jpeg), 3);

        let h264 = MediaFormat::video("H264");
        assert_eq!(config.move_encoding(MediaKind::Video, &h264, MoveDirection::Up), None);
        let h261 = MediaFormat::video("H261");
        assert_eq!(config.move_encoding(MediaKind::Video, &h261, MoveDirection::Down), None);
    }

    #[test]
    fn test_move_stops_at_disabled_entries() {
        let config = registry();
        let g729 = MediaFormat::audio("G729", 8000.0);
        let g722 = MediaFormat::audio("G722", 8000.0);

        assert_eq!(config.move_encoding(MediaKind::Audio, &g729, MoveDirection::Down), None);
        assert_eq!(config.move_encoding(MediaKind::Audio, &g722, MoveDirection::Up), None);
        assert_eq!(config.priority(&g729), 50);

        let ordered = config.ordered_encodings(MediaKind::Audio);
        assert_eq!(ordered.len(), 14);
        assert_eq!(ordered[12], (g722, 0));
    }

    struct RecordingRegistry {
        plugins: Vec<String>,
        packages: Vec<String>,
    }

    impl PluginRegistry for RecordingRegistry {
        fn is_registered(&self, identifier: &str) -> bool {
            self.plugins.iter().any(|p| p == identifier)
        }

        fn register_plugin(&mut self, identifier: &str, _: &[MediaFormat], _: &[MediaFormat]) -> bool {
            self.plugins.push(identifier.to_owned());
            true
        }

        fn add_package_prefix(&mut self, prefix: &str) -> bool {
            if self.packages.iter().any(|p| p == prefix) {
                return false;
            }
            self.packages.push(prefix.to_owned());
            true
        }
    }

    #[test]
    fn test_register_custom_codecs_skips_known() {
        let config = registry();
        let mut plugins = RecordingRegistry {
            plugins: vec![CUSTOM_CODECS[0].to_owned()],
            packages: vec![],
        };

        assert_eq!(config.register_custom_codecs(&mut plugins), CUSTOM_CODECS.len() - 1);
        assert_eq!(config.register_custom_codecs(&mut plugins), 0);

        config.register_custom_packages(&mut plugins);
        config.register_custom_packages(&mut plugins);
        assert_eq!(plugins.packages.len(), CUSTOM_PACKAGES.len());
    }
}
