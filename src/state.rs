use std::sync::Arc;

use codec_prefs::{EncodingConfiguration, MediaFormat, MediaKind};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EncodingConfiguration>,
}

impl AppState {
    pub fn new(config: Arc<EncodingConfiguration>) -> Self {
        Self { config }
    }

    /// Catalog entry for `NAME/RATE`, or a bare format of `kind` when the
    /// catalog does not know it.
    pub fn resolve(&self, kind: MediaKind, encoding: &str, clock_rate: f64) -> MediaFormat {
        resolve(&self.config, Some(kind), encoding, clock_rate)
    }
}

/// Looks `NAME/RATE` up in the catalog, trying `kind` first or both kinds.
pub fn resolve(
    config: &EncodingConfiguration,
    kind: Option<MediaKind>,
    encoding: &str,
    clock_rate: f64,
) -> MediaFormat {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => MediaKind::ALL.to_vec(),
    };
    kinds
        .iter()
        .flat_map(|k| config.available_encodings(*k))
        .find(|f| f.matches(encoding, clock_rate))
        .unwrap_or_else(|| {
            MediaFormat::new(encoding, clock_rate, kind.unwrap_or(MediaKind::Audio))
        })
}
