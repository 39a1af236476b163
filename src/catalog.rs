use crate::format::{MediaFormat, MediaKind};

/// Source of the formats the local media engine can produce and consume,
/// independent of user preference.
pub trait AvailableCatalog: Send + Sync {
    fn available_encodings(&self, kind: MediaKind) -> Vec<MediaFormat>;

    /// Catalog entry with this static RTP payload type, if any.
    fn find_by_payload_type(&self, kind: MediaKind, payload_type: u8) -> Option<MediaFormat> {
        self.available_encodings(kind)
            .into_iter()
            .find(|f| f.payload_type == Some(payload_type))
    }
}

/// Fixed list of formats. Its order is the tie-break order of the registry.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    formats: Vec<MediaFormat>,
}

impl StaticCatalog {
    pub fn new(formats: Vec<MediaFormat>) -> Self {
        Self { formats }
    }

    /// Formats the built-in engine handles, with their RFC 3551 payload types.
    pub fn builtin() -> Self {
        Self::new(vec![
            MediaFormat::audio("PCMU", 8000.0).with_payload_type(0),
            MediaFormat::audio("G723", 8000.0).with_payload_type(4),
            MediaFormat::audio("GSM", 8000.0).with_payload_type(3),
            MediaFormat::audio("DVI4", 8000.0).with_payload_type(5),
            MediaFormat::audio("DVI4", 16000.0).with_payload_type(6),
            MediaFormat::audio("PCMA", 8000.0).with_payload_type(8),
            MediaFormat::audio("iLBC", 8000.0),
            MediaFormat::audio("speex", 8000.0),
            MediaFormat::audio("speex", 16000.0),
            MediaFormat::audio("speex", 32000.0),
            // G.722 is advertised at 8000 even though it samples at 16 kHz
            MediaFormat::audio("G722", 8000.0).with_payload_type(9),
            MediaFormat::audio("G728", 8000.0).with_payload_type(15),
            MediaFormat::audio("G729", 8000.0).with_payload_type(18),
            MediaFormat::audio("telephone-event", 8000.0),
            MediaFormat::video("H264"),
            MediaFormat::video("H263").with_payload_type(34),
            MediaFormat::video("JPEG").with_payload_type(26),
            MediaFormat::video("H261").with_payload_type(31),
        ])
    }
}

impl AvailableCatalog for StaticCatalog {
    fn available_encodings(&self, kind: MediaKind) -> Vec<MediaFormat> {
        self.formats
            .iter()
            .filter(|f| f.kind == kind)
            .cloned()
            .collect()
    }
}
