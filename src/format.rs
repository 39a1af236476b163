use std::hash::{Hash, Hasher};

/// Clock rate used for every video format.
pub const VIDEO_CLOCK_RATE: f64 = 90000.0;

/// Clock rate of a format whose persisted key carries no `/RATE` part.
pub const CLOCK_RATE_NOT_SPECIFIED: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatParseError {
    #[error("unknown media kind '{0}', expected 'audio' or 'video'")]
    UnknownKind(String),
    #[error("empty encoding name")]
    EmptyEncoding,
    #[error("invalid clock rate '{0}'")]
    InvalidClockRate(String),
}

impl std::str::FromStr for MediaKind {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            _ => Err(FormatParseError::UnknownKind(s.to_owned())),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A codec variant, identified by encoding name and clock rate.
///
/// Payload type and channel count ride along for SDP and media-engine use
/// but do not take part in equality: `speex/8000` and `speex/16000` are
/// distinct, two `H264/90000` entries with different payload types are not.
#[derive(Debug, Clone)]
pub struct MediaFormat {
    pub encoding: String,
    pub clock_rate: f64,
    pub kind: MediaKind,
    pub payload_type: Option<u8>,
    pub channels: u16,
}

impl MediaFormat {
    pub fn new(encoding: impl Into<String>, clock_rate: f64, kind: MediaKind) -> Self {
        Self {
            encoding: encoding.into(),
            clock_rate,
            kind,
            payload_type: None,
            channels: 1,
        }
    }

    pub fn audio(encoding: impl Into<String>, clock_rate: f64) -> Self {
        Self::new(encoding, clock_rate, MediaKind::Audio)
    }

    pub fn video(encoding: impl Into<String>) -> Self {
        Self::new(encoding, VIDEO_CLOCK_RATE, MediaKind::Video)
    }

    pub fn with_payload_type(mut self, payload_type: u8) -> Self {
        self.payload_type = Some(payload_type);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// `NAME/RATE`, the identity used for priorities and persisted keys.
    pub fn preference_key(&self) -> String {
        preference_key(&self.encoding, self.clock_rate)
    }

    /// Same encoding and clock rate.
    pub fn matches(&self, encoding: &str, clock_rate: f64) -> bool {
        self.encoding == encoding && self.clock_rate == clock_rate
    }
}

impl PartialEq for MediaFormat {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.encoding, other.clock_rate)
    }
}

impl Eq for MediaFormat {}

impl Hash for MediaFormat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.preference_key().hash(state);
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.preference_key())
    }
}

pub fn clock_rate_to_string(clock_rate: f64) -> String {
    if clock_rate.fract() == 0.0 && clock_rate.abs() < i64::MAX as f64 {
        format!("{}", clock_rate as i64)
    } else {
        format!("{clock_rate}")
    }
}

pub fn preference_key(encoding: &str, clock_rate: f64) -> String {
    format!("{}/{}", encoding, clock_rate_to_string(clock_rate))
}

/// Splits `NAME/RATE` (or a bare `NAME`) into its parts.
pub fn parse_encoding_key(s: &str) -> Result<(String, f64), FormatParseError> {
    let (encoding, clock_rate) = match s.rfind('/') {
        Some(separator) => {
            let rate = &s[separator + 1..];
            let clock_rate = rate
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite())
                .ok_or_else(|| FormatParseError::InvalidClockRate(rate.to_owned()))?;
            (&s[..separator], clock_rate)
        }
        None => (s, CLOCK_RATE_NOT_SPECIFIED),
    };

    if encoding.is_empty() {
        return Err(FormatParseError::EmptyEncoding);
    }
    Ok((encoding.to_owned(), clock_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_rate_string() {
        assert_eq!(clock_rate_to_string(8000.0), "8000");
        assert_eq!(clock_rate_to_string(90000.0), "90000");
        assert_eq!(clock_rate_to_string(11025.5), "11025.5");
        assert_eq!(clock_rate_to_string(CLOCK_RATE_NOT_SPECIFIED), "-1");
    }

    #[test]
    fn test_equality_ignores_payload_type() {
        let a = MediaFormat::video("H264").with_payload_type(97);
        let b = MediaFormat::video("H264").with_payload_type(99);
        assert_eq!(a, b);
        assert_ne!(MediaFormat::audio("speex", 8000.0), MediaFormat::audio("speex", 16000.0));
    }

    #[test]
    fn test_parse_encoding_key() {
        assert_eq!(parse_encoding_key("PCMU/8000"), Ok(("PCMU".to_owned(), 8000.0)));
        assert_eq!(
            parse_encoding_key("H263-1998/90000"),
            Ok(("H263-1998".to_owned(), 90000.0))
        );
        assert_eq!(
            parse_encoding_key("telephone-event"),
            Ok(("telephone-event".to_owned(), CLOCK_RATE_NOT_SPECIFIED))
        );
        assert_eq!(
            parse_encoding_key("H264/bad"),
            Err(FormatParseError::InvalidClockRate("bad".to_owned()))
        );
        assert_eq!(parse_encoding_key("/8000"), Err(FormatParseError::EmptyEncoding));
    }

    #[test]
    fn test_media_kind_from_str() {
        assert_eq!("Audio".parse::<MediaKind>(), Ok(MediaKind::Audio));
        assert_eq!("video".parse::<MediaKind>(), Ok(MediaKind::Video));
        assert!("application".parse::<MediaKind>().is_err());
    }
}
