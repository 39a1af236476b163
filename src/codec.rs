use crate::format::VIDEO_CLOCK_RATE;

// Video codec priorities (higher number = higher priority)
pub const VIDEO_CODEC_PRIORITY: &[(&str, f64, i32)] = &[
    ("H264", VIDEO_CLOCK_RATE, 1100),
    ("H263", VIDEO_CLOCK_RATE, 1000),
    ("JPEG", VIDEO_CLOCK_RATE, 950),
    ("H261", VIDEO_CLOCK_RATE, 800),
];

// Audio codec priorities (higher number = higher priority)
pub const AUDIO_CODEC_PRIORITY: &[(&str, f64, i32)] = &[
    ("PCMU", 8000.0, 650),
    ("PCMA", 8000.0, 600),
    ("iLBC", 8000.0, 500),
    ("GSM", 8000.0, 450),
    ("speex", 8000.0, 352),
    ("speex", 16000.0, 351),
    ("speex", 32000.0, 350),
    ("DVI4", 8000.0, 300),
    ("DVI4", 16000.0, 250),
    ("G723", 8000.0, 150),
    ("G728", 8000.0, 100),
    ("G729", 8000.0, 50),
];

// Codec plugins handed to the media engine once at startup
pub const CUSTOM_CODECS: &[&str] = &[
    "codec.audio.alaw.depacketizer",
    "codec.audio.alaw.encoder",
    "codec.audio.alaw.packetizer",
    "codec.audio.ulaw.decoder",
    "codec.audio.ulaw.encoder",
    "codec.audio.ulaw.packetizer",
    "codec.audio.speex.decoder",
    "codec.audio.speex.encoder",
    "codec.audio.speex.resampler",
    "codec.audio.ilbc.decoder",
    "codec.audio.ilbc.encoder",
    "codec.audio.g722.decoder",
    "codec.audio.g722.encoder",
    "codec.audio.gsm.decoder",
    "codec.audio.gsm.encoder",
    "codec.audio.gsm.depacketizer",
    "codec.audio.gsm.packetizer",
    "codec.video.h263p.depacketizer",
    "codec.video.h263p.decoder",
    "codec.video.h263p.encoder",
    "codec.video.h263p.packetizer",
    "codec.video.h264.depacketizer",
    "codec.video.h264.decoder",
    "codec.video.h264.encoder",
    "codec.video.h264.packetizer",
    "codec.video.swscaler",
];

// Package prefixes searched for capture data sources
pub const CUSTOM_PACKAGES: &[&str] = &["media.ext", "media.fmj"];

/// Built-in priority for `encoding`/`clock_rate`, 0 when it has none.
pub fn default_priority(encoding: &str, clock_rate: f64) -> i32 {
    VIDEO_CODEC_PRIORITY
        .iter()
        .chain(AUDIO_CODEC_PRIORITY)
        .find(|(name, rate, _)| *name == encoding && *rate == clock_rate)
        .map(|(_, _, priority)| *priority)
        .unwrap_or(0)
}
