use std::io::Cursor;

use tracing::{debug, warn};
use webrtc::sdp::description::{media::MediaDescription, session::SessionDescription};

use crate::{
    format::{MediaFormat, MediaKind},
    registry::EncodingConfiguration,
};

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("invalid SDP: {0}")]
    InvalidSdp(String),
}

/// Outcome for one `m=` section of an offer.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedMedia {
    pub kind: MediaKind,
    pub mid: Option<String>,
    /// Accepted formats, highest local priority first, with the offered
    /// payload types.
    pub accepted: Vec<MediaFormat>,
    /// Offered formats that are disabled locally.
    pub rejected: Vec<MediaFormat>,
}

impl NegotiatedMedia {
    pub fn preferred(&self) -> Option<&MediaFormat> {
        self.accepted.first()
    }
}

/// Intersects every audio/video section of `sdp` with local preferences.
/// Sections of other media types are skipped.
pub fn negotiate_offer(
    config: &EncodingConfiguration,
    sdp: &str,
) -> Result<Vec<NegotiatedMedia>, NegotiationError> {
    let session = SessionDescription::unmarshal(&mut Cursor::new(sdp.as_bytes()))
        .map_err(|e| NegotiationError::InvalidSdp(e.to_string()))?;

    let mut negotiated = Vec::new();
    for media in &session.media_descriptions {
        let Ok(kind) = media.media_name.media.parse::<MediaKind>() else {
            debug!("Skipping '{}' media section", media.media_name.media);
            continue;
        };

        let offered = offered_formats(config, kind, media);
        let accepted = config.update_encodings(&offered);
        let rejected = offered
            .into_iter()
            .filter(|f| !accepted.contains(f))
            .collect();

        negotiated.push(NegotiatedMedia {
            kind,
            mid: attribute(media, "mid").map(str::to_owned),
            accepted,
            rejected,
        });
    }
    Ok(negotiated)
}

fn attribute<'a>(media: &'a MediaDescription, key: &str) -> Option<&'a str> {
    media
        .attributes
        .iter()
        .find(|a| a.key == key)
        .and_then(|a| a.value.as_deref())
}

/// Formats of a section in offered order, resolved from `a=rtpmap` lines or
/// the catalog's static payload types.
fn offered_formats(
    config: &EncodingConfiguration,
    kind: MediaKind,
    media: &MediaDescription,
) -> Vec<MediaFormat> {
    let available = config.available_encodings(kind);
    let mut formats = Vec::new();

    for fmt in &media.media_name.formats {
        let Ok(payload_type) = fmt.parse::<u8>() else {
            warn!("Ignoring non-numeric format '{}' in {} section", fmt, kind);
            continue;
        };

        let rtpmap = media
            .attributes
            .iter()
            .filter(|a| a.key == "rtpmap")
            .filter_map(|a| a.value.as_deref())
            .find_map(|v| parse_rtpmap(v).filter(|(pt, ..)| *pt == payload_type));

        let format = match rtpmap {
            Some((_, name, clock_rate, channels)) => {
                // rtpmap names are case-insensitive; prefer the catalog spelling
                let encoding = available
                    .iter()
                    .find(|f| f.encoding.eq_ignore_ascii_case(&name) && f.clock_rate == clock_rate)
                    .map(|f| f.encoding.clone())
                    .unwrap_or(name);
                MediaFormat::new(encoding, clock_rate, kind)
                    .with_payload_type(payload_type)
                    .with_channels(channels)
            }
            None => match available
                .iter()
                .find(|f| f.payload_type == Some(payload_type))
            {
                Some(format) => format.clone(),
                None => {
                    debug!("Unknown payload type {} in {} section", payload_type, kind);
                    continue;
                }
            },
        };

        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// `PT NAME/RATE[/CHANNELS]`
fn parse_rtpmap(value: &str) -> Option<(u8, String, f64, u16)> {
    let (payload_type, encoding) = value.trim().split_once(' ')?;
    let payload_type = payload_type.parse().ok()?;

    let mut parts = encoding.trim().split('/');
    let name = parts.next().filter(|n| !n.is_empty())?.to_owned();
    let clock_rate = parts.next()?.parse::<f64>().ok()?;
    let channels = match parts.next() {
        Some(c) => c.parse().ok()?,
        None => 1,
    };
    Some((payload_type, name, clock_rate, channels))
}
