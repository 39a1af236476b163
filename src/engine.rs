use tracing::{debug, info};
use webrtc::{
    api::{
        API, APIBuilder,
        interceptor_registry::register_default_interceptors,
        media_engine::{
            MIME_TYPE_G722, MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_PCMA, MIME_TYPE_PCMU,
            MIME_TYPE_TELEPHONE_EVENT, MIME_TYPE_VP8, MIME_TYPE_VP9, MediaEngine,
        },
    },
    interceptor::registry::Registry,
    peer_connection::RTCPeerConnection,
    rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType},
};

use crate::{
    format::{MediaFormat, MediaKind},
    negotiation::NegotiatedMedia,
    registry::{EncodingConfiguration, PluginRegistry},
};

/// First payload type handed out to formats without a static one.
pub const FIRST_DYNAMIC_PAYLOAD_TYPE: u8 = 96;

const H264_FMTP: &str = "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f";

// MIME types webrtc can packetize; anything else stays out of its media engine
const WEBRTC_MIME_TYPES: &[&str] = &[
    MIME_TYPE_PCMU,
    MIME_TYPE_PCMA,
    MIME_TYPE_G722,
    MIME_TYPE_OPUS,
    MIME_TYPE_TELEPHONE_EVENT,
    MIME_TYPE_H264,
    MIME_TYPE_VP8,
    MIME_TYPE_VP9,
];

/// In-process plugin list, the engine side of codec registration.
#[derive(Debug, Default)]
pub struct PluginList {
    pub plugins: Vec<String>,
    pub packages: Vec<String>,
}

impl PluginRegistry for PluginList {
    fn is_registered(&self, identifier: &str) -> bool {
        self.plugins.iter().any(|p| p == identifier)
    }

    fn register_plugin(
        &mut self,
        identifier: &str,
        inputs: &[MediaFormat],
        outputs: &[MediaFormat],
    ) -> bool {
        if inputs.is_empty() && outputs.is_empty() {
            return false;
        }
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

fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Audio => RTPCodecType::Audio,
        MediaKind::Video => RTPCodecType::Video,
    }
}

/// webrtc's spelling of the MIME type of `format`, `None` when webrtc has
/// no packetizer for it.
pub fn webrtc_mime_type(format: &MediaFormat) -> Option<&'static str> {
    let mime_type = format!("{}/{}", format.kind, format.encoding);
    WEBRTC_MIME_TYPES
        .iter()
        .copied()
        .find(|m| m.eq_ignore_ascii_case(&mime_type))
}

/// webrtc codec parameters for `format`, `payload_type` used when the
/// format has no static one.
pub fn codec_parameters(format: &MediaFormat, payload_type: u8) -> RTCRtpCodecParameters {
    let sdp_fmtp_line = if format.encoding.eq_ignore_ascii_case("H264") {
        H264_FMTP.to_owned()
    } else {
        String::new()
    };
    let mime_type = match webrtc_mime_type(format) {
        Some(mime_type) => mime_type.to_owned(),
        None => format!("{}/{}", format.kind, format.encoding),
    };

    RTCRtpCodecParameters {
        capability: RTCRtpCodecCapability {
            mime_type,
            clock_rate: format.clock_rate as u32,
            channels: format.channels,
            sdp_fmtp_line,
            rtcp_feedback: vec![],
        },
        payload_type: format.payload_type.unwrap_or(payload_type),
        ..Default::default()
    }
}

/// Registers the supported encodings webrtc has a MIME type for with
/// `engine`, highest priority first. Returns how many codecs were
/// registered.
///
/// Registration order only shapes the offers the engine creates. Answers
/// follow the remote offer unless the transceivers are given
/// [`preferred_codecs`].
pub fn register_with_media_engine(
    config: &EncodingConfiguration,
    engine: &mut MediaEngine,
) -> Result<usize, webrtc::Error> {
    let mut next_dynamic = FIRST_DYNAMIC_PAYLOAD_TYPE;
    let mut registered = 0;

    for kind in MediaKind::ALL {
        for format in config.supported_encodings(kind) {
            if webrtc_mime_type(&format).is_none() {
                debug!("Skipping {}, webrtc cannot packetize it", format);
                continue;
            }
            let parameters = codec_parameters(&format, next_dynamic);
            if format.payload_type.is_none() {
                next_dynamic = next_dynamic.saturating_add(1);
            }
            debug!(
                "Registering {} as {} (pt {})",
                format, parameters.capability.mime_type, parameters.payload_type
            );
            engine.register_codec(parameters, codec_type(kind))?;
            registered += 1;
        }
    }

    info!("Registered {} codecs with the media engine", registered);
    Ok(registered)
}

/// Codec preferences for the transceiver answering `media`: the accepted
/// formats webrtc can carry, highest local priority first, keeping the
/// offered payload types.
pub fn preferred_codecs(
    config: &EncodingConfiguration,
    media: &NegotiatedMedia,
) -> Vec<RTCRtpCodecParameters> {
    let supported = config.supported_encodings(media.kind);
    media
        .accepted
        .iter()
        .filter(|f| supported.contains(f) && webrtc_mime_type(f).is_some())
        .filter_map(|f| f.payload_type.map(|pt| codec_parameters(f, pt)))
        .collect()
}

/// Hands each transceiver of `pc` the preferred codecs of its offered
/// section, matched by mid and then by kind in section order. Call between
/// setting the remote offer and creating the answer.
pub async fn apply_codec_preferences(
    config: &EncodingConfiguration,
    pc: &RTCPeerConnection,
    media: &[NegotiatedMedia],
) -> Result<(), webrtc::Error> {
    let mut unmatched: Vec<&NegotiatedMedia> = media.iter().collect();

    for transceiver in pc.get_transceivers().await {
        let kind = transceiver.kind();
        let mid = transceiver.mid();
        let position = unmatched
            .iter()
            .position(|m| mid.is_some() && m.mid.as_deref() == mid.as_deref())
            .or_else(|| unmatched.iter().position(|m| codec_type(m.kind) == kind));
        let Some(position) = position else {
            continue;
        };
        let section = unmatched.remove(position);

        let codecs = preferred_codecs(config, section);
        if codecs.is_empty() {
            continue;
        }
        debug!(
            "Transceiver {:?} prefers {:?}",
            mid,
            codecs.iter().map(|c| c.payload_type).collect::<Vec<_>>()
        );
        transceiver.set_codec_preferences(codecs).await?;
    }
    Ok(())
}

/// webrtc API whose media engine offers the current supported encodings.
pub fn build_api(config: &EncodingConfiguration) -> Result<API, webrtc::Error> {
    let mut m = MediaEngine::default();
    register_with_media_engine(config, &mut m)?;

    let registry = register_default_interceptors(Registry::new(), &mut m)?;

    Ok(APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build())
}
