//! Named voices offered by the OpenAI speech endpoint.
//!
//! The catalogue is used for help output and CLI suggestions only. Voice
//! identifiers are opaque strings and are sent to the provider unchecked,
//! so providers with their own voices work without changes here.

/// A named voice with a short description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// Voice used when neither the CLI nor the config names one
pub const DEFAULT_VOICE: &str = "alloy";

pub const VOICES: &[VoiceInfo] = &[
    VoiceInfo {
        id: "alloy",
        label: "Alloy (Neutral)",
        description: "Neutral, balanced voice suitable for most content",
    },
    VoiceInfo {
        id: "echo",
        label: "Echo (Male)",
        description: "Clear male voice with good articulation",
    },
    VoiceInfo {
        id: "fable",
        label: "Fable (British Male)",
        description: "British-accented male voice, great for storytelling",
    },
    VoiceInfo {
        id: "onyx",
        label: "Onyx (Deep Male)",
        description: "Deep, authoritative male voice",
    },
    VoiceInfo {
        id: "nova",
        label: "Nova (Female)",
        description: "Clear, professional female voice",
    },
    VoiceInfo {
        id: "shimmer",
        label: "Shimmer (Female)",
        description: "Warm, friendly female voice",
    },
];

/// Look up a catalogue entry by id (case-insensitive)
pub fn find_voice(id: &str) -> Option<&'static VoiceInfo> {
    VOICES.iter().find(|v| v.id.eq_ignore_ascii_case(id))
}
