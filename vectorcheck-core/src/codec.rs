//! Codec and output format identifiers shared by suites and decoders.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bitstream family a suite exercises and a decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Codec {
    /// No codec
    #[serde(rename = "None")]
    None,
    /// Placeholder codec used by self-tests
    #[serde(rename = "Dummy")]
    Dummy,
    /// H.264 / AVC
    #[serde(rename = "H.264")]
    H264,
    /// H.265 / HEVC
    #[serde(rename = "H.265")]
    H265,
    /// H.266 / VVC
    #[serde(rename = "H.266")]
    H266,
    /// VP8
    #[serde(rename = "VP8")]
    Vp8,
    /// VP9
    #[serde(rename = "VP9")]
    Vp9,
    /// Advanced Audio Coding
    #[serde(rename = "AAC")]
    Aac,
    /// AV1
    #[serde(rename = "AV1")]
    Av1,
}

impl Codec {
    /// Every codec, in listing order
    pub const ALL: [Codec; 9] = [
        Codec::None,
        Codec::Dummy,
        Codec::H264,
        Codec::H265,
        Codec::H266,
        Codec::Vp8,
        Codec::Vp9,
        Codec::Aac,
        Codec::Av1,
    ];

    /// Name used in suite descriptors
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::None => "None",
            Codec::Dummy => "Dummy",
            Codec::H264 => "H.264",
            Codec::H265 => "H.265",
            Codec::H266 => "H.266",
            Codec::Vp8 => "VP8",
            Codec::Vp9 => "VP9",
            Codec::Aac => "AAC",
            Codec::Av1 => "AV1",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = String;

    /// Case-insensitive; `h264` and `H.264` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('.', "");
        Codec::ALL
            .into_iter()
            .find(|codec| codec.as_str().to_lowercase().replace('.', "") == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Codec::ALL.iter().map(|c| c.as_str()).collect();
                format!("Unknown codec '{}'. Expected one of: {}", s, known.join(", "))
            })
    }
}

/// Sample layout a decoder is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// No specific format (audio suites, checksum-only decoders)
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "yuv420p")]
    Yuv420p,
    #[serde(rename = "yuv420p10le")]
    Yuv420p10le,
    #[serde(rename = "yuv420p12le")]
    Yuv420p12le,
    #[serde(rename = "yuv422p")]
    Yuv422p,
    #[serde(rename = "yuv422p10le")]
    Yuv422p10le,
    #[serde(rename = "yuv422p12le")]
    Yuv422p12le,
    #[serde(rename = "yuv444p")]
    Yuv444p,
    #[serde(rename = "yuv444p10le")]
    Yuv444p10le,
    #[serde(rename = "yuv444p12le")]
    Yuv444p12le,
    #[serde(rename = "yuv444p16le")]
    Yuv444p16le,
    #[serde(rename = "gbrp")]
    Gbrp,
    #[serde(rename = "gbrp10le")]
    Gbrp10le,
    #[serde(rename = "gbrp12le")]
    Gbrp12le,
    #[serde(rename = "gbrp14le")]
    Gbrp14le,
    #[serde(rename = "gray")]
    Gray,
    #[serde(rename = "gray10le")]
    Gray10le,
    #[serde(rename = "gray12le")]
    Gray12le,
    #[serde(rename = "gray16le")]
    Gray16le,
    /// Format could not be determined when the suite was generated
    #[serde(rename = "Unknown")]
    Unknown,
    /// Planar float audio
    #[serde(rename = "fltp")]
    Fltp,
}

impl OutputFormat {
    /// Name used in suite descriptors and passed to decoders
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::None => "None",
            OutputFormat::Yuv420p => "yuv420p",
            OutputFormat::Yuv420p10le => "yuv420p10le",
            OutputFormat::Yuv420p12le => "yuv420p12le",
            OutputFormat::Yuv422p => "yuv422p",
            OutputFormat::Yuv422p10le => "yuv422p10le",
            OutputFormat::Yuv422p12le => "yuv422p12le",
            OutputFormat::Yuv444p => "yuv444p",
            OutputFormat::Yuv444p10le => "yuv444p10le",
            OutputFormat::Yuv444p12le => "yuv444p12le",
            OutputFormat::Yuv444p16le => "yuv444p16le",
            OutputFormat::Gbrp => "gbrp",
            OutputFormat::Gbrp10le => "gbrp10le",
            OutputFormat::Gbrp12le => "gbrp12le",
            OutputFormat::Gbrp14le => "gbrp14le",
            OutputFormat::Gray => "gray",
            OutputFormat::Gray10le => "gray10le",
            OutputFormat::Gray12le => "gray12le",
            OutputFormat::Gray16le => "gray16le",
            OutputFormat::Unknown => "Unknown",
            OutputFormat::Fltp => "fltp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("Unknown output format '{}'", s))
    }
}
