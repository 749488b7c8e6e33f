//! Decoder capability and the registry the binary builds at startup.

use crate::codec::{Codec, OutputFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vectorcheck_ipc::DecodedOutput;

/// Number of stderr lines kept when a decoder command fails
const STDERR_TAIL: usize = 20;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoder timed out after {:.3} secs", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("{program} exited with {status}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoder produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl DecodeError {
    /// Extra lines worth showing under the failure title.
    pub fn detail(&self) -> Vec<String> {
        match self {
            DecodeError::CommandFailed { stderr, .. } => {
                let skip = stderr.len().saturating_sub(STDERR_TAIL);
                stderr[skip..].to_vec()
            }
            _ => Vec::new(),
        }
    }
}

/// Arguments of a single decode call.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub format: OutputFormat,
    pub timeout: Duration,
    pub verbose: bool,
    pub keep_files: bool,
}

/// A decoder under test.
///
/// Implementations are plain values; process spawning lives in
/// [`crate::process::run_with_timeout`] and is shared by composition.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;

    fn codec(&self) -> Codec;

    fn description(&self) -> &str {
        ""
    }

    /// Hardware decoders are never run with more than one concurrent job.
    fn hw_acceleration(&self) -> bool {
        false
    }

    /// Decode `request.input` and return a checksum or per-frame checksums.
    fn decode(&self, request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError>;

    /// Whether the decoder can run on this machine. May be slow; callers go
    /// through [`RegisteredDecoder::is_available`], which asks once.
    fn probe(&self, _verbose: bool) -> bool {
        true
    }
}

/// A registry entry: the decoder plus its memoized availability.
pub struct RegisteredDecoder {
    decoder: Arc<dyn Decoder>,
    available: OnceLock<bool>,
}

impl RegisteredDecoder {
    fn new(decoder: Arc<dyn Decoder>) -> Self {
        Self {
            decoder,
            available: OnceLock::new(),
        }
    }

    pub fn decoder(&self) -> &Arc<dyn Decoder> {
        &self.decoder
    }

    pub fn name(&self) -> &str {
        self.decoder.name()
    }

    pub fn codec(&self) -> Codec {
        self.decoder.codec()
    }

    pub fn hw_acceleration(&self) -> bool {
        self.decoder.hw_acceleration()
    }

    /// Probe once per registry entry; later calls return the cached answer.
    pub fn is_available(&self, verbose: bool) -> bool {
        *self.available.get_or_init(|| {
            let available = self.decoder.probe(verbose);
            debug!(decoder = self.decoder.name(), available, "probed decoder");
            available
        })
    }
}

impl std::fmt::Display for RegisteredDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.decoder.description())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Decoder \"{0}\" registered twice")]
    Duplicate(String),
}

/// Collects decoders before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    decoders: Vec<Arc<dyn Decoder>>,
}

impl RegistryBuilder {
    pub fn with<D: Decoder + 'static>(mut self, decoder: D) -> Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    pub fn with_arc(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoders.push(decoder);
        self
    }

    /// Reject duplicate names (case-insensitive) and sort entries by name.
    pub fn build(self) -> Result<DecoderRegistry, RegistryError> {
        let mut seen = HashSet::new();
        for decoder in &self.decoders {
            if !seen.insert(decoder.name().to_lowercase()) {
                return Err(RegistryError::Duplicate(decoder.name().to_string()));
            }
        }

        let mut entries: Vec<Arc<RegisteredDecoder>> = self
            .decoders
            .into_iter()
            .map(|d| Arc::new(RegisteredDecoder::new(d)))
            .collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(DecoderRegistry { entries })
    }
}

/// Immutable set of decoders, passed explicitly to whoever needs it.
#[derive(Clone)]
pub struct DecoderRegistry {
    entries: Vec<Arc<RegisteredDecoder>>,
}

impl DecoderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builder preloaded with the decoders compiled into the binary.
    pub fn builtin() -> RegistryBuilder {
        Self::builder().with(crate::decoders::Dummy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredDecoder>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive exact lookup
    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredDecoder>> {
        self.entries
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }
}
