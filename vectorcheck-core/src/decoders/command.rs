use crate::codec::Codec;
use crate::decoder::{DecodeError, DecodeRequest, Decoder};
use crate::process::{ProcessOutput, run_with_timeout};
use serde::Deserialize;
use std::process::Command;
use tracing::debug;
use vectorcheck_ipc::DecodedOutput;

/// Where a command decoder's checksum comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChecksumSource {
    /// MD5 of the file the command wrote to `{output}`
    #[default]
    OutputFile,
    /// First token printed on stdout (`md5sum`-style tools)
    Stdout,
    /// One checksum per stdout line, last field of each line (`framemd5`)
    StdoutFrames,
}

/// An external decoder binary described in the configuration file.
///
/// `args` may contain `{input}`, `{output}` and `{format}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandDecoder {
    pub name: String,
    pub codec: Codec,
    #[serde(default)]
    pub description: String,
    pub binary: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub checksum: ChecksumSource,
    #[serde(default)]
    pub hw_acceleration: bool,
}

impl CommandDecoder {
    fn command(&self, request: &DecodeRequest<'_>) -> Command {
        let input = request.input.to_string_lossy();
        let output = request.output.to_string_lossy();
        let format = request.format.as_str();

        let mut command = Command::new(&self.binary);
        command.args(self.args.iter().map(|arg| {
            arg.replace("{input}", &input)
                .replace("{output}", &output)
                .replace("{format}", format)
        }));
        command
    }

    fn checksum(
        &self,
        request: &DecodeRequest<'_>,
        output: &ProcessOutput,
    ) -> Result<DecodedOutput, DecodeError> {
        match self.checksum {
            ChecksumSource::OutputFile => {
                if !request.output.exists() {
                    return Err(DecodeError::MissingOutput(request.output.to_path_buf()));
                }
                Ok(DecodedOutput::Checksum(super::file_md5(request.output)?))
            }
            ChecksumSource::Stdout => output
                .stdout
                .split_whitespace()
                .next()
                .map(|sum| DecodedOutput::Checksum(sum.to_lowercase()))
                .ok_or_else(|| DecodeError::Other(format!("{} printed no checksum", self.binary))),
            ChecksumSource::StdoutFrames => {
                let frames: Vec<String> = output
                    .stdout
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .filter_map(|line| line.rsplit([',', ' ', '\t']).next())
                    .map(str::to_lowercase)
                    .collect();
                if frames.is_empty() {
                    return Err(DecodeError::Other(format!(
                        "{} printed no frame checksums",
                        self.binary
                    )));
                }
                Ok(DecodedOutput::Frames(frames))
            }
        }
    }
}

impl Decoder for CommandDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn codec(&self) -> Codec {
        self.codec
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn hw_acceleration(&self) -> bool {
        self.hw_acceleration
    }

    fn decode(&self, request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError> {
        let mut command = self.command(request);
        debug!(decoder = %self.name, ?command, "running decoder");
        let output = run_with_timeout(&mut command, request.timeout)?;

        if request.verbose && !output.stderr.is_empty() {
            eprint!("{}", output.stderr);
        }
        if !output.status.success() {
            return Err(DecodeError::CommandFailed {
                program: self.binary.clone(),
                status: output.status.to_string(),
                stderr: output.stderr_lines(),
            });
        }
        self.checksum(request, &output)
    }

    fn probe(&self, verbose: bool) -> bool {
        match which::which(&self.binary) {
            Ok(path) => {
                debug!(decoder = %self.name, path = %path.display(), "decoder binary found");
                true
            }
            Err(e) => {
                if verbose {
                    eprintln!("{}: {} not usable: {}", self.name, self.binary, e);
                }
                false
            }
        }
    }
}
