//! Configuration loading from vectorcheck.toml
//!
//! The configuration file is discovered by walking up from the current
//! directory, or named explicitly with `--config`. Command line flags always
//! win over file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vectorcheck_core::decoders::CommandDecoder;

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "vectorcheck.toml";

/// vectorcheck configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VectorcheckConfig {
    /// Scheduler configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Directory layout
    #[serde(default)]
    pub paths: PathsConfig,
    /// Console and summary output
    #[serde(default)]
    pub output: OutputConfig,
    /// External decoder commands
    #[serde(default)]
    pub decoders: Vec<CommandDecoder>,
    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Where a job's decode runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Each job in its own worker process (default)
    #[default]
    Process,
    /// Jobs on threads of the scheduler process
    InProcess,
}

impl IsolationMode {
    /// Whether this mode provides process isolation
    pub fn is_isolated(self) -> bool {
        matches!(self, IsolationMode::Process)
    }

    /// Name used in configuration and reports
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationMode::Process => "process",
            IsolationMode::InProcess => "in-process",
        }
    }
}

impl std::str::FromStr for IsolationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" => Ok(IsolationMode::Process),
            "in-process" | "inprocess" | "thread" => Ok(IsolationMode::InProcess),
            other => Err(format!("Unknown isolation mode: {}", other)),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Parallel jobs (default: available parallelism)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Per-job timeout (e.g., "30s", "2m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Isolation mode: "process" or "in-process"
    #[serde(default)]
    pub isolation: IsolationMode,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout: default_timeout(),
            isolation: IsolationMode::default(),
        }
    }
}

fn default_timeout() -> String {
    "30s".to_string()
}

/// Directory layout
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directories searched recursively for suite descriptors
    #[serde(default = "default_test_suites_dirs")]
    pub test_suites_dirs: Vec<PathBuf>,
    /// Root of downloaded test vectors
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,
    /// Scratch directory for decoder output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            test_suites_dirs: default_test_suites_dirs(),
            resources_dir: default_resources_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_test_suites_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("test_suites")]
}
fn default_resources_dir() -> PathBuf {
    PathBuf::from("resources")
}
fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("vectorcheck_output")
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Use emoji in the Markdown summary
    #[serde(default = "default_emoji")]
    pub emoji: bool,
    /// Default summary format: "md", "csv", "junitxml", "json"
    #[serde(default = "default_summary_format")]
    pub summary_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            emoji: default_emoji(),
            summary_format: default_summary_format(),
        }
    }
}

fn default_emoji() -> bool {
    true
}
fn default_summary_format() -> String {
    "md".to_string()
}

impl VectorcheckConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", path.display(), e))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Walk up from the current directory looking for `vectorcheck.toml`.
    ///
    /// A file that exists but fails to parse is an error, not a miss.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let Ok(mut dir) = std::env::current_dir() else {
            return Ok(None);
        };
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path).map(Some);
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Per-job timeout in nanoseconds
    pub fn timeout_ns(&self) -> anyhow::Result<u64> {
        Self::parse_duration(&self.runner.timeout)
    }

    /// Parse duration string (e.g., "30s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if value < 0.0 {
            return Err(anyhow::anyhow!("Negative duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectorcheck_core::Codec;
    use vectorcheck_core::decoders::ChecksumSource;

    #[test]
    fn test_default_config() {
        let config = VectorcheckConfig::default();
        assert_eq!(config.runner.timeout, "30s");
        assert_eq!(config.runner.isolation, IsolationMode::Process);
        assert!(config.runner.jobs.is_none());
        assert!(config.output.emoji);
        assert!(config.decoders.is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(VectorcheckConfig::parse_duration("30s").unwrap(), 30_000_000_000);
        assert_eq!(VectorcheckConfig::parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(VectorcheckConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(VectorcheckConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(VectorcheckConfig::parse_duration("1.5").unwrap(), 1_500_000_000);
        assert!(VectorcheckConfig::parse_duration("").is_err());
        assert!(VectorcheckConfig::parse_duration("5h").is_err());
        assert!(VectorcheckConfig::parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_toml_with_decoders() {
        let toml_str = r#"
            [runner]
            jobs = 2
            isolation = "in-process"

            [paths]
            test_suites_dirs = ["suites", "extra"]

            [[decoders]]
            name = "libvpx-VP9"
            codec = "VP9"
            binary = "vpxdec"
            args = ["--i420", "--md5", "{input}"]
            checksum = "stdout"
        "#;

        let config: VectorcheckConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.jobs, Some(2));
        assert_eq!(config.runner.isolation, IsolationMode::InProcess);
        assert_eq!(config.paths.test_suites_dirs.len(), 2);
        assert_eq!(config.paths.resources_dir, PathBuf::from("resources"));
        assert_eq!(config.runner.timeout, "30s");
        assert_eq!(config.decoders.len(), 1);
        assert_eq!(config.decoders[0].codec, Codec::Vp9);
        assert_eq!(config.decoders[0].checksum, ChecksumSource::Stdout);
    }

    #[test]
    fn test_load_records_source() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[runner]\ntimeout = \"5s\"\n").unwrap();
        let config = VectorcheckConfig::load(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.timeout_ns().unwrap(), 5_000_000_000);
    }
}
