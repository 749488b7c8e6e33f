//! Suite descriptors and the catalog that loads them from disk.

use crate::codec::Codec;
use crate::vector::TestVector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid suite descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Repeated test suite with name \"{0}\"")]
    Duplicate(String),

    #[error("No test suites found in \"{0}\"")]
    Empty(String),
}

/// A named, ordered collection of test vectors for one codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    pub codec: Codec,
    pub description: String,
    pub test_vectors: Vec<TestVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_test_vectors: Option<Vec<TestVector>>,
    /// Descriptor the suite was loaded from
    #[serde(skip)]
    pub path: PathBuf,
}

impl TestSuite {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut suite: TestSuite =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        suite.path = path.to_path_buf();
        Ok(suite)
    }

    /// Rewrite the descriptor at `self.path`, pretty-printed with four spaces.
    pub fn save(&self) -> Result<(), CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })?;
        buf.push(b'\n');

        let mut file = fs::File::create(&self.path).map_err(io_err)?;
        file.write_all(&buf).map_err(io_err)?;
        Ok(())
    }

    pub fn vector(&self, name: &str) -> Option<&TestVector> {
        self.test_vectors.iter().find(|v| v.name == name)
    }

    /// Case-insensitive exact lookup
    pub fn find_vector(&self, name: &str) -> Option<&TestVector> {
        self.test_vectors
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// `<resources>/<suite>/<vector>/<input_file>`
    pub fn input_path(&self, resources_dir: &Path, vector: &TestVector) -> PathBuf {
        resources_dir
            .join(&self.name)
            .join(&vector.name)
            .join(&vector.input_file)
    }
}

/// All suites found under the configured directories.
#[derive(Debug, Default)]
pub struct SuiteCatalog {
    suites: Vec<TestSuite>,
    problems: Vec<(PathBuf, CatalogError)>,
}

impl SuiteCatalog {
    /// Walk every directory recursively and load each `*.json` descriptor.
    ///
    /// Descriptors that fail to parse, or that repeat an already loaded
    /// suite name, are skipped and kept in [`SuiteCatalog::problems`]. An
    /// empty catalog is an error.
    pub fn load(dirs: &[PathBuf]) -> Result<Self, CatalogError> {
        let mut catalog = SuiteCatalog::default();

        for dir in dirs {
            let mut files = Vec::new();
            collect_descriptors(dir, &mut files);
            files.sort();

            for path in files {
                match TestSuite::load(&path) {
                    Ok(suite) => {
                        if catalog.suites.iter().any(|s| s.name == suite.name) {
                            warn!(
                                path = %path.display(),
                                suite = %suite.name,
                                "duplicate test suite"
                            );
                            catalog
                                .problems
                                .push((path, CatalogError::Duplicate(suite.name)));
                        } else {
                            debug!(
                                path = %path.display(),
                                suite = %suite.name,
                                "loaded test suite"
                            );
                            catalog.suites.push(suite);
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping test suite");
                        catalog.problems.push((path, e));
                    }
                }
            }
        }

        if catalog.suites.is_empty() {
            let joined: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
            return Err(CatalogError::Empty(joined.join(", ")));
        }
        Ok(catalog)
    }

    pub fn from_suites(suites: Vec<TestSuite>) -> Self {
        Self {
            suites,
            problems: Vec::new(),
        }
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    pub fn problems(&self) -> &[(PathBuf, CatalogError)] {
        &self.problems
    }

    /// Case-insensitive exact lookup
    pub fn get(&self, name: &str) -> Option<&TestSuite> {
        self.suites.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

fn collect_descriptors(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot read test suite dir");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_descriptors(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
}

/// Split an OS path-list string (`a:b` on Unix) into directories.
pub fn split_path_list(list: &str) -> Vec<PathBuf> {
    std::env::split_paths(list)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
