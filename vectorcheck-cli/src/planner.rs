//! Run Planner
//!
//! Selects suites, decoders and vectors by name and builds the job list of a
//! suite × decoder pair.
//!
//! Names match case-insensitively and exactly. Selection keeps catalog (or
//! registry) order, not the order names were given in.

use std::fmt;
use std::path::Path;
use thiserror::Error;
use vectorcheck_core::{Job, JobSettings, TestSuite, TestVector};

/// A requested name that matched nothing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No {kind} found for: {}", .names.join(", "))]
pub struct Unmatched {
    pub kind: SelectionKind,
    pub names: Vec<String>,
}

/// What was being selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    TestSuite,
    Decoder,
    TestVector,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionKind::TestSuite => "test suite",
            SelectionKind::Decoder => "decoder",
            SelectionKind::TestVector => "test vector",
        })
    }
}

/// Keep the items whose name is in `requested`; an empty request keeps all.
///
/// Fails if any requested name matches no item.
pub fn select_by_name<'a, T, F>(
    items: impl IntoIterator<Item = &'a T>,
    requested: &[String],
    kind: SelectionKind,
    name_of: F,
) -> Result<Vec<&'a T>, Unmatched>
where
    T: 'a + ?Sized,
    F: Fn(&T) -> &str,
{
    let items: Vec<&T> = items.into_iter().collect();
    if requested.is_empty() {
        return Ok(items);
    }

    let unmatched: Vec<String> = requested
        .iter()
        .filter(|name| !items.iter().any(|item| name_of(*item).eq_ignore_ascii_case(name)))
        .cloned()
        .collect();
    if !unmatched.is_empty() {
        return Err(Unmatched {
            kind,
            names: unmatched,
        });
    }

    Ok(items
        .into_iter()
        .filter(|item| requested.iter().any(|name| name_of(*item).eq_ignore_ascii_case(name)))
        .collect())
}

/// Every requested vector must exist in at least one of `suites`.
pub fn check_vectors_exist(suites: &[&TestSuite], requested: &[String]) -> Result<(), Unmatched> {
    let unmatched: Vec<String> = requested
        .iter()
        .filter(|name| suites.iter().all(|suite| suite.find_vector(name).is_none()))
        .cloned()
        .collect();
    if unmatched.is_empty() {
        Ok(())
    } else {
        Err(Unmatched {
            kind: SelectionKind::TestVector,
            names: unmatched,
        })
    }
}

fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Work planned for one suite × decoder pair
#[derive(Debug, Clone)]
pub struct SuitePlan<'a> {
    /// Vectors reported on, in catalog order
    pub selected: Vec<&'a TestVector>,
    /// One job per selected vector not skipped; the rest stay `NotRun`
    pub jobs: Vec<Job>,
}

impl SuitePlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Filters applied inside a suite
#[derive(Debug, Clone, Copy)]
pub struct VectorFilter<'a> {
    /// Only these vectors (empty: all)
    pub only: &'a [String],
    /// Never run these vectors
    pub skip: &'a [String],
}

/// Build the plan of one suite × decoder pair.
pub fn plan_suite<'a>(
    suite: &'a TestSuite,
    decoder: &str,
    filter: VectorFilter<'_>,
    resources_dir: &Path,
    results_dir: &Path,
    settings: &JobSettings,
) -> SuitePlan<'a> {
    let selected: Vec<&TestVector> = suite
        .test_vectors
        .iter()
        .filter(|v| filter.only.is_empty() || contains_name(filter.only, &v.name))
        .collect();

    let jobs = selected
        .iter()
        .copied()
        .filter(|v| !contains_name(filter.skip, &v.name))
        .map(|vector| Job::for_vector(suite, vector, decoder, resources_dir, results_dir, settings))
        .collect();

    SuitePlan { selected, jobs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use vectorcheck_core::{Codec, ExpectedResult, OutputFormat};

    fn vector(name: &str) -> TestVector {
        TestVector {
            name: name.to_string(),
            source: String::new(),
            source_checksum: String::new(),
            input_file: format!("{name}.bin"),
            output_format: OutputFormat::Yuv420p,
            result: ExpectedResult::Checksum("00".to_string()),
        }
    }

    fn suite(name: &str, vectors: &[&str]) -> TestSuite {
        TestSuite {
            name: name.to_string(),
            codec: Codec::Dummy,
            description: String::new(),
            test_vectors: vectors.iter().map(|v| vector(v)).collect(),
            failing_test_vectors: None,
            path: PathBuf::new(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn settings() -> JobSettings {
        JobSettings {
            timeout: Duration::from_secs(5),
            verbose: false,
            keep_files: false,
            reference: false,
        }
    }

    #[test]
    fn test_select_case_insensitive_in_catalog_order() {
        let suites = vec![
            suite("JVT-AVC_V1", &[]),
            suite("dummy", &[]),
            suite("VP9-TEST-VECTORS", &[]),
        ];
        let picked = select_by_name(
            &suites,
            &names(&["vp9-test-vectors", "jvt-avc_v1"]),
            SelectionKind::TestSuite,
            |s| s.name.as_str(),
        )
        .unwrap();
        let picked: Vec<&str> = picked.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(picked, vec!["JVT-AVC_V1", "VP9-TEST-VECTORS"]);
    }

    #[test]
    fn test_select_is_exact_not_substring() {
        let suites = vec![suite("dummy", &[]), suite("dummy_fail", &[])];
        let picked = select_by_name(&suites, &names(&["dummy"]), SelectionKind::TestSuite, |s| {
            s.name.as_str()
        })
        .unwrap();
        assert_eq!(picked.len(), 1);
    }

    #[test]
    fn test_unmatched_names_reported() {
        let suites = vec![suite("dummy", &[])];
        let err = select_by_name(
            &suites,
            &names(&["nope", "dummy", "missing"]),
            SelectionKind::TestSuite,
            |s| s.name.as_str(),
        )
        .unwrap_err();
        assert_eq!(err.names, names(&["nope", "missing"]));
        assert_eq!(err.to_string(), "No test suite found for: nope, missing");
    }

    #[test]
    fn test_vectors_must_exist_somewhere() {
        let a = suite("a", &["one", "two"]);
        let b = suite("b", &["three"]);
        assert!(check_vectors_exist(&[&a, &b], &names(&["ONE", "three"])).is_ok());
        let err = check_vectors_exist(&[&a, &b], &names(&["four"])).unwrap_err();
        assert_eq!(err.to_string(), "No test vector found for: four");
    }

    #[test]
    fn test_plan_honours_only_and_skip() {
        let dummy = suite("dummy", &["one", "two", "three"]);
        let only = names(&["three", "one"]);
        let skip = names(&["one"]);
        let plan = plan_suite(
            &dummy,
            "Dummy",
            VectorFilter {
                only: &only,
                skip: &skip,
            },
            Path::new("resources"),
            Path::new("/tmp/out/dummy"),
            &settings(),
        );

        let selected: Vec<&str> = plan.selected.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(selected, vec!["one", "three"]);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].vector(), "three");
        assert_eq!(
            plan.jobs[0].spec.input_path,
            Path::new("resources/dummy/three/three.bin").to_string_lossy()
        );
    }

    #[test]
    fn test_plan_empty_when_filter_misses_suite() {
        let dummy = suite("dummy", &["one"]);
        let only = names(&["two"]);
        let plan = plan_suite(
            &dummy,
            "Dummy",
            VectorFilter { only: &only, skip: &[] },
            Path::new("resources"),
            Path::new("/tmp/out/dummy"),
            &settings(),
        );
        assert!(plan.is_empty());
        assert!(plan.jobs.is_empty());
    }
}
