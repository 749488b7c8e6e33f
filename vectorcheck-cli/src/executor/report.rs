//! Report Building
//!
//! Projects finished [`SuiteRun`]s into the serializable [`Report`] consumed
//! by the summary renderers. Runs of the same suite are grouped together,
//! keeping the order in which suites first ran.

use super::aggregation::SuiteRun;
use super::metadata::build_report_meta;
use vectorcheck_core::{FailureRecord, VectorOutcome, VectorRun};
use vectorcheck_report::{
    DecoderRun, FailureInfo, Report, ReportConfig, ReportSummary, SuiteReport, VectorReport,
    VectorStatus,
};

fn status_of(outcome: VectorOutcome) -> VectorStatus {
    match outcome {
        VectorOutcome::NotRun => VectorStatus::NotRun,
        VectorOutcome::Success => VectorStatus::Success,
        VectorOutcome::Fail => VectorStatus::Fail,
        VectorOutcome::Timeout => VectorStatus::Timeout,
        VectorOutcome::Error => VectorStatus::Error,
        VectorOutcome::Reference => VectorStatus::Reference,
    }
}

fn failure_info(record: &FailureRecord) -> FailureInfo {
    FailureInfo {
        title: record.title.clone(),
        detail: record.detail.clone(),
    }
}

fn vector_report(run: &VectorRun) -> VectorReport {
    VectorReport {
        name: run.name.clone(),
        status: status_of(run.outcome),
        elapsed_secs: run.elapsed.as_secs_f64(),
        failures: run.errors.iter().map(failure_info).collect(),
    }
}

fn decoder_run(run: &SuiteRun) -> DecoderRun {
    DecoderRun {
        decoder: run.decoder.clone(),
        success_count: run.success_count,
        total: run.vectors.len(),
        elapsed_secs: run.elapsed.as_secs_f64(),
        jobs: run.jobs,
        vectors: run.vectors.iter().map(vector_report).collect(),
    }
}

/// Build a complete Report from finished runs
pub fn build_report(runs: &[SuiteRun], config: ReportConfig) -> Report {
    let mut suites: Vec<SuiteReport> = Vec::new();
    for run in runs {
        match suites.iter_mut().find(|s| s.name == run.suite) {
            Some(suite) => suite.decoders.push(decoder_run(run)),
            None => suites.push(SuiteReport {
                name: run.suite.clone(),
                codec: run.codec.to_string(),
                decoders: vec![decoder_run(run)],
            }),
        }
    }

    let summary = ReportSummary::from_suites(&suites);
    Report {
        meta: build_report_meta(config),
        suites,
        summary,
    }
}
