#![warn(missing_docs)]
//! # vectorcheck
//!
//! Conformance testing for video and audio decoders.
//!
//! vectorcheck runs every {decoder × test suite × test vector} combination you
//! select, compares each decoded output checksum (or per-frame checksums)
//! against the expected value recorded in the suite descriptor, and reports:
//! - **Parallel scheduling**: a rayon pool of `-j N` jobs, or an ordered
//!   sequential run that can stop at the first failure
//! - **Process isolation**: each job decodes in its own worker process, so a
//!   crashing or hanging decoder costs one vector, not the run
//! - **Thresholds for CI**: exit code 2 below a success threshold, 3 over a
//!   time threshold
//! - **Reference mode**: record a trusted decoder's output as the new
//!   expected results
//! - **Summaries**: Markdown, CSV, JUnit XML and JSON
//!
//! ## Quick Start
//!
//! ```ignore
//! use vectorcheck::prelude::*;
//!
//! let catalog = SuiteCatalog::load(&["test_suites".into()])?;
//! let registry = DecoderRegistry::builtin().build()?;
//! let outcome = Orchestrator::new(catalog, registry).run(&RunContext {
//!     test_suites: vec!["dummy".to_string()],
//!     isolation: IsolationMode::InProcess,
//!     ..RunContext::default()
//! })?;
//! std::process::exit(outcome.status.code());
//! ```
//!
//! ## Custom Decoders
//!
//! ```ignore
//! struct MyDecoder;
//!
//! impl Decoder for MyDecoder {
//!     fn name(&self) -> &str { "My-H.264" }
//!     fn codec(&self) -> Codec { Codec::H264 }
//!     fn decode(&self, request: &DecodeRequest<'_>) -> Result<DecodedOutput, DecodeError> {
//!         // decode request.input into request.output
//!         # unimplemented!()
//!     }
//! }
//!
//! let code = vectorcheck::run(DecoderRegistry::builtin().with(MyDecoder))?;
//! ```

// Re-export core types
pub use vectorcheck_core::{
    Codec, DecodeError, DecodeRequest, Decoder, DecoderRegistry, ExpectedResult, Job,
    JobOutcome, OutputFormat, RegistryBuilder, SuiteCatalog, TestSuite, TestVector,
    VectorOutcome, VectorRun, decoders,
};

// Re-export IPC types a decoder implementation needs
pub use vectorcheck_ipc::{DecodedOutput, JobReport, JobSpec};

// Re-export the engine
pub use vectorcheck_cli::{
    IsolationMode, Orchestrator, OrchestratorError, RunContext, RunOutcome, RunStatus,
    SuccessThreshold, SuiteRun, ThresholdPolicy, VectorcheckConfig, run,
};

// Re-export summaries
pub use vectorcheck_report::{Report, ResultGlyphs, SummaryFormat, render_summary};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Codec, DecodeError, DecodeRequest, DecodedOutput, Decoder, DecoderRegistry,
        IsolationMode, Orchestrator, RunContext, RunStatus, SuiteCatalog,
    };
}
