//! vectorcheck core
//!
//! The pieces a decoder conformance run is made of:
//! - [`TestSuite`] descriptors and the [`SuiteCatalog`] that loads them
//! - the [`Decoder`] capability and an explicit [`DecoderRegistry`]
//! - [`Job`]s, in-process execution ([`run_job`]) and verdicts ([`judge`])
//! - the worker-process main loop ([`WorkerMain`])

pub mod codec;
pub mod decoder;
pub mod decoders;
pub mod job;
pub mod process;
pub mod suite;
pub mod vector;
mod worker;

pub use codec::{Codec, OutputFormat};
pub use decoder::{
    DecodeError, DecodeRequest, Decoder, DecoderRegistry, RegisteredDecoder, RegistryBuilder,
    RegistryError,
};
pub use job::{Job, JobOutcome, JobSettings, judge, run_job};
pub use suite::{CatalogError, SuiteCatalog, TestSuite, split_path_list};
pub use vector::{ExpectedResult, FailureRecord, TestVector, VectorOutcome, VectorRun};
pub use worker::WorkerMain;
