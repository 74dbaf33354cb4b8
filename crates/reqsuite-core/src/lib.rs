//! reqsuite-core: Core types, checks and templating for declarative HTTP test suites
//!
//! This crate holds everything that does not touch the network: the test
//! model and its v1 document parser, the shared data context, request
//! templating, the closed set of response checks, run results and
//! diagnostics, and run configuration.

pub mod check;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod document;
pub mod hook;
pub mod model;
pub mod parse;
pub mod plan;
pub mod query;
pub mod registry;
pub mod result;
pub mod template;

pub use check::{Check, CheckError, CustomBodyCheck};
pub use config::{Config, ConfigError};
pub use context::{DataContext, DataError};
pub use document::{TestDocument, generate_schema};
pub use hook::{HookError, Replacements, RequestHook};
pub use model::{HookInvocation, RequestSpec, ResponseSnapshot, Test};
pub use parse::{DocumentFormat, ParseError, ParseOptions, parse_document, parse_file};
pub use plan::{ExecutionPlan, GroupPlan, OrderPlan, Validation, ValidationStatus};
pub use registry::Registry;
pub use result::{FailureReport, RunResult, RunSummary, TestOutcome};
pub use template::TemplateError;
