//! reqsuite-runner: bounded concurrent execution of HTTP test suites

pub mod dispatcher;
pub mod execute;
pub mod index;
pub mod limiter;
pub mod tally;

pub use dispatcher::{Runner, RunnerError, build_client};
pub use execute::{ExecutionError, run_test};
pub use index::{GroupBucket, GroupFilter, GroupIndex, Grouped};
pub use tally::FailurePolicy;
