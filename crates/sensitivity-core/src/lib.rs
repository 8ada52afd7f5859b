pub mod clients;
pub mod config;
pub mod error;
pub mod notify;
pub mod policy;
pub mod request;
pub mod saga;
pub mod step;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use error::{ClientError, ClientResult, Result, SensitivityError};
pub use saga::{Orchestrator, SagaState, WorkflowOutcome};
