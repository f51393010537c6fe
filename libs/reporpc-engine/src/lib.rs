pub mod error;
pub mod materializer;
pub mod runner;
pub mod router;
pub mod engine;
pub mod dispatcher;

pub use dispatcher::Dispatcher;
pub use engine::{ExecutionEngine, ProcessEngine};
pub use error::{AggregateError, BatchOutcome, ExecError, RequestOutcome};
