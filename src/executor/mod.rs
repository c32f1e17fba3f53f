pub mod dispatcher;

pub use dispatcher::{ActionExecutor, ExecutionOutcome};
