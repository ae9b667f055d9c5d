pub mod collections;
pub mod history;
pub mod parser;
pub mod providers;
pub mod recommendations;
pub mod report;
pub mod request_forwarder;
pub mod retry;
pub mod workflow;

pub use workflow::{Workflow, WorkflowOptions};
