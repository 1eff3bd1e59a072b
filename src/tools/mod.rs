//! Tools exposed to the agent host
//!
//! Every tool is a descriptor plus an external command. Requests are bound
//! against the descriptor, turned into a command line, run, and reported back
//! as text.

pub mod adapter;
pub mod catalog;
pub mod command;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod schema;

pub use command::CommandLine;
pub use protocol::{InvocationResult, ToolRequest, ToolResponse};
pub use registry::ToolRegistry;
