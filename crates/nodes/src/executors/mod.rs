//! Built-in executor family (component D).
//!
//! Every executor here is a black box to the scheduler: it implements
//! [`crate::Executor`] and is registered under a `node_type` string by
//! whoever assembles the process's [`crate::ExecutorRegistry`] (typically the
//! `cli` crate at startup). The engine crate never imports these modules
//! directly.

pub mod conditional;
pub mod file_storage;
pub mod function_call;
pub mod http;
pub mod merge;
pub mod transform;
