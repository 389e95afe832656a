//! Clients for the managed services the tools drive.
//!
//! Each service is a trait so the tool systems can be exercised without the network;
//! the HTTP implementations talk to the managed endpoints named in [`crate::config::PlannerConfig`].
pub mod browser;
pub mod code_interpreter;
pub mod http;
pub mod memory;
pub mod storage;
