//! Kirha MCP Gateway.
//!
//! A Model Context Protocol server that exposes the Kirha search/planning API
//! as MCP tools, over stdio or streamable HTTP. The HTTP transport multiplexes
//! concurrent sessions over one listener and supports resumable event streams.

pub mod config;
pub mod http;
pub mod session;
pub mod stdio;
pub mod tools;
