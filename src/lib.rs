//! Country-data MCP server: a TTL-expiring fetch cache in front of the
//! REST Countries API, exposed as MCP tools over stdio.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod mcp;
pub mod ports;

#[cfg(test)]
pub mod test_helpers;
