//! # mountgate-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire mountgate workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives (mount rules, hostnames,
//! runtime paths) that the parser, the isolation core, and the CLI share.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
