//! # mountgate-core
//!
//! Builds a host's private mount tree and isolates the process around it.
//!
//! This crate provides:
//! - **System**: the [`HostSystem`](system::HostSystem) seam over every
//!   syscall the launcher issues, with a `nix`-backed implementation and a
//!   recording implementation for dry runs.
//! - **Privilege**: a scoped guard that lowers the effective uid and
//!   restores it on every exit path.
//! - **Filesystem**: `mkdir -p` with mode `0770` and per-rule bind mounts.
//! - **Namespace**: entry into a private mount namespace.
//! - **Isolation**: the ordered protocol tying these together as a typestate
//!   machine, so mounts cannot be issued before isolation and directories
//!   cannot be created after privilege is raised.

pub mod filesystem;
pub mod isolation;
pub mod namespace;
pub mod privilege;
pub mod system;
