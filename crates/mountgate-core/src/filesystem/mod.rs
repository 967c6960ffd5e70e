//! Filesystem work for the mount tree.
//!
//! Directory creation runs at lowered privilege before the namespace is
//! entered; bind mounts run afterwards, inside it.

pub mod dirs;
pub mod mount;
