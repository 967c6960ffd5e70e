//! Linux namespace management for the launcher.
//!
//! Only the mount namespace is isolated: the filesystem server must keep
//! the host's network, PID, and user view.

pub mod mount;
