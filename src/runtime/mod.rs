//! Process runtime plumbing: OS signals and orderly shutdown.

pub mod signals;
