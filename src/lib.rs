#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::future_not_send,
    clippy::todo,
    clippy::use_self,
    unused_crate_dependencies
)]
#![forbid(unsafe_code)]

// Workaround for "unused crate" lint false positives.
#[cfg(test)]
use criterion as _;
#[cfg(test)]
use tracing_log as _;
#[cfg(test)]
use tracing_subscriber as _;

pub mod balance;

pub mod protocol;

pub mod topic;
