//! Core primitives for the protocol

#![no_std]
#![warn(rust_2018_idioms, missing_debug_implementations, missing_docs)]

pub mod hashes;
pub mod tick;
pub mod validator;
