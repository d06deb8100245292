#![forbid(unsafe_code)]

pub mod blob;
mod record;
pub mod share;

pub use record::{ProductSnapshot, Record};
