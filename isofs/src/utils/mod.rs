//! Decoding helpers shared by the on-disk parsers

pub mod bytes;
pub mod datetime;
pub mod string;
