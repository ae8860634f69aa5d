//! Small kernel language executed per output pixel.
//!
//! [`generate`] writes the source for a [`ProgramKey`](crate::state::ProgramKey),
//! [`compile`] checks it and [`Machine`] runs it along one ray.

mod ast;
mod compile;
mod exec;
mod generator;
mod parse;

pub use compile::{compile, Program};
pub use exec::{Flow, Machine, Samples};
pub use generator::generate;
