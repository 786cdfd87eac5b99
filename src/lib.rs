#![doc=include_str!("../README.md")]

mod bitvec;
pub use bitvec::*;
mod state;
pub use state::*;
mod formula;
pub use formula::*;
mod evaluate;
pub use evaluate::*;
mod execution;
pub use execution::*;

pub mod backend;
pub mod ipl;
#[cfg(feature = "sample")]
pub mod sample;
