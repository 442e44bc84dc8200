#![cfg_attr(not(any(test, doctest, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

extern crate alloc;

mod atan2;
pub use atan2::*;
mod packet;
pub use packet::*;
mod frame;
pub use frame::*;
mod pipeline;
pub use pipeline::*;

#[cfg(feature = "std")]
mod replay;
#[cfg(feature = "std")]
pub use replay::*;
#[cfg(feature = "std")]
mod bench;
#[cfg(feature = "std")]
pub use bench::*;

#[cfg(test)]
pub mod testing;
