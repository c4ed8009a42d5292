//! Client side of the btpd IPC channel.
//!
//! The daemon is reached through its Unix socket in the btpd directory:
//! - point operations (add, del, start, stop, rate, die) get a single code
//! - batch queries return one result per target, in target order

pub mod socket;

pub use socket::{Channel, ChannelError};
