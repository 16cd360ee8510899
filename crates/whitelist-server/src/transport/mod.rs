//! Inbound transports

pub mod stdio;
