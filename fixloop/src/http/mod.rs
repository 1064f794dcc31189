//! HTTP clients for source APIs

pub mod ci;
pub mod client;
pub mod logs;
pub mod replay;
pub mod tracker;
