//! fixloop library
//!
//! Deploys a build, watches it for runtime errors, generates and applies
//! fixes, and repeats until the deployment is clean or the safety budget
//! runs out.

pub mod app;
pub mod apply;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod fixgen;
pub mod http;
pub mod logs;
pub mod models;
pub mod monitor;
pub mod server;
pub mod storage;
pub mod utils;
