//! Wire payloads of the error sources watched by fixloop.

pub mod models;
