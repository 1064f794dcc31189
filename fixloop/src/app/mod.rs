//! Application wiring and the loop orchestrator

pub mod events;
pub mod fsm;
pub mod options;
pub mod orchestrator;
pub mod run;
