pub mod brownfield_config;
pub mod checkpoint;
pub mod errors;
pub mod gates;
pub mod init;
pub mod language;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod state;
pub mod tools;
pub mod tracker;
pub mod util;
