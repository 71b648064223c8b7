pub mod config;
pub mod countdown;
pub mod gate;
pub mod session;
pub mod telemetry;
