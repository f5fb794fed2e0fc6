//! Core modules for the prop runtime

pub mod sensors;
pub mod outputs;
pub mod bridge;
pub mod status;
pub mod controller;
pub mod api;

pub use sensors::{SensorEngine, SensorEvent};
pub use outputs::OutputController;
pub use bridge::{parse_command, Channel, NetworkBridge, Topics};
pub use status::StatusPublisher;
pub use controller::PropController;
pub use api::{create_router, run_server};
