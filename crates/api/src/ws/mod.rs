//! Live canvas updates over WebSocket: the upgrade handler, viewers
//! grouped per canvas, the bus-to-browser forwarder and a ping heartbeat.

mod forwarder;
mod handler;
mod heartbeat;
pub mod manager;

pub use forwarder::EventForwarder;
pub use handler::canvas_ws_handler;
pub use heartbeat::{spawn_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
