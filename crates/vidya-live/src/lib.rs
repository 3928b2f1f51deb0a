pub mod controller;
pub mod null_transport;
pub mod protocol;
pub mod registry;
pub mod transport;
pub mod websocket;

pub use controller::SessionController;
pub use null_transport::NullTransport;
pub use protocol::{ClientMessage, RealtimeInput, ServerMessage};
pub use registry::TransportRegistry;
pub use transport::{LiveTransport, TransportEvent};
pub use websocket::WebSocketTransport;
