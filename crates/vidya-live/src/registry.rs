use crate::transport::LiveTransport;
use std::collections::HashMap;
use vidya_core::SessionError;

pub struct TransportRegistry {
    factories: HashMap<String, fn() -> Box<dyn LiveTransport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", || Box::new(crate::null_transport::NullTransport::new()));
        registry.register("websocket", || {
            Box::new(crate::websocket::WebSocketTransport::new())
        });
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Box<dyn LiveTransport>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn LiveTransport>, SessionError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| SessionError::TransportNotFound(name.to_string()))
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}
