use super::listener::HeartRateRegistry;

/// Shared state for listener handlers
#[derive(Clone, Debug, Default)]
pub struct ListenerState {
    /// Consumer slot owned by the wearable session manager
    pub registry: HeartRateRegistry,
}

impl ListenerState {
    pub fn new(registry: HeartRateRegistry) -> Self {
        Self { registry }
    }
}
