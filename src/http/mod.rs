//! Sensor event listener
//!
//! A minimal local HTTP endpoint for the wearable companion:
//! - ANY /heartrate - decode `{"heartrate": <number>}` and forward it to the
//!   registered listener, answering `good` or `bad`
//! - anything else - answered with `good`, no side effects

mod handlers;
mod listener;
mod routes;
mod server;
mod state;

pub use handlers::{decode_heart_rate, ACK_BAD, ACK_GOOD, HEART_RATE_FIELD};
pub use listener::{HeartRateEvent, HeartRateListener, HeartRateRegistry};
pub use routes::{create_router, HEART_RATE_PATH};
pub use server::CollectorServer;
pub use state::ListenerState;
