mod tracing_events;

pub use tracing_events::TracingEvents;
