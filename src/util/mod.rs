pub mod backoff;
pub mod backpressure;

pub use backoff::Backoff;
pub use backpressure::BackpressureController;
