pub mod constants;
mod timeout;
mod wait;

pub use wait::Backoff;
