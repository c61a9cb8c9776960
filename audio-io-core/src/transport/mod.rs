pub mod adapter;

pub use adapter::{ForwardOutcome, TransportAdapter};
