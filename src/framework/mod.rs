//! Concurrency building blocks shared by the caches.

mod single_flight;

pub use single_flight::*;
