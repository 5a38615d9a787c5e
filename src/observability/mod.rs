//! Observability: structured logging lives in `main` (tracing init),
//! metrics exposition here.

pub mod metrics;
