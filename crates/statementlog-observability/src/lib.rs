//! statementlog Observability
//!
//! Prometheus metrics for the stream writer.
//!
//! # Usage
//!
//! ```no_run
//! use statementlog_observability::{exporter, metrics};
//!
//! metrics::init();
//! let text = exporter::gather_text().unwrap();
//! ```

pub mod exporter;
pub mod metrics;

pub use exporter::gather_text;
pub use metrics::{init, REGISTRY};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_init_is_safe() {
        init();
        init();
    }

    #[test]
    fn test_registry_accessible() {
        init();
        let _registry = &*REGISTRY;
    }
}
