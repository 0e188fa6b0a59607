//! Indicator set implementations

mod stix;

pub use stix::{extract_host, parse_pattern, IndicatorError, StixIndicators};
