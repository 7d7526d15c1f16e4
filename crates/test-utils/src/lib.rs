//! Shared test fixtures for the cdm-decode workspace.
//!
//! Both decoders read real-world file formats, so their tests run against
//! synthetic files built column-by-column (GHCN-Monthly text pairs) or
//! record-by-record (SIGMET RAW volumes). The builders here produce files
//! with known content that the assertions can be written against exactly.
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod ghcnm;
pub mod sigmet;

pub use ghcnm::*;
pub use sigmet::*;

/// Approximate floating-point equality assertion.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
