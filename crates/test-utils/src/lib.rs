//! Shared test utilities for the WFS workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-memory [`AreaBackend`](wfs_common::AreaBackend) with failure
//!   injection and a call log
//! - WKT / GML fixtures
//! - Approximate float assertions for coordinates
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, InMemoryAreaBackend};
//! ```

pub mod fixtures;
pub mod memory_backend;

pub use fixtures::*;
pub use memory_backend::{BackendCall, InMemoryAreaBackend};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
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

/// Macro for approximate equality of two sequences of coordinates.
///
/// Works on anything iterable whose items have `x` and `y` fields, such as
/// `&[wfs_common::Coord]`.
#[macro_export]
macro_rules! assert_coords_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: Vec<_> = $left.iter().collect();
        let right: Vec<_> = $right.iter().collect();
        assert_eq!(left.len(), right.len(), "coordinate counts differ");
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(l.x, r.x, $epsilon);
            $crate::assert_approx_eq!(l.y, r.y, $epsilon);
        }
    }};
}
