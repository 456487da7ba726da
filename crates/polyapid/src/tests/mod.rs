//! Test suites for the polyapi daemon bootstrap.

pub(crate) mod support;
mod unit;
