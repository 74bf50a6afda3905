//! Run reports consumed outside the console: JUnit XML and CI annotations

pub mod ci;
pub mod junit;

pub use ci::CiReporter;
pub use junit::write_junit;
