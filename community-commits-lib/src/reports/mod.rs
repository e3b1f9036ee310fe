//! Rendering of aggregated network activity
//!
//! Two generators are provided, each accessed through a `generate` function:
//! - **HTML**: Self-contained document with embedded CSS and dark mode
//! - **JSON**: Machine-readable structured data
//!
//! Both operate on the output of [`crate::aggregate::Aggregator::aggregate`]: a
//! slice of [`DatedPushEvents`](crate::aggregate::DatedPushEvents), newest day
//! first. Generators write into any [`core::fmt::Write`] so they can be tested
//! against a `String`; [`ReportTargets`] takes care of putting the result on disk.

mod html;
mod json;
mod targets;

pub use html::generate as generate_html;
pub use json::generate as generate_json;
pub use targets::ReportTargets;
