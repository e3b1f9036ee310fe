//! Conversion of a re-scan cadence into a recurring trigger
//!
//! The queue runs its handler on a cron-like trigger. [`format_schedule`] turns
//! the configured interval into such an expression, and [`Trigger`] evaluates
//! an expression to find the next instant at which it fires.
//!
//! Expressions have six space separated fields: second, minute, hour,
//! day-of-month, month and day-of-week. Each field is `*`, a fixed value `N`,
//! or a repetition `S/STEP` that matches `S`, `S + STEP`, `S + 2*STEP`, ...

mod format;
mod ticker;
mod trigger;

pub use format::{Schedule, format_schedule};
pub use ticker::run_until_stopped;
pub use trigger::Trigger;
