//! Weekly roster cycle.
//!
//! [`WeeklySchedule`] decides when the cycle fires; [`Scheduler`] runs it.

pub mod runner;
pub mod schedule;

pub use runner::{
    CycleReport, DateOutcome, Scheduler, SchedulerState, SchedulerStatus, StatusHandle,
};
pub use schedule::WeeklySchedule;
