//! Persistent record of audit runs.

pub mod logger;

pub use logger::EventLog;
