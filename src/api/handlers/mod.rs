//! API request handlers.

/// Budget status handler.
pub mod budget;
/// Run lifecycle handlers (start, poll, export, cancel).
pub mod runs;
