//! Due-time computation.
//!
//! Pure functions of `(Task, TaskState, now)` deciding whether a task is
//! eligible to be enqueued and when it will next become eligible. Recurring
//! tasks are keyed to a fixed origin (the first-execution timestamp) and walk
//! forward in exact interval multiples, so a long outage causes exactly one
//! catch-up run instead of a burst: the current window always starts at the
//! most recent interval boundary at or before `now`.
//!
//! These functions never fail and have no side effects; malformed input
//! degrades to "not due".

use crate::core::task::Task;
use crate::state::TaskState;

/// Fixed polling granularity of the external due-check driver, in seconds.
///
/// Failure retries and first-window due-ness are only observable at this
/// resolution, so next-execution estimates align to it.
pub const CRON_TICK: i64 = 60;

/// Whether `task` is eligible to be enqueued for execution at `now`.
///
/// A task is due when it is enabled, not already queued, and either
/// - has never run and its first execution time has passed, or
/// - is recurring and its most recent execution failed (unconditional retry
///   on the next check, no backoff), or
/// - is recurring and has not yet run within the current interval window.
///
/// A non-recurring task that has run once is never due again.
pub fn is_due(task: &Task, state: &TaskState, now: i64) -> bool {
    if !state.is_enabled() || state.is_queued() {
        return false;
    }
    if !state.has_run() {
        return now > task.first_execution();
    }
    if !task.is_recurring() {
        return false;
    }
    if !state.last_execution_succeeded() {
        return true;
    }
    match window_start(task, now) {
        Some(start) => !state.has_run_since(start),
        None => false,
    }
}

/// The next time `task` shall execute, or `None` if no next execution is
/// expected (disabled, queued, or a one-shot that already ran).
///
/// For a satisfied window this is the start of the following window. For an
/// unsatisfied window — including a failed run awaiting retry — it is the
/// next aligned driver tick at or after `now`, the earliest moment due-ness
/// can be observed.
pub fn due_next(task: &Task, state: &TaskState, now: i64) -> Option<i64> {
    if !state.is_enabled() || state.is_queued() || (!task.is_recurring() && state.has_run()) {
        return None;
    }

    let first = task.first_execution();
    if !state.has_run() && first > now {
        return Some(first);
    }

    if !task.is_recurring() {
        // One-shot whose first execution time has passed: picked up at the
        // next driver tick, aligned to the first-execution origin.
        return next_tick(first, now);
    }

    let start = window_start(task, now)?;
    if state.has_run_since(start) && state.last_execution_succeeded() {
        start.checked_add(task.interval())
    } else {
        next_tick(start, now)
    }
}

/// Start of the interval window containing `now`: the most recent boundary
/// `first + k * interval` at or before `now`.
///
/// Only meaningful for recurring tasks (`interval > 0`). Euclidean division
/// keeps the floor semantics when `now` precedes the origin; arithmetic that
/// would overflow on extreme origins yields `None`, which callers treat as
/// "not due".
fn window_start(task: &Task, now: i64) -> Option<i64> {
    let first = task.first_execution();
    let elapsed_windows = now.checked_sub(first)?.div_euclid(task.interval());
    elapsed_windows
        .checked_mul(task.interval())?
        .checked_add(first)
}

/// The first tick boundary `origin + k * CRON_TICK` at or after `now`, or
/// `None` when the computation would overflow.
///
/// Callers guarantee `origin <= now`.
fn next_tick(origin: i64, now: i64) -> Option<i64> {
    let ticks = now
        .checked_sub(origin)?
        .checked_add(CRON_TICK - 1)?
        .div_euclid(CRON_TICK);
    ticks.checked_mul(CRON_TICK)?.checked_add(origin)
}
