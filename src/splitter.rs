//! Adaptive range splitting
//!
//! The portal silently truncates any result at the cap. The only trustworthy signal is
//! "count below cap means complete", so a window reporting at or above the cap is
//! halved until it drops below, and the day is walked left to right from there.
//!
//! [`RangeSplitter`] is the pure state machine: it hands out the next window to probe
//! and consumes the probe's count. [`split_day`] drives it with an async probe.

use std::future::Future;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{ProbeCount, WindowReport};
use crate::window::{DAY_SECONDS, QueryWindow};

/// What the splitter did with a probe result
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The count was below the cap; the window is complete
    Accepted(WindowReport),
    /// A single-second window reported at or above the cap and was accepted anyway
    Overflow(WindowReport),
    /// The window was halved; probe [`RangeSplitter::current`] again
    Narrowed,
}

/// Bisection state for one calendar day
#[derive(Clone, Debug)]
pub struct RangeSplitter {
    window: QueryWindow,
    cap: usize,
    done: bool,
}

impl RangeSplitter {
    /// Start at the full-day window
    pub fn new(day: NaiveDate, cap: usize) -> Self {
        Self {
            window: QueryWindow::full_day(day),
            cap,
            done: false,
        }
    }

    /// Window to probe next, or `None` once the day is covered
    pub fn current(&self) -> Option<QueryWindow> {
        (!self.done).then_some(self.window)
    }

    /// Whether every second of the day has been accepted
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed the count for [`current`](Self::current) and advance.
    ///
    /// `Unknown` counts as "at or above the cap".
    pub fn record(&mut self, count: ProbeCount) -> Result<Decision> {
        if self.done {
            return Err(Error::Other("day already covered".to_string()));
        }
        let window = self.window;

        if count.is_below(self.cap) {
            self.advance_past(window)?;
            return Ok(Decision::Accepted(WindowReport {
                window,
                count,
                overflow: false,
            }));
        }

        if window.is_single_second() {
            self.advance_past(window)?;
            return Ok(Decision::Overflow(WindowReport {
                window,
                count,
                overflow: true,
            }));
        }

        let start = window.start();
        let mid = start + (window.end() - start) / 2;
        self.window = QueryWindow::new(window.day(), start, mid)?;
        Ok(Decision::Narrowed)
    }

    fn advance_past(&mut self, accepted: QueryWindow) -> Result<()> {
        if accepted.reaches_end_of_day() {
            self.done = true;
        } else {
            self.window = QueryWindow::new(accepted.day(), accepted.end() + 1, DAY_SECONDS)?;
        }
        Ok(())
    }
}

/// A window accepted by [`split_day`], with whatever the probe produced for it
#[derive(Clone, Debug)]
pub struct AcceptedWindow<T> {
    /// Window, count and overflow flag
    pub report: WindowReport,
    /// Probe output for the accepted window
    pub payload: T,
}

/// Result of splitting one day
#[derive(Clone, Debug)]
pub struct DaySplit<T> {
    /// Accepted windows in day order
    pub windows: Vec<AcceptedWindow<T>>,
    /// Number of probes issued
    pub probes: usize,
}

/// Cover `day` with windows whose probed count is below `cap`.
///
/// `probe` returns the count for a window plus a payload kept for accepted windows.
/// `on_accept` sees every accepted window as it is accepted. A probe error aborts the
/// day with [`Error::DayFailed`] naming the window being probed.
pub async fn split_day<T, P, Fut>(
    day: NaiveDate,
    cap: usize,
    mut probe: P,
    mut on_accept: impl FnMut(&WindowReport),
) -> Result<DaySplit<T>>
where
    P: FnMut(QueryWindow) -> Fut,
    Fut: Future<Output = Result<(ProbeCount, T)>>,
{
    let mut splitter = RangeSplitter::new(day, cap);
    let mut windows = Vec::new();
    let mut probes = 0;

    while let Some(window) = splitter.current() {
        probes += 1;
        let (count, payload) = probe(window).await.map_err(|e| Error::DayFailed {
            day,
            window,
            source: Box::new(e),
        })?;

        match splitter.record(count)? {
            Decision::Narrowed => {
                debug!(%day, start = window.start(), end = window.end(), %count, "narrowing window");
            }
            Decision::Accepted(report) => {
                debug!(%day, start = window.start(), end = window.end(), %count, "window accepted");
                on_accept(&report);
                windows.push(AcceptedWindow { report, payload });
            }
            Decision::Overflow(report) => {
                warn!(%day, window = %window, %count, "single-second window at cap, results may be truncated");
                on_accept(&report);
                windows.push(AcceptedWindow { report, payload });
            }
        }
    }

    Ok(DaySplit { windows, probes })
}
