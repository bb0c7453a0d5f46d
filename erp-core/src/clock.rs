use chrono::{Local, NaiveDate};

/// Source of "today" for invoice date validation.
///
/// Injected into the invoice service so tests can pin the calendar instead
/// of depending on the wall clock.
pub trait Clock: Send + Sync {
    /// Current date, with no time component.
    fn today(&self) -> NaiveDate;
}

/// Wall-clock implementation using the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a fixed date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
