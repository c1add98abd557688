use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::context::RequestContext;
use crate::duration::format_duration;
use crate::error::ValidationError;

use super::Validator;

/// Source of the current time.
pub type Clock = fn() -> DateTime<Utc>;

/// Rejects queries whose `start` or `time` reaches further back than the
/// configured lookback. `end` is not checked.
#[derive(Debug, Clone)]
pub struct TimeWindowValidator {
    max_lookback: Duration,
    clock: Clock,
}

impl TimeWindowValidator {
    pub fn new(max_lookback: Duration) -> Self {
        Self::with_clock(max_lookback, Utc::now)
    }

    /// Creates a validator reading the current time from `clock`.
    pub fn with_clock(max_lookback: Duration, clock: Clock) -> Self {
        Self {
            max_lookback,
            clock,
        }
    }

    /// Earliest accepted instant.
    fn lower_bound(&self) -> DateTime<Utc> {
        let now = (self.clock)();
        TimeDelta::from_std(self.max_lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Validator for TimeWindowValidator {
    fn name(&self) -> &'static str {
        "time_window"
    }

    fn validate(&self, ctx: &RequestContext) -> Result<(), ValidationError> {
        let bound = self.lower_bound();
        let window = format_duration(self.max_lookback);

        if ctx.start().is_some_and(|start| start < bound) {
            return Err(ValidationError::new(
                self.name(),
                format!("start time must be within {window} from now"),
            ));
        }

        if ctx.time().is_some_and(|time| time < bound) {
            return Err(ValidationError::new(
                self.name(),
                format!("timestamp must be within {window} from now"),
            ));
        }

        Ok(())
    }
}
