use std::time::Duration;

use crate::context::RequestContext;
use crate::defaults::STEP_BANDS;
use crate::duration::{format_duration, parse_step};
use crate::error::ValidationError;

use super::Validator;

/// Limits the span of a range query according to its step.
///
/// Only applies to range queries that carry a `step`. Bands are checked
/// largest step first; a step below the smallest band is rejected.
#[derive(Debug, Clone)]
pub struct RangeQueryValidator {
    bands: &'static [(Duration, Duration)],
}

impl RangeQueryValidator {
    pub fn new() -> Self {
        Self { bands: STEP_BANDS }
    }

    /// Maximum span allowed for `step`, or `None` if the step is too small.
    pub fn max_span(&self, step: Duration) -> Option<Duration> {
        self.bands
            .iter()
            .find(|(min_step, _)| step >= *min_step)
            .map(|(_, max_span)| *max_span)
    }
}

impl Default for RangeQueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for RangeQueryValidator {
    fn name(&self) -> &'static str {
        "range_query"
    }

    fn validate(&self, ctx: &RequestContext) -> Result<(), ValidationError> {
        let Some(raw_step) = ctx.step().filter(|_| ctx.is_range()) else {
            return Ok(());
        };

        let step = parse_step(raw_step).map_err(|e| {
            ValidationError::new(self.name(), format!("invalid step format: {e}"))
        })?;

        let span = match (ctx.start(), ctx.end()) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        };

        let Some(max_span) = self.max_span(step) else {
            return Err(ValidationError::new(
                self.name(),
                "step must be at least 1 minute",
            ));
        };

        if span > max_span {
            return Err(ValidationError::new(
                self.name(),
                format!(
                    "query range {} exceeds maximum allowed {} for step {}",
                    format_duration(span),
                    format_duration(max_span),
                    format_duration(step)
                ),
            ));
        }

        Ok(())
    }
}
