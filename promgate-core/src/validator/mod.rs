//! Query validators and the pipeline that runs them.
//!
//! Each [`Validator`] inspects a [`RequestContext`] and either accepts it or
//! returns a [`ValidationError`] naming the reason. Validators carry only
//! their own configuration, so one instance serves every request.
//!
//! # Example
//!
//! ```
//! use promgate_core::context::RequestContext;
//! use promgate_core::validator::ValidationPipeline;
//! use promgate_core::{AllowedSpaces, RulesConfig};
//!
//! let pipeline = ValidationPipeline::standard(&RulesConfig::new(AllowedSpaces::new(["a"])));
//!
//! let ok = RequestContext::new(r#"rate(http_requests_total{space="a"}[5m])"#).unwrap();
//! assert!(pipeline.run(&ok).is_ok());
//!
//! let rejected = RequestContext::new("rate(http_requests_total[5m])").unwrap();
//! assert_eq!(pipeline.run(&rejected).unwrap_err().rule(), "label");
//! ```

mod function_range;
mod label;
mod range_query;
mod time_window;

pub use function_range::FunctionRangeValidator;
pub use label::LabelValidator;
pub use range_query::RangeQueryValidator;
pub use time_window::TimeWindowValidator;

use tracing::debug;

use crate::context::RequestContext;
use crate::error::ValidationError;
use crate::types::RulesConfig;

/// A single semantic rule applied to a query.
pub trait Validator: Send + Sync {
    /// Short, stable name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Checks the request. Must not retain per-request state.
    fn validate(&self, ctx: &RequestContext) -> Result<(), ValidationError>;
}

/// Ordered chain of validators.
///
/// Validators run in registration order; the first rejection stops the chain.
#[derive(Default)]
pub struct ValidationPipeline {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidationPipeline {
    /// Creates an empty pipeline that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the default chain: label, time window, function range, range query.
    pub fn standard(rules: &RulesConfig) -> Self {
        let mut pipeline = Self::new();
        pipeline.register(LabelValidator::new(rules.allowed_spaces.clone()));
        pipeline.register(TimeWindowValidator::new(rules.max_lookback));
        pipeline.register(FunctionRangeValidator::new(rules.max_function_range));
        pipeline.register(RangeQueryValidator::new());
        pipeline
    }

    /// Appends a validator to the end of the chain.
    pub fn register(&mut self, validator: impl Validator + 'static) -> &mut Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Number of registered validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Validator names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    /// Runs every validator against `ctx`, stopping at the first failure.
    pub fn run(&self, ctx: &RequestContext) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if let Err(err) = validator.validate(ctx) {
                debug!(
                    rule = validator.name(),
                    reason = err.reason(),
                    "Query rejected"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("validators", &self.names())
            .finish()
    }
}
