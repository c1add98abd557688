use std::time::Duration;

use promql_parser::parser::{Call, Expr};

use crate::context::RequestContext;
use crate::duration::format_duration;
use crate::error::ValidationError;
use crate::expr::{self, Node};

use super::Validator;

const INCREASE: &str = "increase";
const OVER_TIME_SUFFIX: &str = "_over_time";

/// Caps the range-vector window of `increase` and every `*_over_time` function.
///
/// Every offending call is reported, joined into one message.
#[derive(Debug, Clone)]
pub struct FunctionRangeValidator {
    max_range: Duration,
}

impl FunctionRangeValidator {
    pub fn new(max_range: Duration) -> Self {
        Self { max_range }
    }

    fn is_tracked(name: &str) -> bool {
        name == INCREASE || name.ends_with(OVER_TIME_SUFFIX)
    }

    fn check_call(&self, call: &Call) -> Option<String> {
        let name = call.func.name;
        let Some(first) = call.args.args.first() else {
            return Some(format!("{name} function requires arguments"));
        };

        // Only a literal range selector has a window to check.
        let Expr::MatrixSelector(ms) = &**first else {
            return None;
        };

        (ms.range > self.max_range).then(|| {
            format!(
                "{name} function time range {} cannot exceed {}",
                format_duration(ms.range),
                format_duration(self.max_range)
            )
        })
    }
}

impl Validator for FunctionRangeValidator {
    fn name(&self) -> &'static str {
        "function_range"
    }

    fn validate(&self, ctx: &RequestContext) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        expr::inspect(ctx.expr(), |node, _| {
            if let Node::Call(call) = node
                && Self::is_tracked(call.func.name)
                && let Some(err) = self.check_call(call)
            {
                errors.push(err);
            }
        });

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(
                self.name(),
                format!("function validation errors: {}", errors.join("; ")),
            ))
        }
    }
}
