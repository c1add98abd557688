use std::sync::Arc;

use promql_parser::label::{MatchOp, Matcher};

use crate::context::RequestContext;
use crate::defaults::SPACE_LABEL;
use crate::error::ValidationError;
use crate::expr::{self, Node, match_op_symbol};
use crate::types::AllowedSpaces;

use super::Validator;

/// Outcome of checking one selector's `space` restriction.
#[derive(Debug)]
enum SpaceCheck {
    /// The selector has no `space` matcher at all.
    Missing,
    /// An equality or regex matcher was checked against the allowed set.
    Checked {
        value: String,
        op: &'static str,
        allowed: bool,
    },
}

/// Requires every selector to restrict the `space` label to allowed values.
///
/// Equality matchers must name an allowed value. Regex matchers are split on
/// `|` and every alternative must be allowed. Negative matchers are not
/// checked but do not count as a restriction on their own.
#[derive(Debug, Clone)]
pub struct LabelValidator {
    allowed: Arc<AllowedSpaces>,
}

impl LabelValidator {
    pub fn new(allowed: Arc<AllowedSpaces>) -> Self {
        Self { allowed }
    }

    fn check_regex(&self, pattern: &str) -> bool {
        pattern.split('|').all(|value| self.allowed.contains(value))
    }

    fn check_group(&self, matchers: &[Matcher], checks: &mut Vec<SpaceCheck>) {
        let mut found = false;
        for matcher in matchers.iter().filter(|m| m.name == SPACE_LABEL) {
            found = true;
            let allowed = match &matcher.op {
                MatchOp::Equal => self.allowed.contains(&matcher.value),
                MatchOp::Re(_) => self.check_regex(&matcher.value),
                MatchOp::NotEqual | MatchOp::NotRe(_) => continue,
            };
            checks.push(SpaceCheck::Checked {
                value: matcher.value.clone(),
                op: match_op_symbol(&matcher.op),
                allowed,
            });
        }

        if !found {
            checks.push(SpaceCheck::Missing);
        }
    }
}

impl Validator for LabelValidator {
    fn name(&self) -> &'static str {
        "label"
    }

    fn validate(&self, ctx: &RequestContext) -> Result<(), ValidationError> {
        let mut checks = Vec::new();

        expr::inspect(ctx.expr(), |node, _| {
            let Node::Selector(vs) = node else {
                return;
            };

            // `{a="x" or b="y"}` matches either group, so each must be restricted.
            if vs.matchers.or_matchers.is_empty() {
                self.check_group(&vs.matchers.matchers, &mut checks);
            } else {
                for group in &vs.matchers.or_matchers {
                    self.check_group(group, &mut checks);
                }
            }
        });

        if checks.is_empty() {
            return Err(ValidationError::new(
                self.name(),
                "query must contain at least one metric with a 'space' label",
            ));
        }

        for check in checks {
            match check {
                SpaceCheck::Missing => {
                    return Err(ValidationError::new(
                        self.name(),
                        "all metrics in the query must have a 'space' label",
                    ));
                }
                SpaceCheck::Checked {
                    value,
                    op,
                    allowed: false,
                } => {
                    return Err(ValidationError::new(
                        self.name(),
                        format!("space values {value} with matcher {op} are not allowed"),
                    ));
                }
                SpaceCheck::Checked { .. } => {}
            }
        }

        Ok(())
    }
}
