//! Checked special functions and the thread-local policy that governs them.
//!
//! The default policy is [`NumericPolicy::Strict`]: a non-finite result of
//! `exp` or `sqrt` becomes a [`SimError::Numerical`]. A
//! [`NumericErrorScope`] installs a policy for the current thread and puts
//! the previous one back when dropped.

use std::cell::Cell;

use crate::errors::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPolicy {
    /// Non-finite results are errors.
    #[default]
    Strict,
    /// Non-finite results are returned unchanged.
    Permissive,
}

thread_local! {
    static POLICY: Cell<NumericPolicy> = const { Cell::new(NumericPolicy::Strict) };
}

/// Policy in force on the current thread.
pub fn current_policy() -> NumericPolicy {
    POLICY.with(|p| p.get())
}

/// RAII guard installing a [`NumericPolicy`] on the current thread.
#[derive(Debug)]
#[must_use = "the policy is reverted as soon as the scope is dropped"]
pub struct NumericErrorScope {
    previous: NumericPolicy,
}

impl NumericErrorScope {
    pub fn new(policy: NumericPolicy) -> Self {
        let previous = POLICY.with(|p| p.replace(policy));
        Self { previous }
    }

    pub fn strict() -> Self {
        Self::new(NumericPolicy::Strict)
    }
}

impl Drop for NumericErrorScope {
    fn drop(&mut self) {
        POLICY.with(|p| p.set(self.previous));
    }
}

fn check(context: &'static str, op: &str, input: f64, value: f64) -> Result<f64, SimError> {
    if value.is_finite() || current_policy() == NumericPolicy::Permissive {
        Ok(value)
    } else {
        Err(SimError::numerical(
            context,
            format!("{op}({input}) returned {value}"),
        ))
    }
}

/// `exp(x)`, failing on a non-finite result.
pub fn checked_exp(context: &'static str, x: f64) -> Result<f64, SimError> {
    check(context, "exp", x, x.exp())
}

/// `sqrt(x)`, failing on a non-finite result (including negative input).
pub fn checked_sqrt(context: &'static str, x: f64) -> Result<f64, SimError> {
    check(context, "sqrt", x, x.sqrt())
}
