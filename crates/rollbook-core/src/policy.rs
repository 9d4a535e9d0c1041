//! Error Severity & Override Disposition
//!
//! Every fallible check in the suite classifies its failures as either
//! fatal or a warning. What happens to a warning is not decided by the
//! code that raised it: it is a pure function of the severity and the
//! caller's [`OverridePolicy`], so batch and interactive callers share
//! one rule instead of re-dispatching on error types.

use serde::{Deserialize, Serialize};

/// How bad a failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The operation cannot proceed: invalid input, unresolvable
    /// conflict, lock exhaustion.
    Fatal,

    /// Recoverable: the caller may elect to proceed anyway.
    Warning,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Warning => "warning",
        }
    }

    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller context for deciding what to do with a warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverridePolicy {
    /// Proceed past warnings without asking.
    pub override_warnings: bool,

    /// A human is present; warnings may prompt for confirmation.
    pub interactive: bool,
}

impl OverridePolicy {
    /// Batch policy: warnings block unless overridden.
    #[must_use]
    pub fn batch(override_warnings: bool) -> Self {
        Self {
            override_warnings,
            interactive: false,
        }
    }

    /// Interactive policy: warnings prompt unless overridden.
    #[must_use]
    pub fn interactive(override_warnings: bool) -> Self {
        Self {
            override_warnings,
            interactive: true,
        }
    }
}

/// What the caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Carry on. `overridden` records that a warning was suppressed, for
    /// reports and audit logs.
    Proceed { overridden: bool },

    /// Ask the operator before carrying on.
    Confirm,

    /// Stop this item.
    Block,
}

impl Disposition {
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Disposition::Block)
    }
}

/// Decide the fate of a failure with the given severity.
///
/// Fatal errors always block. Warnings proceed when the policy overrides
/// them, prompt when the caller is interactive, and otherwise block:
/// an unattended run must not silently skip a check a human would have
/// been asked about.
#[must_use]
pub fn disposition(severity: Severity, policy: OverridePolicy) -> Disposition {
    match severity {
        Severity::Fatal => Disposition::Block,
        Severity::Warning if policy.override_warnings => Disposition::Proceed { overridden: true },
        Severity::Warning if policy.interactive => Disposition::Confirm,
        Severity::Warning => Disposition::Block,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_always_blocks() {
        for policy in [
            OverridePolicy::batch(false),
            OverridePolicy::batch(true),
            OverridePolicy::interactive(false),
            OverridePolicy::interactive(true),
        ] {
            assert_eq!(disposition(Severity::Fatal, policy), Disposition::Block);
        }
    }

    #[test]
    fn test_warning_overridden() {
        assert_eq!(
            disposition(Severity::Warning, OverridePolicy::batch(true)),
            Disposition::Proceed { overridden: true }
        );
        // Override wins even when interactive.
        assert_eq!(
            disposition(Severity::Warning, OverridePolicy::interactive(true)),
            Disposition::Proceed { overridden: true }
        );
    }

    #[test]
    fn test_warning_prompts_when_interactive() {
        assert_eq!(
            disposition(Severity::Warning, OverridePolicy::interactive(false)),
            Disposition::Confirm
        );
    }

    #[test]
    fn test_warning_blocks_in_batch() {
        assert_eq!(
            disposition(Severity::Warning, OverridePolicy::batch(false)),
            Disposition::Block
        );
    }
}
