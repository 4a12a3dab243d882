use rust_decimal::Decimal;

use crate::{
    domain::{Capability, Role},
    overdue::OverdueStatus,
};

/// Member actions that are refused while access is restricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedAction {
    SubmitBookRequest,
    ApplyEducationalSupport,
    WelfareContribution,
    EducationalContribution,
}

impl ProtectedAction {
    pub fn label(self) -> &'static str {
        match self {
            ProtectedAction::SubmitBookRequest => "submit a book request",
            ProtectedAction::ApplyEducationalSupport => "apply for educational support",
            ProtectedAction::WelfareContribution => "make a welfare contribution",
            ProtectedAction::EducationalContribution => "make an educational contribution",
        }
    }
}

/// The only two ways out of a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    ViewOverdues,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The backend flagged the member as restricted.
    Restricted,
    /// Standing could not be loaded and the gate is configured to fail closed.
    StatusUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub action: ProtectedAction,
    pub reason: DenialReason,
    pub overdue_count: u32,
    pub total_overdue_amount: Decimal,
}

impl Denial {
    pub fn choices(&self) -> [ResolutionChoice; 2] {
        [ResolutionChoice::ViewOverdues, ResolutionChoice::Cancel]
    }

    pub fn message(&self) -> String {
        match self.reason {
            DenialReason::Restricted => format!(
                "You have {} overdue payment(s) totalling ₹{}. Please clear them to {}.",
                self.overdue_count, self.total_overdue_amount, self.action.label()
            ),
            DenialReason::StatusUnavailable => format!(
                "We could not confirm your payment status. Please check your overdues before you {}.",
                self.action.label()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allow,
    Deny(Denial),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Decides whether a protected action may proceed. Consult it before
/// creating anything for the action.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate {
    fail_closed_on_unknown: bool,
}

impl AccessGate {
    pub fn new(fail_closed_on_unknown: bool) -> Self {
        Self { fail_closed_on_unknown }
    }

    pub fn decide(
        &self,
        role: Option<Role>,
        status: &OverdueStatus,
        action: ProtectedAction,
    ) -> GateDecision {
        if role.is_some_and(|r| r.can(Capability::OverdueExempt)) {
            return GateDecision::Allow;
        }

        match status {
            OverdueStatus::Loaded(summary) if summary.restricted_access => {
                GateDecision::Deny(Denial {
                    action,
                    reason: DenialReason::Restricted,
                    overdue_count: summary.overdue_count,
                    total_overdue_amount: summary.total_overdue_amount,
                })
            }
            OverdueStatus::Failed if self.fail_closed_on_unknown => GateDecision::Deny(Denial {
                action,
                reason: DenialReason::StatusUnavailable,
                overdue_count: 0,
                total_overdue_amount: Decimal::ZERO,
            }),
            _ => GateDecision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OverdueSummary;

    fn summary(restricted: bool, count: u32) -> OverdueSummary {
        OverdueSummary {
            member_id: "m-1".into(),
            has_overdue: count > 0,
            overdue_count: count,
            total_overdue_amount: Decimal::new(75000, 2),
            oldest_overdue_days: 31,
            restricted_access: restricted,
            overdue_items: Vec::new(),
        }
    }

    #[test]
    fn restricted_member_is_denied_with_two_choices() {
        let gate = AccessGate::default();
        let status = OverdueStatus::Loaded(summary(true, 2));

        let GateDecision::Deny(denial) =
            gate.decide(Some(Role::Member), &status, ProtectedAction::SubmitBookRequest)
        else {
            panic!("expected denial");
        };
        assert_eq!(denial.reason, DenialReason::Restricted);
        assert_eq!(denial.choices(), [ResolutionChoice::ViewOverdues, ResolutionChoice::Cancel]);
        assert!(denial.message().contains("750.00"));
    }

    #[test]
    fn minor_overdue_without_restriction_is_allowed() {
        let gate = AccessGate::default();
        let status = OverdueStatus::Loaded(summary(false, 1));
        assert!(gate
            .decide(Some(Role::Member), &status, ProtectedAction::WelfareContribution)
            .is_allowed());
    }

    #[test]
    fn admins_are_never_gated() {
        let gate = AccessGate::new(true);
        let status = OverdueStatus::Loaded(summary(true, 3));
        assert!(gate
            .decide(Some(Role::Admin), &status, ProtectedAction::ApplyEducationalSupport)
            .is_allowed());
    }

    #[test]
    fn failed_status_follows_policy() {
        let action = ProtectedAction::SubmitBookRequest;
        assert!(AccessGate::new(false)
            .decide(Some(Role::Member), &OverdueStatus::Failed, action)
            .is_allowed());

        let decision = AccessGate::new(true).decide(Some(Role::Member), &OverdueStatus::Failed, action);
        assert!(matches!(
            decision,
            GateDecision::Deny(Denial { reason: DenialReason::StatusUnavailable, .. })
        ));
    }

    #[test]
    fn nothing_loaded_is_allowed() {
        assert!(AccessGate::new(true)
            .decide(Some(Role::Member), &OverdueStatus::NotLoaded, ProtectedAction::SubmitBookRequest)
            .is_allowed());
    }
}
