use onboard_calendar::CalendarAction;
use onboard_core::domain::permission::{Capability, PermissionLevel};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

/// Gate in front of every calendar tool. With `enforce_permissions` off, only the prompt
/// directive restricts the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub enforce_permissions: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { enforce_permissions: true }
    }
}

pub fn required_capability(action: CalendarAction) -> Capability {
    match action {
        CalendarAction::List => Capability::Read,
        CalendarAction::Create => Capability::Create,
        CalendarAction::Edit => Capability::Update,
        CalendarAction::Delete => Capability::Delete,
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, level: PermissionLevel, action: CalendarAction) -> GuardrailDecision {
        let capability = required_capability(action);
        if level.capabilities().allows(capability) {
            return GuardrailDecision::Allow;
        }

        if !self.enforce_permissions {
            tracing::warn!(
                event_name = "guardrail.advisory_only",
                level = level.as_str(),
                action = action.as_str(),
                "capability missing but enforcement is disabled"
            );
            return GuardrailDecision::Allow;
        }

        GuardrailDecision::Deny {
            reason_code: match action {
                CalendarAction::List => "calendar_read_not_permitted",
                CalendarAction::Create => "calendar_create_not_permitted",
                CalendarAction::Edit => "calendar_update_not_permitted",
                CalendarAction::Delete => "calendar_delete_not_permitted",
            },
            user_message: format!(
                "Permission error: your permission level ({level}) does not allow you to {action} \
                 calendar events. Log in again with a permission level that includes this \
                 operation."
            ),
            fallback_path: "login_with_wider_permission",
        }
    }
}

#[cfg(test)]
mod tests {
    use onboard_calendar::CalendarAction;
    use onboard_core::domain::permission::PermissionLevel;

    use super::{GuardrailDecision, GuardrailPolicy};

    #[test]
    fn every_level_is_gated_by_its_capabilities() {
        let policy = GuardrailPolicy::default();
        let actions =
            [CalendarAction::List, CalendarAction::Create, CalendarAction::Edit, CalendarAction::Delete];
        let expected = [
            (PermissionLevel::Readonly, [true, false, false, false]),
            (PermissionLevel::ReadUpdate, [true, false, true, false]),
            (PermissionLevel::ReadCreateUpdate, [true, true, true, false]),
            (PermissionLevel::FullAccess, [true, true, true, true]),
        ];

        for (level, allowed) in expected {
            for (action, allowed) in actions.iter().zip(allowed) {
                let decision = policy.evaluate(level, *action);
                assert_eq!(
                    decision == GuardrailDecision::Allow,
                    allowed,
                    "{level} / {action}"
                );
            }
        }
    }

    #[test]
    fn denial_explains_the_missing_capability() {
        let decision =
            GuardrailPolicy::default().evaluate(PermissionLevel::Readonly, CalendarAction::Delete);

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Deny { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            GuardrailDecision::Allow => ("", String::new(), ""),
        };

        assert_eq!(reason_code, "calendar_delete_not_permitted");
        assert!(user_message.starts_with("Permission error"));
        assert!(user_message.contains("readonly"));
        assert_eq!(fallback_path, "login_with_wider_permission");
    }

    #[test]
    fn advisory_mode_allows_everything() {
        let policy = GuardrailPolicy { enforce_permissions: false };

        assert_eq!(
            policy.evaluate(PermissionLevel::Readonly, CalendarAction::Delete),
            GuardrailDecision::Allow
        );
    }
}
