//! Instructions and input envelopes for the pipeline's agents.

use chrono::{DateTime, FixedOffset};

use onboard_core::clock::format_local;
use onboard_core::config::AssistantConfig;
use onboard_core::domain::permission::{Capability, PermissionLevel};

pub const CALENDAR_LABEL: &str = "Calendar";
pub const HELP_LABEL: &str = "Help";
pub const VALID_MARKER: &str = "Valid response";
pub const REVISED_MARKER: &str = "Revised text:";
pub const EMAIL_NOT_FOUND: &str = "Could not find the email of one of the participants.";
pub const FALLBACK_REPLY: &str = "Could not answer this request. Please try again.";
pub const EMPTY_MESSAGE_REPLY: &str =
    "Hello! Ask me anything about the company, its tools, or your calendar.";

fn technologies(assistant: &AssistantConfig) -> String {
    if assistant.allowed_technologies.is_empty() {
        "the tools the company has adopted".to_string()
    } else {
        assistant.allowed_technologies.join(", ")
    }
}

fn policy_rules(assistant: &AssistantConfig) -> String {
    format!(
        "1. It must not reference companies other than {company}.\n\
         2. It must not mention technologies outside this list: {tech}.\n\
         3. It must not include sensitive or confidential information.\n\
         4. It must not contain hate speech or offensive language.",
        company = assistant.company_name,
        tech = technologies(assistant),
    )
}

pub fn classifier_instructions(assistant: &AssistantConfig) -> String {
    format!(
        "You route messages from employees of {company} during onboarding.\n\
         Reply with exactly `{CALENDAR_LABEL}` when the message asks to see, schedule, change or \
         cancel meetings or events.\n\
         Reply with exactly `{HELP_LABEL}` when the message asks about the company, its culture, \
         policies, programs or work tools.\n\
         Otherwise answer the message yourself, briefly and politely.\n\
         The user's calendar permissions follow the message. Do not offer operations they lack.",
        company = assistant.company_name,
    )
}

pub fn help_instructions(assistant: &AssistantConfig) -> String {
    format!(
        "You are a senior developer helping new employees of {company} get familiar with its \
         culture, policies, programs and work tools ({tech}).\n\
         Search the knowledge base first and use web search only when it has no answer.\n\
         Answer clearly, with step-by-step guidance when useful. For questions outside this \
         scope reply: 'Sorry, I cannot answer that question.'\n\
         Never share personal information about anyone.",
        company = assistant.company_name,
        tech = technologies(assistant),
    )
}

pub fn participant_instructions() -> String {
    format!(
        "You collect the email addresses of everyone involved in a calendar request.\n\
         When scheduling, the requesting user is always involved. When querying, only the \
         people the request names are involved (the requesting user when they ask about \
         themselves).\n\
         Keep emails already present in the request and look up every username with the \
         email lookup tool.\n\
         Reply only with the comma-separated list of emails. If any lookup fails reply exactly: \
         {EMAIL_NOT_FOUND}"
    )
}

pub fn calendar_instructions(assistant: &AssistantConfig) -> String {
    format!(
        "You manage the calendar of {company} employees: listing events, scheduling meetings, \
         editing and deleting them.\n\
         Use the current date and time given with each request as the reference and interpret \
         relative dates (tomorrow, next Tuesday) from it. Schedule meetings only in the future.\n\
         Always pass dates to tools as YYYY-MM-DDTHH:MM:SS.\n\
         Include every listed attendee. To schedule you need a subject, a date, a time and the \
         attendees; if any is missing ask the user to restate the whole request with all \
         details, because you do not remember earlier messages.\n\
         Respect the user's permission level. When an operation is not allowed, explain it \
         politely and say that logging in with another permission level enables it.\n\
         Scheduled content must follow these rules:\n{rules}",
        company = assistant.company_name,
        rules = policy_rules(assistant),
    )
}

pub fn revisor_instructions(assistant: &AssistantConfig) -> String {
    format!(
        "You review a reply written for an employee of {company}. The reply must follow these \
         rules:\n{rules}\n\
         If it follows all of them, answer only `{VALID_MARKER}`.\n\
         Otherwise answer `{REVISED_MARKER}` followed by the corrected reply.",
        company = assistant.company_name,
        rules = policy_rules(assistant),
    )
}

/// Human-readable capability block threaded into classifier and calendar prompts.
pub fn permission_directive(level: PermissionLevel) -> String {
    let permissions = level.capabilities();
    let mut directive = format!("USER PERMISSIONS - LEVEL: {}\n", level.as_str().to_uppercase());
    for capability in Capability::ALL {
        let (label, allowed) = match capability {
            Capability::Read => ("VIEW calendar events", permissions.can_read),
            Capability::Create => ("CREATE new events", permissions.can_create),
            Capability::Update => ("EDIT existing events", permissions.can_update),
            Capability::Delete => ("DELETE events", permissions.can_delete),
        };
        if allowed {
            directive.push_str(&format!("[allowed] {label}\n"));
        } else {
            directive.push_str(&format!("[not allowed] {label} - OPERATION NOT AUTHORIZED\n"));
        }
    }
    directive.push_str(
        "Check these permissions before any operation. If the user asks for one that is not \
         authorized, explain that it is unavailable at the current permission level.\n",
    );
    directive
}

pub fn user_input(message: &str, username: &str) -> String {
    format!("{message}\nUser: {username}")
}

pub fn classifier_input(message: &str, username: &str, directive: &str) -> String {
    format!("{}\n\n{directive}", user_input(message, username))
}

pub fn calendar_input(
    message: &str,
    username: &str,
    now: DateTime<FixedOffset>,
    attendees: &str,
    directive: &str,
) -> String {
    format!(
        "{}\nToday: {}\nWeekday: {}\nAttendees: {attendees}\n\n{directive}",
        user_input(message, username),
        format_local(&now),
        now.format("%A"),
    )
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use onboard_core::domain::permission::PermissionLevel;

    use super::{calendar_input, permission_directive};

    #[test]
    fn directive_lists_every_capability() {
        let directive = permission_directive(PermissionLevel::ReadUpdate);

        assert!(directive.starts_with("USER PERMISSIONS - LEVEL: READ_UPDATE"));
        assert!(directive.contains("[allowed] VIEW calendar events"));
        assert!(directive.contains("[not allowed] CREATE new events"));
        assert!(directive.contains("[allowed] EDIT existing events"));
        assert!(directive.contains("[not allowed] DELETE events"));
    }

    #[test]
    fn calendar_input_carries_time_and_attendees() {
        let now = DateTime::parse_from_rfc3339("2025-03-10T08:00:00-03:00").expect("time");

        let input = calendar_input("book a sync", "ana", now, "ana@example.com", "PERMS");

        assert_eq!(
            input,
            "book a sync\nUser: ana\nToday: 2025-03-10T08:00:00\nWeekday: Monday\n\
             Attendees: ana@example.com\n\nPERMS"
        );
    }
}
