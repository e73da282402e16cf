use crate::prompts::{CALENDAR_LABEL, HELP_LABEL};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Calendar,
    Help,
    /// The classifier answered on its own; the text still goes through revision.
    DirectAnswer(String),
}

/// Maps classifier output to a flow. A label counts when it is the whole reply (ignoring
/// surrounding punctuation) or when it appears in a reply longer than the label's threshold.
pub fn classify(output: &str) -> Route {
    let trimmed = output.trim();
    let bare = trimmed.trim_matches(|c: char| !c.is_alphanumeric());
    let length = trimmed.chars().count();

    if bare == CALENDAR_LABEL || (trimmed.contains(CALENDAR_LABEL) && length > 20) {
        return Route::Calendar;
    }
    if bare == HELP_LABEL || (trimmed.contains(HELP_LABEL) && length > 15) {
        return Route::Help;
    }
    Route::DirectAnswer(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{classify, Route};

    #[test]
    fn exact_labels_route() {
        assert_eq!(classify("Calendar"), Route::Calendar);
        assert_eq!(classify("  `Help`.\n"), Route::Help);
    }

    #[test]
    fn contained_labels_need_enough_context() {
        assert_eq!(classify("This is a Calendar request."), Route::Calendar);
        assert_eq!(classify("Route: Help please"), Route::Help);
        assert_eq!(classify("My Calendar"), Route::DirectAnswer("My Calendar".to_string()));
        assert_eq!(classify("Help me!"), Route::DirectAnswer("Help me!".to_string()));
    }

    #[test]
    fn calendar_wins_over_help() {
        assert_eq!(classify("Calendar request, not Help"), Route::Calendar);
    }

    #[test]
    fn greetings_fall_through_to_direct_answer() {
        assert_eq!(
            classify("Hi! How can I help you today?"),
            Route::DirectAnswer("Hi! How can I help you today?".to_string())
        );
        assert_eq!(classify(""), Route::DirectAnswer(String::new()));
    }
}
