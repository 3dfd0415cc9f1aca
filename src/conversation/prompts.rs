//! User-facing texts, keyboards and the menu lookup table.

use crate::channels::{Controls, KeyboardButton};

use super::state::SessionState;

// ── Keyboard labels ─────────────────────────────────────────────────

pub const SUBMIT_COMPLAINT: &str = "📤 Submit complaint";
pub const SUBMIT_ANOTHER: &str = "📤 Submit another complaint";
pub const PROFILE: &str = "👤 My profile";
pub const ABOUT: &str = "ℹ️ About";
pub const MAIN_MENU: &str = "🏠 Main menu";
pub const BACK: &str = "🔙 Back";
pub const SEND_LOCATION: &str = "📍 Send location";

/// Operators offered on the picker; free text is accepted too.
pub const OPERATORS: [&str; 4] = ["Whoosh", "Yandex", "Jet", "Don't know"];

// ── Menu dispatch ───────────────────────────────────────────────────

/// What a main-menu message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    SubmitComplaint,
    Profile,
    About,
    MainMenu,
}

/// Recognised menu literals: keyboard labels plus typed aliases.
const MENU_TABLE: &[(&str, MenuAction)] = &[
    (SUBMIT_COMPLAINT, MenuAction::SubmitComplaint),
    (SUBMIT_ANOTHER, MenuAction::SubmitComplaint),
    ("submit complaint", MenuAction::SubmitComplaint),
    ("submit another complaint", MenuAction::SubmitComplaint),
    (PROFILE, MenuAction::Profile),
    ("my profile", MenuAction::Profile),
    ("view profile", MenuAction::Profile),
    (ABOUT, MenuAction::About),
    ("about", MenuAction::About),
    (MAIN_MENU, MenuAction::MainMenu),
    ("main menu", MenuAction::MainMenu),
];

impl MenuAction {
    /// Look a menu message up; `None` for anything unrecognised.
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        MENU_TABLE
            .iter()
            .find(|(literal, _)| literal.eq_ignore_ascii_case(text))
            .map(|(_, action)| *action)
    }
}

pub fn is_back(text: &str) -> bool {
    let text = text.trim();
    text == BACK || text.eq_ignore_ascii_case("back")
}

/// `/cancel`, `/reset` (with or without `@BotName`) and a bare `reset`.
pub fn is_cancel(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("reset") {
        return true;
    }
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    matches!(command, "/cancel" | "/reset")
}

/// Whether `text` is one of the bot's own reply-keyboard buttons (or a
/// typed menu alias) rather than something the user wrote.
pub fn is_keyboard_label(text: &str) -> bool {
    let trimmed = text.trim();
    MenuAction::from_text(trimmed).is_some()
        || is_back(trimmed)
        || trimmed == SEND_LOCATION
        || OPERATORS.contains(&trimmed)
}

// ── Texts ───────────────────────────────────────────────────────────

pub const WELCOME: &str = "👋 Welcome! This bot records e-scooters parked where they block \
     pavements, crossings and entrances. Use the menu below.";
pub const CANCELLED: &str = "❌ Cancelled. Nothing was sent.";
pub const MENU_HINT: &str = "Choose an option from the menu.";
pub const CHOOSE_OPERATOR: &str = "🛴 Choose the scooter operator:";
pub const ASK_LOCATION: &str = "📍 Share your location or type the address:";
pub const ASK_MEDIA: &str = "📸 Send a photo or video of the violation:";
pub const ASK_DESCRIPTION: &str = "✏️ Briefly describe the violation:";
pub const ABOUT_TEXT: &str = "ℹ️ This bot helps record e-scooter parking violations. \
     Every complaint is checked by a moderator before it is published.";
pub const SUBMITTED: &str = "✅ Complaint sent. You will be notified once a moderator reviews it.";
pub const TRY_AGAIN: &str = "⚠️ Something went wrong, please try again.";

/// Gentle re-prompt for input of the wrong kind.
pub fn reprompt(state: SessionState) -> &'static str {
    match state {
        SessionState::Menu => MENU_HINT,
        SessionState::AwaitingOperator => "Pick an operator from the keyboard or type its name.",
        SessionState::AwaitingLocation => "Send your location or type the address.",
        SessionState::AwaitingMedia => "Please send a photo or a video of the violation.",
        SessionState::AwaitingDescription => "Please describe the violation in a text message.",
    }
}

pub fn profile(name: &str, complaints: u64) -> String {
    format!("👤 Profile @{name}\nComplaints sent: {complaints}")
}

// ── Keyboards ───────────────────────────────────────────────────────

fn text_row(labels: &[&str]) -> Vec<KeyboardButton> {
    labels
        .iter()
        .map(|l| KeyboardButton::Text((*l).to_string()))
        .collect()
}

pub fn main_menu() -> Controls {
    Controls::Keyboard(vec![text_row(&[SUBMIT_COMPLAINT, PROFILE]), text_row(&[ABOUT])])
}

pub fn operator_keyboard() -> Controls {
    Controls::Keyboard(vec![text_row(&OPERATORS), text_row(&[BACK])])
}

pub fn location_keyboard() -> Controls {
    Controls::Keyboard(vec![
        vec![KeyboardButton::RequestLocation(SEND_LOCATION.to_string())],
        text_row(&[BACK]),
    ])
}

pub fn after_report_keyboard() -> Controls {
    Controls::Keyboard(vec![text_row(&[SUBMIT_ANOTHER, MAIN_MENU])])
}

/// Keyboard that belongs with a state's prompt. Media and description
/// are free input, so the reply keyboard is taken away.
pub fn keyboard_for(state: SessionState) -> Controls {
    match state {
        SessionState::Menu => main_menu(),
        SessionState::AwaitingOperator => operator_keyboard(),
        SessionState::AwaitingLocation => location_keyboard(),
        SessionState::AwaitingMedia | SessionState::AwaitingDescription => Controls::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_labels_map_to_actions() {
        assert_eq!(MenuAction::from_text(SUBMIT_COMPLAINT), Some(MenuAction::SubmitComplaint));
        assert_eq!(MenuAction::from_text(SUBMIT_ANOTHER), Some(MenuAction::SubmitComplaint));
        assert_eq!(MenuAction::from_text(PROFILE), Some(MenuAction::Profile));
        assert_eq!(MenuAction::from_text(ABOUT), Some(MenuAction::About));
        assert_eq!(MenuAction::from_text(MAIN_MENU), Some(MenuAction::MainMenu));
    }

    #[test]
    fn aliases_are_case_insensitive() {
        assert_eq!(MenuAction::from_text("  Submit Complaint "), Some(MenuAction::SubmitComplaint));
        assert_eq!(MenuAction::from_text("VIEW PROFILE"), Some(MenuAction::Profile));
        assert_eq!(MenuAction::from_text("submit"), None);
        assert_eq!(MenuAction::from_text(""), None);
    }

    #[test]
    fn back_literal() {
        assert!(is_back(BACK));
        assert!(is_back("Back"));
        assert!(!is_back("backyard"));
    }

    #[test]
    fn cancel_commands() {
        for text in ["/cancel", "/reset", "reset", "/cancel@PatrolBot", " RESET "] {
            assert!(is_cancel(text), "{text} should cancel");
        }
        for text in ["cancel please", "/cancellation", "/start"] {
            assert!(!is_cancel(text), "{text} should not cancel");
        }
    }

    #[test]
    fn keyboard_labels_are_recognised() {
        for text in [
            SUBMIT_COMPLAINT,
            SUBMIT_ANOTHER,
            PROFILE,
            ABOUT,
            MAIN_MENU,
            BACK,
            SEND_LOCATION,
            "Whoosh",
            "Don't know",
            " submit complaint ",
        ] {
            assert!(is_keyboard_label(text), "{text} should be a keyboard label");
        }
        for text in ["blurry photo", "duplicate of yesterday", "Whoosh scooter is fine"] {
            assert!(!is_keyboard_label(text), "{text} should not be a keyboard label");
        }
    }

    #[test]
    fn location_keyboard_requests_geo() {
        match location_keyboard() {
            Controls::Keyboard(rows) => {
                assert_eq!(
                    rows[0][0],
                    KeyboardButton::RequestLocation(SEND_LOCATION.to_string())
                );
            }
            other => panic!("expected reply keyboard, got {other:?}"),
        }
    }

    #[test]
    fn profile_text() {
        assert_eq!(profile("rider", 3), "👤 Profile @rider\nComplaints sent: 3");
    }
}
