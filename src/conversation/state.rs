//! Complaint dialogue state machine — one linear flow per user.
//!
//! Menu → AwaitingOperator → AwaitingLocation → AwaitingMedia →
//! AwaitingDescription → (complete) → Menu. Each state accepts one input
//! shape; anything else leaves the session untouched and re-prompts.

use serde::{Deserialize, Serialize};

use crate::channels::Media;

use super::prompts::{self, MenuAction};

/// The steps of the complaint dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Menu,
    AwaitingOperator,
    AwaitingLocation,
    AwaitingMedia,
    AwaitingDescription,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Menu => "menu",
            Self::AwaitingOperator => "awaiting_operator",
            Self::AwaitingLocation => "awaiting_location",
            Self::AwaitingMedia => "awaiting_media",
            Self::AwaitingDescription => "awaiting_description",
        };
        write!(f, "{s}")
    }
}

/// Fields collected so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub operator: Option<String>,
    pub location: Option<String>,
    pub media: Option<Media>,
    pub description: Option<String>,
}

/// A draft with every field filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteDraft {
    pub operator: String,
    pub location: String,
    pub media: Media,
    pub description: String,
}

impl Draft {
    fn complete(&self) -> Option<CompleteDraft> {
        Some(CompleteDraft {
            operator: self.operator.clone()?,
            location: self.location.clone()?,
            media: self.media.clone()?,
            description: self.description.clone()?,
        })
    }
}

/// One user input, already classified by kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input<'a> {
    /// `/start`.
    Start,
    /// `/cancel`, `/reset` or `reset`.
    Cancel,
    /// Any other slash command.
    Command(&'a str),
    Text(&'a str),
    Location { lat: f64, lon: f64 },
    Media {
        media: &'a Media,
        caption: Option<&'a str>,
    },
}

impl<'a> Input<'a> {
    /// Classify a text message.
    pub fn from_text(text: &'a str) -> Self {
        let trimmed = text.trim();
        if prompts::is_cancel(trimmed) {
            Input::Cancel
        } else if trimmed.starts_with('/') {
            Input::Command(trimmed)
        } else {
            Input::Text(text)
        }
    }
}

/// What the session wants said back after an input.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Greeting plus the main menu.
    Welcome,
    /// Draft discarded, back at the menu.
    Cancelled,
    /// Redisplay the main menu.
    Menu,
    ChooseOperator,
    AskLocation,
    AskMedia,
    AskDescription,
    /// Show the user's complaint count.
    Profile,
    About,
    /// Input of the wrong kind for the current state.
    Reprompt(SessionState),
    /// All fields collected; the session is back at the menu.
    Complete(CompleteDraft),
}

/// Per-user conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub state: SessionState,
    pub draft: Draft,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            state: SessionState::Menu,
            draft: Draft::default(),
        }
    }

    /// Return to the menu with an empty draft.
    pub fn reset(&mut self) {
        self.state = SessionState::Menu;
        self.draft = Draft::default();
    }

    /// Feed one input through the state machine.
    pub fn advance(&mut self, input: Input<'_>) -> Reply {
        match input {
            Input::Start => {
                self.reset();
                return Reply::Welcome;
            }
            Input::Cancel => {
                self.reset();
                return Reply::Cancelled;
            }
            _ => {}
        }

        match (self.state, input) {
            (SessionState::Menu, Input::Text(text)) => match MenuAction::from_text(text) {
                Some(MenuAction::SubmitComplaint) => {
                    self.draft = Draft::default();
                    self.state = SessionState::AwaitingOperator;
                    Reply::ChooseOperator
                }
                Some(MenuAction::Profile) => Reply::Profile,
                Some(MenuAction::About) => Reply::About,
                Some(MenuAction::MainMenu) | None => Reply::Menu,
            },
            (SessionState::Menu, _) => Reply::Menu,

            (SessionState::AwaitingOperator, Input::Text(text)) => {
                if prompts::is_back(text) {
                    self.reset();
                    return Reply::Welcome;
                }
                self.draft.operator = Some(text.trim().to_string());
                self.state = SessionState::AwaitingLocation;
                Reply::AskLocation
            }

            (SessionState::AwaitingLocation, Input::Text(text)) => {
                if prompts::is_back(text) {
                    self.draft.location = None;
                    self.state = SessionState::AwaitingOperator;
                    return Reply::ChooseOperator;
                }
                self.draft.location = Some(text.to_string());
                self.state = SessionState::AwaitingMedia;
                Reply::AskMedia
            }
            (SessionState::AwaitingLocation, Input::Location { lat, lon }) => {
                self.draft.location = Some(format_coordinates(lat, lon));
                self.state = SessionState::AwaitingMedia;
                Reply::AskMedia
            }

            (SessionState::AwaitingMedia, Input::Media { media, caption }) => {
                self.draft.media = Some(media.clone());
                match caption.map(str::trim).filter(|c| !c.is_empty()) {
                    Some(caption) => {
                        self.draft.description = Some(caption.to_string());
                        self.finish()
                    }
                    None => {
                        self.state = SessionState::AwaitingDescription;
                        Reply::AskDescription
                    }
                }
            }

            (SessionState::AwaitingDescription, Input::Text(text)) => {
                self.draft.description = Some(text.to_string());
                self.finish()
            }

            (state, _) => Reply::Reprompt(state),
        }
    }

    /// Put a completed draft back after it could not be recorded, so the
    /// user can retry by resending the description.
    pub fn restore(&mut self, draft: CompleteDraft) {
        self.draft = Draft {
            operator: Some(draft.operator),
            location: Some(draft.location),
            media: Some(draft.media),
            description: None,
        };
        self.state = SessionState::AwaitingDescription;
    }

    fn finish(&mut self) -> Reply {
        let reply = match self.draft.complete() {
            Some(complete) => Reply::Complete(complete),
            // Unreachable through `advance`; recover to the menu
            None => Reply::Menu,
        };
        self.reset();
        reply
    }
}

/// `"<lat>, <lon>"` using the shortest round-trip float formatting.
pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("{lat}, {lon}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::prompts::{BACK, SUBMIT_COMPLAINT};

    fn photo() -> Media {
        Media::photo("file-1")
    }

    #[test]
    fn happy_path_collects_every_field() {
        let mut session = Session::new(1);
        assert_eq!(session.advance(Input::Start), Reply::Welcome);
        assert_eq!(
            session.advance(Input::Text(SUBMIT_COMPLAINT)),
            Reply::ChooseOperator
        );
        assert_eq!(session.state, SessionState::AwaitingOperator);

        assert_eq!(session.advance(Input::Text("Whoosh")), Reply::AskLocation);
        assert_eq!(
            session.advance(Input::Location {
                lat: 47.1,
                lon: 51.9
            }),
            Reply::AskMedia
        );
        assert_eq!(session.draft.location.as_deref(), Some("47.1, 51.9"));

        let media = photo();
        assert_eq!(
            session.advance(Input::Media {
                media: &media,
                caption: None
            }),
            Reply::AskDescription
        );
        assert_eq!(session.state, SessionState::AwaitingDescription);

        let reply = session.advance(Input::Text("blocks the sidewalk"));
        assert_eq!(
            reply,
            Reply::Complete(CompleteDraft {
                operator: "Whoosh".into(),
                location: "47.1, 51.9".into(),
                media: photo(),
                description: "blocks the sidewalk".into(),
            })
        );
        assert_eq!(session, Session::new(1));
    }

    #[test]
    fn caption_skips_description_step() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Jet"));
        session.advance(Input::Text("Kabanbay Batyr 53"));

        let media = Media::video("vid");
        let reply = session.advance(Input::Media {
            media: &media,
            caption: Some("  on the tactile paving "),
        });
        match reply {
            Reply::Complete(draft) => {
                assert_eq!(draft.description, "on the tactile paving");
                assert_eq!(draft.location, "Kabanbay Batyr 53");
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(session.state, SessionState::Menu);
    }

    #[test]
    fn blank_caption_still_asks_for_description() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Jet"));
        session.advance(Input::Text("here"));
        let media = photo();
        assert_eq!(
            session.advance(Input::Media {
                media: &media,
                caption: Some("   ")
            }),
            Reply::AskDescription
        );
    }

    #[test]
    fn back_steps_one_state() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Yandex"));
        assert_eq!(session.state, SessionState::AwaitingLocation);

        assert_eq!(session.advance(Input::Text(BACK)), Reply::ChooseOperator);
        assert_eq!(session.state, SessionState::AwaitingOperator);

        assert_eq!(session.advance(Input::Text(BACK)), Reply::Welcome);
        assert_eq!(session.state, SessionState::Menu);
        assert_eq!(session.draft, Draft::default());
    }

    #[test]
    fn wrong_input_kind_does_not_transition() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Whoosh"));
        session.advance(Input::Text("somewhere"));
        let before = session.clone();

        assert_eq!(
            session.advance(Input::Text("here is a photo, trust me")),
            Reply::Reprompt(SessionState::AwaitingMedia)
        );
        assert_eq!(
            session.advance(Input::Location { lat: 1.0, lon: 2.0 }),
            Reply::Reprompt(SessionState::AwaitingMedia)
        );
        assert_eq!(session, before);
    }

    #[test]
    fn media_is_not_an_operator() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        let media = photo();
        assert_eq!(
            session.advance(Input::Media {
                media: &media,
                caption: None
            }),
            Reply::Reprompt(SessionState::AwaitingOperator)
        );
        assert!(session.draft.operator.is_none());
    }

    #[test]
    fn unknown_commands_are_not_data() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        assert_eq!(
            session.advance(Input::from_text("/help")),
            Reply::Reprompt(SessionState::AwaitingOperator)
        );
    }

    #[test]
    fn cancel_from_any_state_discards_draft() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Whoosh"));
        session.advance(Input::Text("somewhere"));

        assert_eq!(session.advance(Input::from_text("/cancel")), Reply::Cancelled);
        assert_eq!(session, Session::new(1));
    }

    #[test]
    fn start_always_resets() {
        let mut session = Session::new(1);
        session.advance(Input::Text(SUBMIT_COMPLAINT));
        session.advance(Input::Text("Whoosh"));
        assert_eq!(session.advance(Input::Start), Reply::Welcome);
        assert_eq!(session, Session::new(1));
    }

    #[test]
    fn menu_lookup_and_default() {
        let mut session = Session::new(1);
        assert_eq!(session.advance(Input::Text("view profile")), Reply::Profile);
        assert_eq!(session.advance(Input::Text("about")), Reply::About);
        assert_eq!(session.advance(Input::Text("main menu")), Reply::Menu);
        assert_eq!(session.advance(Input::Text("what is this")), Reply::Menu);
        let media = photo();
        assert_eq!(
            session.advance(Input::Media {
                media: &media,
                caption: None
            }),
            Reply::Menu
        );
        assert_eq!(session.state, SessionState::Menu);
    }

    #[test]
    fn replaying_inputs_is_deterministic() {
        let media = photo();
        let inputs = [
            Input::Start,
            Input::Text("submit complaint"),
            Input::Text("Whoosh"),
            Input::Text(BACK),
            Input::Text("Jet"),
            Input::Location { lat: 51.128, lon: 71.43 },
            Input::Text("stray"),
            Input::Media {
                media: &media,
                caption: None,
            },
        ];

        let run = || {
            let mut session = Session::new(9);
            let replies: Vec<Reply> = inputs.iter().map(|i| session.advance(*i)).collect();
            (session, replies)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn restore_returns_to_description_step() {
        let mut session = Session::new(1);
        session.restore(CompleteDraft {
            operator: "Whoosh".into(),
            location: "x".into(),
            media: photo(),
            description: "d".into(),
        });
        assert_eq!(session.state, SessionState::AwaitingDescription);
        assert!(session.draft.description.is_none());

        assert!(matches!(session.advance(Input::Text("again")), Reply::Complete(_)));
    }

    #[test]
    fn coordinates_formatting() {
        assert_eq!(format_coordinates(47.1, 51.9), "47.1, 51.9");
        assert_eq!(format_coordinates(-0.5, 120.0), "-0.5, 120");
    }
}
