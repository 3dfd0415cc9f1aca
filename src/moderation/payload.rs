//! Button payload codec — `"<action>:<token>"` strings carried by moderator
//! inline buttons.

use crate::error::ModerationError;

use super::model::SubmissionId;

/// What a moderator button asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Approve and publish (`confirm`).
    Approve,
    /// First reject press; asks the moderator to confirm (`reject`).
    Reject,
    /// Confirmed intent to reject; the next text is the reason
    /// (`reject_confirm`, also accepted as `reject_yes`).
    RejectConfirm,
    /// Back out of a reject before giving a reason (`reject_cancel`).
    RejectCancel,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "confirm",
            Self::Reject => "reject",
            Self::RejectConfirm => "reject_confirm",
            Self::RejectCancel => "reject_cancel",
        }
    }

    fn parse(action: &str) -> Option<Self> {
        match action {
            "confirm" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "reject_confirm" | "reject_yes" => Some(Self::RejectConfirm),
            "reject_cancel" => Some(Self::RejectCancel),
            _ => None,
        }
    }
}

/// A decoded button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPayload {
    pub action: ModerationAction,
    pub id: SubmissionId,
}

impl ButtonPayload {
    pub fn new(action: ModerationAction, id: SubmissionId) -> Self {
        Self { action, id }
    }

    /// Encode as callback data (at most 51 bytes, under Telegram's 64).
    pub fn encode(&self) -> String {
        format!("{}:{}", self.action.as_str(), self.id)
    }

    /// Decode callback data.
    pub fn decode(raw: &str) -> Result<Self, ModerationError> {
        let (action, token) = raw
            .split_once(':')
            .ok_or_else(|| ModerationError::InvalidPayload(raw.to_string()))?;
        let action = ModerationAction::parse(action)
            .ok_or_else(|| ModerationError::InvalidPayload(raw.to_string()))?;
        let id = token
            .parse()
            .map_err(|_| ModerationError::InvalidPayload(raw.to_string()))?;
        Ok(Self { action, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_action_and_token() {
        let id: SubmissionId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        let payload = ButtonPayload::new(ModerationAction::RejectConfirm, id);
        assert_eq!(
            payload.encode(),
            "reject_confirm:67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
        assert!(payload.encode().len() <= 64);
        assert_eq!(ButtonPayload::decode(&payload.encode()).unwrap(), payload);
    }

    #[test]
    fn reject_yes_is_an_alias_for_confirmation() {
        let id = SubmissionId::new();
        let decoded = ButtonPayload::decode(&format!("reject_yes:{id}")).unwrap();
        assert_eq!(decoded.action, ModerationAction::RejectConfirm);
        assert_eq!(decoded.id, id);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let id = SubmissionId::new();
        for raw in [
            "confirm".to_string(),
            format!("publish:{id}"),
            "confirm:12345".to_string(),
            String::new(),
        ] {
            assert!(
                matches!(ButtonPayload::decode(&raw), Err(ModerationError::InvalidPayload(_))),
                "{raw:?} should be invalid"
            );
        }
    }
}
