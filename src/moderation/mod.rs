//! Moderation of completed complaints: pending registry, button protocol
//! and public-channel publishing.

pub mod markers;
pub mod model;
pub mod notices;
pub mod payload;
pub mod protocol;
pub mod publish;
pub mod registry;

pub use markers::{RejectMarker, RejectMarkers};
pub use model::{NewSubmission, RowId, Submission, SubmissionId, SubmissionStatus};
pub use payload::{ButtonPayload, ModerationAction};
pub use protocol::{Moderation, ModerationOutcome, Press};
pub use publish::Publisher;
pub use registry::PendingRegistry;
