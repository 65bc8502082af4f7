pub mod config_entry;
pub mod rate_limit;
pub mod script;
pub mod session;
pub mod submission;

pub use config_entry::{ConfigIndexEntry, ConfigListing, ConfigMetadata};
pub use rate_limit::{CooldownReservation, CooldownTracker, InFlightGuard, InFlightSet, SubmitterRegistry, UploadTrackers};
pub use script::{Script, ScriptIndexEntry, ScriptKind, ScriptListing};
pub use session::{OAuthAccount, Session, SessionUser, TokenClaims};
pub use submission::{normalize_name, Submission, SubmissionMetadata, SubmittedFile};
