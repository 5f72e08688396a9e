//! Capability interface to the remote ranking service.
//!
//! The tracker never talks to the network itself. Everything it needs from
//! the service goes through [`RemoteSession`]:
//!
//! - **Client**: created once per `init`, released on teardown
//! - **Controllers**: one for score submission, one for rank lookup, each
//!   with its own completion callback and its own cancel/release
//! - **Scores**: transient objects built for a single submission
//!
//! Completions are delivered through [`CompletionCallback`] and may arrive
//! on any thread. Every asynchronous request carries a [`RequestTicket`]
//! which the implementation must hand back unchanged in the callback.

mod loopback;
#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::config::InitParams;

pub use loopback::{LoopbackConfig, LoopbackRemote};

/// Leaderboard partition used for every submission and lookup
pub const LEADERBOARD_MODE: u32 = 0;

/// Status reported by the remote service
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr,
    Display,
)]
pub enum StatusCode {
    #[strum(serialize = "ok")]
    Ok,
    #[strum(serialize = "invalid argument")]
    InvalidArgument,
    #[strum(serialize = "invalid state")]
    InvalidState,
    #[strum(serialize = "request cancelled")]
    RequestCancelled,
    #[strum(serialize = "request failed")]
    RequestFailed,
    #[strum(serialize = "not found")]
    NotFound,
    #[strum(serialize = "http server error")]
    HttpServerError,
    #[strum(serialize = "invalid server response")]
    InvalidServerResponse,
    #[strum(serialize = "out of memory")]
    OutOfMemory,
    #[strum(serialize = "not implemented")]
    NotImplemented,
}

impl StatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Which slice of the leaderboard rank lookups search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, IntoStaticStr, Display)]
pub enum SearchScope {
    #[default]
    #[strum(serialize = "global")]
    Global,
    #[strum(serialize = "24h")]
    LastDay,
    #[strum(serialize = "country")]
    UserCountry,
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle!(
    /// Remote client created by `init`
    ClientHandle
);
handle!(
    /// Submission or rank controller
    ControllerHandle
);
handle!(
    /// Transient score object
    ScoreHandle
);
handle!(
    /// User identity attached to a client session
    UserHandle
);

/// Identity of one issued asynchronous request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(pub u64);

impl fmt::Display for RequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fields of a remote score object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreFields {
    pub result: u32,
    pub mode: u32,
    pub level: u32,
    pub minor_result: u32,
}

/// Completion callback registered with a controller
pub type CompletionCallback = Arc<dyn Fn(RequestTicket, StatusCode) + Send + Sync>;

/// Operations the tracker needs from the ranking service.
///
/// Implementations must be safe to call from any thread, including from
/// inside a completion callback. A method that returns `Err` must not also
/// deliver a completion for the same ticket.
pub trait RemoteSession: Send + Sync {
    fn create_client(&self, params: &InitParams) -> Result<ClientHandle, StatusCode>;

    fn create_submission_controller(
        &self,
        client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode>;

    fn create_rank_controller(
        &self,
        client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode>;

    fn set_rank_search_scope(
        &self,
        controller: ControllerHandle,
        scope: SearchScope,
    ) -> Result<(), StatusCode>;

    /// Abort whatever request the controller has in flight
    fn cancel(&self, controller: ControllerHandle) -> Result<(), StatusCode>;

    fn release_controller(&self, controller: ControllerHandle);

    fn release_client(&self, client: ClientHandle);

    fn create_score(&self, client: ClientHandle) -> Result<ScoreHandle, StatusCode>;

    fn set_score_fields(&self, score: ScoreHandle, fields: &ScoreFields);

    fn release_score(&self, score: ScoreHandle);

    /// Submit a score; the remote keeps its own copy of the score object
    fn submit_score(
        &self,
        controller: ControllerHandle,
        score: ScoreHandle,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode>;

    fn load_rank_for_user(
        &self,
        controller: ControllerHandle,
        user: UserHandle,
        mode: u32,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode>;

    /// Score attached to the last completed rank lookup, `None` if the user
    /// has never submitted
    fn score_from_rank_result(&self, controller: ControllerHandle) -> Option<ScoreFields>;

    fn rank_from_result(&self, controller: ControllerHandle) -> u32;

    fn current_user(&self, client: ClientHandle) -> UserHandle;

    fn login(&self, user: UserHandle) -> Option<String>;

    /// Human-readable text for a status, used for logging only
    fn describe_status(&self, status: StatusCode) -> String {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_code_text() {
        assert_eq!(StatusCode::Ok.to_string(), "ok");
        assert_eq!(StatusCode::RequestCancelled.to_string(), "request cancelled");
        assert_eq!(
            StatusCode::from_str("http server error").unwrap(),
            StatusCode::HttpServerError
        );
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::InvalidState.is_ok());
    }

    #[test]
    fn test_search_scope_default_is_global() {
        assert_eq!(SearchScope::default(), SearchScope::Global);
        assert_eq!(SearchScope::from_str("24h").unwrap(), SearchScope::LastDay);
    }

    #[test]
    fn test_ticket_display() {
        assert_eq!(RequestTicket(7).to_string(), "#7");
    }
}
