//! # rankline-core
//!
//! Client-side leaderboard session manager.
//!
//! This crate provides:
//! - A [`ScoreTracker`] that keeps the user's best score, rank and login
//! - Gated submission of improved scores to a remote ranking service
//! - Rank refresh, including the one-time bootstrap from the server
//! - The [`RemoteSession`] capability trait the service is reached through
//! - The [`EventSink`] trait results are reported through
//! - A loopback [`RemoteSession`] for local runs and integration tests
//!
//! Completions from the remote service may arrive on any thread; the
//! tracker serializes all state access internally.

pub mod config;
pub mod error;
pub mod events;
mod rank;
pub mod remote;
pub mod session;
mod submission;
pub mod tracker;

pub use config::{Config, InitParams};
pub use error::{Error, Result};
pub use events::{EventLog, EventSink, LeaderboardEvent, Phase};
pub use remote::{
    ClientHandle, CompletionCallback, ControllerHandle, LEADERBOARD_MODE, LoopbackConfig,
    LoopbackRemote, RemoteSession, RequestTicket, ScoreFields, ScoreHandle, SearchScope,
    StatusCode, UserHandle,
};
pub use session::{BestScore, Session, SessionSnapshot};
pub use tracker::ScoreTracker;
