//! Score submission flow.
//!
//! A submission is only attempted once the session is available and the
//! new tuple strictly beats the cached best. The cached best is updated
//! before the request goes out; it is not rolled back if the request fails.
//! A successful completion chains into a rank refresh.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::events::{LeaderboardEvent, Phase};
use crate::remote::{
    ClientHandle, ControllerHandle, LEADERBOARD_MODE, RequestTicket, StatusCode,
};
use crate::session::BestScore;
use crate::tracker::{Flow, Inner};

impl Inner {
    pub(crate) fn submit_result(self: &Arc<Self>, candidate: BestScore) {
        debug!(
            "submitResult called with result={} minorResult={} level={}",
            candidate.result, candidate.minor_result, candidate.level
        );

        let (ticket, superseded, claimed, player) = {
            let mut state = self.lock();
            let player = state.session.login.clone();

            if !state.session.is_ready() {
                warn!("submitResult called while {}", state.session.stage());
                drop(state);
                self.finish_submission(player, StatusCode::InvalidState);
                return;
            }

            if !candidate.improves_on(&state.session.best) {
                warn!(
                    "Submitted score ({}, {}) is not better than current best ({}, {})",
                    candidate.result,
                    candidate.minor_result,
                    state.session.best.result,
                    state.session.best.minor_result
                );
                drop(state);
                self.finish_submission(player, StatusCode::InvalidState);
                return;
            }

            if state.handles.client.is_none() || state.handles.submission.is_none() {
                warn!("submitResult called without a submission controller");
                drop(state);
                self.finish_submission(player, StatusCode::InvalidState);
                return;
            }

            let ticket = self.issue_ticket();
            state.session.best = candidate;
            let slot = &mut state.submission;
            let superseded = slot.pending.replace(ticket);
            (ticket, superseded, slot.claim(), player)
        };

        if let Some(old) = superseded {
            debug!("Submission {} superseded by {}", old, ticket);
            self.finish_submission(player, StatusCode::RequestCancelled);
        }
        if claimed {
            self.issue(Flow::Submission);
        }
    }

    /// Build a score object, submit it and release the local copy
    pub(crate) fn send_score(
        &self,
        client: ClientHandle,
        controller: ControllerHandle,
        score: BestScore,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        let handle = self.remote.create_score(client).map_err(|status| {
            error!("Create score failed: {}", self.describe(status));
            status
        })?;

        self.remote
            .set_score_fields(handle, &score.to_fields(LEADERBOARD_MODE));
        let submitted = self.remote.submit_score(controller, handle, ticket);
        self.remote.release_score(handle);

        match submitted {
            Ok(()) => debug!(
                "Submitted {} result={} minorResult={} level={} mode={}",
                ticket, score.result, score.minor_result, score.level, LEADERBOARD_MODE
            ),
            Err(status) => error!("Submit score failed: {}", self.describe(status)),
        }
        submitted
    }

    pub(crate) fn on_submission_complete(
        self: &Arc<Self>,
        ticket: RequestTicket,
        status: StatusCode,
    ) {
        let player = {
            let mut state = self.lock();
            if !state.submission.settle(ticket) {
                debug!("Ignoring stale submission completion {}", ticket);
                return;
            }
            state.session.login.clone()
        };
        self.finish_submission(player, status);
    }

    fn finish_submission(self: &Arc<Self>, player: String, status: StatusCode) {
        let success = status.is_ok();
        if !success {
            warn!("{} {}", Phase::ResultSubmit, self.describe(status));
        }

        self.emit(LeaderboardEvent::new(Phase::ResultSubmit, success, player));
        if success {
            self.refresh_rank(false);
        }
    }
}
