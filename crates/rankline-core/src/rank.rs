//! Rank refresh flow.
//!
//! The first successful rank completion after `init` doubles as the
//! session bootstrap: the score attached to the rank result and the user's
//! login are copied into the session and the session becomes available.
//! Later completions only update the rank.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::events::{
    FIELD_LEVEL, FIELD_MINOR_RESULT, FIELD_RANK, FIELD_RESULT, LeaderboardEvent, Phase,
};
use crate::remote::{
    ClientHandle, ControllerHandle, LEADERBOARD_MODE, RequestTicket, ScoreFields, StatusCode,
};
use crate::session::BestScore;
use crate::tracker::{Flow, Inner};

/// Values read from the remote for one successful rank completion
struct RankResult {
    rank: u32,
    bootstrap: Option<Bootstrap>,
}

struct Bootstrap {
    score: Option<ScoreFields>,
    login: Option<String>,
}

impl Inner {
    pub(crate) fn refresh_rank(self: &Arc<Self>, bootstrap: bool) {
        debug!("refreshRank called (bootstrap={})", bootstrap);

        let (ticket, superseded, claimed, player) = {
            let mut state = self.lock();
            let player = state.session.login.clone();

            if !bootstrap && !state.session.initialized {
                warn!("refreshRank called while {}", state.session.stage());
                drop(state);
                self.finish_rank_failure(player, StatusCode::InvalidState);
                return;
            }

            if state.handles.client.is_none() || state.handles.rank.is_none() {
                warn!("refreshRank called without a rank controller");
                drop(state);
                self.finish_rank_failure(player, StatusCode::InvalidState);
                return;
            }

            let ticket = self.issue_ticket();
            let slot = &mut state.rank;
            let superseded = slot.pending.replace(ticket);
            (ticket, superseded, slot.claim(), player)
        };

        if let Some(old) = superseded {
            debug!("Rank request {} superseded by {}", old, ticket);
            self.finish_rank_failure(player, StatusCode::RequestCancelled);
        }
        if claimed {
            self.issue(Flow::Rank);
        }
    }

    pub(crate) fn send_rank_load(
        &self,
        client: ClientHandle,
        controller: ControllerHandle,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        let user = self.remote.current_user(client);
        self.remote
            .load_rank_for_user(controller, user, LEADERBOARD_MODE, ticket)
            .map_err(|status| {
                error!("Rank load failed: {}", self.describe(status));
                status
            })
    }

    pub(crate) fn on_rank_complete(self: &Arc<Self>, ticket: RequestTicket, status: StatusCode) {
        let (handles, available, player) = {
            let mut state = self.lock();
            if !state.rank.settle(ticket) {
                debug!("Ignoring stale rank completion {}", ticket);
                return;
            }
            (
                state.handles,
                state.session.available,
                state.session.login.clone(),
            )
        };

        if !status.is_ok() {
            self.finish_rank_failure(player, status);
            return;
        }

        let (Some(client), Some(controller)) = (handles.client, handles.rank) else {
            self.finish_rank_failure(player, StatusCode::InvalidState);
            return;
        };

        let bootstrap = (!available).then(|| {
            let score = self.remote.score_from_rank_result(controller);
            if score.is_none() {
                debug!("{} current user has no score", Phase::RankRequest);
            }
            let user = self.remote.current_user(client);
            Bootstrap {
                score,
                login: self.remote.login(user),
            }
        });
        let result = RankResult {
            rank: self.remote.rank_from_result(controller),
            bootstrap,
        };

        self.apply_rank(result);
    }

    fn apply_rank(&self, result: RankResult) {
        let event = {
            let mut state = self.lock();
            if !state.session.initialized {
                let player = state.session.login.clone();
                drop(state);
                debug!("Session torn down before rank result was applied");
                self.finish_rank_failure(player, StatusCode::InvalidState);
                return;
            }

            let session = &mut state.session;
            match result.bootstrap {
                Some(bootstrap) if !session.available => {
                    if let Some(score) = bootstrap.score {
                        session.best = BestScore::from(score);
                    }
                    if let Some(login) = bootstrap.login {
                        debug!("login {}", login);
                        session.login = login;
                    }
                    session.available = true;
                }
                _ => {}
            }
            session.rank = result.rank;

            LeaderboardEvent::new(Phase::RankRequest, true, session.login.clone())
                .with_field(FIELD_RANK, session.rank)
                .with_field(FIELD_LEVEL, session.best.level)
                .with_field(FIELD_RESULT, session.best.result)
                .with_field(FIELD_MINOR_RESULT, session.best.minor_result)
        };

        self.emit(event);
    }

    fn finish_rank_failure(&self, player: String, status: StatusCode) {
        warn!("{} {}", Phase::RankRequest, self.describe(status));
        self.emit(LeaderboardEvent::new(Phase::RankRequest, false, player));
    }
}
