//! Leaderboard session tracker.
//!
//! [`ScoreTracker`] owns one [`Session`] and drives the two request flows
//! against a [`RemoteSession`]:
//!
//! - **Submission** (`submission.rs`): gated, optimistic score submission
//! - **Rank** (`rank.rs`): rank refresh plus the one-time bootstrap that
//!   seeds the best score and login from the server
//!
//! ## Locking
//!
//! All session state, remote handles and pending-request bookkeeping sit
//! behind one mutex. It is never held across a remote request or an
//! [`EventSink::emit`], so completions may arrive synchronously on the
//! calling thread and sinks may call back into the tracker. `init` and
//! `terminate` are additionally serialized by a lifecycle mutex.
//!
//! ## Request tickets
//!
//! Every submission and rank lookup is tagged with a fresh
//! [`RequestTicket`]. Each flow remembers the ticket of its one pending
//! request; completions carrying any other ticket are dropped. A pending
//! request that gets superseded or cancelled is resolved locally as a
//! failed completion, so every accepted request produces exactly one event.
//!
//! ## Issuing
//!
//! Callers only queue a ticket. The remote `cancel` and the request itself
//! are sent by whichever caller holds the flow's issuing role, which keeps
//! sending until the newest queued ticket is out. Other callers return
//! immediately, so two threads never interleave cancel and send on one
//! controller.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rankline_core::{EventLog, InitParams, LoopbackConfig, LoopbackRemote, ScoreTracker};
//!
//! let remote = Arc::new(LoopbackRemote::new(LoopbackConfig::default()));
//! let events = Arc::new(EventLog::new());
//! let tracker = ScoreTracker::new(remote, events.clone());
//!
//! tracker.init(&InitParams::new("g", "s", "1.0", "USD", "en"))?;
//! // ... wait for the bootstrap userRankRequest event ...
//! tracker.submit_result(150, 0, 4);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, error, warn};

use crate::config::InitParams;
use crate::error::{Error, Result};
use crate::events::{EventSink, LeaderboardEvent, Phase};
use crate::remote::{
    ClientHandle, CompletionCallback, ControllerHandle, RemoteSession, RequestTicket,
    SearchScope, StatusCode,
};
use crate::session::{BestScore, Session, SessionSnapshot};

/// One of the two request flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Submission,
    Rank,
}

impl Flow {
    pub fn name(self) -> &'static str {
        match self {
            Flow::Submission => "submission",
            Flow::Rank => "rank",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Flow::Submission => Phase::ResultSubmit,
            Flow::Rank => Phase::RankRequest,
        }
    }
}

/// Remote handles owned by a session
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Handles {
    pub client: Option<ClientHandle>,
    pub submission: Option<ControllerHandle>,
    pub rank: Option<ControllerHandle>,
}

impl Handles {
    pub fn controller(&self, flow: Flow) -> Option<ControllerHandle> {
        match flow {
            Flow::Submission => self.submission,
            Flow::Rank => self.rank,
        }
    }
}

/// Pending-request bookkeeping for one flow
#[derive(Debug, Default)]
pub(crate) struct FlowSlot {
    /// Ticket the flow is waiting on
    pub pending: Option<RequestTicket>,
    /// Last ticket handed to the remote
    pub issued: Option<RequestTicket>,
    /// Some caller is running the issue loop
    pub issuing: bool,
    /// Remote cancel still owed by the issue loop
    pub cancel_requested: bool,
}

impl FlowSlot {
    /// Consume the pending ticket if `ticket` is it
    pub fn settle(&mut self, ticket: RequestTicket) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Take the issuing role; false if another caller already holds it
    pub fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.issuing, true)
    }

    /// Queued ticket not yet handed to the remote
    fn unissued(&self) -> Option<RequestTicket> {
        self.pending.filter(|&ticket| self.issued != Some(ticket))
    }
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub session: Session,
    pub handles: Handles,
    pub submission: FlowSlot,
    pub rank: FlowSlot,
}

impl State {
    pub fn slot(&mut self, flow: Flow) -> &mut FlowSlot {
        match flow {
            Flow::Submission => &mut self.submission,
            Flow::Rank => &mut self.rank,
        }
    }
}

pub(crate) struct Inner {
    pub remote: Arc<dyn RemoteSession>,
    pub sink: Arc<dyn EventSink>,
    state: Mutex<State>,
    lifecycle: Mutex<()>,
    next_ticket: AtomicU64,
}

/// Client-side leaderboard session.
///
/// Cheap to clone; clones share the same session. Dropping the last clone
/// tears the session down as `terminate` would.
#[derive(Clone)]
pub struct ScoreTracker {
    inner: Arc<Inner>,
}

impl ScoreTracker {
    pub fn new(remote: Arc<dyn RemoteSession>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                sink,
                state: Mutex::new(State::default()),
                lifecycle: Mutex::new(()),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    /// Create the remote client and both controllers, then start the
    /// bootstrap rank fetch.
    ///
    /// Does nothing if already initialized. On any construction failure
    /// everything created so far is released and the failing step is
    /// returned; call `init` again to retry.
    pub fn init(&self, params: &InitParams) -> Result<()> {
        self.inner.init(params)
    }

    /// Release all remote resources and clear the lifecycle flags
    pub fn terminate(&self) {
        self.inner.terminate();
    }

    /// Cancel in-flight requests on both flows
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Re-fetch the current rank
    pub fn refresh(&self) {
        debug!("refresh called");
        self.inner.refresh_rank(false);
    }

    /// Submit a score if it beats the cached best
    pub fn submit_result(&self, result: u32, minor_result: u32, level: u32) {
        self.inner
            .submit_result(BestScore::new(result, minor_result, level));
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().session.clone()
    }
}

impl Inner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn issue_ticket(&self) -> RequestTicket {
        RequestTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn describe(&self, status: StatusCode) -> String {
        self.remote.describe_status(status)
    }

    pub(crate) fn emit(&self, event: LeaderboardEvent) {
        debug!(
            "Sending event phase={} success={} player={}",
            event.phase.as_str(),
            event.success,
            event.player
        );
        self.sink.emit(event);
    }

    /// Best-effort cancel; failures are logged and swallowed
    pub(crate) fn cancel_controller(&self, controller: ControllerHandle, what: &str) {
        if let Err(status) = self.remote.cancel(controller) {
            error!("Cancel {} controller failed: {}", what, self.describe(status));
        }
    }

    fn completion_callback(
        self: &Arc<Self>,
        on_complete: fn(&Arc<Inner>, RequestTicket, StatusCode),
    ) -> CompletionCallback {
        let weak: Weak<Inner> = Arc::downgrade(self);
        Arc::new(move |ticket: RequestTicket, status: StatusCode| {
            match weak.upgrade() {
                Some(inner) => on_complete(&inner, ticket, status),
                None => debug!("Completion {} arrived after tracker was dropped", ticket),
            }
        })
    }

    fn init(self: &Arc<Self>, params: &InitParams) -> Result<()> {
        debug!("init called");
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());

        let existing = {
            let state = self.lock();
            if state.session.initialized {
                return Ok(());
            }
            state.handles
        };

        let client = match existing.client {
            Some(client) => client,
            None => {
                let client = self
                    .remote
                    .create_client(params)
                    .map_err(|status| self.abort_init("create client", status))?;
                self.lock().handles.client = Some(client);
                client
            }
        };

        if existing.submission.is_none() {
            let callback = self.completion_callback(Inner::on_submission_complete);
            let controller = self
                .remote
                .create_submission_controller(client, callback)
                .map_err(|status| self.abort_init("create submission controller", status))?;
            self.lock().handles.submission = Some(controller);
        }

        let rank = match existing.rank {
            Some(rank) => rank,
            None => {
                let callback = self.completion_callback(Inner::on_rank_complete);
                let controller = self
                    .remote
                    .create_rank_controller(client, callback)
                    .map_err(|status| self.abort_init("create rank controller", status))?;
                self.lock().handles.rank = Some(controller);
                controller
            }
        };

        self.remote
            .set_rank_search_scope(rank, SearchScope::Global)
            .map_err(|status| self.abort_init("set rank search scope", status))?;

        self.lock().session.initialized = true;
        drop(lifecycle);

        self.refresh_rank(true);
        Ok(())
    }

    fn abort_init(&self, step: &'static str, status: StatusCode) -> Error {
        error!("Failed to {}: {}", step, self.describe(status));
        self.destroy();
        Error::Remote { step, status }
    }

    fn terminate(&self) {
        debug!("terminate called");
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());

        if !self.lock().session.initialized {
            warn!("terminate called when not initialized");
            return;
        }
        self.destroy();
    }

    fn cancel(self: &Arc<Self>) {
        debug!("cancel called");
        let mut aborted = Vec::new();
        let mut claimed = Vec::new();
        let player = {
            let mut state = self.lock();
            if !state.session.is_ready() {
                warn!("cancel called while {}", state.session.stage());
                return;
            }
            for flow in [Flow::Submission, Flow::Rank] {
                let slot = state.slot(flow);
                if let Some(ticket) = slot.pending.take() {
                    aborted.push((flow, ticket));
                }
                slot.cancel_requested = true;
                if slot.claim() {
                    claimed.push(flow);
                }
            }
            state.session.login.clone()
        };

        for flow in claimed {
            self.issue(flow);
        }
        for (flow, ticket) in aborted {
            debug!("{} request {} cancelled", flow.name(), ticket);
            self.emit(LeaderboardEvent::new(flow.phase(), false, player.clone()));
        }
    }

    /// Issue loop for a flow whose issuing role the caller holds.
    ///
    /// Cancels the controller and sends the newest queued ticket, repeating
    /// while other callers keep queueing. Releases the role once nothing is
    /// left to send or cancel.
    pub(crate) fn issue(self: &Arc<Self>, flow: Flow) {
        loop {
            let step = {
                let mut state = self.lock();
                let client = state.handles.client;
                let controller = state.handles.controller(flow);
                let best = state.session.best;
                let slot = state.slot(flow);
                let next = slot.unissued();
                let cancel = std::mem::take(&mut slot.cancel_requested) || next.is_some();
                match (client, controller) {
                    (Some(client), Some(controller)) if cancel => {
                        if next.is_some() {
                            slot.issued = next;
                        }
                        Some((client, controller, next, best))
                    }
                    _ => {
                        slot.issuing = false;
                        None
                    }
                }
            };
            let Some((client, controller, next, best)) = step else {
                return;
            };

            self.cancel_controller(controller, flow.name());
            let Some(ticket) = next else {
                continue;
            };

            // A newer ticket or a cancel may have landed during the cancel
            if self.lock().slot(flow).pending != Some(ticket) {
                debug!("{} request {} dropped before issue", flow.name(), ticket);
                continue;
            }

            let sent = match flow {
                Flow::Submission => self.send_score(client, controller, best, ticket),
                Flow::Rank => self.send_rank_load(client, controller, ticket),
            };
            if let Err(status) = sent {
                match flow {
                    Flow::Submission => self.on_submission_complete(ticket, status),
                    Flow::Rank => self.on_rank_complete(ticket, status),
                }
            }
        }
    }

    /// Cancel and release every live handle, client last. Safe to call
    /// repeatedly.
    pub(crate) fn destroy(&self) {
        debug!("destroy called");
        let handles = {
            let mut state = self.lock();
            for flow in [Flow::Submission, Flow::Rank] {
                let slot = state.slot(flow);
                slot.pending = None;
                slot.cancel_requested = false;
            }
            state.session.reset_lifecycle();
            std::mem::take(&mut state.handles)
        };
        release_handles(self.remote.as_ref(), handles);
    }
}

fn release_handles(remote: &dyn RemoteSession, handles: Handles) {
    for (controller, what) in [
        (handles.submission, "submission"),
        (handles.rank, "rank"),
    ] {
        let Some(controller) = controller else {
            continue;
        };
        debug!("Cancelling {} controller", what);
        if let Err(status) = remote.cancel(controller) {
            error!(
                "Cancel {} controller failed: {}",
                what,
                remote.describe_status(status)
            );
        }
        debug!("Releasing {} controller", what);
        remote.release_controller(controller);
    }

    if let Some(client) = handles.client {
        debug!("Releasing client");
        remote.release_client(client);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if state.session.initialized {
            debug!("Tracker dropped while initialized, tearing down");
        }
        state.session.reset_lifecycle();
        state.submission.pending = None;
        state.rank.pending = None;
        let handles = std::mem::take(&mut state.handles);
        release_handles(self.remote.as_ref(), handles);
    }
}
