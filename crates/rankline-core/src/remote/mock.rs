//! Scripted remote for unit tests.
//!
//! Records every call, lets tests inject failures per operation, and only
//! delivers completions when the test asks for them.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    ClientHandle, CompletionCallback, ControllerHandle, RemoteSession, RequestTicket,
    ScoreFields, ScoreHandle, SearchScope, StatusCode, UserHandle,
};
use crate::config::InitParams;
use crate::events::EventLog;
use crate::tracker::ScoreTracker;

#[derive(Default)]
struct Failures {
    client: Option<StatusCode>,
    submission_controller: Option<StatusCode>,
    rank_controller: Option<StatusCode>,
    scope: Option<StatusCode>,
    cancel: Option<StatusCode>,
    create_score: Option<StatusCode>,
    submit: Option<StatusCode>,
    load: Option<StatusCode>,
}

struct MockState {
    next_handle: u64,
    failures: Failures,
    live_clients: usize,
    live_controllers: usize,
    live_scores: HashMap<ScoreHandle, ScoreFields>,
    clients_created: usize,
    clients_released: usize,
    submission_callback: Option<CompletionCallback>,
    rank_callback: Option<CompletionCallback>,
    scope: Option<SearchScope>,
    cancels: Vec<ControllerHandle>,
    submissions: Vec<(RequestTicket, ScoreFields)>,
    rank_loads: Vec<RequestTicket>,
    last_mode: Option<u32>,
    server_score: Option<ScoreFields>,
    rank: u32,
    login: Option<String>,
    cancel_pause: Option<(Sender<()>, Receiver<()>)>,
}

/// Handle on a `cancel` call parked by [`MockRemote::pause_next_cancel`]
pub(crate) struct CancelPause {
    /// Receives once the call is parked
    pub entered: Receiver<()>,
    /// Send to let the call continue
    pub release: Sender<()>,
}

pub(crate) struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 1,
                failures: Failures::default(),
                live_clients: 0,
                live_controllers: 0,
                live_scores: HashMap::new(),
                clients_created: 0,
                clients_released: 0,
                submission_callback: None,
                rank_callback: None,
                scope: None,
                cancels: Vec::new(),
                submissions: Vec::new(),
                rank_loads: Vec::new(),
                last_mode: None,
                server_score: None,
                rank: 1,
                login: Some("player-one".to_string()),
                cancel_pause: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn next_handle(state: &mut MockState) -> u64 {
        let handle = state.next_handle;
        state.next_handle += 1;
        handle
    }

    /// Make one construction step fail: "client", "submission", "rank" or
    /// "scope". Any other name clears all construction failures.
    pub fn fail_construction(&self, step: &str, status: StatusCode) {
        let mut state = self.state();
        let failures = &mut state.failures;
        failures.client = None;
        failures.submission_controller = None;
        failures.rank_controller = None;
        failures.scope = None;
        match step {
            "client" => failures.client = Some(status),
            "submission" => failures.submission_controller = Some(status),
            "rank" => failures.rank_controller = Some(status),
            "scope" => failures.scope = Some(status),
            _ => {}
        }
    }

    /// Park the next `cancel` call until the test releases it
    pub fn pause_next_cancel(&self) -> CancelPause {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.state().cancel_pause = Some((entered_tx, release_rx));
        CancelPause {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn fail_cancel(&self, status: StatusCode) {
        self.state().failures.cancel = Some(status);
    }

    pub fn fail_create_score(&self, status: StatusCode) {
        self.state().failures.create_score = Some(status);
    }

    pub fn fail_submit(&self, status: StatusCode) {
        self.state().failures.submit = Some(status);
    }

    pub fn fail_load(&self, status: StatusCode) {
        self.state().failures.load = Some(status);
    }

    pub fn set_server_score(&self, score: Option<ScoreFields>) {
        self.state().server_score = score;
    }

    pub fn set_rank(&self, rank: u32) {
        self.state().rank = rank;
    }

    pub fn set_login(&self, login: Option<&str>) {
        self.state().login = login.map(str::to_string);
    }

    pub fn live_clients(&self) -> usize {
        self.state().live_clients
    }

    pub fn live_controllers(&self) -> usize {
        self.state().live_controllers
    }

    pub fn live_scores(&self) -> usize {
        self.state().live_scores.len()
    }

    pub fn clients_created(&self) -> usize {
        self.state().clients_created
    }

    pub fn clients_released(&self) -> usize {
        self.state().clients_released
    }

    pub fn scope(&self) -> Option<SearchScope> {
        self.state().scope
    }

    pub fn cancels(&self) -> Vec<ControllerHandle> {
        self.state().cancels.clone()
    }

    pub fn submissions(&self) -> Vec<(RequestTicket, ScoreFields)> {
        self.state().submissions.clone()
    }

    pub fn rank_loads(&self) -> Vec<RequestTicket> {
        self.state().rank_loads.clone()
    }

    pub fn last_mode(&self) -> Option<u32> {
        self.state().last_mode
    }

    /// Deliver a completion for the most recent submission
    pub fn complete_submission(&self, status: StatusCode) {
        let ticket = self.state().submissions.last().map(|(ticket, _)| *ticket);
        if let Some(ticket) = ticket {
            self.complete_submission_ticket(ticket, status);
        }
    }

    pub fn complete_submission_ticket(&self, ticket: RequestTicket, status: StatusCode) {
        let callback = self.state().submission_callback.clone();
        if let Some(callback) = callback {
            callback(ticket, status);
        }
    }

    /// Deliver a completion for the most recent rank lookup
    pub fn complete_rank(&self, status: StatusCode) {
        let ticket = self.state().rank_loads.last().copied();
        if let Some(ticket) = ticket {
            self.complete_rank_ticket(ticket, status);
        }
    }

    pub fn complete_rank_ticket(&self, ticket: RequestTicket, status: StatusCode) {
        let callback = self.state().rank_callback.clone();
        if let Some(callback) = callback {
            callback(ticket, status);
        }
    }
}

impl RemoteSession for MockRemote {
    fn create_client(&self, _params: &InitParams) -> Result<ClientHandle, StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.client {
            return Err(status);
        }
        state.live_clients += 1;
        state.clients_created += 1;
        Ok(ClientHandle(Self::next_handle(&mut state)))
    }

    fn create_submission_controller(
        &self,
        _client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.submission_controller {
            return Err(status);
        }
        state.live_controllers += 1;
        state.submission_callback = Some(on_complete);
        Ok(ControllerHandle(Self::next_handle(&mut state)))
    }

    fn create_rank_controller(
        &self,
        _client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.rank_controller {
            return Err(status);
        }
        state.live_controllers += 1;
        state.rank_callback = Some(on_complete);
        Ok(ControllerHandle(Self::next_handle(&mut state)))
    }

    fn set_rank_search_scope(
        &self,
        _controller: ControllerHandle,
        scope: SearchScope,
    ) -> Result<(), StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.scope {
            return Err(status);
        }
        state.scope = Some(scope);
        Ok(())
    }

    fn cancel(&self, controller: ControllerHandle) -> Result<(), StatusCode> {
        let pause = self.state().cancel_pause.take();
        if let Some((entered, release)) = pause {
            let _ = entered.send(());
            let _ = release.recv();
        }

        let mut state = self.state();
        state.cancels.push(controller);
        match state.failures.cancel {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }

    fn release_controller(&self, _controller: ControllerHandle) {
        self.state().live_controllers -= 1;
    }

    fn release_client(&self, _client: ClientHandle) {
        let mut state = self.state();
        state.live_clients -= 1;
        state.clients_released += 1;
    }

    fn create_score(&self, _client: ClientHandle) -> Result<ScoreHandle, StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.create_score {
            return Err(status);
        }
        let handle = ScoreHandle(Self::next_handle(&mut state));
        state.live_scores.insert(handle, ScoreFields::default());
        Ok(handle)
    }

    fn set_score_fields(&self, score: ScoreHandle, fields: &ScoreFields) {
        self.state().live_scores.insert(score, *fields);
    }

    fn release_score(&self, score: ScoreHandle) {
        self.state().live_scores.remove(&score);
    }

    fn submit_score(
        &self,
        _controller: ControllerHandle,
        score: ScoreHandle,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.submit {
            return Err(status);
        }
        let fields = state
            .live_scores
            .get(&score)
            .copied()
            .ok_or(StatusCode::InvalidArgument)?;
        state.submissions.push((ticket, fields));
        Ok(())
    }

    fn load_rank_for_user(
        &self,
        _controller: ControllerHandle,
        _user: UserHandle,
        mode: u32,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        let mut state = self.state();
        if let Some(status) = state.failures.load {
            return Err(status);
        }
        state.last_mode = Some(mode);
        state.rank_loads.push(ticket);
        Ok(())
    }

    fn score_from_rank_result(&self, _controller: ControllerHandle) -> Option<ScoreFields> {
        self.state().server_score
    }

    fn rank_from_result(&self, _controller: ControllerHandle) -> u32 {
        self.state().rank
    }

    fn current_user(&self, client: ClientHandle) -> UserHandle {
        UserHandle(client.0)
    }

    fn login(&self, _user: UserHandle) -> Option<String> {
        self.state().login.clone()
    }
}

pub(crate) fn test_params() -> InitParams {
    InitParams::new("g", "s", "1.0", "USD", "en")
}

pub(crate) fn server_score(result: u32, minor_result: u32, level: u32) -> ScoreFields {
    ScoreFields {
        result,
        mode: 0,
        level,
        minor_result,
    }
}

/// Tracker that has finished its bootstrap rank fetch
pub(crate) fn ready_tracker(
    score: Option<ScoreFields>,
) -> (ScoreTracker, Arc<MockRemote>, Arc<EventLog>) {
    let remote = Arc::new(MockRemote::new());
    let events = Arc::new(EventLog::new());
    let tracker = ScoreTracker::new(remote.clone(), events.clone());
    remote.set_server_score(score);
    tracker.init(&test_params()).unwrap();
    remote.complete_rank(StatusCode::Ok);
    assert!(tracker.snapshot().available);
    (tracker, remote, events)
}
