//! In-process remote backed by a worker thread.
//!
//! Requests are queued on an `mpsc` channel and processed by a background
//! thread, which then invokes the controller's completion callback. This
//! gives the tracker the same threading it sees against a real service:
//! completions arrive on a thread other than the caller's.
//!
//! The "leaderboard" is one stored best score for the local user plus a
//! fixed list of rival results. Rank is `1 + rivals strictly ahead`.
//!
//! Cancelling a controller drops its in-flight request; the worker still
//! calls back for it with [`StatusCode::RequestCancelled`].

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{
    ClientHandle, CompletionCallback, ControllerHandle, RemoteSession, RequestTicket,
    ScoreFields, ScoreHandle, SearchScope, StatusCode, UserHandle,
};
use crate::config::InitParams;
use crate::session::BestScore;

/// Behaviour of the loopback remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Login reported for the local user; empty means none
    pub login: String,
    /// Results of other players on the board
    pub rivals: Vec<u32>,
    /// Delay before each request is processed
    pub latency_ms: u64,
    /// Score already stored for the local user
    pub stored_score: Option<ScoreFields>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            login: "player".to_string(),
            rivals: Vec::new(),
            latency_ms: 0,
            stored_score: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerKind {
    Submission,
    Rank,
}

struct Controller {
    kind: ControllerKind,
    callback: CompletionCallback,
    in_flight: Option<RequestTicket>,
    last_rank: u32,
    last_score: Option<ScoreFields>,
}

enum Job {
    Submit {
        controller: ControllerHandle,
        ticket: RequestTicket,
        fields: ScoreFields,
    },
    LoadRank {
        controller: ControllerHandle,
        ticket: RequestTicket,
    },
    Shutdown,
}

struct Board {
    next_handle: u64,
    config: LoopbackConfig,
    stored: Option<ScoreFields>,
    clients: HashSet<ClientHandle>,
    controllers: HashMap<ControllerHandle, Controller>,
    scores: HashMap<ScoreHandle, ScoreFields>,
}

impl Board {
    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn rank(&self) -> u32 {
        let own = self.stored.map(|s| s.result).unwrap_or(0);
        let ahead = self.config.rivals.iter().filter(|&&r| r > own).count();
        (ahead as u32).saturating_add(1)
    }

    fn submit(&mut self, fields: ScoreFields) {
        let better = match self.stored {
            Some(stored) => BestScore::from(fields).improves_on(&BestScore::from(stored)),
            None => true,
        };
        if better {
            self.stored = Some(fields);
        }
    }
}

/// Loopback implementation of [`RemoteSession`]
pub struct LoopbackRemote {
    board: Arc<Mutex<Board>>,
    jobs: Sender<Job>,
    worker: Option<JoinHandle<()>>,
}

impl LoopbackRemote {
    pub fn new(config: LoopbackConfig) -> Self {
        let latency = Duration::from_millis(config.latency_ms);
        let board = Arc::new(Mutex::new(Board {
            next_handle: 1,
            stored: config.stored_score,
            config,
            clients: HashSet::new(),
            controllers: HashMap::new(),
            scores: HashMap::new(),
        }));

        let (tx, rx) = mpsc::channel();
        let worker_board = Arc::clone(&board);
        let worker = thread::Builder::new()
            .name("rankline-loopback".to_string())
            .spawn(move || worker_loop(worker_board, rx, latency))
            .ok();
        if worker.is_none() {
            warn!("Failed to spawn loopback worker, requests will never complete");
        }

        Self {
            board,
            jobs: tx,
            worker,
        }
    }

    fn board(&self) -> MutexGuard<'_, Board> {
        lock_board(&self.board)
    }

    /// Best score stored for the local user
    pub fn stored_score(&self) -> Option<ScoreFields> {
        self.board().stored
    }

    /// Number of clients and controllers not yet released
    pub fn live_handles(&self) -> usize {
        let board = self.board();
        board.clients.len() + board.controllers.len()
    }

    fn create_controller(
        &self,
        client: ClientHandle,
        kind: ControllerKind,
        callback: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode> {
        let mut board = self.board();
        if !board.clients.contains(&client) {
            return Err(StatusCode::InvalidArgument);
        }
        let handle = ControllerHandle(board.allocate());
        board.controllers.insert(
            handle,
            Controller {
                kind,
                callback,
                in_flight: None,
                last_rank: 0,
                last_score: None,
            },
        );
        debug!("Loopback created {:?} controller {:?}", kind, handle);
        Ok(handle)
    }

    /// Mark a request in flight and queue it for the worker
    fn enqueue(
        &self,
        controller: ControllerHandle,
        kind: ControllerKind,
        ticket: RequestTicket,
        job: Job,
    ) -> Result<(), StatusCode> {
        {
            let mut board = self.board();
            let entry = board
                .controllers
                .get_mut(&controller)
                .filter(|c| c.kind == kind)
                .ok_or(StatusCode::InvalidArgument)?;
            if entry.in_flight.is_some() {
                return Err(StatusCode::InvalidState);
            }
            entry.in_flight = Some(ticket);
        }

        if self.jobs.send(job).is_err() {
            if let Some(entry) = self.board().controllers.get_mut(&controller) {
                entry.in_flight = None;
            }
            return Err(StatusCode::RequestFailed);
        }
        Ok(())
    }
}

fn lock_board(board: &Mutex<Board>) -> MutexGuard<'_, Board> {
    board.lock().unwrap_or_else(|e| e.into_inner())
}

fn worker_loop(board: Arc<Mutex<Board>>, jobs: Receiver<Job>, latency: Duration) {
    while let Ok(job) = jobs.recv() {
        let (controller, ticket) = match &job {
            Job::Submit {
                controller, ticket, ..
            }
            | Job::LoadRank { controller, ticket } => (*controller, *ticket),
            Job::Shutdown => break,
        };

        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let delivery = {
            let mut board = lock_board(&board);
            let current = board
                .controllers
                .get(&controller)
                .map(|c| (c.in_flight == Some(ticket), c.callback.clone()));

            match current {
                None => None,
                Some((false, callback)) => Some((callback, StatusCode::RequestCancelled)),
                Some((true, callback)) => {
                    let rank = match job {
                        Job::Submit { fields, .. } => {
                            board.submit(fields);
                            None
                        }
                        _ => Some((board.rank(), board.stored)),
                    };
                    if let Some(entry) = board.controllers.get_mut(&controller) {
                        entry.in_flight = None;
                        if let Some((rank, score)) = rank {
                            entry.last_rank = rank;
                            entry.last_score = score;
                        }
                    }
                    Some((callback, StatusCode::Ok))
                }
            }
        };

        match delivery {
            Some((callback, status)) => {
                trace!("Loopback completing {} with {}", ticket, status);
                callback(ticket, status);
            }
            None => debug!("Loopback dropped {} for released controller", ticket),
        }
    }
    debug!("Loopback worker stopped");
}

impl Drop for LoopbackRemote {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            // The last reference can be dropped from inside a completion
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl RemoteSession for LoopbackRemote {
    fn create_client(&self, params: &InitParams) -> Result<ClientHandle, StatusCode> {
        if params.game_id.is_empty() {
            return Err(StatusCode::InvalidArgument);
        }
        let mut board = self.board();
        let handle = ClientHandle(board.allocate());
        board.clients.insert(handle);
        debug!(
            "Loopback client {:?} for game {} v{}",
            handle, params.game_id, params.game_version
        );
        Ok(handle)
    }

    fn create_submission_controller(
        &self,
        client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode> {
        self.create_controller(client, ControllerKind::Submission, on_complete)
    }

    fn create_rank_controller(
        &self,
        client: ClientHandle,
        on_complete: CompletionCallback,
    ) -> Result<ControllerHandle, StatusCode> {
        self.create_controller(client, ControllerKind::Rank, on_complete)
    }

    fn set_rank_search_scope(
        &self,
        controller: ControllerHandle,
        scope: SearchScope,
    ) -> Result<(), StatusCode> {
        let board = self.board();
        match board.controllers.get(&controller) {
            Some(entry) if entry.kind == ControllerKind::Rank => {
                debug!("Loopback rank scope for {:?} set to {}", controller, scope);
                Ok(())
            }
            _ => Err(StatusCode::InvalidArgument),
        }
    }

    fn cancel(&self, controller: ControllerHandle) -> Result<(), StatusCode> {
        let mut board = self.board();
        let entry = board
            .controllers
            .get_mut(&controller)
            .ok_or(StatusCode::InvalidArgument)?;
        if let Some(ticket) = entry.in_flight.take() {
            debug!("Loopback cancelled {}", ticket);
        }
        Ok(())
    }

    fn release_controller(&self, controller: ControllerHandle) {
        self.board().controllers.remove(&controller);
    }

    fn release_client(&self, client: ClientHandle) {
        self.board().clients.remove(&client);
    }

    fn create_score(&self, client: ClientHandle) -> Result<ScoreHandle, StatusCode> {
        let mut board = self.board();
        if !board.clients.contains(&client) {
            return Err(StatusCode::InvalidArgument);
        }
        let handle = ScoreHandle(board.allocate());
        board.scores.insert(handle, ScoreFields::default());
        Ok(handle)
    }

    fn set_score_fields(&self, score: ScoreHandle, fields: &ScoreFields) {
        if let Some(entry) = self.board().scores.get_mut(&score) {
            *entry = *fields;
        }
    }

    fn release_score(&self, score: ScoreHandle) {
        self.board().scores.remove(&score);
    }

    fn submit_score(
        &self,
        controller: ControllerHandle,
        score: ScoreHandle,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        let fields = self
            .board()
            .scores
            .get(&score)
            .copied()
            .ok_or(StatusCode::InvalidArgument)?;
        self.enqueue(
            controller,
            ControllerKind::Submission,
            ticket,
            Job::Submit {
                controller,
                ticket,
                fields,
            },
        )
    }

    fn load_rank_for_user(
        &self,
        controller: ControllerHandle,
        _user: UserHandle,
        _mode: u32,
        ticket: RequestTicket,
    ) -> Result<(), StatusCode> {
        self.enqueue(
            controller,
            ControllerKind::Rank,
            ticket,
            Job::LoadRank { controller, ticket },
        )
    }

    fn score_from_rank_result(&self, controller: ControllerHandle) -> Option<ScoreFields> {
        self.board()
            .controllers
            .get(&controller)
            .and_then(|c| c.last_score)
    }

    fn rank_from_result(&self, controller: ControllerHandle) -> u32 {
        self.board()
            .controllers
            .get(&controller)
            .map(|c| c.last_rank)
            .unwrap_or(0)
    }

    fn current_user(&self, client: ClientHandle) -> UserHandle {
        UserHandle(client.0)
    }

    fn login(&self, _user: UserHandle) -> Option<String> {
        let board = self.board();
        (!board.config.login.is_empty()).then(|| board.config.login.clone())
    }
}
