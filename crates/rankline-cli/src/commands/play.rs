//! Scripted session against the loopback service.
//!
//! Runs `init`, waits for the bootstrap rank event, submits each score in
//! order and waits for its flow to settle, then terminates.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rankline_core::{
    BestScore, EventSink, LEADERBOARD_MODE, LeaderboardEvent, LoopbackRemote, Phase,
    ScoreTracker,
};
use tracing::{debug, info, warn};

use super::load_config;
use crate::output::{OutputFormat, format_event};

pub struct PlayOptions<'a> {
    pub config_path: &'a Path,
    pub secret: Option<String>,
    pub seed: Option<BestScore>,
    pub format: OutputFormat,
    pub timeout_secs: u64,
    pub scores: &'a [BestScore],
}

/// Forwards tracker events to the main thread
struct ChannelSink {
    tx: Mutex<Sender<LeaderboardEvent>>,
}

impl EventSink for ChannelSink {
    fn emit(&self, event: LeaderboardEvent) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if tx.send(event).is_err() {
            debug!("Event receiver gone, dropping event");
        }
    }
}

struct EventWaiter {
    rx: Receiver<LeaderboardEvent>,
    format: OutputFormat,
    timeout: Duration,
}

impl EventWaiter {
    /// Print events until one for `phase` arrives, and return it
    fn wait_for(&self, phase: Phase) -> Result<LeaderboardEvent> {
        loop {
            let event = match self.rx.recv_timeout(self.timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    bail!(
                        "Timed out after {}s waiting for {}",
                        self.timeout.as_secs(),
                        phase
                    )
                }
                Err(RecvTimeoutError::Disconnected) => bail!("Event channel closed"),
            };

            println!("{}", format_event(self.format, &event, Local::now()));
            if event.phase == phase {
                return Ok(event);
            }
        }
    }
}

pub fn run(options: PlayOptions<'_>) -> Result<()> {
    let mut config = load_config(options.config_path)?;
    if let Some(secret) = options.secret {
        config.game.game_secret = secret;
    }
    if let Some(seed) = options.seed {
        config.loopback.stored_score = Some(seed.to_fields(LEADERBOARD_MODE));
    }

    let remote = Arc::new(LoopbackRemote::new(config.loopback.clone()));
    let (tx, rx) = mpsc::channel();
    let sink = ChannelSink { tx: Mutex::new(tx) };
    let tracker = ScoreTracker::new(remote, Arc::new(sink));
    let waiter = EventWaiter {
        rx,
        format: options.format,
        timeout: Duration::from_secs(options.timeout_secs),
    };

    tracker
        .init(&config.game)
        .context("Failed to initialize leaderboard session")?;

    let bootstrap = waiter.wait_for(Phase::RankRequest)?;
    if !bootstrap.success {
        tracker.terminate();
        bail!("Bootstrap rank request failed");
    }

    for score in options.scores {
        info!(
            "Submitting result={} minorResult={} level={}",
            score.result, score.minor_result, score.level
        );
        tracker.submit_result(score.result, score.minor_result, score.level);

        let submitted = waiter.wait_for(Phase::ResultSubmit)?;
        if submitted.success {
            waiter.wait_for(Phase::RankRequest)?;
        } else {
            warn!("Score was not submitted");
        }
    }

    let snapshot = tracker.snapshot();
    info!(
        "Session done: best=({}, {}, level {}) rank={} login={}",
        snapshot.best.result,
        snapshot.best.minor_result,
        snapshot.best.level,
        snapshot.rank,
        snapshot.login
    );

    tracker.terminate();
    Ok(())
}
