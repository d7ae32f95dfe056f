//! `simulate` subcommand: synthetic users hammering one queue manager

use crate::settings::Settings;
use agent_queue_core::application::ExpirySweeper;
use agent_queue_core::domain::RequestParams;
use agent_queue_core::{AdmissionRequest, QueueConfig, QueueError, QueueManager};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use rand::Rng;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tabled::{Table, Tabled};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SIMULATED_AGENT: &str = "simulated-agent";

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Number of distinct users
    #[arg(short, long, default_value = "3")]
    pub users: usize,

    /// Requests submitted by each user
    #[arg(short, long, default_value = "8")]
    pub requests: usize,

    /// Mean simulated work per request
    #[arg(long, default_value = "400")]
    pub work_ms: u64,

    /// Work time varies by up to this much either way
    #[arg(long, default_value = "200")]
    pub jitter_ms: u64,

    /// Spacing between a user's submissions
    #[arg(long, default_value = "50")]
    pub arrival_ms: u64,

    /// Every Nth queued request gives up while waiting (0 = never)
    #[arg(long, default_value = "0")]
    pub abandon_every: usize,

    /// Log a per-user snapshot this often
    #[arg(long, default_value = "250")]
    pub report_ms: u64,

    /// Override queue.max_concurrent_per_user
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Override queue.max_queue_size
    #[arg(long)]
    pub max_queue: Option<usize>,

    /// Override queue.request_timeout_ms
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl SimulateArgs {
    fn queue_config(&self, base: QueueConfig) -> Result<QueueConfig> {
        let mut config = base;
        if let Some(limit) = self.max_concurrent {
            config = config.with_max_concurrent_per_user(limit);
        }
        if let Some(size) = self.max_queue {
            config = config.with_max_queue_size(size);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(timeout_ms));
        }
        config.validate()?;
        Ok(config)
    }
}

/// How one simulated request ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Completed,
    QueueFull,
    Rejected(QueueError),
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestReport {
    queued: bool,
    outcome: Outcome,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Tabled)]
struct UserTally {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Immediate")]
    immediate: usize,
    #[tabled(rename = "Queued")]
    queued: usize,
    #[tabled(rename = "Completed")]
    completed: usize,
    #[tabled(rename = "Queue full")]
    queue_full: usize,
    #[tabled(rename = "Timed out")]
    timed_out: usize,
    #[tabled(rename = "Cancelled")]
    cancelled: usize,
    #[tabled(rename = "Other")]
    other: usize,
}

impl UserTally {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, report: &RequestReport) {
        match report.outcome {
            Outcome::QueueFull => self.queue_full += 1,
            Outcome::Invalid => self.other += 1,
            _ if report.queued => self.queued += 1,
            _ => self.immediate += 1,
        }

        match &report.outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Rejected(QueueError::Timeout { .. } | QueueError::Expired { .. }) => {
                self.timed_out += 1
            }
            Outcome::Rejected(QueueError::Cancelled) => self.cancelled += 1,
            Outcome::Rejected(_) => self.other += 1,
            Outcome::QueueFull | Outcome::Invalid => {}
        }
    }
}

pub async fn run(settings: &Settings, args: SimulateArgs) -> Result<()> {
    let config = args.queue_config(settings.queue_config()?)?;
    let manager = QueueManager::with_config(config)?;

    info!(
        users = args.users,
        requests = args.requests,
        max_concurrent_per_user = config.max_concurrent_per_user,
        max_queue_size = config.max_queue_size,
        request_timeout_ms = config.request_timeout_ms(),
        "Starting simulation"
    );

    let shutdown = CancellationToken::new();
    let sweeper =
        ExpirySweeper::new(manager.clone(), settings.sweep_interval()?)?.spawn(shutdown.clone());
    let monitor = spawn_monitor(
        manager.clone(),
        Duration::from_millis(args.report_ms.max(1)),
        shutdown.clone(),
    );

    let tallies = drive(&manager, &args).await?;

    shutdown.cancel();
    sweeper.await.context("Sweeper task failed")?;
    monitor.await.context("Monitor task failed")?;

    print_summary(&tallies, manager.tracked_users());
    Ok(())
}

/// Submit every simulated request and wait for all of them to finish
async fn drive(manager: &QueueManager, args: &SimulateArgs) -> Result<Vec<UserTally>> {
    let mut tasks = spawn_requests(manager, args);

    let mut tallies: BTreeMap<String, UserTally> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (user_id, report) = joined.context("Simulated request panicked")?;
        tallies
            .entry(user_id.clone())
            .or_insert_with(|| UserTally::new(&user_id))
            .record(&report);
    }

    Ok(tallies.into_values().collect())
}

fn spawn_requests(
    manager: &QueueManager,
    args: &SimulateArgs,
) -> JoinSet<(String, RequestReport)> {
    let mut tasks = JoinSet::new();
    let mut rng = rand::thread_rng();

    for user_index in 0..args.users {
        let user_id = format!("user-{}", user_index + 1);
        for seq in 0..args.requests {
            let arrival = Duration::from_millis(
                args.arrival_ms * seq as u64 + rng.gen_range(0..=args.arrival_ms),
            );
            let work = Duration::from_millis(rng.gen_range(
                args.work_ms.saturating_sub(args.jitter_ms)..=args.work_ms + args.jitter_ms,
            ));
            let abandon = args.abandon_every > 0 && (seq + 1) % args.abandon_every == 0;
            let manager = manager.clone();
            let user_id = user_id.clone();

            tasks.spawn(async move {
                if !arrival.is_zero() {
                    tokio::time::sleep(arrival).await;
                }
                let report = run_request(&manager, &user_id, seq, work, abandon).await;
                (user_id, report)
            });
        }
    }

    tasks
}

async fn run_request(
    manager: &QueueManager,
    user_id: &str,
    seq: usize,
    work: Duration,
    abandon: bool,
) -> RequestReport {
    let token = CancellationToken::new();
    let request = AdmissionRequest::new(
        user_id,
        SIMULATED_AGENT,
        RequestParams::new(json!({ "seq": seq, "work_ms": work.as_millis() as u64 })),
    )
    .with_cancellation(token.clone());

    let mut admission = match manager.request_admission(request) {
        Ok(admission) => admission,
        Err(err) => {
            let outcome = match err.as_queue_error() {
                Some(QueueError::QueueFull { .. }) => Outcome::QueueFull,
                Some(other) => Outcome::Rejected(other.clone()),
                None => {
                    warn!(user_id = %user_id, error = %err, "Admission failed");
                    Outcome::Invalid
                }
            };
            return RequestReport {
                queued: false,
                outcome,
            };
        }
    };

    let queued = !admission.can_execute;
    let request_id = admission.request_id.clone();

    if queued {
        let stats = manager.get_queue_stats(user_id, Some(&request_id));
        if let Some(message) = QueueManager::get_queue_message(&stats) {
            info!(user_id = %user_id, request_id = %request_id, "{}", message);
        }

        if abandon {
            token.cancel();
            manager.cancel_queued(user_id, &request_id);
        }
    }

    let outcome = match admission.events.started().await {
        Ok(_) => {
            tokio::select! {
                _ = tokio::time::sleep(work) => {
                    manager.report_completion(user_id, &request_id);
                    Outcome::Completed
                }
                Some(err) = admission.events.rejection() => {
                    // Stop in-flight work
                    token.cancel();
                    Outcome::Rejected(err)
                }
            }
        }
        Err(err) => Outcome::Rejected(err),
    };

    RequestReport { queued, outcome }
}

fn spawn_monitor(
    manager: QueueManager,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for user in manager.snapshot() {
                        info!(
                            user_id = %user.user_id,
                            active = user.active,
                            queued = user.queued,
                            "Queue snapshot"
                        );
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    })
}

fn print_summary(tallies: &[UserTally], tracked_users: usize) {
    println!();
    println!("{}", "Simulation summary".cyan().bold());
    println!();
    println!("{}", Table::new(tallies.to_vec()));

    let completed: usize = tallies.iter().map(|t| t.completed).sum();
    let rejected: usize = tallies
        .iter()
        .map(|t| t.queue_full + t.timed_out + t.cancelled + t.other)
        .sum();

    println!();
    println!("  {} {}", "Completed:".bold(), completed.to_string().green());
    println!("  {} {}", "Rejected:".bold(), rejected.to_string().yellow());
    if tracked_users == 0 {
        println!("  {} {}", "Leftover users:".bold(), "0".green());
    } else {
        println!(
            "  {} {}",
            "Leftover users:".bold(),
            tracked_users.to_string().red()
        );
    }
}
