//! `slotctl` — inspect tutor schedules and replay booking scenarios from the
//! command line.
//!
//! ## Usage
//!
//! ```sh
//! # List bookable slots for a tutor on a date
//! slotctl slots -s schedule.json --tutor alice --date 2026-03-16 --now 2026-03-15T12:00:00Z
//!
//! # Replay a scripted hold/finalize sequence (stdin or file)
//! slotctl replay -s schedule.json -i script.json
//! cat script.json | slotctl replay -s schedule.json
//! ```
//!
//! The schedule file declares the engine config and the tutors; the script
//! file carries an explicit starting `now` plus a list of steps, so replays
//! are fully deterministic. Logs go to stderr, results to stdout as one JSON
//! object per step.

use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use slot_engine::{AvailabilityException, AvailabilityRule, Scheduler, SchedulerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "slotctl", version, about = "Tutor booking engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookable slots for a tutor on a date
    Slots {
        /// Schedule file (config + tutors)
        #[arg(short, long)]
        schedule: String,
        /// Tutor id to query
        #[arg(short, long)]
        tutor: String,
        /// Calendar date in the tutor's timezone (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
        /// Clock to evaluate against (RFC 3339)
        #[arg(short, long)]
        now: DateTime<Utc>,
    },
    /// Replay a scripted sequence of booking operations
    Replay {
        /// Schedule file (config + tutors)
        #[arg(short, long)]
        schedule: String,
        /// Script file (reads from stdin if omitted)
        #[arg(short = 'i', long)]
        script: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Input formats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    config: SchedulerConfig,
    tutors: Vec<TutorEntry>,
}

#[derive(Deserialize)]
struct TutorEntry {
    id: String,
    timezone: String,
    duration_minutes: u32,
    #[serde(default)]
    rules: Vec<AvailabilityRule>,
    #[serde(default)]
    exceptions: Vec<AvailabilityException>,
}

#[derive(Deserialize)]
struct Script {
    /// Starting clock for the replay.
    now: DateTime<Utc>,
    steps: Vec<Step>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Slots {
        tutor: String,
        date: NaiveDate,
    },
    Hold {
        tutor: String,
        consumer: String,
        start_at: DateTime<Utc>,
        /// Defaults to the tutor's configured session length.
        duration_minutes: Option<u32>,
    },
    Finalize {
        /// Index of a previously created hold (0-based, in creation order).
        hold: usize,
        consumer: String,
        student: String,
        #[serde(default)]
        intake: serde_json::Value,
    },
    Cancel {
        /// Index of a previously created booking (0-based, in creation order).
        booking: usize,
        consumer: String,
    },
    Advance {
        minutes: i64,
    },
    Sweep,
}

#[derive(Serialize)]
struct StepOutcome {
    step: usize,
    op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Slots {
            schedule,
            tutor,
            date,
            now,
        } => run_slots(&schedule, &tutor, date, now),
        Commands::Replay { schedule, script } => run_replay(&schedule, script.as_deref()),
    }
}

fn load_schedule(path: &str) -> Result<(Scheduler, ScheduleFile)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schedule file: {path}"))?;
    let file: ScheduleFile =
        serde_json::from_str(&raw).with_context(|| format!("invalid schedule file: {path}"))?;

    let scheduler = Scheduler::new(file.config);
    for tutor in &file.tutors {
        scheduler
            .register_tutor(
                &tutor.id,
                &tutor.timezone,
                tutor.duration_minutes,
                tutor.rules.clone(),
                tutor.exceptions.clone(),
            )
            .with_context(|| format!("failed to register tutor: {}", tutor.id))?;
    }
    tracing::debug!(tutors = file.tutors.len(), "schedule loaded");
    Ok((scheduler, file))
}

fn run_slots(schedule: &str, tutor: &str, date: NaiveDate, now: DateTime<Utc>) -> Result<()> {
    let (scheduler, _) = load_schedule(schedule)?;
    let slots = scheduler
        .generate_slots(tutor, date, now)
        .with_context(|| format!("slot query failed for tutor {tutor}"))?;
    println!("{}", serde_json::to_string_pretty(&slots)?);
    Ok(())
}

fn run_replay(schedule: &str, script_path: Option<&str>) -> Result<()> {
    let (scheduler, file) = load_schedule(schedule)?;

    let raw = match script_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script file: {path}"))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            buf
        }
    };
    let script: Script = serde_json::from_str(&raw).context("invalid script")?;

    let mut now = script.now;
    let mut holds = Vec::new();
    let mut bookings = Vec::new();

    for (step, op) in script.steps.into_iter().enumerate() {
        let outcome = match op {
            Step::Slots { tutor, date } => outcome(
                step,
                "slots",
                scheduler
                    .generate_slots(&tutor, date, now)
                    .map(|s| serde_json::to_value(s).unwrap_or_default()),
            ),
            Step::Hold {
                tutor,
                consumer,
                start_at,
                duration_minutes,
            } => {
                let duration = match duration_minutes {
                    Some(d) => d,
                    None => match file.tutors.iter().find(|t| t.id == tutor) {
                        Some(entry) => entry.duration_minutes,
                        None => bail!("script references unknown tutor: {tutor}"),
                    },
                };
                let result = scheduler.create_hold(&tutor, &consumer, start_at, duration, now);
                if let Ok(hold) = &result {
                    holds.push(hold.clone());
                }
                outcome(
                    step,
                    "hold",
                    result.map(|h| serde_json::to_value(h).unwrap_or_default()),
                )
            }
            Step::Finalize {
                hold,
                consumer,
                student,
                intake,
            } => {
                let Some(held) = holds.get(hold) else {
                    bail!("script references hold #{hold} before it was created");
                };
                let result =
                    scheduler.finalize_booking(held.id, &consumer, &student, intake, now);
                if let Ok(booking) = &result {
                    bookings.push(booking.clone());
                }
                outcome(
                    step,
                    "finalize",
                    result.map(|b| serde_json::to_value(b).unwrap_or_default()),
                )
            }
            Step::Cancel { booking, consumer } => {
                let Some(booked) = bookings.get(booking) else {
                    bail!("script references booking #{booking} before it was created");
                };
                outcome(
                    step,
                    "cancel",
                    scheduler
                        .cancel_booking(booked.id, &consumer, now)
                        .map(|b| serde_json::to_value(b).unwrap_or_default()),
                )
            }
            Step::Advance { minutes } => {
                now += Duration::minutes(minutes);
                StepOutcome {
                    step,
                    op: "advance",
                    result: Some(serde_json::json!({ "now": now })),
                    error: None,
                }
            }
            Step::Sweep => {
                let purged = scheduler.sweep_expired(now);
                StepOutcome {
                    step,
                    op: "sweep",
                    result: Some(serde_json::json!({ "purged": purged })),
                    error: None,
                }
            }
        };
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

fn outcome(
    step: usize,
    op: &'static str,
    result: slot_engine::Result<serde_json::Value>,
) -> StepOutcome {
    match result {
        Ok(value) => StepOutcome {
            step,
            op,
            result: Some(value),
            error: None,
        },
        Err(err) => StepOutcome {
            step,
            op,
            result: None,
            error: Some(err.to_string()),
        },
    }
}
