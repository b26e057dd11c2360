//! Interactive brew: time the pours on the terminal, then save the result.

use std::{io::Write, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::watch,
    task::JoinHandle,
};

use crate::{
    cli::BrewArgs,
    entries::EntryRepository,
    form::{format_number, EntryForm},
    models::CoffeeEntry,
    settings::BrewSettings,
    storage::KeyValueStorage,
    timer::{BrewInputs, ExtractionPhase, SystemClock, TimerController, TimerSnapshot},
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrewCommand {
    Pour,
    Adjust(f64),
    Reset,
    Confirm,
    Cancel,
    Finish,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("{0} g is not one of the offered amounts ({1})")]
    UnsupportedIncrement(String, String),
}

fn increments_label(increments: &[f64]) -> String {
    increments
        .iter()
        .map(|step| format!("{step:+}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads one line of input. Adjustments must be one of `increments`.
pub fn parse_command(line: &str, increments: &[f64]) -> Result<BrewCommand, CommandError> {
    let trimmed = line.trim();
    let command = match trimmed.to_ascii_lowercase().as_str() {
        "p" | "pour" => BrewCommand::Pour,
        "r" | "reset" => BrewCommand::Reset,
        "c" | "confirm" => BrewCommand::Confirm,
        "x" | "cancel" => BrewCommand::Cancel,
        "f" | "finish" => BrewCommand::Finish,
        "q" | "quit" => BrewCommand::Quit,
        other if other.starts_with('+') || other.starts_with('-') => {
            let delta = other
                .parse::<f64>()
                .map_err(|_| CommandError::Unknown(trimmed.to_string()))?;
            if !increments.contains(&delta) {
                return Err(CommandError::UnsupportedIncrement(
                    trimmed.to_string(),
                    increments_label(increments),
                ));
            }
            BrewCommand::Adjust(delta)
        }
        _ => return Err(CommandError::Unknown(trimmed.to_string())),
    };
    Ok(command)
}

pub fn format_elapsed(snapshot: &TimerSnapshot) -> String {
    format!("{}s", snapshot.elapsed_secs())
}

/// One status line for the current snapshot.
pub fn describe(snapshot: &TimerSnapshot) -> String {
    let poured: f64 = snapshot.laps.iter().map(|lap| lap.water_amount).sum();
    match snapshot.phase {
        ExtractionPhase::Idle => "idle".to_string(),
        ExtractionPhase::Running => format!(
            "{}  {} pour(s), {} g total",
            format_elapsed(snapshot),
            snapshot.laps.len(),
            format_number(poured)
        ),
        ExtractionPhase::AwaitingLapAmount => format!(
            "{}  pour amount: {} g",
            format_elapsed(snapshot),
            format_number(snapshot.pending_amount)
        ),
        ExtractionPhase::Finished => "finished".to_string(),
    }
}

fn help_line(increments: &[f64]) -> String {
    format!(
        "p pour | {} adjust | r reset | c confirm | x cancel | f finish | q quit",
        increments_label(increments)
    )
}

/// Drives `controller` from `input` until the brew is finished or abandoned.
///
/// Returns the saved entry, or `None` when the user quit or input ended
/// before the brew was finished.
pub async fn run_brew<S, R, W>(
    controller: &TimerController,
    repo: &EntryRepository<S>,
    increments: &[f64],
    args: BrewArgs,
    input: R,
    out: &mut W,
) -> Result<Option<CoffeeEntry>>
where
    S: KeyValueStorage,
    R: AsyncRead + Unpin,
    W: Write,
{
    let inputs = BrewInputs {
        bean_type: args.bean,
        bean_amount: args.bean_amount,
        temperature: args.temperature,
        steam_amount: args.bloom.unwrap_or_default(),
    };
    let started = controller.start(&inputs).await?;
    writeln!(out, "{}", help_line(increments))?;
    writeln!(out, "{}", describe(&started))?;

    let mut lines = BufReader::new(input).lines();
    let handoff = loop {
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            controller.shutdown().await;
            writeln!(out, "input closed; brew discarded")?;
            return Ok(None);
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line, increments) {
            Ok(command) => command,
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };

        let snapshot = match command {
            BrewCommand::Pour => {
                let snapshot = controller.begin_lap().await;
                if snapshot.phase != ExtractionPhase::AwaitingLapAmount {
                    writeln!(out, "a pour is already open")?;
                }
                snapshot
            }
            BrewCommand::Adjust(delta) => controller.adjust_amount(delta).await,
            BrewCommand::Reset => controller.reset_amount().await,
            BrewCommand::Confirm => {
                if !controller.confirm_lap().await {
                    writeln!(out, "set an amount above 0 g first")?;
                }
                controller.snapshot().await
            }
            BrewCommand::Cancel => controller.cancel_lap().await,
            BrewCommand::Finish => match controller.finish().await {
                Some(handoff) => break handoff,
                None => {
                    writeln!(out, "confirm or cancel the open pour first")?;
                    controller.snapshot().await
                }
            },
            BrewCommand::Quit => {
                controller.shutdown().await;
                writeln!(out, "brew discarded")?;
                return Ok(None);
            }
        };
        writeln!(out, "{}", describe(&snapshot))?;
    };

    writeln!(
        out,
        "finished at {}s with {} g poured",
        handoff.extraction_end_time,
        format_number(handoff.water_amount)
    )?;

    let mut form = EntryForm::from_handoff(&handoff);
    if let Some(notes) = args.notes {
        form.set_notes(notes);
    }
    let entry = form.submit(Utc::now()).context("brew not saved")?;
    let created = repo.create(entry).await?;
    log_info!("Saved brew {}", created.id);
    writeln!(out, "saved {}", created.id)?;
    Ok(Some(created))
}

/// Prints the running clock to stderr once per whole second.
fn spawn_display(mut snapshots: watch::Receiver<TimerSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_shown = None;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if !snapshot.phase.is_active() {
                continue;
            }
            let secs = snapshot.elapsed_secs();
            if last_shown != Some(secs) {
                last_shown = Some(secs);
                let mut stderr = std::io::stderr();
                if write!(stderr, "\r{} ", format_elapsed(&snapshot)).is_err()
                    || stderr.flush().is_err()
                {
                    break;
                }
            }
        }
    })
}

/// `brew` against the real terminal.
pub async fn run_interactive<S: KeyValueStorage>(
    repo: &EntryRepository<S>,
    settings: &BrewSettings,
    args: BrewArgs,
) -> Result<()> {
    let controller = TimerController::new(Arc::new(SystemClock), settings.tick_interval());
    let display = spawn_display(controller.subscribe());
    let mut stdout = std::io::stdout();

    let result = run_brew(
        &controller,
        repo,
        &settings.pour_increments,
        args,
        tokio::io::stdin(),
        &mut stdout,
    )
    .await;

    controller.shutdown().await;
    display.abort();
    result.map(|_| ())
}
