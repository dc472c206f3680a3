//! `watch`: follow the live channel until Ctrl-C.
//!
//! Renders the fleet at most once per `--interval`, and reports connection
//! and error transitions on stderr as they happen.

use std::time::Duration;

use chrono::Local;
use owo_colors::OwoColorize;
use tokio::time::MissedTickBehavior;

use ambutrack_core::error::NO_TOKEN_MESSAGE;
use ambutrack_core::{ConnectionState, FleetSnapshot, Tracker};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    tracker: &Tracker,
    args: WatchArgs,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut fleet = tracker.fleet();
    let mut states = tracker.connection_state();
    let mut errors = tracker.errors();

    tracker.connect().await;

    if tracker.state() == ConnectionState::Disconnected && !tracker.reconnect_pending() {
        let message = tracker.error();
        if message.as_deref() == Some(NO_TOKEN_MESSAGE) {
            return Err(CliError::NoToken {
                profile: profile_name.into(),
            });
        }
        return Err(CliError::ConnectionFailed {
            reason: message.unwrap_or_else(|| "channel closed during handshake".into()),
        });
    }

    let state = *states.borrow_and_update();
    notice(global, &format!("channel {}", output::paint_state(state, color)));
    if let Some(message) = errors.borrow_and_update().clone() {
        report_error(global, &message, color);
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut dirty = false;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                notice(global, "interrupted, disconnecting");
                break;
            }
            snapshot = fleet.changed() => {
                let Some(snapshot) = snapshot else { break };
                if args.once {
                    print_fleet(tracker, global, &snapshot)?;
                    break;
                }
                dirty = true;
            }
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                notice(global, &format!("channel {}", output::paint_state(state, color)));
            }
            Ok(()) = errors.changed() => {
                let current = errors.borrow_and_update().clone();
                if let Some(message) = current {
                    report_error(global, &message, color);
                    if args.once && tracker.store().last_bootstrap().is_none() && !tracker.is_loading() {
                        tracker.disconnect();
                        return Err(CliError::Tracking { message });
                    }
                }
            }
            _ = ticker.tick() => {
                if dirty {
                    print_fleet(tracker, global, fleet.current())?;
                    dirty = false;
                }
            }
        }
    }

    tracker.disconnect();
    Ok(())
}

fn print_fleet(
    tracker: &Tracker,
    global: &GlobalOpts,
    snapshot: &FleetSnapshot,
) -> Result<(), CliError> {
    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!(
            "── {} · {} ──",
            Local::now().format("%H:%M:%S"),
            fleet_summary(snapshot, tracker.store().data_age())
        );
    }
    let out = output::render_fleet(global, snapshot.as_slice())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// `"5 vehicles · 3 available · data 4s old"`.
fn fleet_summary(snapshot: &FleetSnapshot, age: Option<chrono::Duration>) -> String {
    let available = snapshot
        .iter()
        .filter(|v| v.status.is_dispatchable())
        .count();
    let mut summary = format!("{} vehicles · {available} available", snapshot.len());
    if let Some(age) = age.and_then(|a| a.to_std().ok()) {
        let age = Duration::from_secs(age.as_secs());
        summary.push_str(&format!(" · data {} old", humantime::format_duration(age)));
    }
    summary
}

fn notice(global: &GlobalOpts, message: &str) {
    if !global.quiet {
        eprintln!("· {message}");
    }
}

fn report_error(global: &GlobalOpts, message: &str, color: bool) {
    if global.quiet {
        return;
    }
    if color {
        eprintln!("{} {message}", "error:".red().bold());
    } else {
        eprintln!("error: {message}");
    }
}
