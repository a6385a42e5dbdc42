//! Console event reporter
//!
//! Subscribes to the run's event bus and renders progress to the
//! terminal: lifecycle lines on stderr, task output on stdout prefixed
//! with the task's label. Purely observational; it never feeds back into
//! scheduling.

use std::io::{self, IsTerminal};

use convoy_core::{Event, RunEvent, RunTally, TaskEvent};
use tokio::sync::broadcast::{error::RecvError, Receiver};

/// Drain the bus until every sender is gone
pub async fn report(mut rx: Receiver<Event>, verbose: bool) {
    let colors = io::stderr().is_terminal();
    loop {
        match rx.recv().await {
            Ok(event) => print_event(&event, verbose, colors),
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("convoy: dropped {skipped} progress events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &Event, verbose: bool, colors: bool) {
    match event {
        Event::Task(TaskEvent::Started { label, .. }) => {
            if verbose {
                eprintln!("{} {label}", paint("▶", "34", colors));
            }
        }
        Event::Task(TaskEvent::Completed {
            label,
            failed,
            duration_ms,
            ..
        }) => {
            if *failed {
                eprintln!(
                    "{} {label} ({})",
                    paint("✗", "31", colors),
                    format_duration(*duration_ms)
                );
            } else {
                eprintln!(
                    "{} {label} ({})",
                    paint("✓", "32", colors),
                    format_duration(*duration_ms)
                );
            }
        }
        Event::Task(TaskEvent::Output { label, line, .. }) => {
            println!("{label} {} {line}", paint("|", "2", colors));
        }
        Event::Task(TaskEvent::ErrorOutput { label, line, .. }) => {
            eprintln!("{label} {} {line}", paint("|", "31", colors));
        }
        Event::Run(RunEvent::RunStarted { total_tasks }) => {
            if verbose {
                eprintln!("running {total_tasks} tasks");
            }
        }
        Event::Run(RunEvent::RunFinished { tally }) => {
            print_summary(tally, colors);
        }
    }
}

fn print_summary(tally: &RunTally, colors: bool) {
    if tally.failed > 0 {
        eprintln!(
            "{} {} succeeded, {} failed",
            paint("✗", "31", colors),
            tally.success,
            tally.failed
        );
    } else {
        eprintln!(
            "{} {} succeeded",
            paint("✓", "32", colors),
            tally.success
        );
    }
}

fn paint(text: &str, code: &str, colors: bool) -> String {
    if colors {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms}ms")
    }
}
