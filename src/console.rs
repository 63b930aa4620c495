use crossterm::style::{Color, Stylize};
use std::{
    fmt::Display,
    io::{self, Write},
    sync::{Arc, Mutex},
};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Info,
    Delivered,
    Waiting,
    Transient,
    Authorization,
    Target,
    Token,
    NoLocalProcess,
}

impl Status {
    fn color(self) -> Color {
        match self {
            Status::Info => Color::Cyan,
            Status::Delivered => Color::Green,
            Status::Waiting | Status::Transient => Color::Yellow,
            Status::Authorization | Status::Target => Color::Red,
            Status::Token => Color::Magenta,
            Status::NoLocalProcess => Color::DarkYellow,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Status::Info => "info",
            Status::Delivered => "sent",
            Status::Waiting => "wait",
            Status::Transient => "retry",
            Status::Authorization => "auth",
            Status::Target => "target",
            Status::Token => "token",
            Status::NoLocalProcess => "player",
        }
    }
}

#[derive(Clone, Debug)]
enum Sink {
    Stdout,
    Silent,
    Recording(Arc<Mutex<Vec<(Status, String)>>>),
}

/// Coloured one-line status output for the operator.
#[derive(Clone, Debug)]
pub struct Console {
    sink: Sink,
}

impl Console {
    pub fn stdout() -> Self {
        Self { sink: Sink::Stdout }
    }

    pub fn silent() -> Self {
        Self { sink: Sink::Silent }
    }

    /// Keeps every status line in memory instead of printing it. Clones share the log.
    pub fn recording() -> Self {
        Self {
            sink: Sink::Recording(Arc::default()),
        }
    }

    /// Lines kept by a recording console; empty for the other sinks.
    pub fn recorded(&self) -> Vec<(Status, String)> {
        match &self.sink {
            Sink::Recording(log) => log.lock().map(|log| log.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn line(&self, status: Status, message: impl Display) {
        let message = message.to_string();
        info!(status = status.label(), "{message}");
        match &self.sink {
            Sink::Stdout => {
                let time = chrono::Local::now().format("%H:%M:%S");
                let tag = format!("[{}]", status.label());
                println!("{time} {} {}", tag.with(status.color()).bold(), message.with(status.color()));
            }
            Sink::Silent => {}
            Sink::Recording(log) => {
                if let Ok(mut log) = log.lock() {
                    log.push((status, message));
                }
            }
        }
    }

    /// Prints a prompt without a trailing newline.
    pub fn prompt(&self, message: impl Display) {
        if !matches!(self.sink, Sink::Stdout) {
            return;
        }
        print!("{} ", message.to_string().with(Color::White).bold());
        let _ = io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_clones_share_one_log() {
        let console = Console::recording();
        let handle = console.clone();
        console.line(Status::Token, "expiring");
        handle.line(Status::Info, format_args!("tick {}", 2));

        assert_eq!(
            console.recorded(),
            vec![
                (Status::Token, "expiring".to_string()),
                (Status::Info, "tick 2".to_string()),
            ]
        );
        assert!(Console::silent().recorded().is_empty());
    }
}
