#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::mpsc;

use procvisor::display::{DisplayEvent, LogSink};
use procvisor::types::{Classification, LogLine, StreamSource};

/// Records everything posted to a [`LogSink`] in place of the display task.
pub struct EventCapture {
    rx: mpsc::UnboundedReceiver<DisplayEvent>,
    seen: Vec<DisplayEvent>,
}

impl EventCapture {
    pub fn new() -> (LogSink, Self) {
        let (sink, rx) = LogSink::channel();
        (
            sink,
            Self {
                rx,
                seen: Vec::new(),
            },
        )
    }

    /// Pull in whatever is queued right now.
    fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.seen.push(event);
        }
    }

    /// All events so far, in arrival order.
    pub fn events(&mut self) -> Vec<DisplayEvent> {
        self.pump();
        self.seen.clone()
    }

    pub fn lines(&mut self) -> Vec<LogLine> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DisplayEvent::Line(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&mut self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }

    /// Lines forwarded from one child stream.
    pub fn stream(&mut self, source: StreamSource) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|l| l.source == source)
            .collect()
    }

    pub fn stream_texts(&mut self, source: StreamSource) -> Vec<String> {
        self.stream(source).into_iter().map(|l| l.text).collect()
    }

    /// Error-classified lines produced by procvisor itself.
    pub fn supervisor_errors(&mut self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.source == StreamSource::Supervisor && l.class == Classification::Error)
            .map(|l| l.text)
            .collect()
    }

    pub fn contains(&mut self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    /// The sequence of `Controls` toggles seen so far.
    pub fn controls(&mut self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DisplayEvent::Controls { enabled } => Some(enabled),
                _ => None,
            })
            .collect()
    }

    /// Wait until a line containing `needle` arrives.
    pub async fn wait_for_text(&mut self, needle: &str, within: Duration) -> bool {
        if self.contains(needle) {
            return true;
        }

        let deadline = tokio::time::Instant::now() + within;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(event)) => {
                    let hit = matches!(&event, DisplayEvent::Line(l) if l.text.contains(needle));
                    self.seen.push(event);
                    if hit {
                        return true;
                    }
                }
                Ok(None) | Err(_) => return false,
            }
        }
    }
}
