//! Where a received chat line goes.
//!
//! Pulled out behind a trait for the same reason the original source's
//! display path is worth abstracting: the engine's dispatch logic is
//! otherwise untestable without capturing real stdout. Production wires
//! [`StdoutSink`]; engine tests wire a channel-backed sink instead.

pub trait OutputSink: Send + Sync {
    fn chat_line(&self, nickname: &str, body: &str);
}

/// Prints `<nickname>: <body>` to stdout, matching the original source's
/// `printf("%s: %s\n", ...)` display format.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn chat_line(&self, nickname: &str, body: &str) {
        println!("{nickname}: {body}");
    }
}
