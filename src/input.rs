//! The input shuttle: bridges blocking stdin reads into the async engine.
//!
//! `std::io::Stdin` has no non-blocking read path, so the shuttle runs on
//! a real OS thread (not a tokio task) and forwards each line across a
//! bounded channel via `blocking_send`. Grounded in the same pattern used
//! for terminal input elsewhere in the pack rather than `crossterm`'s
//! raw-mode event stream, since this engine only ever needs whole lines,
//! not individual keystrokes.
//!
//! The thread is never joined on shutdown: a blocking `read_line` can't
//! be interrupted short of closing stdin out from under it, so per the
//! spec's concurrency note we let the process exit reclaim it rather than
//! invent a cancellation path for it.

use std::io::BufRead;

use tokio::sync::mpsc;

/// Spawns the shuttle thread and returns the receiving end the engine
/// selects on. The channel closes (further `recv()` calls return `None`)
/// once stdin hits EOF.
pub fn spawn(buffer: usize) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(buffer);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
