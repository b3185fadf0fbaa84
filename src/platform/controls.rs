// Terminal class buttons: stdin commands mapped to control events

use crate::models::classifier::ClassIndex;
use crate::models::session::ControlEvent;
use log::{debug, warn};
use std::io::BufRead;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

/// Parse one command line.
///
/// `press N` / `p N`, `release` / `r`, `clear N`, `clear`, `quit` / `q`.
pub fn parse_command(line: &str) -> Option<ControlEvent> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    let argument = words.next();
    if words.next().is_some() {
        return None;
    }

    let class = || argument.and_then(|a| a.parse::<usize>().ok()).map(ClassIndex);

    match (command.as_str(), argument) {
        ("press" | "p", Some(_)) => class().map(ControlEvent::Press),
        ("release" | "r", _) => Some(ControlEvent::Release),
        ("clear" | "c", Some(_)) => class().map(ControlEvent::ClearClass),
        ("clear" | "c", None) => Some(ControlEvent::ClearAll),
        ("quit" | "q" | "exit", None) => Some(ControlEvent::Quit),
        _ => None,
    }
}

const USAGE: &str = "try: press 0, release, clear 1, clear, quit";

/// Forward command lines from `input` until it ends or the receiver goes away
pub fn forward_commands<R: BufRead>(input: R, tx: &mpsc::Sender<ControlEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(event) => {
                if tx.blocking_send(event).is_err() {
                    return;
                }
            }
            None => warn!("Unknown command: {:?} ({})", line, USAGE),
        }
    }
    debug!("stdin closed; no more control input");
}

/// Read stdin on its own OS thread.
///
/// A blocking stdin read cannot be cancelled, so it must stay off the tokio
/// runtime; the thread is detached and never delays shutdown.
pub fn spawn_stdin_controls(tx: mpsc::Sender<ControlEvent>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-controls".to_string())
        .spawn(move || forward_commands(std::io::stdin().lock(), &tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_press_and_release() {
        assert_eq!(parse_command("press 2"), Some(ControlEvent::Press(ClassIndex(2))));
        assert_eq!(parse_command("  P 0 "), Some(ControlEvent::Press(ClassIndex(0))));
        assert_eq!(parse_command("release"), Some(ControlEvent::Release));
        assert_eq!(parse_command("r 1"), Some(ControlEvent::Release));
    }

    #[test]
    fn test_parse_clear_and_quit() {
        assert_eq!(parse_command("clear 1"), Some(ControlEvent::ClearClass(ClassIndex(1))));
        assert_eq!(parse_command("clear"), Some(ControlEvent::ClearAll));
        assert_eq!(parse_command("quit"), Some(ControlEvent::Quit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("press"), None);
        assert_eq!(parse_command("press x"), None);
        assert_eq!(parse_command("press 1 2"), None);
        assert_eq!(parse_command("dance"), None);
    }

    #[test]
    fn test_forward_commands_sends_parsed_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = std::io::Cursor::new("press 1\n\ndance\nrelease\nquit\n");

        forward_commands(input, &tx);

        assert_eq!(rx.try_recv().ok(), Some(ControlEvent::Press(ClassIndex(1))));
        assert_eq!(rx.try_recv().ok(), Some(ControlEvent::Release));
        assert_eq!(rx.try_recv().ok(), Some(ControlEvent::Quit));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_forward_commands_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let input = std::io::Cursor::new("press 0\npress 1\n");

        // Returns instead of blocking on a closed channel
        forward_commands(input, &tx);
        assert!(tx.is_closed());
    }
}
