//! Subcommand handlers. Each one opens its own channel to the daemon.

pub mod control;
pub mod list;
pub mod stat;

use crate::client::ChannelError;
use anyhow::{anyhow, Result};
use std::fmt;

/// Counts the items a command could not act on while it carries on with the
/// rest of them.
#[derive(Debug)]
pub struct Failures {
    command: &'static str,
    failed: usize,
}

impl Failures {
    pub fn new(command: &'static str) -> Self {
        Self { command, failed: 0 }
    }

    /// An item was skipped before reaching the daemon.
    pub fn skip(&mut self, reason: impl fmt::Display) {
        eprintln!("btcli: {}.", reason);
        self.failed += 1;
    }

    /// The daemon refused the request for `token`. Any other channel error
    /// ends the command and is handed back.
    pub fn report(&mut self, token: &str, err: ChannelError) -> Result<(), ChannelError> {
        if err.is_fatal() {
            return Err(err);
        }
        if let ChannelError::Command(code) = err {
            eprintln!("btcli {} '{}': {}.", self.command, token, code);
        }
        self.failed += 1;
        Ok(())
    }

    /// Turn any recorded failure into the command's error.
    pub fn finish(self, total: usize) -> Result<()> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(anyhow!(
                "{} failed for {} of {} torrents",
                self.command,
                self.failed,
                total
            ))
        }
    }
}

#[cfg(test)]
impl Failures {
    pub fn failed(&self) -> usize {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::IpcError;
    use std::io;

    #[test]
    fn test_command_errors_are_counted() {
        let mut failures = Failures::new("del");
        failures
            .report("3", ChannelError::Command(IpcError::NoSuchTorrent))
            .unwrap();
        failures.skip("bad torrent 'x' (missing)");
        assert_eq!(failures.failed(), 2);
        let err = failures.finish(5).unwrap_err();
        assert_eq!(err.to_string(), "del failed for 2 of 5 torrents");
    }

    #[test]
    fn test_channel_errors_are_handed_back() {
        let mut failures = Failures::new("stop");
        let err = failures
            .report("1", ChannelError::Communication(io::ErrorKind::BrokenPipe.into()))
            .unwrap_err();
        assert!(matches!(err, ChannelError::Communication(_)));
        assert_eq!(failures.failed(), 0);
        assert!(failures.finish(1).is_ok());
    }
}
