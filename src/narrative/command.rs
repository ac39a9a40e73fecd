//! Narrative service backed by an external command.
//!
//! The request is written to the command's stdin as JSON; the phrased text
//! is read from stdout. The command is killed if it exceeds the timeout.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{CasebookError, Result};
use crate::narrative::{NarrativeRequest, Narrator};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `program args...` once per phrasing attempt.
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNarrator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Build from a configured command line (program first). `None` when the
    /// command is empty.
    pub fn from_command_line(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), timeout))
    }
}

impl Narrator for CommandNarrator {
    fn phrase(&self, request: &NarrativeRequest) -> Result<String> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CasebookError::narrative(format!("spawn {}: {}", self.program, e)))?;

        // Written off-thread so a command that never drains stdin still
        // falls under the deadline. Killing the child ends the write.
        if let Some(mut stdin) = child.stdin.take() {
            thread::spawn(move || {
                let _ = stdin.write_all(&payload);
            });
        }

        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut text = String::new();
                stdout.read_to_string(&mut text).map(|_| text)
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CasebookError::narrative(format!(
                        "{} timed out after {:?}",
                        self.program, self.timeout
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(CasebookError::narrative(format!(
                        "wait {}: {}",
                        self.program, e
                    )))
                }
            }
        };

        if !status.success() {
            return Err(CasebookError::narrative(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        let text = match reader.map(|handle| handle.join()) {
            Some(Ok(Ok(text))) => text,
            Some(Ok(Err(e))) => {
                return Err(CasebookError::narrative(format!("read output: {}", e)))
            }
            Some(Err(_)) => return Err(CasebookError::narrative("output reader panicked")),
            None => String::new(),
        };

        Ok(text.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn request() -> NarrativeRequest {
        NarrativeRequest {
            subject: "Butler".into(),
            base_text: "I saw nothing.".into(),
            ..NarrativeRequest::default()
        }
    }

    fn sh(script: &str, timeout: Duration) -> CommandNarrator {
        CommandNarrator::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    #[test]
    fn test_reads_stdout() {
        let narrator = sh("cat >/dev/null; echo '  Nothing at all, sir.  '", Duration::from_secs(5));
        assert_eq!(narrator.phrase(&request()).unwrap(), "Nothing at all, sir.");
    }

    #[test]
    fn test_receives_request_json() {
        let narrator = sh("cat", Duration::from_secs(5));
        let out = narrator.phrase(&request()).unwrap();
        let echoed: NarrativeRequest = serde_json::from_str(&out).unwrap();
        assert_eq!(echoed, request());
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let narrator = sh("exit 3", Duration::from_secs(5));
        let err = narrator.phrase(&request()).unwrap_err();
        assert!(matches!(err, CasebookError::Narrative { .. }));
    }

    #[test]
    fn test_timeout_kills_command() {
        let narrator = sh("sleep 5", Duration::from_millis(100));
        let started = Instant::now();
        let err = narrator.phrase(&request()).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_covers_unread_stdin() {
        // Larger than any pipe buffer, and the command never reads it
        let big = NarrativeRequest {
            base_text: "x".repeat(1 << 20),
            ..request()
        };
        let narrator = sh("sleep 5", Duration::from_millis(100));
        let started = Instant::now();
        let err = narrator.phrase(&big).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program_is_error() {
        let narrator = CommandNarrator::new("/nonexistent/narrator", vec![], Duration::from_secs(1));
        assert!(narrator.phrase(&request()).is_err());
    }

    #[test]
    fn test_from_command_line() {
        assert!(CommandNarrator::from_command_line(&[], Duration::from_secs(1)).is_none());
        let narrator = CommandNarrator::from_command_line(
            &["phrase".to_string(), "--fast".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(narrator.program, "phrase");
        assert_eq!(narrator.args, vec!["--fast"]);
    }
}
