//! Publish the project repository to GitHub.
//!
//! Asks for the GitHub user name, replaces an existing `origin` remote only
//! after confirmation, adds `https://github.com/<user>/ade_modelo_agricola.git`
//! and pushes. Only the push is allowed to fail softly: its error becomes
//! [`PublishOutcome::PushFailed`] and the caller prints the troubleshooting
//! hints.

use std::io::{self, BufRead, Write};
use std::process::Command;

use tracing::{debug, info, warn};

pub const REMOTE_NAME: &str = "origin";
pub const REPOSITORY_NAME: &str = "ade_modelo_agricola";
pub const DEFAULT_BRANCH: &str = "main";

/// Printed after a failed push.
pub const TROUBLESHOOTING_HINTS: [&str; 3] = [
    "Make sure the repository exists on GitHub",
    "Check your authentication (personal access token or SSH key)",
    "Check your network connection",
];

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("GitHub user name must not be empty")]
    EmptyUser,

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("failed to read answer: {0}")]
    Prompt(#[from] io::Error),
}

/// The git operations the publish flow needs.
pub trait GitClient {
    fn has_remote(&self, name: &str) -> Result<bool, PublishError>;
    fn remove_remote(&self, name: &str) -> Result<(), PublishError>;
    fn add_remote(&self, name: &str, url: &str) -> Result<(), PublishError>;
    fn push(&self, remote: &str, branch: &str) -> Result<(), PublishError>;
}

/// Source of answers to interactive questions.
pub trait Prompter {
    /// Show `question` and return the answer without surrounding whitespace.
    fn ask(&mut self, question: &str) -> io::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The user kept the existing remote; nothing was changed
    Aborted,
    Pushed { url: String },
    PushFailed { url: String, error: String },
}

/// `https://github.com/<user>/ade_modelo_agricola.git`
pub fn remote_url(user: &str) -> String {
    format!("https://github.com/{}/{}.git", user, REPOSITORY_NAME)
}

/// Run the publish flow against `git`, asking `prompter` for input.
pub fn publish(
    git: &dyn GitClient,
    prompter: &mut dyn Prompter,
    branch: &str,
) -> Result<PublishOutcome, PublishError> {
    let user = prompter.ask("GitHub user name: ")?;
    if user.is_empty() {
        return Err(PublishError::EmptyUser);
    }
    let url = remote_url(&user);

    if git.has_remote(REMOTE_NAME)? {
        let answer = prompter.ask(&format!(
            "Remote '{}' already exists. Replace it? (s/n): ",
            REMOTE_NAME
        ))?;
        if !answer.eq_ignore_ascii_case("s") {
            info!(answer = %answer, "Keeping existing remote");
            return Ok(PublishOutcome::Aborted);
        }
        git.remove_remote(REMOTE_NAME)?;
        debug!(remote = REMOTE_NAME, "Removed existing remote");
    }

    git.add_remote(REMOTE_NAME, &url)?;
    info!(remote = REMOTE_NAME, url = %url, "Added remote");

    match git.push(REMOTE_NAME, branch) {
        Ok(()) => {
            info!(url = %url, branch = %branch, "Pushed");
            Ok(PublishOutcome::Pushed { url })
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Push failed");
            Ok(PublishOutcome::PushFailed {
                url,
                error: e.to_string(),
            })
        }
    }
}

/// Print the user-facing message for `outcome`.
pub fn write_outcome(out: &mut impl Write, outcome: &PublishOutcome) -> io::Result<()> {
    match outcome {
        PublishOutcome::Aborted => writeln!(out, "Operation cancelled, remotes left unchanged."),
        PublishOutcome::Pushed { url } => {
            writeln!(out, "Repository published successfully.")?;
            writeln!(out, "URL: {}", url.trim_end_matches(".git"))
        }
        PublishOutcome::PushFailed { error, .. } => {
            writeln!(out, "Push failed: {}", error)?;
            writeln!(out, "Check that:")?;
            for hint in TROUBLESHOOTING_HINTS {
                writeln!(out, "  - {}", hint)?;
            }
            Ok(())
        }
    }
}

/// Runs the `git` executable in the current directory.
#[derive(Debug, Default)]
pub struct SystemGit;

impl SystemGit {
    fn run(&self, args: &[&str]) -> Result<String, PublishError> {
        let command = args.join(" ");
        debug!(command = %command, "Running git");
        let output = Command::new("git")
            .args(args)
            .output()
            .map_err(|e| PublishError::Git {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(PublishError::Git {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl GitClient for SystemGit {
    fn has_remote(&self, name: &str) -> Result<bool, PublishError> {
        let remotes = self.run(&["remote"])?;
        Ok(remotes.lines().any(|line| line.trim() == name))
    }

    fn remove_remote(&self, name: &str) -> Result<(), PublishError> {
        self.run(&["remote", "remove", name]).map(|_| ())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<(), PublishError> {
        self.run(&["remote", "add", name, url]).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), PublishError> {
        self.run(&["push", "-u", remote, branch]).map(|_| ())
    }
}

/// Reads answers from a line-based input, writing questions to an output.
pub struct LinePrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl LinePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url() {
        assert_eq!(
            remote_url("octo"),
            "https://github.com/octo/ade_modelo_agricola.git"
        );
    }

    #[test]
    fn test_line_prompter_trims() {
        let mut output = Vec::new();
        let mut prompter = LinePrompter::new(&b"  S \n"[..], &mut output);
        assert_eq!(prompter.ask("Replace? ").unwrap(), "S");
        assert_eq!(output, b"Replace? ");
    }

    #[test]
    fn test_line_prompter_eof_is_empty() {
        let mut prompter = LinePrompter::new(&b""[..], Vec::new());
        assert_eq!(prompter.ask("user: ").unwrap(), "");
    }

    #[test]
    fn test_write_outcome_hints() {
        let mut out = Vec::new();
        write_outcome(
            &mut out,
            &PublishOutcome::PushFailed {
                url: remote_url("octo"),
                error: "denied".to_string(),
            },
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Push failed: denied"));
        for hint in TROUBLESHOOTING_HINTS {
            assert!(text.contains(hint));
        }
    }

    #[test]
    fn test_write_outcome_success_url() {
        let mut out = Vec::new();
        write_outcome(
            &mut out,
            &PublishOutcome::Pushed {
                url: remote_url("octo"),
            },
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("https://github.com/octo/ade_modelo_agricola\n"));
    }
}
