//! Publish flow against a recording git client and scripted answers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use pipeline::publish::{publish, GitClient, Prompter, PublishError, PublishOutcome};

#[derive(Default)]
struct FakeGit {
    has_origin: bool,
    push_error: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeGit {
    fn with_origin() -> Self {
        Self {
            has_origin: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl GitClient for FakeGit {
    fn has_remote(&self, name: &str) -> Result<bool, PublishError> {
        self.calls.borrow_mut().push(format!("has_remote {}", name));
        Ok(self.has_origin)
    }

    fn remove_remote(&self, name: &str) -> Result<(), PublishError> {
        self.calls.borrow_mut().push(format!("remove_remote {}", name));
        Ok(())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<(), PublishError> {
        self.calls
            .borrow_mut()
            .push(format!("add_remote {} {}", name, url));
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), PublishError> {
        self.calls
            .borrow_mut()
            .push(format!("push {} {}", remote, branch));
        match &self.push_error {
            Some(message) => Err(PublishError::Git {
                command: format!("push -u {} {}", remote, branch),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

struct Script {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl Script {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            questions: Vec::new(),
        }
    }
}

impl Prompter for Script {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

#[test]
fn test_no_origin_adds_and_pushes() {
    let git = FakeGit::default();
    let mut script = Script::new(&["octo"]);

    let outcome = publish(&git, &mut script, "main").unwrap();

    assert_eq!(
        outcome,
        PublishOutcome::Pushed {
            url: "https://github.com/octo/ade_modelo_agricola.git".to_string()
        }
    );
    assert_eq!(script.questions.len(), 1);
    assert_eq!(
        git.calls(),
        vec![
            "has_remote origin",
            "add_remote origin https://github.com/octo/ade_modelo_agricola.git",
            "push origin main",
        ]
    );
}

#[test]
fn test_existing_origin_declined() {
    let git = FakeGit::with_origin();
    let mut script = Script::new(&["octo", "n"]);

    let outcome = publish(&git, &mut script, "main").unwrap();

    assert_eq!(outcome, PublishOutcome::Aborted);
    assert_eq!(script.questions.len(), 2);
    assert!(script.questions[1].contains("origin"));
    assert_eq!(git.calls(), vec!["has_remote origin"]);
}

#[test]
fn test_existing_origin_replaced_either_case() {
    for answer in ["s", "S"] {
        let git = FakeGit::with_origin();
        let mut script = Script::new(&["octo", answer]);

        let outcome = publish(&git, &mut script, "main").unwrap();

        assert!(matches!(outcome, PublishOutcome::Pushed { .. }));
        let calls = git.calls();
        let removed = calls.iter().position(|c| c == "remove_remote origin");
        let added = calls.iter().position(|c| c.starts_with("add_remote origin"));
        assert!(removed.is_some());
        assert!(removed < added, "remote must be removed before it is added");
    }
}

#[test]
fn test_other_answers_abort() {
    for answer in ["y", "yes", "si", ""] {
        let git = FakeGit::with_origin();
        let mut script = Script::new(&["octo", answer]);

        let outcome = publish(&git, &mut script, "main").unwrap();

        assert_eq!(outcome, PublishOutcome::Aborted, "answer {:?}", answer);
        assert_eq!(git.calls(), vec!["has_remote origin"]);
    }
}

#[test]
fn test_push_failure_is_reported() {
    let git = FakeGit {
        push_error: Some("Authentication failed".to_string()),
        ..Default::default()
    };
    let mut script = Script::new(&["octo"]);

    let outcome = publish(&git, &mut script, "develop").unwrap();

    match outcome {
        PublishOutcome::PushFailed { url, error } => {
            assert_eq!(url, "https://github.com/octo/ade_modelo_agricola.git");
            assert!(error.contains("Authentication failed"));
        }
        other => panic!("expected PushFailed, got {:?}", other),
    }
    assert_eq!(git.calls().last().unwrap(), "push origin develop");
}

#[test]
fn test_empty_user_is_rejected() {
    let git = FakeGit::default();
    let mut script = Script::new(&[""]);

    let result = publish(&git, &mut script, "main");

    assert!(matches!(result, Err(PublishError::EmptyUser)));
    assert!(git.calls().is_empty());
}
