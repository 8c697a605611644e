use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::DateTime;
use tracing::trace;

use super::backend::{CommitRecord, RemoteTarget, Signature, TreeStatus, VcsBackend};
use crate::error::BackendError;

/// Remote used when only a branch is configured.
const DEFAULT_REMOTE: &str = "origin";
/// Field separator for `git log --format`.
const LOG_FIELD_SEPARATOR: char = '\u{1f}';
const LOG_FORMAT: &str = "--format=%H%x1f%ct%x1f%an%x1f%ae%x1f%s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `VcsBackend` that drives the `git` executable in a working directory.
#[derive(Debug, Clone)]
pub struct GitCliBackend<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    target: RemoteTarget,
    executor: E,
}

impl GitCliBackend<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::with_executor(repo_path, ProcessCommandExecutor)
    }
}

impl<E: CommandExecutor> GitCliBackend<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), target: RemoteTarget::default(), executor }
    }

    pub fn with_target(mut self, target: RemoteTarget) -> Self {
        self.target = target;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    fn remote_name(&self) -> Option<&str> {
        match (&self.target.remote, &self.target.branch) {
            (Some(remote), _) => Some(remote),
            (None, Some(_)) => Some(DEFAULT_REMOTE),
            (None, None) => None,
        }
    }

    fn has_head(&self) -> Result<bool, BackendError> {
        match self.run(args(&["rev-parse", "--verify", "--quiet", "HEAD"])) {
            Ok(_) => Ok(true),
            // `--quiet` exits with 1 and no output when HEAD is unborn.
            Err(BackendError::CommandFailed { code: Some(1), .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, BackendError> {
        let command = format!("git {}", args.join(" "));
        trace!(repo = %self.repo_path.display(), %command, "running git");
        let result = self.executor.execute("git", &args, &self.repo_path).map_err(|error| {
            BackendError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitCommandOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() { result.stdout } else { result.stderr };

        Err(BackendError::CommandFailed { command, code: result.code, stderr })
    }
}

impl<E: CommandExecutor + 'static> VcsBackend for GitCliBackend<E> {
    fn verify_repository(&self) -> Result<(), BackendError> {
        let output = self.run(args(&["rev-parse", "--show-toplevel"]))?;
        let reported = PathBuf::from(output.stdout.trim());
        let unexpected = |message: String| BackendError::UnexpectedOutput {
            command: "git rev-parse --show-toplevel".to_string(),
            message,
        };

        let top_level = std::fs::canonicalize(&reported)
            .map_err(|error| unexpected(format!("{}: {error}", reported.display())))?;
        let requested = std::fs::canonicalize(&self.repo_path)
            .map_err(|error| unexpected(format!("{}: {error}", self.repo_path.display())))?;

        if top_level != requested {
            return Err(unexpected(format!(
                "`{}` is inside the repository rooted at `{}`",
                requested.display(),
                top_level.display()
            )));
        }
        Ok(())
    }

    fn fetch(&self) -> Result<(), BackendError> {
        let mut fetch = args(&["fetch"]);
        fetch.extend(self.remote_name().map(str::to_string));
        self.run(fetch).map(|_| ())
    }

    fn status(&self) -> Result<TreeStatus, BackendError> {
        let output = self.run(args(&["status", "--porcelain"]))?;
        let changed = output.stdout.lines().filter(|line| !line.trim().is_empty()).count();
        if changed == 0 {
            Ok(TreeStatus::Clean)
        } else {
            Ok(TreeStatus::Dirty { changed })
        }
    }

    fn log(&self, max_count: usize) -> Result<Vec<CommitRecord>, BackendError> {
        if max_count == 0 || !self.has_head()? {
            return Ok(Vec::new());
        }

        let log_args = vec![
            "log".to_string(),
            "-n".to_string(),
            max_count.to_string(),
            LOG_FORMAT.to_string(),
        ];
        let command = format!("git {}", log_args.join(" "));
        let output = self.run(log_args)?;

        output
            .stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                parse_log_line(line).ok_or_else(|| BackendError::UnexpectedOutput {
                    command: command.clone(),
                    message: format!("malformed log line `{line}`"),
                })
            })
            .collect()
    }

    fn add(&self, pattern: &str) -> Result<(), BackendError> {
        self.run(vec!["add".to_string(), "--all".to_string(), "--".to_string(), pattern.to_string()])
            .map(|_| ())
    }

    fn commit(&self, message: &str, author: &Signature) -> Result<(), BackendError> {
        self.run(vec![
            "-c".to_string(),
            format!("user.name={}", author.name),
            "-c".to_string(),
            format!("user.email={}", author.email),
            "commit".to_string(),
            "-m".to_string(),
            message.to_string(),
            "--author".to_string(),
            format!("{} <{}>", author.name, author.email),
        ])
        .map(|_| ())
    }

    fn push(&self) -> Result<(), BackendError> {
        let mut push = args(&["push"]);
        push.extend(self.remote_name().map(str::to_string));
        if let Some(branch) = &self.target.branch {
            push.push(format!("HEAD:{branch}"));
        }
        self.run(push).map(|_| ())
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn parse_log_line(line: &str) -> Option<CommitRecord> {
    let mut fields = line.splitn(5, LOG_FIELD_SEPARATOR);
    let id = fields.next()?.to_string();
    let seconds = fields.next()?.trim().parse::<i64>().ok()?;
    let author_name = fields.next()?.to_string();
    let author_email = fields.next()?.to_string();
    let summary = fields.next().unwrap_or_default().to_string();

    Some(CommitRecord {
        id,
        committed_at: DateTime::from_timestamp(seconds, 0)?,
        author_name,
        author_email,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Invocation {
        program: String,
        args: Vec<String>,
        cwd: PathBuf,
    }

    #[derive(Clone)]
    struct MockExecutor {
        calls: Arc<Mutex<Vec<Invocation>>>,
        responses: Arc<Mutex<VecDeque<Result<CommandResult, std::io::Error>>>>,
    }

    impl MockExecutor {
        fn new(responses: Vec<Result<CommandResult, std::io::Error>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            }
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().expect("mock calls lock poisoned").clone()
        }
    }

    impl CommandExecutor for MockExecutor {
        fn execute(
            &self,
            program: &str,
            args: &[String],
            cwd: &Path,
        ) -> Result<CommandResult, std::io::Error> {
            self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
            });

            self.responses
                .lock()
                .expect("mock responses lock poisoned")
                .pop_front()
                .expect("missing mock response")
        }
    }

    fn ok(stdout: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: true,
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn failed(code: i32, stderr: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn status_reports_clean_tree_on_empty_porcelain() {
        let mock = MockExecutor::new(vec![ok("")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        assert_eq!(backend.status().expect("status should succeed"), TreeStatus::Clean);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "git");
        assert_eq!(calls[0].args, vec!["status", "--porcelain"]);
        assert_eq!(calls[0].cwd, PathBuf::from("/tmp/repo"));
    }

    #[test]
    fn status_counts_untracked_files_as_dirty() {
        let mock = MockExecutor::new(vec![ok(" M README.md\n?? notes/new.md\n")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock);

        assert_eq!(backend.status().unwrap(), TreeStatus::Dirty { changed: 2 });
    }

    #[test]
    fn log_parses_commit_records_most_recent_first() {
        let mock = MockExecutor::new(vec![
            ok("abc123\n"),
            ok("abc123\u{1f}1700000000\u{1f}Alice\u{1f}alice@example.test\u{1f}second\n\
                def456\u{1f}1600000000\u{1f}Bob\u{1f}bob@example.test\u{1f}first: with\u{1f}sep\n"),
        ]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        let commits = backend.log(2).expect("log should succeed");
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "abc123");
        assert_eq!(commits[0].committed_at.timestamp(), 1_700_000_000);
        assert_eq!(commits[0].author_name, "Alice");
        assert_eq!(commits[1].summary, "first: with\u{1f}sep");

        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["rev-parse", "--verify", "--quiet", "HEAD"]);
        assert_eq!(calls[1].args, vec!["log", "-n", "2", LOG_FORMAT]);
    }

    #[test]
    fn log_is_empty_when_head_is_unborn() {
        let mock = MockExecutor::new(vec![failed(1, "")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        assert!(backend.log(1).expect("log should succeed").is_empty());
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn log_propagates_not_a_repository() {
        let mock = MockExecutor::new(vec![failed(128, "fatal: not a git repository\n")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock);

        let error = backend.log(1).expect_err("log should fail outside a repository");
        assert!(matches!(error, BackendError::CommandFailed { code: Some(128), .. }));
    }

    #[test]
    fn log_rejects_malformed_lines() {
        let mock = MockExecutor::new(vec![ok("abc\n"), ok("abc123\u{1f}not-a-number\n")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock);

        let error = backend.log(1).expect_err("malformed output should fail");
        assert!(matches!(error, BackendError::UnexpectedOutput { .. }));
    }

    #[test]
    fn add_stages_everything_under_pattern() {
        let mock = MockExecutor::new(vec![ok("")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        backend.add(".").expect("add should succeed");
        assert_eq!(mock.calls()[0].args, vec!["add", "--all", "--", "."]);
    }

    #[test]
    fn commit_uses_signature_as_author_and_committer() {
        let mock = MockExecutor::new(vec![ok("[main abc123] Commit by autopush\n")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        backend.commit("Commit by autopush", &Signature::autopush()).expect("commit should succeed");

        assert_eq!(
            mock.calls()[0].args,
            vec![
                "-c",
                "user.name=autopush",
                "-c",
                "user.email=autopush@github.com",
                "commit",
                "-m",
                "Commit by autopush",
                "--author",
                "autopush <autopush@github.com>",
            ]
        );
    }

    #[test]
    fn fetch_and_push_use_tracked_upstream_by_default() {
        let mock = MockExecutor::new(vec![ok(""), ok("")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone());

        backend.fetch().unwrap();
        backend.push().unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["fetch"]);
        assert_eq!(calls[1].args, vec!["push"]);
    }

    #[test]
    fn fetch_and_push_honor_configured_remote_and_branch() {
        let mock = MockExecutor::new(vec![ok(""), ok(""), ok("")]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock.clone())
            .with_target(RemoteTarget::new(Some("backup".into()), Some("notes".into())));

        backend.fetch().unwrap();
        backend.push().unwrap();

        let branch_only = GitCliBackend::with_executor("/tmp/repo", mock.clone())
            .with_target(RemoteTarget::new(None, Some("main".into())));
        branch_only.push().unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["fetch", "backup"]);
        assert_eq!(calls[1].args, vec!["push", "backup", "HEAD:notes"]);
        assert_eq!(calls[2].args, vec!["push", "origin", "HEAD:main"]);
    }

    #[test]
    fn push_failure_falls_back_to_stdout_when_stderr_is_empty() {
        let mock = MockExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: "rejected\n".to_string(),
            stderr: "  \n".to_string(),
        })]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock);

        let error = backend.push().expect_err("push should fail");
        assert_eq!(
            error,
            BackendError::CommandFailed {
                command: "git push".to_string(),
                code: Some(1),
                stderr: "rejected\n".to_string(),
            }
        );
    }

    #[test]
    fn spawn_failure_is_reported_with_command() {
        let mock = MockExecutor::new(vec![Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "git not installed",
        ))]);
        let backend = GitCliBackend::with_executor("/tmp/repo", mock);

        let error = backend.fetch().expect_err("fetch should fail");
        assert_eq!(
            error,
            BackendError::SpawnFailed {
                command: "git fetch".to_string(),
                message: "git not installed".to_string(),
            }
        );
    }

    #[test]
    fn verify_repository_rejects_nested_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        let top = format!("{}\n", dir.path().display());

        let mock = MockExecutor::new(vec![ok(&top)]);
        let backend = GitCliBackend::with_executor(&nested, mock);
        let error = backend.verify_repository().expect_err("nested path is not a root");
        assert!(matches!(error, BackendError::UnexpectedOutput { .. }));

        let mock = MockExecutor::new(vec![ok(&top)]);
        let backend = GitCliBackend::with_executor(dir.path(), mock);
        backend.verify_repository().expect("top level should verify");
    }
}
