//! Description of the process a session runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use portable_pty::CommandBuilder;

use super::PtySize;

/// `PATH` handed to spawned processes unless overridden.
#[cfg(unix)]
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/local/sbin:/usr/sbin:/sbin";

/// `PATH` handed to spawned processes unless overridden.
#[cfg(windows)]
pub const DEFAULT_PATH: &str = r"C:\Windows\system32;C:\Windows;C:\Windows\System32\WindowsPowerShell\v1.0";

/// `TERM` handed to spawned processes unless overridden.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Get the default shell for the current platform.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        "powershell.exe".to_string()
    }
}

/// What to run inside a new pseudo-terminal, and with which environment.
///
/// The environment is built from scratch: only `PATH`, `HOME`, `TERM` and
/// `SHELL` are set, followed by the explicit overrides in `env`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory. Defaults to `HOME`.
    pub cwd: Option<PathBuf>,
    /// Explicit environment overrides, applied last.
    pub env: BTreeMap<String, String>,
    /// Initial terminal dimensions.
    pub size: PtySize,
    /// Value of `TERM`.
    pub term: String,
    /// Value of `PATH`.
    pub path: String,
}

impl SpawnSpec {
    /// Run `program` with no arguments.
    pub fn shell(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            size: PtySize::default(),
            term: DEFAULT_TERM.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Run a command line through the platform shell.
    ///
    /// Uses `sh -c` on Unix and `cmd /c` on Windows.
    pub fn command_line(command_line: &str) -> Self {
        #[cfg(unix)]
        let (program, flag) = ("/bin/sh", "-c");
        #[cfg(windows)]
        let (program, flag) = ("cmd.exe", "/c");

        Self::shell(program).with_args([flag, command_line])
    }

    /// Replace the argument list.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the initial dimensions.
    pub fn with_size(mut self, size: PtySize) -> Self {
        self.size = size;
        self
    }

    /// Add an environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The complete environment the process will see.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let home = std::env::var("HOME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "/".to_string());
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.program.clone());

        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), self.path.clone());
        env.insert("HOME".to_string(), home);
        env.insert("TERM".to_string(), self.term.clone());
        env.insert("SHELL".to_string(), shell);

        #[cfg(windows)]
        for key in ["SystemRoot", "COMSPEC"] {
            if let Ok(value) = std::env::var(key) {
                env.insert(key.to_string(), value);
            }
        }

        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Translate into a portable-pty command with a cleared environment.
    pub(crate) fn to_command(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        cmd.env_clear();

        let env = self.environment();
        match &self.cwd {
            Some(dir) => cmd.cwd(dir),
            None => {
                if let Some(home) = env.get("HOME") {
                    cmd.cwd(home);
                }
            }
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Default for SpawnSpec {
    fn default() -> Self {
        Self::shell(default_shell())
    }
}
