//! Local provisioner configuration

use std::path::PathBuf;

/// Shell used to interpret step commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// `sh -c` on Unix, `cmd /C` on Windows
    Default,
    /// `bash -c`
    Bash,
}

impl Shell {
    /// Get the shell executable and arguments
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Shell::Default => {
                if cfg!(target_os = "windows") {
                    ("cmd", &["/C"])
                } else {
                    ("sh", &["-c"])
                }
            }
            Shell::Bash => ("bash", &["-c"]),
        }
    }
}

/// Configuration for the local provisioner
#[derive(Debug, Clone)]
pub struct LocalProvisionerConfig {
    /// Parent directory for per-job working directories
    ///
    /// If not provided, the system temp directory is used.
    pub base_dir: Option<PathBuf>,

    /// Directory exported to commands as `MATRIX_SOURCE_DIR`
    pub source_dir: PathBuf,

    pub shell: Shell,

    /// Inherited variables removed before every command, so only the step
    /// that binds a secret gets to see it
    pub scrubbed_env: Vec<String>,
}

impl Default for LocalProvisionerConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            source_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            shell: Shell::Default,
            scrubbed_env: Vec::new(),
        }
    }
}

impl LocalProvisionerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_scrubbed_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scrubbed_env.extend(names.into_iter().map(Into::into));
        self
    }
}
