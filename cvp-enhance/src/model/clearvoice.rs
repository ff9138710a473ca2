//! ClearVoice subprocess client
//!
//! Runs one model invocation per process using the configured Python
//! interpreter and a small embedded driver script. The interpreter must have
//! the `clearvoice` package installed; model weights are fetched by the
//! library on first use.

use super::{EnhancementModel, ModelError};
use cvp_common::Task;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Driver script passed with `-c`; argv is `task model input output`
const DRIVER_SCRIPT: &str = r#"
import sys
from clearvoice import ClearVoice

task, model_name, input_path, output_path = sys.argv[1:5]
cv = ClearVoice(task=task, model_names=[model_name])
processed = cv(input_path=input_path, online_write=False)
cv.write(processed, output_path=output_path)
"#;

/// Lines of stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// ClearVoice client
#[derive(Debug, Clone)]
pub struct ClearVoiceCli {
    python: PathBuf,
}

impl ClearVoiceCli {
    /// Create client for the given interpreter (e.g. "python3" or a venv path)
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Check that the interpreter starts and can import `clearvoice`
    pub fn probe(&self) -> Result<(), ModelError> {
        let output = self.command().arg("-c").arg("import clearvoice").output();
        check_status(output).map(|_| ())
    }

    fn command(&self) -> Command {
        Command::new(&self.python)
    }
}

impl EnhancementModel for ClearVoiceCli {
    fn apply(
        &self,
        task: Task,
        model_name: &str,
        input: &Path,
        output: &Path,
    ) -> Result<(), ModelError> {
        tracing::debug!(
            python = %self.python.display(),
            task = %task,
            model = model_name,
            input = %input.display(),
            output = %output.display(),
            "Invoking ClearVoice"
        );

        let result = self
            .command()
            .arg("-c")
            .arg(DRIVER_SCRIPT)
            .arg(task.as_str())
            .arg(model_name)
            .arg(input)
            .arg(output)
            .output();

        check_status(result)?;

        if !output.is_file() {
            return Err(ModelError::NoOutput(output.to_path_buf()));
        }

        Ok(())
    }
}

fn check_status(result: std::io::Result<Output>) -> Result<Output, ModelError> {
    let output = match result {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ModelError::Unavailable(format!(
                "Python interpreter not found: {}",
                e
            )));
        }
        Err(e) => return Err(ModelError::Unavailable(e.to_string())),
    };

    if output.status.success() {
        return Ok(output);
    }

    Err(ModelError::Failed {
        status: output.status.to_string(),
        stderr: stderr_tail(&output.stderr),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interpreter_is_unavailable() {
        let client = ClearVoiceCli::new("/nonexistent/bin/python-cvp-test");
        let err = client.probe().unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_failure() {
        // `false` ignores its arguments and exits 1
        let client = ClearVoiceCli::new("false");
        let dir = tempfile::TempDir::new().unwrap();
        let err = client
            .apply(
                Task::SpeechEnhancement,
                "MossFormer2_SE_48K",
                &dir.path().join("in.wav"),
                &dir.path().join("out.wav"),
            )
            .unwrap_err();
        assert!(matches!(err, ModelError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_no_output() {
        // `true` exits 0 without writing anything
        let client = ClearVoiceCli::new("true");
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out.wav");
        let err = client
            .apply(Task::SpeechEnhancement, "FRCRN_SE_16K", &dir.path().join("in.wav"), &out)
            .unwrap_err();
        assert!(matches!(err, ModelError::NoOutput(path) if path == out));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
    }
}
