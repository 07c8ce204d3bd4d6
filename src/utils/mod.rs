use std::path::PathBuf;
use tokio::sync::OnceCell;

use crate::config::SubprocessConfig;

/// Startup probe for the helper strategy's prerequisites.
///
/// The probe runs at most once per instance; later calls return the cached
/// warnings, so it is safe to call from several places.
pub struct DependencyCheck {
    interpreter: String,
    script: PathBuf,
    warnings: OnceCell<Vec<String>>,
}

impl DependencyCheck {
    pub fn new(config: &SubprocessConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script: config.resolved_script(),
            warnings: OnceCell::new(),
        }
    }

    /// Human-readable warnings for missing prerequisites (empty when all is well)
    pub async fn warnings(&self) -> &[String] {
        self.warnings
            .get_or_init(|| async {
                let mut missing = Vec::new();

                if !check_command_available(&self.interpreter).await {
                    missing.push(format!(
                        "{} - required by the subprocess strategy",
                        self.interpreter
                    ));
                }

                if !self.script.is_file() {
                    missing.push(format!(
                        "{} - helper script for the subprocess strategy was not found",
                        self.script.display()
                    ));
                }

                missing
            })
            .await
    }

    /// Whether the probe has already run
    pub fn is_checked(&self) -> bool {
        self.warnings.initialized()
    }
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_reports_missing_interpreter_and_script() {
        let mut subprocess = Config::default().subprocess;
        subprocess.interpreter = "definitely-not-an-installed-interpreter".to_string();
        subprocess.script = PathBuf::from("/nonexistent/helper.py");

        let check = DependencyCheck::new(&subprocess);
        assert!(!check.is_checked());

        let warnings = check.warnings().await;
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("definitely-not-an-installed-interpreter"));
        assert!(warnings[1].contains("/nonexistent/helper.py"));
    }

    #[tokio::test]
    async fn test_probe_runs_once() {
        let mut subprocess = Config::default().subprocess;
        subprocess.interpreter = "definitely-not-an-installed-interpreter".to_string();

        let check = DependencyCheck::new(&subprocess);
        let first = check.warnings().await.as_ptr();
        assert!(check.is_checked());
        let second = check.warnings().await.as_ptr();
        assert_eq!(first, second);
    }
}
