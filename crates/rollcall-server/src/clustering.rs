// SPDX-License-Identifier: Apache-2.0

//! Delegation of k-means clustering to an external command.
//!
//! The command reads `{"features": [[f64]], "k": n}` on stdin and prints
//! `{"cluster_labels": [...], "cluster_centers": [[...]]}` on stdout, or a
//! JSON object with an `error` field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub features: Vec<Vec<f64>>,
    pub k: usize,
}

impl ClusterRequest {
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.k == 0 {
            return Err(ClusterError::Invalid("k must be at least 1".to_string()));
        }
        if self.features.len() < self.k {
            return Err(ClusterError::Invalid(format!(
                "need at least k={} feature rows, got {}",
                self.k,
                self.features.len()
            )));
        }
        let width = self.features.first().map_or(0, Vec::len);
        if width == 0 || self.features.iter().any(|row| row.len() != width) {
            return Err(ClusterError::Invalid(
                "feature rows must be non-empty and equally long".to_string(),
            ));
        }
        if self.features.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ClusterError::Invalid("feature values must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub cluster_labels: Vec<usize>,
    pub cluster_centers: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    Invalid(String),
    Spawn(String),
    Timeout(Duration),
    Failed(String),
    Output(String),
}

impl ClusterError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "validation_error",
            Self::Spawn(_) | Self::Failed(_) => "cluster_command_failed",
            Self::Timeout(_) => "cluster_command_timeout",
            Self::Output(_) => "parse_error",
        }
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(m) => write!(f, "invalid cluster request: {m}"),
            Self::Spawn(m) => write!(f, "failed to start cluster command: {m}"),
            Self::Timeout(d) => write!(f, "cluster command timed out after {}ms", d.as_millis()),
            Self::Failed(m) => write!(f, "cluster command failed: {m}"),
            Self::Output(m) => write!(f, "cluster command output unreadable: {m}"),
        }
    }
}

impl std::error::Error for ClusterError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ClusterRunner {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Splits a command line on whitespace: program first, then arguments.
    pub fn from_command_line(line: &str, timeout: Duration) -> Result<Self, String> {
        let mut parts = line.split_whitespace().map(ToString::to_string);
        let program = parts
            .next()
            .ok_or_else(|| "cluster command must not be empty".to_string())?;
        Ok(Self::new(program, parts.collect(), timeout))
    }

    #[instrument(
        name = "cluster_run",
        skip(self, request),
        fields(rows = request.features.len(), k = request.k)
    )]
    pub async fn run(&self, request: &ClusterRequest) -> Result<ClusterResponse, ClusterError> {
        request.validate()?;
        let input =
            serde_json::to_vec(request).map_err(|e| ClusterError::Invalid(e.to_string()))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClusterError::Spawn(format!("{}: {e}", self.program)))?;
        let stdin = child.stdin.take();
        // The handle drops after the write, closing the pipe.
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input).await?;
            }
            Ok::<(), io::Error>(())
        };
        // Feeding stdin and waiting for exit share one deadline.
        let (fed, output) = tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| ClusterError::Timeout(self.timeout))?;
        let output = output.map_err(|e| ClusterError::Failed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ClusterError::Failed(format!("exit {}: {stderr}", output.status)));
        }
        match fed {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
                return Err(ClusterError::Failed(format!("writing stdin: {e}")));
            }
            _ => {}
        }
        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ClusterError::Output(e.to_string()))?;
        if let Some(message) = value.get("error").and_then(serde_json::Value::as_str) {
            return Err(ClusterError::Failed(message.to_string()));
        }
        let response: ClusterResponse =
            serde_json::from_value(value).map_err(|e| ClusterError::Output(e.to_string()))?;
        if response.cluster_labels.len() != request.features.len() {
            return Err(ClusterError::Output(format!(
                "expected {} labels, got {}",
                request.features.len(),
                response.cluster_labels.len()
            )));
        }
        info!(clusters = response.cluster_centers.len(), "clustering finished");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rows: usize, k: usize) -> ClusterRequest {
        ClusterRequest {
            features: (0..rows).map(|i| vec![i as f64, 1.0]).collect(),
            k,
        }
    }

    #[test]
    fn validation_rejects_zero_k_and_short_input() {
        assert!(matches!(request(3, 0).validate(), Err(ClusterError::Invalid(_))));
        assert!(matches!(request(2, 3).validate(), Err(ClusterError::Invalid(_))));
        let mut ragged = request(3, 2);
        ragged.features[1].push(9.0);
        assert!(ragged.validate().is_err());
        assert!(request(3, 3).validate().is_ok());
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let runner =
            ClusterRunner::from_command_line(" python3  kmeans.py ", Duration::from_secs(1))
                .expect("runner");
        assert_eq!(runner.program, "python3");
        assert_eq!(runner.args, vec!["kmeans.py"]);
        assert!(ClusterRunner::from_command_line("  ", Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn parses_labels_from_command_output() {
        let script = r#"cat > /dev/null; printf '{"cluster_labels":[0,1,1],"cluster_centers":[[0.0,1.0],[1.5,1.0]]}'"#;
        let runner =
            ClusterRunner::new("sh", vec!["-c".into(), script.into()], Duration::from_secs(5));
        let out = runner.run(&request(3, 2)).await.expect("clusters");
        assert_eq!(out.cluster_labels, vec![0, 1, 1]);
        assert_eq!(out.cluster_centers.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reported_errors_and_exit_codes_fail() {
        let reported = ClusterRunner::new(
            "sh",
            vec!["-c".into(), r#"cat > /dev/null; echo '{"error":"data insufficient"}'"#.into()],
            Duration::from_secs(5),
        );
        let err = reported.run(&request(2, 1)).await.expect_err("reported");
        assert_eq!(err, ClusterError::Failed("data insufficient".to_string()));

        let crashed = ClusterRunner::new(
            "sh",
            vec!["-c".into(), "cat > /dev/null; echo boom >&2; exit 3".into()],
            Duration::from_secs(5),
        );
        let err = crashed.run(&request(2, 1)).await.expect_err("exit 3");
        assert!(matches!(err, ClusterError::Failed(ref m) if m.contains("boom")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_commands_time_out() {
        let runner = ClusterRunner::new(
            "sh",
            vec!["-c".into(), "sleep 5".into()],
            Duration::from_millis(100),
        );
        let err = runner.run(&request(2, 1)).await.expect_err("timeout");
        assert_eq!(err, ClusterError::Timeout(Duration::from_millis(100)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_covers_input_the_command_never_reads() {
        let runner = ClusterRunner::new(
            "sh",
            vec!["-c".into(), "sleep 30".into()],
            Duration::from_millis(200),
        );
        let large = ClusterRequest {
            features: (0..20_000)
                .map(|i| vec![i as f64, 0.5, 1.25, 2.5, 3.75])
                .collect(),
            k: 3,
        };
        let err = tokio::time::timeout(Duration::from_secs(5), runner.run(&large))
            .await
            .expect("run returns before the outer deadline")
            .expect_err("timeout");
        assert_eq!(err, ClusterError::Timeout(Duration::from_millis(200)));
    }
}
