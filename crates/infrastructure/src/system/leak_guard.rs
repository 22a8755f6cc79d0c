use async_trait::async_trait;
use ferrous_doh_application::ports::{LeakGuard, ProxyEvents};
use ferrous_doh_domain::DomainError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Runs the external leak-prevention helper for the lifetime of a run.
///
/// The helper installs firewall rules when it starts, blocks forever, and
/// removes them when it exits. It is asked to quit with a newline on stdin
/// and then killed.
pub struct ProcessLeakGuard {
    path: PathBuf,
    label: String,
}

impl ProcessLeakGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = helper_label(&path);
        Self { path, label }
    }
}

#[async_trait]
impl LeakGuard for ProcessLeakGuard {
    async fn start(
        &self,
        lifetime: CancellationToken,
        events: Arc<dyn ProxyEvents>,
    ) -> Result<(), DomainError> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::HelperSpawn(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), pid = ?child.id(), "Leak guard helper started");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(relay_output(stdout, self.label.clone(), Arc::clone(&events)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(relay_output(stderr, self.label.clone(), Arc::clone(&events)));
        }
        let stdin = child.stdin.take();

        tokio::spawn(supervise(child, stdin, lifetime, self.label.clone(), events));
        Ok(())
    }
}

async fn relay_output<R>(stream: R, label: String, events: Arc<dyn ProxyEvents>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => events.on_info(&format!("{}: {}", label, line)),
            Ok(None) => return,
            Err(e) => {
                debug!(helper = %label, error = %e, "Helper output closed");
                return;
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    stdin: Option<ChildStdin>,
    lifetime: CancellationToken,
    label: String,
    events: Arc<dyn ProxyEvents>,
) {
    let exited = tokio::select! {
        _ = lifetime.cancelled() => None,
        status = child.wait() => Some(status),
    };

    match exited {
        None => {
            events.on_info(&format!("Stopping {}", label));
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(b"\n").await {
                    debug!(helper = %label, error = %e, "Helper stdin already closed");
                }
            }
            if let Err(e) = child.kill().await {
                warn!(helper = %label, error = %e, "Failed to kill helper");
            }
        }
        Some(Ok(status)) => {
            events.on_error(&format!("{} exited early: {}", label, status));
        }
        Some(Err(e)) => {
            warn!(helper = %label, error = %e, "Failed to wait on helper");
        }
    }
}

fn helper_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("leak guard")
        .to_string()
}
