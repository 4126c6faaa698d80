use crate::collectors::runner::CommandRunner;
use crate::collectors::LOCALHOST;
use crate::report::{LogWriter, Progress, ReportError};
use std::io::Write;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Runs every command against every target, command-outer and host-inner.
/// No hosts means a single local target. Failed invocations are reported
/// and the batch moves on; only log write errors stop it.
pub async fn collect<W: Write, P: Write>(
    commands: &[String],
    hosts: &[String],
    runner: &CommandRunner,
    log: &mut LogWriter<W>,
    progress: &mut Progress<P>,
) -> Result<Summary, ReportError> {
    let targets: Vec<Option<&str>> = if hosts.is_empty() {
        vec![None]
    } else {
        hosts.iter().map(|h| Some(h.as_str())).collect()
    };
    let mut summary = Summary::default();

    for command in commands {
        if command.trim().is_empty() {
            debug!(command = %command, "skipping blank command");
            summary.skipped += 1;
            continue;
        }

        for host in &targets {
            let host_label = host.unwrap_or(LOCALHOST);
            match runner.run(command, *host).await {
                Ok(result) => {
                    log.write_result(&result)?;
                    progress.completed(&result);
                    summary.completed += 1;
                }
                Err(err) => {
                    debug!(host = host_label, command = %command, error = %err, "command failed");
                    progress.failed(host_label, &err);
                    summary.failed += 1;
                }
            }
        }
    }

    log.flush()?;
    info!(
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        "collection finished"
    );
    Ok(summary)
}
