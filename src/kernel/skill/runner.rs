use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::protocol::{FrameAccumulator, LineEvent, ProtocolViolation, SkillOutput};
use crate::kernel::cancel::CancellationToken;
use crate::kernel::config::FriendlyNames;
use crate::kernel::error::SkillFailure;
use crate::kernel::state::ExecutionContext;

const STDERR_CHUNK: usize = 4096;
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// Launches one external skill process and drives its stdout protocol.
///
/// States: spawned -> streaming -> completed | failed. Any stderr output,
/// a protocol violation, the deadline or cancellation fails the run and
/// kills the child.
#[derive(Debug, Clone)]
pub struct SkillRunner {
    command: Vec<String>,
    timeout: Duration,
}

impl SkillRunner {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    /// Intermediate speeches are voiced through `ctx` as their frames arrive.
    /// Returns the final frame's payload, if the skill produced one.
    pub async fn run(
        &self,
        intent_path: &Path,
        names: &FriendlyNames,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Option<SkillOutput>, SkillFailure> {
        let mut child = self.spawn(intent_path)?;
        let result = self.stream(&mut child, names, ctx, cancel).await;

        if result.is_err() {
            if let Err(e) = child.start_kill() {
                debug!("Skill process already gone: {}", e);
            }
        }
        result
    }

    fn spawn(&self, intent_path: &Path) -> Result<Child, SkillFailure> {
        let (program, args) = self.command.split_first().ok_or_else(|| {
            SkillFailure::Spawn(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "skill command is empty",
            ))
        })?;

        Command::new(program)
            .args(args)
            .arg(intent_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SkillFailure::Spawn)
    }

    async fn stream(
        &self,
        child: &mut Child,
        names: &FriendlyNames,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Option<SkillOutput>, SkillFailure> {
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let mut lines = BufReader::new(stdout).lines();
        let mut frames = FrameAccumulator::new();
        let mut err_chunk = vec![0u8; STDERR_CHUNK];
        let mut stderr_open = true;

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(SkillFailure::Cancelled),

                _ = &mut deadline => return Err(self.timed_out(names)),

                read = stderr.read(&mut err_chunk), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        return Err(SkillFailure::Runtime(
                            String::from_utf8_lossy(&err_chunk[..n]).into_owned(),
                        ))
                    }
                    Err(e) => {
                        warn!(skill = %names.skill, "Cannot read skill stderr: {}", e);
                        stderr_open = false;
                    }
                },

                line = lines.next_line() => match line {
                    Ok(Some(line)) => match frames.push_line(&line) {
                        Ok(LineEvent::Intermediate(output)) => {
                            info!(skill = %names.skill, "{}", line);
                            match output.speech_text() {
                                Some(speech) => ctx.say(&speech, false),
                                None => warn!(skill = %names.skill, "Intermediate frame without speech"),
                            }
                        }
                        Ok(LineEvent::Buffered) | Ok(LineEvent::Blank) => {}
                        Err(violation) => {
                            debug!(skill = %names.skill, "stdout: {}", line);
                            return Err(violation_failure(violation, names));
                        }
                    },
                    Ok(None) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                        return Err(violation_failure(ProtocolViolation::NonJson, names))
                    }
                    Err(e) => return Err(SkillFailure::Io(e)),
                },
            }
        }

        // stdout is closed: the answer is in. stderr only gets a short grace
        // window for an error the skill wrote just before closing.
        if stderr_open {
            let grace = tokio::time::sleep(STDERR_GRACE);
            tokio::pin!(grace);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SkillFailure::Cancelled),
                read = stderr.read(&mut err_chunk) => match read {
                    Ok(n) => {
                        let tail = String::from_utf8_lossy(&err_chunk[..n]).into_owned();
                        if !tail.trim().is_empty() {
                            return Err(SkillFailure::Runtime(tail));
                        }
                    }
                    Err(e) => warn!(skill = %names.skill, "Cannot read skill stderr: {}", e),
                },
                _ = &mut grace => {
                    debug!(skill = %names.skill, "Skill still holds stderr after closing stdout, settling");
                }
            }
        }

        frames
            .finish()
            .map_err(|violation| violation_failure(violation, names))
    }

    fn timed_out(&self, names: &FriendlyNames) -> SkillFailure {
        SkillFailure::Timeout {
            skill: names.skill.clone(),
            domain: names.domain.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

fn missing_pipe(name: &str) -> SkillFailure {
    SkillFailure::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("skill {name} is not piped"),
    ))
}

fn violation_failure(violation: ProtocolViolation, names: &FriendlyNames) -> SkillFailure {
    match violation {
        ProtocolViolation::NonJson => SkillFailure::NonJsonOutput {
            skill: names.skill.clone(),
            domain: names.domain.clone(),
        },
        ProtocolViolation::Malformed => SkillFailure::Malformed {
            skill: names.skill.clone(),
            domain: names.domain.clone(),
        },
    }
}
