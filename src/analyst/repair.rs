use super::error::Result;
use super::executors::{ExecutionLimits, ScriptExecutor, ScriptOutput};
use super::extract::extract_script;
use super::inference::CompletionBackend;
use super::metadata::summarize_attachments;
use super::prompts;
use super::workspace::RequestContext;
use crate::shared::config::ExecutionConfig;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a single attempt's output was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    TimedOut,
    NonZeroExit(i32),
    EmptyOutput,
    InvalidJson(String),
    NotStructured,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::TimedOut => write!(f, "the script timed out"),
            AttemptFailure::NonZeroExit(code) => write!(f, "the script exited with code {}", code),
            AttemptFailure::EmptyOutput => write!(f, "the script printed nothing to stdout"),
            AttemptFailure::InvalidJson(err) => write!(f, "stdout is not valid JSON ({})", err),
            AttemptFailure::NotStructured => {
                write!(f, "stdout is JSON but not an array or object")
            }
        }
    }
}

/// One execution of a candidate script. Never mutated after it is recorded.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub script: String,
    pub output: ScriptOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    AttemptsExhausted,
    FixedPoint,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExhaustionReport {
    pub error: String,
    pub attempts: u32,
    pub last_exit_code: i32,
    pub last_stdout: String,
    pub last_stderr: String,
    pub last_code: String,
    #[serde(skip)]
    pub reason: ExhaustionReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded { value: Value, attempts: u32 },
    Exhausted(ExhaustionReport),
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_attempts: u32,
    pub max_code_chars: usize,
    pub accept_empty_output: bool,
    pub limits: ExecutionLimits,
}

impl LoopSettings {
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            max_code_chars: config.max_code_chars,
            accept_empty_output: config.accept_empty_output,
            limits: ExecutionLimits {
                timeout: config.script_timeout(),
            },
        }
    }
}

/// Check a finished script's output. Success means a clean exit and a JSON
/// array or object on stdout.
pub fn validate(
    output: &ScriptOutput,
    accept_empty_output: bool,
) -> std::result::Result<Value, AttemptFailure> {
    if output.timed_out {
        return Err(AttemptFailure::TimedOut);
    }
    if output.exit_code != 0 {
        return Err(AttemptFailure::NonZeroExit(output.exit_code));
    }

    let trimmed = output.stdout.trim();
    if trimmed.is_empty() {
        return if accept_empty_output {
            Ok(Value::Null)
        } else {
            Err(AttemptFailure::EmptyOutput)
        };
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ (Value::Array(_) | Value::Object(_))) => Ok(value),
        Ok(_) => Err(AttemptFailure::NotStructured),
        Err(e) => Err(AttemptFailure::InvalidJson(e.to_string())),
    }
}

/// Generate, run, validate, and on failure ask the model for a fix, up to a
/// bounded number of attempts.
pub struct RepairLoop<'a> {
    completion: &'a dyn CompletionBackend,
    executor: &'a dyn ScriptExecutor,
    system_prompt: &'a str,
    settings: &'a LoopSettings,
}

impl<'a> RepairLoop<'a> {
    pub fn new(
        completion: &'a dyn CompletionBackend,
        executor: &'a dyn ScriptExecutor,
        system_prompt: &'a str,
        settings: &'a LoopSettings,
    ) -> Self {
        Self {
            completion,
            executor,
            system_prompt,
            settings,
        }
    }

    /// Completion and executor errors abort the loop; script failures do not.
    pub async fn run(&self, ctx: &RequestContext) -> Result<Outcome> {
        let attachments = summarize_attachments(ctx.workdir(), ctx.attachments());
        let user_prompt = prompts::initial_prompt(&ctx.question, &ctx.files, &attachments);

        let reply = self.completion.complete(self.system_prompt, &user_prompt).await?;
        let mut script = extract_script(&reply);
        let mut number: u32 = 1;

        loop {
            debug!(request_id = %ctx.request_id, attempt = number, script = %script, "Running candidate script");
            let output = self
                .executor
                .execute(ctx.workdir(), &script, &self.settings.limits)
                .await?;
            let attempt = Attempt {
                number,
                script,
                output,
            };

            let failure = match validate(&attempt.output, self.settings.accept_empty_output) {
                Ok(value) => {
                    info!(request_id = %ctx.request_id, attempts = number, "Produced valid JSON answer");
                    return Ok(Outcome::Succeeded {
                        value,
                        attempts: number,
                    });
                }
                Err(failure) => failure,
            };

            warn!(
                request_id = %ctx.request_id,
                attempt = number,
                exit_code = attempt.output.exit_code,
                timed_out = attempt.output.timed_out,
                "Attempt failed: {}",
                failure
            );

            if number >= self.settings.max_attempts {
                return Ok(self.exhausted(attempt, ExhaustionReason::AttemptsExhausted));
            }

            let feedback =
                prompts::repair_prompt(number, &attempt.output, &failure, &attempt.script);
            let reply = self.completion.complete(self.system_prompt, &feedback).await?;
            let next_script = extract_script(&reply);

            if next_script.trim() == attempt.script.trim() {
                info!(
                    request_id = %ctx.request_id,
                    attempt = number,
                    "Model returned the same script; giving up"
                );
                return Ok(self.exhausted(attempt, ExhaustionReason::FixedPoint));
            }

            script = next_script;
            number += 1;
        }
    }

    fn exhausted(&self, last: Attempt, reason: ExhaustionReason) -> Outcome {
        let error = match reason {
            ExhaustionReason::AttemptsExhausted => format!(
                "Could not produce valid JSON after {} attempts",
                last.number
            ),
            ExhaustionReason::FixedPoint => format!(
                "Could not produce valid JSON: the model repeated the script from attempt {}",
                last.number
            ),
        };
        Outcome::Exhausted(ExhaustionReport {
            error,
            attempts: last.number,
            last_exit_code: last.output.exit_code,
            last_stdout: last.output.stdout,
            last_stderr: last.output.stderr,
            last_code: truncate_chars(&last.script, self.settings.max_code_chars),
            reason,
        })
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
