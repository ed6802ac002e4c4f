//! Request validation and scenario resolution.
//!
//! Turns the raw query parameters of the load-test endpoint into a
//! validated [`LoadTestPlan`]: enumerations checked, numeric ranges
//! clamped, the effective prompt text and command line resolved. All
//! validation happens here, before any engine call is made.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{HarnessError, HarnessResult};

pub const MIN_CONCURRENCY: u32 = 1;
pub const MAX_CONCURRENCY: u32 = 64;
pub const MIN_DURATION_SECS: u64 = 5;
pub const MAX_DURATION_SECS: u64 = 3600;
pub const MAX_CYCLE_DELAY_MS: u64 = 60_000;

/// Commands a providerless cycle may execute inside a session. Whitespace
/// tokenization has no quoting support, so only fixed read-only
/// diagnostics are allowed through.
const COMMAND_ALLOW_LIST: &[&str] = &[
    "echo", "true", "pwd", "date", "whoami", "hostname", "uname", "ls", "git",
];

const DEFAULT_COMMAND: &str = "echo ok";

/// Raw, untrusted query parameters of the load-test endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadTestRequest {
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,
    #[serde(default = "default_cycle_delay_ms")]
    pub cycle_delay_ms: u64,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub inline_body: Option<String>,
}

impl Default for LoadTestRequest {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
            profile: None,
            concurrency: default_concurrency(),
            duration_seconds: default_duration_seconds(),
            cycle_delay_ms: default_cycle_delay_ms(),
            command: None,
            prompt: None,
            file_path: None,
            inline_body: None,
        }
    }
}

fn default_scenario() -> String {
    "providerless".to_string()
}

fn default_concurrency() -> u32 {
    4
}

fn default_duration_seconds() -> u64 {
    30
}

fn default_cycle_delay_ms() -> u64 {
    500
}

/// Broad category of work a cycle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Plain prompt round-trip against the resolved model.
    Remote,
    /// Prompt asking the model to read a workspace file.
    File,
    /// Prompt with a caller-supplied body embedded inline.
    Inline,
    /// Engine primitives only, no model traffic.
    Providerless,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Remote => "remote",
            Scenario::File => "file",
            Scenario::Inline => "inline",
            Scenario::Providerless => "providerless",
        }
    }

    /// Whether cycles submit prompts (as opposed to engine primitives).
    pub fn is_prompt(&self) -> bool {
        !matches!(self, Scenario::Providerless)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(Scenario::Remote),
            "file" => Ok(Scenario::File),
            "inline" => Ok(Scenario::Inline),
            "providerless" => Ok(Scenario::Providerless),
            _ => Err(HarnessError::UnsupportedScenario),
        }
    }
}

/// Primitive mix for providerless runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    CommandOnly,
    GetSessionOnly,
    ListSessionsOnly,
    Mixed,
    SoakMixed,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::CommandOnly => "command_only",
            Profile::GetSessionOnly => "get_session_only",
            Profile::ListSessionsOnly => "list_sessions_only",
            Profile::Mixed => "mixed",
            Profile::SoakMixed => "soak_mixed",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command_only" => Ok(Profile::CommandOnly),
            "get_session_only" => Ok(Profile::GetSessionOnly),
            "list_sessions_only" => Ok(Profile::ListSessionsOnly),
            "mixed" => Ok(Profile::Mixed),
            "soak_mixed" => Ok(Profile::SoakMixed),
            _ => Err(HarnessError::UnsupportedProfile),
        }
    }
}

/// Command line split into binary and arguments. No quoting support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Fallback diagnostic command used when the caller supplies none.
    pub fn default_diagnostic() -> Self {
        Self {
            program: "echo".to_string(),
            args: vec!["ok".to_string()],
        }
    }

    /// Effective command line as echoed back in telemetry.
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Fully validated run parameters. Immutable for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct LoadTestPlan {
    pub scenario: Scenario,
    /// Set for providerless runs only.
    pub profile: Option<Profile>,
    pub concurrency: u32,
    pub duration_seconds: u64,
    pub cycle_delay_ms: u64,
    /// Effective prompt text; set for prompt scenarios only.
    pub prompt: Option<String>,
    /// Allow-listed command; set for providerless runs only.
    pub command: Option<ParsedCommand>,
}

/// Validate a raw request into a plan. Fails before any side effect.
pub fn resolve(request: &LoadTestRequest) -> HarnessResult<LoadTestPlan> {
    let scenario: Scenario = request.scenario.parse()?;

    let (profile, command, prompt) = if scenario.is_prompt() {
        (None, None, Some(build_prompt(scenario, request)))
    } else {
        let profile: Profile = request.profile.as_deref().unwrap_or("mixed").parse()?;
        let command = parse_command(request.command.as_deref())?;
        (Some(profile), Some(command), None)
    };

    Ok(LoadTestPlan {
        scenario,
        profile,
        concurrency: request.concurrency.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY),
        duration_seconds: request
            .duration_seconds
            .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS),
        cycle_delay_ms: request.cycle_delay_ms.min(MAX_CYCLE_DELAY_MS),
        prompt,
        command,
    })
}

/// Scenario template plus the optional caller suffix on a new paragraph.
fn build_prompt(scenario: Scenario, request: &LoadTestRequest) -> String {
    let base = match scenario {
        Scenario::Remote => {
            "Reply with a single short sentence acknowledging this message.".to_string()
        }
        Scenario::File => {
            let path = non_empty(request.file_path.as_deref()).unwrap_or("README.md");
            format!("Read the file at {path} and summarize it in one sentence.")
        }
        Scenario::Inline => {
            let body = non_empty(request.inline_body.as_deref()).unwrap_or("(empty snippet)");
            format!("Consider the following snippet:\n\n{body}\n\nSummarize it in one sentence.")
        }
        Scenario::Providerless => String::new(),
    };

    match non_empty(request.prompt.as_deref()) {
        Some(extra) => format!("{base}\n\n{extra}"),
        None => base,
    }
}

/// Whitespace tokenization gated by the allow-list. Empty input falls back
/// to the default diagnostic command.
fn parse_command(raw: Option<&str>) -> HarnessResult<ParsedCommand> {
    let line = match non_empty(raw) {
        Some(line) => line,
        None => DEFAULT_COMMAND,
    };

    let mut tokens = line.split_whitespace();
    let program = match tokens.next() {
        Some(program) => program,
        None => return Ok(ParsedCommand::default_diagnostic()),
    };
    if !COMMAND_ALLOW_LIST.contains(&program) {
        return Err(HarnessError::CommandNotAllowed(program.to_string()));
    }

    Ok(ParsedCommand {
        program: program.to_string(),
        args: tokens.map(str::to_string).collect(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
