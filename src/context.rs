//! Service context bundling the port trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::id_gen::LiveIdGenerator;
use crate::adapters::live::llm::LiveLlmClient;
use crate::adapters::live::shell::LiveShellExecutor;
use crate::adapters::recording::{RecordingLlmClient, RecordingShellExecutor};
use crate::adapters::replaying::{ReplayingLlmClient, ReplayingShellExecutor};
use crate::cassette::config::CassetteConfig;
use crate::cassette::session::RecordingSession;
use crate::config::Settings;
use crate::ports::{
    Clock, CompletionFuture, CompletionRequest, FileSystem, IdGenerator, LlmClient, PortError,
    ShellExecutor, ShellOutput,
};

/// Every external boundary of a run, built once and borrowed by the
/// pipeline components.
pub struct ServiceContext {
    /// Wall clock for report timestamps.
    pub clock: Box<dyn Clock>,
    /// Single-file reads and writes.
    pub fs: Box<dyn FileSystem>,
    /// Build-tool invocations.
    pub shell: Box<dyn ShellExecutor>,
    /// Run identifiers.
    pub id_gen: Box<dyn IdGenerator>,
    /// Language-model completions.
    pub llm: Box<dyn LlmClient>,
}

impl ServiceContext {
    /// Live adapters everywhere, with the LLM provider taken from `settings`.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            shell: Box::new(LiveShellExecutor),
            id_gen: Box::new(LiveIdGenerator),
            llm: Box::new(LiveLlmClient::new(settings.provider, settings.base_url.clone())),
        }
    }

    /// Live adapters with the LLM and shell ports recorded into a new
    /// session under `root`.
    ///
    /// Drop the context before calling [`RecordingSession::finish`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be created.
    pub fn recording_at(
        settings: &Settings,
        root: &Path,
        run_id: &str,
    ) -> Result<(Self, RecordingSession), String> {
        let session = RecordingSession::new(root, run_id)?;
        let live = Self::live(settings);
        let ctx = Self {
            llm: Box::new(RecordingLlmClient::new(live.llm, Arc::clone(&session.llm))),
            shell: Box::new(RecordingShellExecutor::new(live.shell, Arc::clone(&session.shell))),
            ..live
        };
        Ok((ctx, session))
    }

    /// Replays the LLM and shell ports from cassettes; the rest stay live.
    ///
    /// A port without a cassette answers every call with an error naming it.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured cassette cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        let replayers = config.load_all()?;
        Ok(Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            id_gen: Box::new(LiveIdGenerator),
            llm: match replayers.llm {
                Some(r) => Box::new(ReplayingLlmClient::new(Arc::new(Mutex::new(r)))),
                None => Box::new(UnconfiguredLlmClient),
            },
            shell: match replayers.shell {
                Some(r) => Box::new(ReplayingShellExecutor::new(Arc::new(Mutex::new(r)))),
                None => Box::new(UnconfiguredShellExecutor),
            },
        })
    }

    /// Swaps in a different LLM client.
    #[must_use]
    pub fn with_llm(self, llm: Box<dyn LlmClient>) -> Self {
        Self { llm, ..self }
    }

    /// Swaps in a different shell executor.
    #[must_use]
    pub fn with_shell(self, shell: Box<dyn ShellExecutor>) -> Self {
        Self { shell, ..self }
    }
}

struct UnconfiguredLlmClient;

impl LlmClient for UnconfiguredLlmClient {
    fn complete(&self, _request: &CompletionRequest) -> CompletionFuture<'_> {
        Box::pin(async { Err(PortError::from("LlmClient port has no cassette configured")) })
    }
}

struct UnconfiguredShellExecutor;

impl ShellExecutor for UnconfiguredShellExecutor {
    fn run(&self, _command: &str, _cwd: Option<&Path>) -> Result<ShellOutput, PortError> {
        Err("ShellExecutor port has no cassette configured".into())
    }
}
