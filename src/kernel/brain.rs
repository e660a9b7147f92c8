use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::cancel::{CancellationToken, ExecutionSlot};
use super::config::{ActionDefinition, ActionsFile, BrainConfig, FriendlyNames, LangTable, SkillCatalog, SkillConfig};
use super::dialog::{resolve_dialog_answer, DialogAnswer};
use super::error::{BrainError, ExecutionError, SkillFailure};
use super::event::PresentationChannel;
use super::scheduler::{Dispatch, Scheduler};
use super::skill::{new_utterance_id, IntentFile, IntentObject, SkillOutput, SkillRunner};
use super::speech::{AnswerCorpus, AnswerError};
use super::state::ExecutionContext;
use super::sync::{SyncJob, Synchronizer};
use super::telemetry::{OutcomeKind, TelemetryEvent, TelemetryRecorder, TelemetrySnapshot};
use super::time::Stopwatch;
use super::types::{ClassifiedUtterance, CoreFlags, ExecutionResult};
use crate::outputs::{Speaker, SpeechSynthesizer};

/// Per-call switches of [`Brain::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Speeches are still recorded on the result but nothing is voiced.
    pub mute: bool,
    pub cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn muted() -> Self {
        Self {
            mute: true,
            ..Default::default()
        }
    }
}

/// Active language. Swapped wholesale by [`Brain::set_lang`]; in-flight
/// executions keep the snapshot they started with.
#[derive(Debug, Clone)]
struct Language {
    code: String,
    long_code: String,
    min_confidence: f64,
    answers: Arc<AnswerCorpus>,
}

/// Outcome of a successful dispatch, before it is folded into the result.
struct Settlement {
    outcome: OutcomeKind,
    core: Option<CoreFlags>,
    action: Option<ActionDefinition>,
    next_action: Option<ActionDefinition>,
}

impl Settlement {
    fn clarified() -> Self {
        Self {
            outcome: OutcomeKind::AskedToRepeat,
            core: None,
            action: None,
            next_action: None,
        }
    }
}

/// Skill-execution orchestrator.
///
/// Decides per classified utterance whether to ask for clarification, run
/// an external logic skill or answer from a dialog corpus, and settles each
/// call with exactly one [`ExecutionResult`] or [`ExecutionError`].
pub struct Brain {
    config: BrainConfig,
    langs: LangTable,
    catalog: SkillCatalog,
    language: RwLock<Language>,
    speaker: RwLock<Speaker>,
    synchronizer: Option<Arc<dyn Synchronizer>>,
    runner: SkillRunner,
    slot: ExecutionSlot,
    scheduler: Scheduler,
    rng: Mutex<StdRng>,
    telemetry: Mutex<TelemetryRecorder>,
}

impl Brain {
    pub async fn new(config: BrainConfig, channel: PresentationChannel) -> Result<Self, BrainError> {
        let langs = LangTable::load(&config.langs_path).await?;
        let language = load_language(&config, &langs, &config.lang).await?;
        info!(lang = %language.code, "Brain ready");

        Ok(Self {
            catalog: SkillCatalog::new(&config.skills_dir),
            runner: SkillRunner::new(config.skill_command.clone(), config.skill_timeout),
            language: RwLock::new(language),
            speaker: RwLock::new(Speaker::new(channel, None)),
            synchronizer: None,
            slot: ExecutionSlot::new(),
            scheduler: Scheduler,
            rng: Mutex::new(StdRng::from_entropy()),
            telemetry: Mutex::new(TelemetryRecorder::new()),
            langs,
            config,
        })
    }

    /// Enables voice synthesis. The synthesizer is initialised for the current language.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        synthesizer.init(&self.language.get_mut().long_code);
        self.speaker.get_mut().set_synthesizer(Some(synthesizer));
        self
    }

    pub fn with_synchronizer(mut self, synchronizer: Arc<dyn Synchronizer>) -> Self {
        self.synchronizer = Some(synchronizer);
        self
    }

    /// Makes answer picks and utterance ids reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub async fn lang(&self) -> String {
        self.language.read().await.code.clone()
    }

    /// Switches the answer corpus and re-initialises synthesis for `lang`.
    pub async fn set_lang(&self, lang: &str) -> Result<(), BrainError> {
        let language = load_language(&self.config, &self.langs, lang).await?;

        if let Some(synthesizer) = self.speaker.read().await.synthesizer() {
            synthesizer.init(&language.long_code);
        }

        let mut current = self.language.write().await;
        info!(from = %current.code, to = %language.code, "Language switched");
        *current = language;
        Ok(())
    }

    pub async fn set_channel(&self, channel: PresentationChannel) {
        self.speaker.write().await.set_channel(channel);
    }

    /// Resolves an answer template of the current language.
    pub async fn wernicke(
        &self,
        kind: &str,
        key: Option<&str>,
        substitutions: &[(&str, &str)],
    ) -> Result<String, AnswerError> {
        let answers = self.language.read().await.answers.clone();
        let mut rng = self.rng.lock().await;
        answers.resolve(kind, key, substitutions, &mut *rng)
    }

    pub async fn talk(&self, text: &str, is_final: bool) {
        self.speaker.read().await.talk(text, is_final);
    }

    /// Whether a logic skill process is currently running.
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub async fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.lock().await.snapshot()
    }

    /// Runs one classified utterance to settlement.
    ///
    /// Every failure settles as an [`ExecutionError`] carrying the speeches
    /// produced so far; nothing here panics on bad skill output.
    pub async fn execute(
        &self,
        utterance: ClassifiedUtterance,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError> {
        let stopwatch = Stopwatch::start();
        let language = self.language.read().await.clone();
        let speaker = self.speaker.read().await.clone();
        let utterance_id = {
            let mut rng = self.rng.lock().await;
            new_utterance_id(&mut *rng)
        };
        let cancel = options.cancel.unwrap_or_default();

        let mut ctx = ExecutionContext::new(utterance_id, language.code.clone(), stopwatch, options.mute, speaker);
        let dispatched = self.dispatch(&utterance, &language, &mut ctx, &cancel).await;

        match dispatched {
            Ok(settlement) => {
                let result = ctx.settle(utterance, settlement.core, settlement.action, settlement.next_action);
                info!(
                    utterance_id = %result.utterance_id,
                    execution_time_ms = result.execution_time,
                    outcome = ?settlement.outcome,
                    "Execution settled"
                );
                self.record_settled(settlement.outcome, result.execution_time, result.speeches.len())
                    .await;
                Ok(result)
            }
            Err(cause) => {
                let outcome = OutcomeKind::from(&cause);
                let failure = ctx.fail(cause);
                warn!(kind = ?failure.kind, "Execution failed: {}", failure.cause);
                self.record_settled(outcome, failure.execution_time, failure.speeches.len())
                    .await;
                Err(failure)
            }
        }
    }

    async fn dispatch(
        &self,
        utterance: &ClassifiedUtterance,
        language: &Language,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Settlement, SkillFailure> {
        let classification = &utterance.classification;

        if self.scheduler.needs_clarification(classification, language.min_confidence) {
            info!(
                confidence = classification.confidence,
                min_confidence = language.min_confidence,
                "Confidence too low, asking to repeat"
            );
            let not_sure = self.resolve(language, "random_not_sure", None, &[]).await?;
            ctx.say(&format!("{not_sure}."), true);
            ctx.typing_stopped();
            return Ok(Settlement::clarified());
        }

        let path = &utterance.config_data_file_path;
        let (action, next_action) = ActionsFile::load(path).await?.resolve(&classification.action, path)?;

        debug!(
            domain = %classification.domain,
            skill = %classification.skill,
            action = %classification.action,
            "Dispatching"
        );

        match self.scheduler.route(&action) {
            Dispatch::Logic => {
                self.run_logic(utterance, language, action, next_action, ctx, cancel)
                    .await
            }
            Dispatch::Dialog => self.run_dialog(utterance, language, action, next_action, ctx).await,
        }
    }

    async fn run_logic(
        &self,
        utterance: &ClassifiedUtterance,
        language: &Language,
        action: ActionDefinition,
        next_action: Option<ActionDefinition>,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Settlement, SkillFailure> {
        let Some(_slot) = self.slot.try_acquire() else {
            warn!(
                skill = %utterance.classification.skill,
                "A skill is already running, logic dispatch dropped"
            );
            return Ok(Settlement {
                outcome: OutcomeKind::LogicDropped,
                core: None,
                action: Some(action),
                next_action,
            });
        };

        let classification = &utterance.classification;
        let names = self
            .catalog
            .friendly_names(&classification.domain, &classification.skill)
            .await;

        let intent = IntentObject::from_utterance(ctx.utterance_id(), &language.code, utterance);
        let file = IntentFile::write(&self.config.tmp_dir, &intent).await;
        info!(skill = %names.skill, domain = %names.domain, "Executing skill");
        self.telemetry.lock().await.record(TelemetryEvent::SkillSpawned);

        let output = match self.runner.run(file.path(), &names, ctx, cancel).await {
            Ok(output) => output,
            Err(failure) => {
                error!(skill = %names.skill, domain = %names.domain, "{}", failure);
                if failure.is_user_facing() {
                    self.apologize(language, &names, ctx).await;
                }
                file.remove();
                return Err(failure);
            }
        };

        if let Some(speech) = output.as_ref().and_then(SkillOutput::speech_text) {
            ctx.say(&speech, true);

            // Only a spoken final answer triggers synchronization.
            if let Some(options) = output.as_ref().and_then(SkillOutput::synchronization) {
                let job = SyncJob {
                    classification: classification.clone(),
                    options: options.clone(),
                };
                self.synchronize(&job, language, ctx).await;
            }
        }

        file.remove();
        ctx.typing_stopped();

        let core = output.and_then(|output| output.core);
        let flags = core.clone().unwrap_or_default();
        for suggestions in self.scheduler.suggestions(&action, next_action.as_ref(), Some(&flags)) {
            ctx.suggest(suggestions);
        }

        Ok(Settlement {
            outcome: OutcomeKind::LogicCompleted,
            core,
            action: Some(action),
            next_action,
        })
    }

    async fn run_dialog(
        &self,
        utterance: &ClassifiedUtterance,
        language: &Language,
        action: ActionDefinition,
        next_action: Option<ActionDefinition>,
        ctx: &mut ExecutionContext,
    ) -> Result<Settlement, SkillFailure> {
        let classification = &utterance.classification;
        let path = self
            .catalog
            .skill_config_path(&classification.domain, &classification.skill, &language.code);
        let config = SkillConfig::load(&path).await?;

        let DialogAnswer {
            answer,
            next_action: configured_next,
        } = {
            let mut rng = self.rng.lock().await;
            resolve_dialog_answer(utterance, &config, &mut *rng)?
        };

        ctx.say(&answer, true);
        ctx.typing_stopped();

        let next_action = next_action.or(configured_next);
        for suggestions in self.scheduler.suggestions(&action, next_action.as_ref(), None) {
            ctx.suggest(suggestions);
        }

        Ok(Settlement {
            outcome: OutcomeKind::DialogAnswered,
            core: None,
            action: Some(action),
            next_action,
        })
    }

    /// Generic apology naming the skill and domain. Failing to build it is only logged.
    async fn apologize(&self, language: &Language, names: &FriendlyNames, ctx: &mut ExecutionContext) {
        let substitutions = [
            ("%skill_name%", names.skill.as_str()),
            ("%domain_name%", names.domain.as_str()),
        ];
        match self.resolve(language, "random_skill_errors", None, &substitutions).await {
            Ok(apology) => ctx.say(&format!("{apology}!"), true),
            Err(e) => error!("Cannot build skill error answer: {}", e),
        }
        ctx.typing_stopped();
    }

    async fn synchronize(&self, job: &SyncJob, language: &Language, ctx: &mut ExecutionContext) {
        let Some(synchronizer) = &self.synchronizer else {
            debug!(method = job.method(), "No synchronizer configured, skipping");
            return;
        };

        info!(method = job.method(), skill = %job.classification.skill, "Synchronizing content");
        if let Err(e) = synchronizer.synchronize(job).await {
            error!(method = job.method(), "Synchronization failed: {:#}", e);
            return;
        }

        let key = job.completion_key();
        match self.resolve(language, "synchronizer", Some(&key), &[]).await {
            Ok(speech) => ctx.say(&speech, true),
            Err(e) => warn!("No completion answer for synchronization: {}", e),
        }
    }

    async fn resolve(
        &self,
        language: &Language,
        kind: &str,
        key: Option<&str>,
        substitutions: &[(&str, &str)],
    ) -> Result<String, AnswerError> {
        let mut rng = self.rng.lock().await;
        language.answers.resolve(kind, key, substitutions, &mut *rng)
    }

    async fn record_settled(&self, outcome: OutcomeKind, execution_time_ms: u64, speech_count: usize) {
        self.telemetry.lock().await.record(TelemetryEvent::Settled {
            outcome,
            execution_time_ms,
            speech_count,
        });
    }
}

async fn load_language(config: &BrainConfig, langs: &LangTable, lang: &str) -> Result<Language, BrainError> {
    let (long_code, min_confidence) = langs
        .long_code(lang)
        .zip(langs.min_confidence(lang))
        .ok_or_else(|| BrainError::UnsupportedLanguage(lang.to_string()))?;

    let answers = AnswerCorpus::load(&config.answers_path(lang)).await?;

    Ok(Language {
        code: lang.to_string(),
        long_code: long_code.to_string(),
        min_confidence,
        answers: Arc::new(answers),
    })
}
