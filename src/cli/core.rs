//! Shell context, command dispatch and rendering of wizard state.

use std::{io, path::PathBuf, sync::Arc};

use dialoguer::{theme::ColorfulTheme, Confirm};
use rustyline::error::ReadlineError;
use serde_json::Value;
use strsim::levenshtein;
use thiserror::Error;
use tracing::warn;

use crate::config::{ConfigError, ConfigManager, EngineConfig};
use crate::errors::{StoreError, WizardError};
use crate::flows;
use crate::graph::StepGraph;
use crate::store::{FieldPath, FieldPathError, FieldStore, JsonFieldStore};
use crate::utils::build_info;
use crate::wizard::{SubmitOutcome, Transition, Wizard, WizardPhase};

use super::output;
use super::persist::JsonFileSubmission;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
    #[error("Invalid input: {0}")]
    Input(String),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("No flow is open. Use `flow listing` or `flow search` first.")]
    NoActiveFlow,
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Path(#[from] FieldPathError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dialoguer(#[from] dialoguer::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("exit requested")]
    ExitRequested,
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

/// Command line options of `listing_wizard_cli`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Where submitted records are written.
    pub out_dir: Option<PathBuf>,
    /// Base directory holding `config.json` and `definitions/`.
    pub config_dir: Option<PathBuf>,
    /// Flow opened before the first command.
    pub flow: Option<String>,
}

impl CliOptions {
    pub fn from_args<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| CliError::Input(format!("`{name}` expects a value")))
            };
            match arg.as_str() {
                "--out" => options.out_dir = Some(PathBuf::from(value("--out")?)),
                "--config-dir" => options.config_dir = Some(PathBuf::from(value("--config-dir")?)),
                "--flow" => options.flow = Some(value("--flow")?),
                other => return Err(CliError::Input(format!("unknown option `{other}`"))),
            }
        }
        Ok(options)
    }
}

/// Commands with their usage line, in help order.
pub(crate) const COMMANDS: &[(&str, &str)] = &[
    ("flow", "flow <listing|search|definition name>  open a new flow"),
    ("set", "set <path> <value>  write a field (JSON, or plain text)"),
    ("unset", "unset <path>  remove a field or list item"),
    ("show", "show [path]  print the field store or one field"),
    ("next", "next  validate the current step and move forward"),
    ("back", "back  move to the previous step"),
    ("jump", "jump <step> [item]  edit a step directly (item is 1-based)"),
    ("status", "status  print the current step and progress"),
    ("steps", "steps  list every step of the flow"),
    ("retry", "retry  retry a failed submission"),
    ("restart", "restart  return to the first step"),
    ("cancel", "cancel  discard the open flow"),
    ("version", "version  print build information"),
    ("help", "help  list commands"),
    ("exit", "exit  leave the shell"),
];

pub struct ShellContext {
    pub(crate) mode: CliMode,
    pub(crate) running: bool,
    theme: ColorfulTheme,
    config: EngineConfig,
    config_manager: Option<ConfigManager>,
    trigger: JsonFileSubmission,
    wizard: Option<Wizard<JsonFieldStore>>,
}

impl ShellContext {
    pub fn new(mode: CliMode, options: &CliOptions) -> Result<Self, CliError> {
        let config_manager = match &options.config_dir {
            Some(dir) => Some(ConfigManager::with_base_dir(dir.clone())?),
            None => ConfigManager::default_location()
                .map_err(|err| warn!(%err, "configuration unavailable, using defaults"))
                .ok(),
        };
        let config = match &config_manager {
            Some(manager) => manager.load()?,
            None => EngineConfig::default(),
        };
        crate::init_with(&config.log_filter);

        if mode == CliMode::Script {
            colored::control::set_override(false);
        }

        let out_dir = options
            .out_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("wizard_core_submissions"));

        let mut context = ShellContext {
            mode,
            running: true,
            theme: ColorfulTheme::default(),
            config,
            config_manager,
            trigger: JsonFileSubmission::new(out_dir),
            wizard: None,
        };

        if let Some(flow) = &options.flow {
            context
                .open_flow(flow)
                .map_err(|err| CliError::Input(err.to_string()))?;
        }
        Ok(context)
    }

    pub(crate) fn prompt(&self) -> String {
        match &self.wizard {
            Some(wizard) => format!("{}:{}> ", wizard.graph().name(), wizard.current_key()),
            None => "wizard> ".to_string(),
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let result = match command {
            "flow" => self.cmd_flow(args),
            "set" => self.cmd_set(args),
            "unset" => self.cmd_unset(args),
            "show" => self.cmd_show(args),
            "next" => self.cmd_next(),
            "back" => self.cmd_back(),
            "jump" => self.cmd_jump(args),
            "status" => self.print_status(),
            "steps" => self.cmd_steps(),
            "retry" => self.cmd_retry(),
            "restart" => self.cmd_restart(),
            "cancel" => self.cmd_cancel(),
            "version" => {
                output::info(build_info::current().summary());
                Ok(())
            }
            "help" => {
                self.print_help();
                Ok(())
            }
            "exit" | "quit" => Err(CommandError::ExitRequested),
            _ => {
                self.suggest_command(raw);
                Ok(())
            }
        };
        match result {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));

        let best = COMMANDS
            .iter()
            .map(|(name, _)| (levenshtein(name, &input.to_lowercase()), *name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::info(format!("Suggestion: `{}`?", name));
            }
        }
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        confirm(&self.theme, "Exit shell?", true)
            .map_err(|err| CliError::Input(err.to_string()))
    }

    pub(crate) fn report_error(&self, err: CommandError) -> Result<(), CliError> {
        match err {
            CommandError::ExitRequested => Ok(()),
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Type `help` for usage details.");
                Ok(())
            }
            other => {
                output::error(other);
                Ok(())
            }
        }
    }

    fn wizard(&self) -> Result<&Wizard<JsonFieldStore>, CommandError> {
        self.wizard.as_ref().ok_or(CommandError::NoActiveFlow)
    }

    fn wizard_mut(&mut self) -> Result<&mut Wizard<JsonFieldStore>, CommandError> {
        self.wizard.as_mut().ok_or(CommandError::NoActiveFlow)
    }

    fn open_flow(&mut self, name: &str) -> CommandResult {
        let graph = self.load_graph(name)?;
        self.trigger.set_flow(graph.name());
        self.wizard = Some(Wizard::new(graph, JsonFieldStore::new()));
        output::section(format!("Flow `{}`", name));
        self.print_status()
    }

    fn load_graph(&self, name: &str) -> Result<Arc<StepGraph>, CommandError> {
        if flows::FLOW_NAMES.contains(&name) {
            return Ok(flows::by_name(name)?);
        }
        let manager = self.config_manager.as_ref().ok_or_else(|| {
            CommandError::InvalidArguments(format!(
                "Unknown flow `{}`. Built-in flows: {}",
                name,
                flows::FLOW_NAMES.join(", ")
            ))
        })?;
        let mut definition = manager.load_definition(name)?;
        if definition.labels.is_none() {
            definition.labels = Some(self.config.labels.clone());
        }
        Ok(Arc::new(definition.compile()?))
    }

    fn cmd_flow(&mut self, args: &[&str]) -> CommandResult {
        let [name] = args else {
            return Err(CommandError::InvalidArguments(
                "Usage: flow <listing|search|definition name>".into(),
            ));
        };
        if let Some(wizard) = &self.wizard {
            if matches!(wizard.phase(), WizardPhase::SubmitPending { .. }) {
                return Err(WizardError::SubmissionInFlight.into());
            }
        }
        self.open_flow(name)
    }

    fn cmd_set(&mut self, args: &[&str]) -> CommandResult {
        let [path, raw @ ..] = args else {
            return Err(CommandError::InvalidArguments("Usage: set <path> <value>".into()));
        };
        if raw.is_empty() {
            return Err(CommandError::InvalidArguments("Usage: set <path> <value>".into()));
        }
        let path = FieldPath::parse(path)?;
        let value = parse_value(&raw.join(" "));
        self.wizard_mut()?.store_mut().set(&path, value)?;
        Ok(())
    }

    fn cmd_unset(&mut self, args: &[&str]) -> CommandResult {
        let [path] = args else {
            return Err(CommandError::InvalidArguments("Usage: unset <path>".into()));
        };
        let path = FieldPath::parse(path)?;
        if self.wizard_mut()?.store_mut().remove(&path).is_none() {
            output::warning(format!("Nothing stored at `{}`.", path));
        }
        Ok(())
    }

    fn cmd_show(&self, args: &[&str]) -> CommandResult {
        let store = self.wizard()?.store();
        let rendered = match args {
            [] => serde_json::to_string_pretty(store.as_value())?,
            [path] => {
                let path = FieldPath::parse(path)?;
                match store.get(&path) {
                    Some(value) => serde_json::to_string_pretty(value)?,
                    None => "null".to_string(),
                }
            }
            _ => return Err(CommandError::InvalidArguments("Usage: show [path]".into())),
        };
        output::line(rendered);
        Ok(())
    }

    fn cmd_next(&mut self) -> CommandResult {
        let transition = self.wizard_mut()?.next()?;
        self.report_transition(transition)
    }

    fn cmd_back(&mut self) -> CommandResult {
        let transition = self.wizard_mut()?.previous()?;
        self.report_transition(transition)
    }

    fn cmd_jump(&mut self, args: &[&str]) -> CommandResult {
        let (key, item) = match args {
            [key] => (*key, None),
            [key, item] => {
                let position: usize = item.parse().map_err(|_| {
                    CommandError::InvalidArguments(format!("`{}` is not an item number", item))
                })?;
                if position == 0 {
                    return Err(CommandError::InvalidArguments(
                        "Item numbers start at 1".into(),
                    ));
                }
                (*key, Some(position - 1))
            }
            _ => {
                return Err(CommandError::InvalidArguments(
                    "Usage: jump <step> [item]".into(),
                ))
            }
        };
        let transition = self.wizard_mut()?.jump_to_key(key, item)?;
        self.report_transition(transition)
    }

    fn cmd_retry(&mut self) -> CommandResult {
        let transition = self.wizard_mut()?.retry_submission()?;
        self.report_transition(transition)
    }

    fn cmd_restart(&mut self) -> CommandResult {
        let transition = self.wizard_mut()?.restart()?;
        self.report_transition(transition)
    }

    fn cmd_cancel(&mut self) -> CommandResult {
        self.wizard()?;
        if self.mode == CliMode::Interactive
            && !confirm(&self.theme, "Discard this flow?", false)?
        {
            output::info("Flow kept.");
            return Ok(());
        }
        self.wizard_mut()?.cancel()?;
        self.wizard = None;
        output::info("Flow cancelled. Nothing was submitted.");
        Ok(())
    }

    fn cmd_steps(&self) -> CommandResult {
        let wizard = self.wizard()?;
        let graph = wizard.graph();
        output::section(format!("Steps of `{}`", graph.name()));
        for step in graph.steps() {
            let marker = if step.id == wizard.current_step() { '*' } else { ' ' };
            let region = graph
                .region_of(step.id)
                .map(|(_, region)| format!(" (per item of `{}`)", region.name))
                .unwrap_or_default();
            output::line(format!(
                "{} {:>2}. {} - {}{}",
                marker,
                step.id.index() + 1,
                step.key,
                step.title,
                region
            ));
        }
        Ok(())
    }

    fn report_transition(&mut self, transition: Transition) -> CommandResult {
        match transition {
            Transition::Moved { .. } => self.print_status(),
            Transition::Blocked(err) => {
                output::warning(format!("{} (field `{}`)", err.message, err.field));
                Ok(())
            }
            Transition::ReadyToSubmit => self.submit(),
            Transition::Busy => {
                output::warning("A submission is in progress; try again once it settles.");
                Ok(())
            }
            Transition::Stayed => {
                output::info("Already at the first step.");
                Ok(())
            }
        }
    }

    fn submit(&mut self) -> CommandResult {
        let wizard = self.wizard.as_mut().ok_or(CommandError::NoActiveFlow)?;
        output::info(format!("Submitting `{}`...", wizard.graph().name()));
        match wizard.submit_with(&mut self.trigger)? {
            SubmitOutcome::Submitted(receipt) => {
                let location = self
                    .trigger
                    .last_written()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                output::success(format!(
                    "Submitted record {} to {}",
                    receipt.record_id, location
                ));
            }
            SubmitOutcome::Failed(reason) => {
                output::error(format!("Submission failed: {}", reason));
                output::hint("Use `retry` to submit again or `back` to keep editing.");
            }
        }
        Ok(())
    }

    fn print_status(&self) -> CommandResult {
        let wizard = self.wizard()?;
        let graph = wizard.graph();
        let progress = wizard.progress();
        let title = graph
            .step(wizard.current_step())
            .map(|step| step.title.as_str())
            .unwrap_or_default();

        let mut line = format!(
            "Step {} of {}: {} ({})",
            progress.position,
            progress.total,
            title,
            wizard.current_key()
        );
        if let (Some(index), Some((_, region))) =
            (wizard.loop_index(), graph.region_of(wizard.current_step()))
        {
            let count = region.item_count(wizard.store());
            line.push_str(&format!(" [{} {} of {}]", region.name, index + 1, count));
        }
        output::line(line);

        match wizard.phase() {
            WizardPhase::Submitted(receipt) => {
                output::line(format!("Submitted as {}", receipt.record_id))
            }
            WizardPhase::SubmitFailed { reason } => {
                output::line(format!("Submission failed: {}", reason))
            }
            _ => output::line(format!("Action: {}", wizard.action_label())),
        }
        Ok(())
    }

    fn print_help(&self) {
        output::section("Commands");
        for (_, usage) in COMMANDS {
            output::line(format!("  {}", usage));
        }
    }
}

fn confirm(theme: &ColorfulTheme, prompt: &str, default: bool) -> Result<bool, CommandError> {
    Ok(Confirm::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// JSON when it parses, plain text otherwise, so `set city Lyon` works.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
