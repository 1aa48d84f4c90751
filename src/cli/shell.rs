use std::{
    borrow::Cow,
    fmt,
    io::{self, BufRead},
};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::Validator,
    Cmd, Context as ReadlineContext, Editor, Helper, KeyEvent,
};

use crate::cli::core::{
    CliError, CliMode, CliOptions, CommandError, LoopControl, ShellContext, COMMANDS,
};
use crate::cli::output;
use crate::flows::FLOW_NAMES;

/// Environment variable that switches the shell to reading commands from
/// stdin, one per line.
pub const SCRIPT_ENV: &str = "WIZARD_CLI_SCRIPT";

pub fn run_cli(options: CliOptions) -> Result<(), CliError> {
    let mode = match std::env::var_os(SCRIPT_ENV) {
        Some(_) => CliMode::Script,
        None => CliMode::Interactive,
    };
    let mut context = ShellContext::new(mode, &options)?;

    match mode {
        CliMode::Script => {
            let mut lines = io::stdin().lock().lines();
            drive(&mut context, |_| lines.next().transpose().map_err(CliError::from))
        }
        CliMode::Interactive => {
            let mut editor = Editor::<FlowCompleter, DefaultHistory>::new()?;
            editor.set_helper(Some(FlowCompleter));
            editor.bind_sequence(KeyEvent::from('?'), Cmd::Complete);
            drive(&mut context, |context| read_interactive(&mut editor, context))
        }
    }
}

/// Feeds lines from `read` to the context until it stops, the input ends or
/// `exit` is entered. `read` yields `None` at end of input.
fn drive<F>(context: &mut ShellContext, mut read: F) -> Result<(), CliError>
where
    F: FnMut(&ShellContext) -> Result<Option<String>, CliError>,
{
    while context.running {
        let Some(line) = read(&*context)? else {
            break;
        };
        match run_line(context, &line) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => context.running = false,
            Err(err) => context.report_error(err)?,
        }
    }
    Ok(())
}

fn read_interactive(
    editor: &mut Editor<FlowCompleter, DefaultHistory>,
    context: &ShellContext,
) -> Result<Option<String>, CliError> {
    loop {
        match editor.readline(&context.prompt()) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str()).ok();
                return Ok(Some(line));
            }
            Err(ReadlineError::Interrupted) => {
                if context.confirm_exit()? {
                    return Ok(None);
                }
            }
            Err(ReadlineError::Eof) => {
                output::info("Leaving the wizard shell.");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn run_line(
    context: &mut ShellContext,
    line: &str,
) -> Result<LoopControl, CommandError> {
    let tokens = match tokenize(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            output::warning(err);
            return Ok(LoopControl::Continue);
        }
    };
    match tokens.split_first() {
        None => Ok(LoopControl::Continue),
        Some((raw, _)) if raw.starts_with('#') => Ok(LoopControl::Continue),
        Some((raw, rest)) => {
            let args: Vec<&str> = rest.iter().map(String::as_str).collect();
            context.dispatch(&raw.to_lowercase(), raw, &args)
        }
    }
}

/// Completes command names, and flow names after `flow`.
struct FlowCompleter;

impl FlowCompleter {
    fn candidates(line: &str) -> (usize, Vec<&'static str>) {
        let word_start = line.rfind(char::is_whitespace).map_or(0, |pos| pos + 1);
        let word = line[word_start..].to_ascii_lowercase();
        let preceding: Vec<&str> = line[..word_start].split_whitespace().collect();

        let pool: Vec<&'static str> = match preceding.as_slice() {
            [] => COMMANDS.iter().map(|(name, _)| *name).collect(),
            [command] if command.eq_ignore_ascii_case("flow") => FLOW_NAMES.to_vec(),
            _ => Vec::new(),
        };
        let matches = pool
            .into_iter()
            .filter(|name| name.starts_with(&word))
            .collect();
        (word_start, matches)
    }
}

impl Helper for FlowCompleter {}

impl Completer for FlowCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, names) = Self::candidates(&line[..pos]);
        let pairs = names
            .into_iter()
            .map(|name| Pair {
                display: name.to_string(),
                replacement: format!("{name} "),
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for FlowCompleter {
    type Hint = String;
}

impl Highlighter for FlowCompleter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for FlowCompleter {}

/// Splits a command line the way a POSIX shell would, so JSON values can be
/// quoted: `set rooms '[{"surface": 12}]'`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<String>, TokenizeError> {
    shell_words::split(input).map_err(|err| TokenizeError(err.to_string()))
}

#[derive(Debug)]
pub(crate) struct TokenizeError(String);

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not read command: {}", self.0)
    }
}
