use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

/// A `key=value` pair given with `--rc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(anyhow!("--rc expects key=value, got `{s}`")),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docket",
    version,
    about = "Personal task list with categories, reminders and a calendar",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Override one docketrc setting; repeatable.
    #[arg(long = "rc", value_name = "KEY=VALUE", action = ArgAction::Append)]
    pub rc_overrides: Vec<KeyVal>,

    /// Read settings from this file instead of ~/.docketrc.
    #[arg(long = "rc-file", value_name = "PATH")]
    pub rc_file: Option<PathBuf>,

    /// Directory holding the task snapshot.
    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` wins over
/// the `-v`/`-q` counts.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = match (verbose, quiet) {
        (_, 0) if verbose >= 3 => "trace",
        (2, 0) => "debug",
        (1, 0) => "info",
        (_, 0) | (_, 1) => "warn",
        _ => "error",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|err| anyhow!("bad log filter: {err}"))?;

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "subscriber already installed");
    }

    Ok(())
}

/// Splits `rc.key=value` or `rc.key:value` into its parts.
fn positional_override(token: &str) -> Option<(String, String)> {
    let rest = token.strip_prefix("rc.")?;
    let at = rest.find(['=', ':'])?;
    let (key, value) = (&rest[..at], &rest[at + 1..]);
    (!key.is_empty()).then(|| (format!("rc.{key}"), value.to_string()))
}

/// Pulls positional `rc.` overrides out of the argument list before clap
/// sees it. The binary name is kept in front.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };

    for (index, arg) in raw.iter().enumerate() {
        let captured = (index > 0)
            .then(|| positional_override(&arg.to_string_lossy()))
            .flatten();
        match captured {
            Some((key, value)) => {
                debug!(key = %key, value = %value, "positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    Ok(pre)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let default_command = || {
            cfg.get("default.command")
                .unwrap_or_else(|| "list".to_string())
        };

        let Some((first, args)) = tokens.split_first() else {
            let cmd = default_command();
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        let known = known_command_names();
        if let Some(full) = expand_command_abbrev(first, &known) {
            debug!(token = %first, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                command_args: args.to_vec(),
            });
        }

        let cmd = default_command();
        warn!(token = %first, command = %cmd, "no command detected, passing all terms to default command");
        Ok(Self {
            command: cmd,
            command_args: tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::{Invocation, preprocess_args};
    use crate::config::Config;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn abbreviations_expand() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["cal", "2024-03"])).expect("parse");
        assert_eq!(inv.command, "calendar");
        assert_eq!(inv.command_args, ["2024-03"]);
    }

    #[test]
    fn unknown_first_token_goes_to_default_command() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, os(&["groceries"])).expect("parse");
        assert_eq!(inv.command, "list");
        assert_eq!(inv.command_args, ["groceries"]);

        let inv = Invocation::parse(&cfg, vec![]).expect("parse");
        assert_eq!(inv.command, "list");
    }

    #[test]
    fn positional_rc_overrides_are_removed() {
        let pre = preprocess_args(&os(&["docket", "rc.color=off", "list"])).expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["docket", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![("rc.color".to_string(), "off".to_string())]
        );
    }
}
