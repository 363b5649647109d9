//! Configuration loading for the client.
//!
//! Only the flags that locate the daemon are handed to `ortho_config`; the
//! remaining tokens belong to the command line proper.

use std::ffi::{OsStr, OsString};

use gatehouse_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

/// Configuration flags accepted ahead of the command tokens.
const CONFIG_CLI_FLAGS: &[&str] = &["--config-path", "--daemon-socket"];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered configuration arguments.
    ///
    /// Configuration flags must precede every other token. Once a token is
    /// not a configuration flag the rest of the line is left to the command
    /// parser.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments split between the configuration loader and the command parser.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

/// Separates leading configuration flags from the command line.
///
/// The program name is kept at the head of both halves.
pub(crate) fn split_arguments(args: Vec<OsString>) -> ArgumentSplit {
    let mut remaining = args.into_iter();
    let program = remaining.next().unwrap_or_else(|| OsString::from("gatehouse"));
    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program];

    while let Some(argument) = remaining.next() {
        match classify(&argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument);
                if needs_value && let Some(value) = remaining.next() {
                    config_arguments.push(value);
                }
            }
            FlagAction::Stop => {
                command_arguments.push(argument);
                break;
            }
        }
    }
    command_arguments.extend(remaining);

    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--daemon-socket=tcp://127.0.0.1:9", FlagAction::Include { needs_value: false })]
    #[case("--daemon-socket", FlagAction::Include { needs_value: true })]
    #[case("--ticket", FlagAction::Stop)]
    #[case("Security", FlagAction::Stop)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(classify(OsStr::new(argument)), expected);
    }

    #[test]
    fn leading_configuration_flags_are_separated() {
        let split = split_arguments(os(&[
            "gatehouse",
            "--daemon-socket",
            "tcp://127.0.0.1:9",
            "--ticket",
            "abc",
            "System",
            "Describe",
            "Module=Security",
        ]));
        assert_eq!(
            split.config_arguments,
            os(&["gatehouse", "--daemon-socket", "tcp://127.0.0.1:9"])
        );
        assert_eq!(
            split.command_arguments,
            os(&["gatehouse", "--ticket", "abc", "System", "Describe", "Module=Security"])
        );
    }

    #[test]
    fn configuration_flags_after_the_command_stay_with_the_command() {
        let split = split_arguments(os(&["gatehouse", "Notes", "Add", "--daemon-socket=x"]));
        assert_eq!(split.config_arguments, os(&["gatehouse"]));
        assert_eq!(
            split.command_arguments,
            os(&["gatehouse", "Notes", "Add", "--daemon-socket=x"])
        );
    }
}
