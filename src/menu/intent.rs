use crate::models::{CommandRequest, MenuOption, Mode};

/// A command the menu handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    History,
    Config,
    Help,
    Exit,
}

impl Builtin {
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "history" => Some(Builtin::History),
            "config" => Some(Builtin::Config),
            "help" => Some(Builtin::Help),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    /// The screen this builtin opens; `None` for `exit`.
    pub fn mode(self) -> Option<Mode> {
        match self {
            Builtin::History => Some(Mode::History),
            Builtin::Config => Some(Mode::Config),
            Builtin::Help => Some(Mode::Help),
            Builtin::Exit => None,
        }
    }
}

/// What selecting an option means, decided once per selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuIntent {
    Builtin(Builtin),
    External(CommandRequest),
}

impl MenuIntent {
    pub fn resolve(option: &MenuOption) -> Self {
        let command = option.command.trim();
        match Builtin::from_command(command) {
            Some(builtin) => MenuIntent::Builtin(builtin),
            None => MenuIntent::External(CommandRequest {
                command: command.to_string(),
                args: option.args.clone(),
                flags: option.flags.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RESERVED_COMMANDS;

    #[test]
    fn test_every_reserved_name_is_a_builtin() {
        for name in RESERVED_COMMANDS {
            let option = MenuOption::new(name, name);
            assert!(matches!(MenuIntent::resolve(&option), MenuIntent::Builtin(_)));
        }
    }

    #[test]
    fn test_external_request_carries_args_and_flags() {
        let option = MenuOption::new("upload", "Upload")
            .args(["DOCS"])
            .flag("dry-run", "true");
        let MenuIntent::External(request) = MenuIntent::resolve(&option) else {
            panic!("expected an external command");
        };
        assert_eq!(request.command, "upload");
        assert_eq!(request.args, vec!["DOCS".to_string()]);
        assert!(request.flag_enabled("dry-run"));
    }

    #[test]
    fn test_builtin_modes() {
        assert_eq!(Builtin::History.mode(), Some(Mode::History));
        assert_eq!(Builtin::Exit.mode(), None);
    }
}
