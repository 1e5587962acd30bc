#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const RATIO_COMMAND: CommandSpec = CommandSpec {
    command: "ratio",
    action: "set_aspect_ratio",
};

/// Picker labels usable directly as commands, e.g. `/landscape`.
pub(crate) const ASPECT_PRESET_COMMANDS: &[&str] =
    &["square", "landscape", "portrait", "standard", "tall"];

pub(crate) const TARGET_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "select",
        action: "select_history",
    },
    CommandSpec {
        command: "use",
        action: "select_history",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "ratios",
        action: "list_aspect_ratios",
    },
    CommandSpec {
        command: "history",
        action: "list_history",
    },
    CommandSpec {
        command: "show",
        action: "show_current",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss_error",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/ratio",
    "/ratios",
    "/square",
    "/landscape",
    "/portrait",
    "/standard",
    "/tall",
    "/history",
    "/select",
    "/show",
    "/download",
    "/dismiss",
    "/status",
    "/help",
    "/quit",
];
