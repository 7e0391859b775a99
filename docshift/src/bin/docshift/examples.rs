use crate::commands::{demo, resolve, status};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "status",
            groups: status::EXAMPLES,
        },
        CommandExample {
            name: "resolve",
            groups: resolve::EXAMPLES,
        },
        CommandExample {
            name: "demo",
            groups: demo::EXAMPLES,
        },
    ]
}
