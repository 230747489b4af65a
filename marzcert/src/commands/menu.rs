use super::{CommandResult, install, update};
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Install,
    Update,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 3] = [MenuChoice::Install, MenuChoice::Update, MenuChoice::Exit];

    pub fn key(self) -> &'static str {
        match self {
            MenuChoice::Install => "1",
            MenuChoice::Update => "2",
            MenuChoice::Exit => "0",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::Install => "Install Marzneshin and issue certificates",
            MenuChoice::Update => "Update certificates",
            MenuChoice::Exit => "Exit",
        }
    }
}

pub fn run() -> CommandResult {
    let options = MenuChoice::ALL
        .iter()
        .map(|choice| {
            (
                choice.key().to_string(),
                choice.label().to_string(),
                *choice,
            )
        })
        .collect();
    let choice = output::select(
        "Marzneshin certificates",
        Some("Let's Encrypt wildcard certificates through DNS validation"),
        options,
    )?;
    dispatch(choice)
}

fn dispatch(choice: MenuChoice) -> CommandResult {
    match choice {
        MenuChoice::Install => install::run(),
        MenuChoice::Update => update::run(),
        MenuChoice::Exit => {
            output::muted("Bye");
            Ok(())
        }
    }
}
