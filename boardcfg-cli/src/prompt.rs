//! Terminal prompts backed by dialoguer.

use boardcfg::{BoardCfgError, Prompter};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};

pub struct DialoguerPrompter {
    theme: ColorfulTheme,
}

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

/// Ctrl-C surfaces as an interrupted read; treat it like Esc.
fn prompt_error(err: dialoguer::Error) -> BoardCfgError {
    match err {
        dialoguer::Error::IO(io) if io.kind() == std::io::ErrorKind::Interrupted => {
            BoardCfgError::Cancelled
        }
        other => BoardCfgError::Prompt(other.to_string()),
    }
}

impl Prompter for DialoguerPrompter {
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> boardcfg::Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(BoardCfgError::Cancelled)
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> boardcfg::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(BoardCfgError::Cancelled)
    }

    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validate: &dyn Fn(&str) -> Result<(), String>,
    ) -> boardcfg::Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .validate_with(|text: &String| validate(text));
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().map_err(prompt_error)
    }
}
