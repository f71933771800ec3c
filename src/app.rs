//! Application wiring for the one-shot commands and the interactive shell.

use crate::ai::{
    mime, GeminiDescriptionClient, GeminiEditClient, PhotoDescriptionService, PhotoEditService,
};
use crate::controller::{Controller, Outcome};
use crate::encoder::SelectedFile;
use crate::models::Config;
use crate::shell::{self, Command};
use crate::view::ViewModel;
use crate::{Error, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Owns the controller and decides where edited photos are written.
pub struct App {
    controller: Controller,
    output_dir: PathBuf,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub editor: Arc<dyn PhotoEditService>,
    pub describer: Arc<dyn PhotoDescriptionService>,
}

enum ShellReply {
    Continue(String),
    Quit,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_services(services: AppServices, output_dir: PathBuf) -> Self {
        Self {
            controller: Controller::new(services.editor, services.describer),
            output_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across both clients.
        let http_client = reqwest::Client::new();

        info!("Edit model: {}", config.edit_model);
        let editor = GeminiEditClient::new_with_client(
            config.gemini_api_key.clone(),
            config.edit_model.clone(),
            http_client.clone(),
        )
        .with_base_url(config.gemini_base_url.clone());

        info!("Describe model: {}", config.describe_model);
        let describer = GeminiDescriptionClient::new_with_client(
            config.gemini_api_key.clone(),
            config.describe_model.clone(),
            http_client,
        )
        .with_base_url(config.gemini_base_url.clone());

        Self::with_services(
            AppServices {
                editor: Arc::new(editor),
                describer: Arc::new(describer),
            },
            config.output_dir.clone(),
        )
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Ok(Self::from_config(&config))
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn render(&self) -> String {
        ViewModel::from_state(&self.controller.snapshot()).render()
    }

    /// True when the session currently shows an error message.
    pub fn has_error(&self) -> bool {
        self.controller.snapshot().error.is_some()
    }

    /// Upload `image`, edit it, and save the result. Returns the saved path
    /// when the edit succeeded.
    pub async fn edit(
        &self,
        image: &Path,
        prompt: Option<&str>,
        output: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        if self.upload(image).await != Outcome::Completed {
            return Ok(None);
        }
        if let Some(prompt) = prompt {
            self.controller.set_prompt(prompt);
        }
        match self.controller.request_edit().await {
            Outcome::Completed => self.save_edited(output).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Upload `image` and request its architectural analysis.
    pub async fn describe(&self, image: &Path) -> Outcome {
        match self.upload(image).await {
            Outcome::Completed => self.controller.request_describe().await,
            other => other,
        }
    }

    async fn upload(&self, image: &Path) -> Outcome {
        self.controller
            .on_file_selected(Some(SelectedFile::from_path(image)))
            .await
    }

    /// Write the edited image to `path`, or to a timestamped file in the
    /// output directory.
    pub async fn save_edited(&self, path: Option<&Path>) -> Result<PathBuf> {
        let edited = self
            .controller
            .snapshot()
            .edited_image
            .ok_or(Error::NoEditedImage)?;
        let bytes = edited.decode()?;

        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let mime_type =
                    mime::sniff_image_mime(&bytes).unwrap_or(edited.mime_type.as_str());
                self.default_output_path(mime_type)
            }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        info!("Saved edited photo ({} bytes) to {}", bytes.len(), path.display());
        Ok(path)
    }

    fn default_output_path(&self, mime_type: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        self.output_dir.join(format!(
            "edited-{}.{}",
            stamp,
            mime::extension_for_mime(mime_type)
        ))
    }

    /// Interactive loop over stdin.
    pub async fn run_shell(&self, initial_image: Option<&Path>) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.run_shell_with(stdin, initial_image).await
    }

    pub async fn run_shell_with<R>(&self, input: R, initial_image: Option<&Path>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut tasks = JoinSet::new();
        let mut lines = input.lines();

        if let Some(image) = initial_image {
            self.upload(image).await;
        }
        println!("{}", self.render());
        println!("Type 'help' for commands.");

        while let Some(line) = lines.next_line().await? {
            let reply = match Command::parse(&line) {
                Ok(command) => self.handle(command, &mut tasks).await,
                Err(message) => ShellReply::Continue(message),
            };
            match reply {
                ShellReply::Continue(text) if text.is_empty() => {}
                ShellReply::Continue(text) => println!("{}", text),
                ShellReply::Quit => break,
            }
            // Reap finished operations so the set does not grow unbounded.
            while tasks.try_join_next().is_some() {}
        }

        if !tasks.is_empty() {
            println!("Waiting for {} pending operation(s)...", tasks.len());
        }
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    async fn handle(&self, command: Command, tasks: &mut JoinSet<()>) -> ShellReply {
        match command {
            Command::Empty => ShellReply::Continue(String::new()),
            Command::Help => ShellReply::Continue(shell::HELP.to_string()),
            Command::Quit => ShellReply::Quit,
            Command::Show => ShellReply::Continue(self.render()),
            Command::Open(path) => {
                self.upload(&path).await;
                ShellReply::Continue(self.render())
            }
            Command::Prompt(text) => {
                self.controller.set_prompt(text);
                ShellReply::Continue(self.render())
            }
            Command::Edit => {
                let view = ViewModel::from_state(&self.controller.snapshot());
                if !view.edit_button.enabled {
                    return ShellReply::Continue(format!(
                        "'{}' is unavailable right now",
                        view.edit_button.label
                    ));
                }
                let controller = self.controller.clone();
                tasks.spawn(async move {
                    let outcome = controller.request_edit().await;
                    println!(
                        "\nEdit finished ({:?})\n{}",
                        outcome,
                        ViewModel::from_state(&controller.snapshot()).render()
                    );
                });
                ShellReply::Continue(self.render())
            }
            Command::Describe => {
                let view = ViewModel::from_state(&self.controller.snapshot());
                if !view.describe_button.enabled {
                    return ShellReply::Continue(format!(
                        "'{}' is unavailable right now",
                        view.describe_button.label
                    ));
                }
                let controller = self.controller.clone();
                tasks.spawn(async move {
                    let outcome = controller.request_describe().await;
                    println!(
                        "\nAnalysis finished ({:?})\n{}",
                        outcome,
                        ViewModel::from_state(&controller.snapshot()).render()
                    );
                });
                ShellReply::Continue(self.render())
            }
            Command::Save(path) => match self.save_edited(path.as_deref()).await {
                Ok(saved) => ShellReply::Continue(format!("Saved {}", saved.display())),
                Err(e) => {
                    warn!("Save failed: {}", e);
                    ShellReply::Continue(format!("Could not save: {}", e))
                }
            },
        }
    }
}
