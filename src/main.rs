use anyhow::Result;
use clap::{Parser, Subcommand};
use photo_architect::app::App;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "photo-architect")]
#[command(about = "Edit photos and analyze their architecture with Gemini")]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Edit a photo from a text prompt and save the result.
    Edit {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Edit instruction; defaults to the watercolor prompt.
        #[arg(short, long)]
        prompt: Option<String>,
        /// Where to write the edited photo.
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print an architectural analysis of a photo.
    Describe {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
    /// Interactive session.
    Shell {
        /// Photo to upload on start.
        #[arg(value_name = "IMAGE")]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_architect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        CliCommand::Edit {
            image,
            prompt,
            output,
        } => {
            let saved = app
                .edit(&image, prompt.as_deref(), output.as_deref())
                .await?;
            println!("{}", app.render());
            if let Some(path) = saved {
                info!("Edited photo written to {}", path.display());
                println!("Saved {}", path.display());
            }
        }
        CliCommand::Describe { image } => {
            app.describe(&image).await;
            println!("{}", app.render());
        }
        CliCommand::Shell { image } => {
            app.run_shell(image.as_deref()).await?;
        }
    }

    if app.has_error() {
        std::process::exit(1);
    }
    Ok(())
}
