use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley_gateway::api::ApiServer;
use parley_gateway::voice::AudioEncoding;
use parley_gateway::{Config, Pipeline};

/// Parley - Voice chatbot gateway
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe an audio file and print the text
    TestStt {
        /// Path to the audio file (.wav, .webm, or .flac)
        file: std::path::PathBuf,
    },
    /// Synthesize text to an MP3 file
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Output path for the MP3
        #[arg(short, long, default_value = "parley-tts-test.mp3")]
        output: std::path::PathBuf,
    },
    /// Print the assistant reply for a line of user text
    TestResponder {
        /// User utterance
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestStt { file } => test_stt(&config, &file).await,
            Command::TestTts { text, output } => test_tts(&config, &text, &output).await,
            Command::TestResponder { text } => test_responder(&config, &text).await,
        };
    }

    let server = ApiServer::from_config(&config);
    let handle = server.spawn();

    tokio::select! {
        result = handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

async fn test_stt(config: &Config, file: &std::path::Path) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config);
    if !pipeline.transcriber.is_configured() {
        anyhow::bail!("no STT backend configured (set GOOGLE_API_KEY or OPENAI_API_KEY)");
    }

    let audio = std::fs::read(file)?;
    let hint = AudioEncoding::from_extension(&file.to_string_lossy());
    let text = pipeline.transcriber.transcribe(&audio, hint).await?;
    println!("{text}");
    Ok(())
}

async fn test_tts(config: &Config, text: &str, output: &std::path::Path) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config);
    if !pipeline.synthesizer.is_configured() {
        anyhow::bail!("no TTS backend configured (set GOOGLE_API_KEY or OPENAI_API_KEY)");
    }

    let audio = pipeline.synthesizer.synthesize(text).await?;
    std::fs::write(output, &audio)?;
    println!("wrote {} bytes to {}", audio.len(), output.display());
    Ok(())
}

async fn test_responder(config: &Config, text: &str) -> anyhow::Result<()> {
    use parley_gateway::{Role, Transcript};

    let pipeline = Pipeline::from_config(config);
    let mut transcript = Transcript::seeded(&config.greeting);
    transcript.append(Role::User, text);

    let reply = pipeline.responder.respond(&transcript.snapshot()).await;
    println!("{reply}");
    Ok(())
}
