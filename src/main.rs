use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use voice_chatbot::api::{ApiServer, PersonaResponder};
use voice_chatbot::config::PlaybackBackend;
use voice_chatbot::conversation::{FALLBACK_REPLY, STORAGE_KEY, driver};
use voice_chatbot::llm::LlmClient;
use voice_chatbot::voice::{
    CloudPlayback, EndpointConfig, MicrophoneCapture, SilentPlayback, SpeechPlayback,
    SpeechToText, SystemPlayback, TextToSpeech, event_channel, select_voice,
};
use voice_chatbot::{
    Capabilities, ChatClient, Command, Config, ControllerSettings, ConversationController,
    HttpChatClient, KeyValueStore, Message, Persona, Role, SqliteStore, Transcript, Update, db,
};

/// Voice chat - talk to a persona by voice or text
#[derive(Parser)]
#[command(name = "voicechat", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the chat backend
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Directory with the web front end
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Start an interactive conversation
    Chat {
        /// Origin of the chat backend
        #[arg(long)]
        endpoint: Option<String>,

        /// Speech playback backend (system, cloud, none)
        #[arg(long)]
        playback: Option<PlaybackBackend>,

        /// Disable speech capture and playback
        #[arg(long)]
        no_voice: bool,
    },
    /// Send one message and print the reply
    Ask {
        /// Message to send
        text: String,

        /// Origin of the chat backend
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Print the stored transcript
    History,
    /// Erase the stored transcript
    Clear,
    /// List playback voices and the one that would be used
    Voices {
        /// Speech playback backend (system, cloud, none)
        #[arg(long)]
        playback: Option<PlaybackBackend>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_chatbot=info",
        1 => "info,voice_chatbot=debug",
        2 => "debug",
        _ => "trace",
    };

    // stdout carries the transcript
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
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
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        CliCommand::Serve { port, static_dir } => serve(config, port, static_dir).await,
        CliCommand::Chat {
            endpoint,
            playback,
            no_voice,
        } => chat(&config, endpoint, playback, no_voice).await,
        CliCommand::Ask { text, endpoint } => ask(&config, endpoint, &text).await,
        CliCommand::History => history(&config),
        CliCommand::Clear => clear(&config),
        CliCommand::Voices { playback } => {
            voices(&config, playback.unwrap_or(config.voice.playback));
            Ok(())
        }
    }
}

/// Run the chat backend until interrupted
async fn serve(
    config: Config,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let persona = Persona::load_or_default(config.persona_path.as_deref())?;
    let port = port.unwrap_or(config.server.port);

    let llm = match config.llm.api_key {
        Some(key) => Some(LlmClient::new(&config.llm.api_base, key, config.llm.model)?),
        None => {
            tracing::warn!("OPENAI_API_KEY not set, every reply will be an apology");
            None
        }
    };

    tracing::info!(persona = %persona.name, port, "starting chat backend");

    let responder = Arc::new(PersonaResponder::new(llm, &persona));
    ApiServer::new(responder, port)
        .static_dir(static_dir.or(config.server.static_dir))
        .run()
        .await?;

    Ok(())
}

/// Interactive conversation on stdin/stdout
async fn chat(
    config: &Config,
    endpoint: Option<String>,
    playback: Option<PlaybackBackend>,
    no_voice: bool,
) -> anyhow::Result<()> {
    let persona = Persona::load_or_default(config.persona_path.as_deref())?;
    let store = open_store(config)?;

    let backend = if no_voice {
        PlaybackBackend::None
    } else {
        playback.unwrap_or(config.voice.playback)
    };

    let stt = if no_voice {
        None
    } else {
        build_transcriber(config)
    };

    let endpoint = endpoint.unwrap_or_else(|| config.endpoint.clone());
    let client = Arc::new(HttpChatClient::new(&endpoint));
    tracing::info!(endpoint = client.endpoint(), playback = %backend, "starting conversation");

    let (sink, events) = event_channel();
    let capabilities = Capabilities {
        capture: Box::new(MicrophoneCapture::new(stt, EndpointConfig::default())),
        playback: build_playback(config, backend),
        client,
        events: sink,
    };

    let controller = ConversationController::new(
        capabilities,
        Box::new(store),
        ControllerSettings::for_persona(&persona.name),
    );

    for message in controller.transcript().messages() {
        print_message(message);
    }
    println!("(type a message, /listen, /stop, /ask <question>, /clear or /quit)");

    let renderer = tokio::spawn(render(controller.subscribe(), persona.name.clone()));

    let (commands_tx, commands_rx) = mpsc::channel(16);
    tokio::spawn(read_commands(commands_tx));

    let controller = driver::run(controller, commands_rx, events).await;
    drop(controller);

    if let Err(e) = renderer.await {
        tracing::debug!(error = %e, "renderer task ended abnormally");
    }
    Ok(())
}

/// Forward stdin lines as commands until EOF
async fn read_commands(commands: mpsc::Sender<Command>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(command) = Command::parse(&line) else {
                    if !line.trim().is_empty() {
                        println!("unknown command: {}", line.trim());
                    }
                    continue;
                };
                // Stop reading after quit so shutdown doesn't wait on stdin
                let quit = command == Command::Quit;
                if commands.send(command).await.is_err() || quit {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read input");
                break;
            }
        }
    }
}

/// Print controller updates until the controller goes away
async fn render(mut updates: broadcast::Receiver<Update>, name: String) {
    loop {
        match updates.recv().await {
            Ok(Update::Message(message)) => print_message(&message),
            Ok(Update::Typing(true)) => println!("  {name} is typing..."),
            Ok(Update::Status(Some(status))) => println!("  [{}]", status.text),
            Ok(Update::Cleared) => println!("-- conversation cleared --"),
            Ok(Update::State(state)) => tracing::debug!(%state, "state changed"),
            Ok(Update::Typing(false) | Update::Status(None)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "display fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("you: {}", message.text),
        Role::Bot => println!("bot: {}", message.text),
    }
}

/// Send one message to the backend
async fn ask(config: &Config, endpoint: Option<String>, text: &str) -> anyhow::Result<()> {
    let endpoint = endpoint.unwrap_or_else(|| config.endpoint.clone());
    let client = HttpChatClient::new(&endpoint);

    match client.send(text).await {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
            tracing::warn!(error = %e, "chat request failed");
            println!("{FALLBACK_REPLY}");
        }
    }
    Ok(())
}

/// Print the stored transcript
fn history(config: &Config) -> anyhow::Result<()> {
    let persona = Persona::load_or_default(config.persona_path.as_deref())?;
    let store = open_store(config)?;
    let settings = ControllerSettings::for_persona(&persona.name);

    let transcript = Transcript::load(&store, STORAGE_KEY, Message::bot(settings.greeting));
    for message in transcript.messages() {
        print_message(message);
    }
    Ok(())
}

/// Erase the stored transcript
fn clear(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    store.remove(STORAGE_KEY)?;
    println!("Transcript cleared.");
    Ok(())
}

/// List voices for a playback backend
fn voices(config: &Config, backend: PlaybackBackend) {
    let playback = build_playback(config, backend);
    let voices = playback.voices();

    if voices.is_empty() {
        println!("No voices reported by the {backend} backend.");
        return;
    }

    let chosen = select_voice(&voices).map(|v| v.name.clone());
    for voice in &voices {
        let marker = if chosen.as_deref() == Some(voice.name.as_str()) {
            "*"
        } else {
            " "
        };
        match &voice.language {
            Some(language) => println!("{marker} {} ({language})", voice.name),
            None => println!("{marker} {}", voice.name),
        }
    }
    if chosen.is_none() {
        println!("(no preferred voice found; the default voice will be used)");
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let pool = db::init(config.database_path())?;
    Ok(SqliteStore::new(pool))
}

fn build_transcriber(config: &Config) -> Option<SpeechToText> {
    let Some(key) = &config.llm.api_key else {
        tracing::info!("OPENAI_API_KEY not set, speech capture disabled");
        return None;
    };

    match SpeechToText::new_whisper(
        config.voice.stt_api_base.clone(),
        key.expose_secret().to_string(),
        config.voice.stt_model.clone(),
        Some(&config.voice.language),
    ) {
        Ok(stt) => Some(stt),
        Err(e) => {
            tracing::warn!(error = %e, "speech capture disabled");
            None
        }
    }
}

fn build_playback(config: &Config, backend: PlaybackBackend) -> Box<dyn SpeechPlayback> {
    match backend {
        PlaybackBackend::System => match SystemPlayback::detect() {
            Ok(playback) => Box::new(playback),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to text-only replies");
                Box::new(SilentPlayback)
            }
        },
        PlaybackBackend::Cloud => {
            let key = config
                .llm
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string())
                .unwrap_or_default();
            match TextToSpeech::new(
                config.voice.stt_api_base.clone(),
                key,
                config.voice.tts_model.clone(),
                config.voice.tts_voice.clone(),
            ) {
                Ok(tts) => Box::new(CloudPlayback::new(tts)),
                Err(e) => {
                    tracing::warn!(error = %e, "falling back to text-only replies");
                    Box::new(SilentPlayback)
                }
            }
        }
        PlaybackBackend::None => Box::new(SilentPlayback),
    }
}
