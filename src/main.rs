use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sage_voice::voice::{
    Disabled, MicrophoneRecognizer, SpeakerOutput, SpeechCapture, SpeechOutput, SpeechToText,
    TextToSpeech,
};
use sage_voice::{
    ChannelPresenter, Config, Controller, ControllerHandle, HttpResponseService, Ports,
    SessionSnapshot, Status, Update,
};

/// Sage - talk to the Sage assistant by voice or text
#[derive(Parser)]
#[command(name = "sage", version, about)]
struct Cli {
    /// Reply service endpoint
    #[arg(long, env = "SAGE_SERVICE_URL")]
    service_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone and speaker (text only)
    #[arg(long, env = "SAGE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message and print the reply
    Ask {
        /// Text to send
        text: String,
    },
    /// List the available synthesis voices
    Voices,
}

/// A line typed at the interactive prompt
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Listen,
    Cancel,
    Voice(String),
    Voices,
    Help,
    Quit,
    Text(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (command, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, a)| (c, a.trim()));

        match command {
            "/listen" | "/l" => Self::Listen,
            "/cancel" | "/c" => Self::Cancel,
            "/voice" if !arg.is_empty() => Self::Voice(arg.to_string()),
            "/voices" | "/voice" => Self::Voices,
            "/help" | "/?" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            _ => Self::Text(line.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,sage_voice=info",
        1 => "info,sage_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load_with_options(cli.disable_voice)?;
    if let Some(url) = &cli.service_url {
        config = config.with_service_url(url)?;
    }
    tracing::debug!(?config, "loaded configuration");

    let adapters = Adapters::build(&config)?;

    match cli.command {
        Some(Command::Voices) => list_voices(&adapters).await,
        Some(Command::Ask { text }) => ask(&config, adapters, text).await,
        None => interactive(&config, adapters).await,
    }
}

/// Platform adapters chosen from configuration
struct Adapters {
    capture: Arc<dyn SpeechCapture>,
    output: Arc<dyn SpeechOutput>,
    speaker: Option<Arc<SpeakerOutput>>,
    service: Arc<HttpResponseService>,
}

impl Adapters {
    fn build(config: &Config) -> anyhow::Result<Self> {
        let service = Arc::new(HttpResponseService::new(&config.service)?);
        tracing::info!(url = %service.url(), "using reply service");

        if !config.voice.enabled {
            return Ok(Self {
                capture: Arc::new(Disabled),
                output: Arc::new(Disabled),
                speaker: None,
                service,
            });
        }

        let capture: Arc<dyn SpeechCapture> =
            match SpeechToText::from_config(&config.voice, &config.api_keys) {
                Ok(stt) => Arc::new(MicrophoneRecognizer::new(stt, config.capture.endpoint())?),
                Err(e) => {
                    tracing::warn!(error = %e, "speech recognition disabled");
                    Arc::new(Disabled)
                }
            };

        let speaker = match TextToSpeech::from_config(&config.voice, &config.api_keys) {
            Ok(tts) => Some(Arc::new(SpeakerOutput::new(tts)?)),
            Err(e) => {
                tracing::warn!(error = %e, "spoken replies disabled");
                None
            }
        };

        let output: Arc<dyn SpeechOutput> = match &speaker {
            Some(speaker) => Arc::clone(speaker) as Arc<dyn SpeechOutput>,
            None => Arc::new(Disabled),
        };

        Ok(Self {
            capture,
            output,
            speaker,
            service,
        })
    }

    fn ports(&self) -> Ports {
        Ports {
            capture: Arc::clone(&self.capture),
            output: Arc::clone(&self.output),
            service: Arc::clone(&self.service) as _,
        }
    }

    /// Refresh the catalog from the provider in the background
    fn refresh_voices(&self, handle: &ControllerHandle) {
        let Some(speaker) = self.speaker.clone() else {
            return;
        };
        let handle = handle.clone();

        tokio::spawn(async move {
            match speaker.fetch_voices().await {
                Ok(voices) if !voices.is_empty() => handle.voices_changed(voices),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to fetch voice catalog"),
            }
        });
    }
}

/// Interactive session on the terminal
async fn interactive(config: &Config, adapters: Adapters) -> anyhow::Result<ExitCode> {
    let (presenter, updates) = ChannelPresenter::new();
    let (controller, events) =
        Controller::new(adapters.ports(), Box::new(presenter), config.voice.voice.clone());
    let handle = controller.handle();

    adapters.refresh_voices(&handle);

    let controller_task = tokio::spawn(controller.run(events));
    let render_task = tokio::spawn(render(updates));

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Input::parse(&line) {
                    Input::Listen => handle.start_capture(),
                    Input::Cancel => handle.cancel(),
                    Input::Voice(id) => handle.select_voice(id),
                    Input::Voices if adapters.speaker.is_some() => adapters.refresh_voices(&handle),
                    Input::Voices => println!("no voices available"),
                    Input::Help => print_help(),
                    Input::Quit => break,
                    Input::Text(text) => handle.submit_text(text),
                }
            }
        }
    }

    handle.shutdown();
    controller_task.await?;
    render_task.await?;

    Ok(ExitCode::SUCCESS)
}

/// One-shot submission: print the reply, wait for it to be spoken
async fn ask(config: &Config, adapters: Adapters, text: String) -> anyhow::Result<ExitCode> {
    let (presenter, mut updates) = ChannelPresenter::new();
    let (controller, events) =
        Controller::new(adapters.ports(), Box::new(presenter), config.voice.voice.clone());
    let handle = controller.handle();
    let controller_task = tokio::spawn(controller.run(events));

    handle.submit_text(text);

    let mut started = false;
    let mut failed = false;
    while let Some(update) = updates.recv().await {
        match update {
            Update::Exchange(exchange) => println!("{}", exchange.response),
            Update::Snapshot(snapshot) => {
                if let Some(error) = &snapshot.error {
                    eprintln!("error: {}", error.message);
                    failed = true;
                }
                match snapshot.status {
                    Status::Submitting => started = true,
                    Status::Idle if started || failed => break,
                    _ => {}
                }
            }
        }
    }

    handle.shutdown();
    controller_task.await?;

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn list_voices(adapters: &Adapters) -> anyhow::Result<ExitCode> {
    let voices = match &adapters.speaker {
        Some(speaker) => speaker.fetch_voices().await?,
        None => adapters.output.voices(),
    };

    if voices.is_empty() {
        println!("no voices available");
    }
    for voice in voices {
        println!("{:<24} {:<20} {}", voice.id, voice.display_name, voice.language_tag);
    }

    Ok(ExitCode::SUCCESS)
}

/// Print updates as they arrive
async fn render(mut updates: mpsc::UnboundedReceiver<Update>) {
    let mut last_status = None;

    while let Some(update) = updates.recv().await {
        match update {
            Update::Exchange(exchange) => {
                println!("you:  {}", exchange.user_input);
                println!("sage: {}", exchange.response);
            }
            Update::Snapshot(snapshot) => {
                render_snapshot(&snapshot, &mut last_status);
            }
        }
    }
}

fn render_snapshot(snapshot: &SessionSnapshot, last_status: &mut Option<Status>) {
    if let Some(error) = &snapshot.error {
        println!("! {}", error.message);
    }

    if *last_status != Some(snapshot.status) {
        if matches!(snapshot.status, Status::Listening | Status::Submitting | Status::Speaking) {
            println!("[{}]", snapshot.status);
        }
        *last_status = Some(snapshot.status);
        return;
    }

    // Same status again: the voice selection or catalog changed
    if let Some(voice) = &snapshot.selected_voice_id {
        println!("voice: {voice}");
    }
    if !snapshot.voices.is_empty() {
        let ids: Vec<&str> = snapshot.voices.iter().map(|v| v.id.as_str()).collect();
        println!("voices: {}", ids.join(", "));
    }
}

fn print_help() {
    println!("Type a message and press enter, or:");
    println!("  /listen        speak instead of typing");
    println!("  /cancel        stop listening or speaking");
    println!("  /voice <id>    choose the reply voice");
    println!("  /voices        show available voices");
    println!("  /quit          leave");
}
