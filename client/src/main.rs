use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{
    Command, ControllerId, EnhancementInfo, PlayerConfig, RenderMode, ResizeMode, ResolutionScope, Response, Source,
    ViewId, VodStrategy,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

#[derive(Parser)]
#[command(name = "sfctl")]
#[command(about = "Short-video feed daemon control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage feed controllers
    Controller {
        #[command(subcommand)]
        action: ControllerCommands,
    },

    /// Manage views
    View {
        #[command(subcommand)]
        action: ViewCommands,
    },

    /// Control playback on a view
    Player {
        /// Target view id
        view: ViewId,

        #[command(subcommand)]
        action: PlayerCommands,
    },

    /// Configure the engine (only the first call takes effect)
    Config {
        /// Disable engine logging
        #[arg(long)]
        no_log: bool,

        /// License URL
        #[arg(long, default_value = "")]
        license_url: String,

        /// License key
        #[arg(long, default_value = "")]
        license_key: String,
    },

    /// Configure the optional super-resolution plugin
    Enhance {
        app_id: i64,
        auth_id: i32,
        #[arg(default_value = "0")]
        sr_algorithm: i32,
    },

    /// Stream player events until interrupted
    Watch,

    /// Check if daemon is running
    Ping,

    /// Kill the daemon
    Kill,
}

#[derive(Subcommand)]
enum ControllerCommands {
    /// Create a controller and print its id
    Create,
    /// Stop all playback of a controller and forget it
    Release { controller: ControllerId },
    /// Start playing the current item
    Start { controller: ControllerId },
    /// Set loop mode applied at the next bind
    Loop {
        controller: ControllerId,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Replace the feed with sources from a JSON file
    Sources { controller: ControllerId, file: PathBuf },
    /// Append sources from a JSON file
    Append { controller: ControllerId, file: PathBuf },
    /// Bind feed item `index` to a view
    Bind {
        controller: ControllerId,
        view: ViewId,
        index: i64,
    },
    /// Prepare feed item `index` on a view
    Prebind {
        controller: ControllerId,
        view: ViewId,
        index: i64,
    },
    /// Apply a VOD strategy from a JSON file
    Strategy { controller: ControllerId, file: PathBuf },
}

#[derive(Subcommand)]
enum ViewCommands {
    /// Create and register a view
    Create { view: ViewId },
    /// Change the id of a view
    Rekey { old: ViewId, new: ViewId },
    /// Set the container size in pixels
    Size { view: ViewId, width: u32, height: u32 },
    /// Letterbox policy (contain, cover)
    Resize { view: ViewId, mode: String },
    /// Dispose a view
    Dispose { view: ViewId },
    /// Print the current geometry
    Layout { view: ViewId },
    /// List registered view ids
    List,
}

#[derive(Subcommand)]
enum PlayerCommands {
    /// Play a URL directly
    Play { url: String },
    Pause,
    Resume,
    /// Seek to a position in seconds
    Seek { seconds: f64 },
    /// Playback rate (1.0 is normal)
    Rate { rate: f64 },
    Mute {
        #[arg(action = clap::ArgAction::Set)]
        muted: bool,
    },
    Mirror {
        #[arg(action = clap::ArgAction::Set)]
        mirrored: bool,
    },
    /// Switch resolution, optionally for every later session
    Resolution {
        resolution: i64,
        #[arg(short, long)]
        global: bool,
    },
    /// Render mode (fit, fill)
    Render { mode: String },
    /// Select a subtitle track, -1 for none
    Subtitle {
        #[arg(allow_negative_numbers = true)]
        index: i32,
    },
    /// Set an engine string option; the value is parsed as JSON when possible
    #[command(name = "option")]
    SetOption { key: String, value: String },
    /// Print the duration in seconds
    Duration,
    /// Print the current position in seconds
    Time,
    /// Print the playback state
    State,
    /// List supported resolutions
    Resolutions,
}

#[derive(Debug, Error)]
enum ArgError {
    #[error("unknown resize mode '{0}' (expected contain or cover)")]
    ResizeMode(String),

    #[error("unknown render mode '{0}' (expected fit or fill)")]
    RenderMode(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command {
        Commands::Controller { action } => match action {
            ControllerCommands::Create => Command::CreateController,
            ControllerCommands::Release { controller } => Command::ReleaseController { controller },
            ControllerCommands::Start { controller } => Command::Start { controller },
            ControllerCommands::Loop { controller, enabled } => Command::SetLoop { controller, enabled },
            ControllerCommands::Sources { controller, file } => Command::SetSources {
                controller,
                sources: read_json::<Vec<Source>>(&file)?,
            },
            ControllerCommands::Append { controller, file } => Command::AppendSources {
                controller,
                sources: read_json::<Vec<Source>>(&file)?,
            },
            ControllerCommands::Bind { controller, view, index } => Command::Bind { controller, view, index },
            ControllerCommands::Prebind { controller, view, index } => Command::PreBind { controller, view, index },
            ControllerCommands::Strategy { controller, file } => Command::SetVodStrategy {
                controller,
                strategy: read_json::<VodStrategy>(&file)?,
            },
        },
        Commands::View { action } => match action {
            ViewCommands::Create { view } => Command::CreateView { view },
            ViewCommands::Rekey { old, new } => Command::SetViewId { old, new },
            ViewCommands::Size { view, width, height } => Command::SetViewSize { view, width, height },
            ViewCommands::Resize { view, mode } => Command::SetResizeMode {
                view,
                mode: parse_resize_mode(&mode)?,
            },
            ViewCommands::Dispose { view } => Command::DisposeView { view },
            ViewCommands::Layout { view } => Command::GetViewLayout { view },
            ViewCommands::List => Command::ListViews,
        },
        Commands::Player { view, action } => match action {
            PlayerCommands::Play { url } => Command::Play {
                view,
                source: Source::from_url(url),
            },
            PlayerCommands::Pause => Command::Pause { view },
            PlayerCommands::Resume => Command::Resume { view },
            PlayerCommands::Seek { seconds } => Command::Seek { view, seconds },
            PlayerCommands::Rate { rate } => Command::SetRate { view, rate },
            PlayerCommands::Mute { muted } => Command::SetMute { view, muted },
            PlayerCommands::Mirror { mirrored } => Command::SetMirror { view, mirrored },
            PlayerCommands::Resolution { resolution, global } => Command::SwitchResolution {
                view,
                resolution,
                scope: if global {
                    ResolutionScope::Global
                } else {
                    ResolutionScope::Session
                },
            },
            PlayerCommands::Render { mode } => Command::SetRenderMode {
                view,
                mode: parse_render_mode(&mode)?,
            },
            PlayerCommands::Subtitle { index } => Command::SelectSubtitleTrack { view, index },
            PlayerCommands::SetOption { key, value } => Command::SetStringOption {
                view,
                key,
                value: serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value)),
            },
            PlayerCommands::Duration => Command::GetDuration { view },
            PlayerCommands::Time => Command::GetCurrentPlayTime { view },
            PlayerCommands::State => Command::GetPlaybackState { view },
            PlayerCommands::Resolutions => Command::GetSupportedResolutions { view },
        },
        Commands::Config {
            no_log,
            license_url,
            license_key,
        } => Command::SetConfiguration {
            config: PlayerConfig {
                enable_log: !no_log,
                license_url,
                license_key,
            },
        },
        Commands::Enhance {
            app_id,
            auth_id,
            sr_algorithm,
        } => Command::ProbeEnhancement {
            info: EnhancementInfo {
                app_id,
                auth_id,
                sr_algorithm,
            },
        },
        Commands::Watch => Command::Subscribe,
        Commands::Ping => Command::Ping,
        Commands::Kill => Command::Kill,
    };

    let watching = matches!(command, Command::Subscribe);
    let (mut reader, mut writer) = match connect().await {
        Ok(halves) => halves,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nIs the daemon running? Try starting it with: shortfeedd");
            std::process::exit(1);
        }
    };

    let response = send_command(&mut reader, &mut writer, &command).await?;
    handle_response(response);

    if watching {
        loop {
            let Some(response) = read_response(&mut reader).await? else {
                println!("Daemon closed the stream");
                return Ok(());
            };
            handle_response(response);
        }
    }

    Ok(())
}

async fn connect() -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
    let socket_path = common::get_socket_path();
    let stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("Failed to connect to {}", socket_path.display()))?;
    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader), writer))
}

async fn send_command(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    command: &Command,
) -> Result<Response> {
    // Send command
    let command_json = serde_json::to_string(command)?;
    writer.write_all(command_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    read_response(reader)
        .await?
        .context("Daemon closed the connection without answering")
}

async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<Option<Response>> {
    let mut response_line = String::new();
    if reader.read_line(&mut response_line).await? == 0 {
        return Ok(None);
    }
    let response: Response = serde_json::from_str(&response_line)?;
    Ok(Some(response))
}

fn handle_response(response: Response) {
    match response {
        Response::Ok => {
            println!("✓ Success");
        }
        Response::Error(e) => {
            eprintln!("✗ Error: {}", e);
            std::process::exit(1);
        }
        Response::Pong => {
            println!("✓ Daemon is running");
        }
        Response::ControllerCreated(id) => {
            println!("{}", id);
        }
        Response::Revision(revision) => {
            println!("✓ Revision {}", revision);
        }
        Response::Seconds(seconds) => {
            println!("{:.3}", seconds);
        }
        Response::Playing(playing) => {
            println!("{}", playing);
        }
        Response::State(state) => {
            println!("{:?}", state);
        }
        Response::Layout(layout) => {
            println!("View Layout:");
            println!("  Container: {}x{}", layout.container_width, layout.container_height);
            println!(
                "  Video: {}x{} (ratio {:.3})",
                layout.video_width, layout.video_height, layout.aspect_ratio
            );
            println!("  Modes: {:?} / {:?}", layout.resize_mode, layout.render_mode);
            println!(
                "  Child: {}x{} at ({}, {})",
                layout.width, layout.height, layout.x, layout.y
            );
            println!(
                "  Subtitles: {}",
                if layout.subtitle_visible { "visible" } else { "hidden" }
            );
        }
        Response::Resolutions(items) => {
            println!("Supported Resolutions:");
            for item in items {
                println!(
                    "  [{}] {}x{} @ {} bps",
                    item.index, item.width, item.height, item.bitrate
                );
            }
        }
        Response::Views(ids) => {
            if ids.is_empty() {
                println!("No views registered");
            }
            for id in ids {
                println!("{}", id);
            }
        }
        Response::Subscribed => {
            println!("Watching events (Ctrl+C to stop)");
        }
        Response::Event(event) => match serde_json::to_string(&event) {
            Ok(json) => println!("[{}] {}", event.name(), json),
            Err(_) => println!("[{}] view {}", event.name(), event.view_id()),
        },
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_resize_mode(name: &str) -> Result<ResizeMode, ArgError> {
    match name.to_lowercase().as_str() {
        "contain" | "fit" => Ok(ResizeMode::Contain),
        "cover" | "crop" => Ok(ResizeMode::Cover),
        _ => Err(ArgError::ResizeMode(name.to_string())),
    }
}

fn parse_render_mode(name: &str) -> Result<RenderMode, ArgError> {
    match name.to_lowercase().as_str() {
        "fit" => Ok(RenderMode::Fit),
        "fill" => Ok(RenderMode::Fill),
        _ => Err(ArgError::RenderMode(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_modes() {
        assert_eq!(parse_resize_mode("Cover").unwrap(), ResizeMode::Cover);
        assert_eq!(parse_resize_mode("contain").unwrap(), ResizeMode::Contain);
        assert!(parse_resize_mode("stretch").is_err());
        assert_eq!(parse_render_mode("FILL").unwrap(), RenderMode::Fill);
        assert!(parse_render_mode("tile").is_err());
    }

    #[test]
    fn test_cli_parses_negative_subtitle_index() {
        let cli = Cli::try_parse_from(["sfctl", "player", "4", "subtitle", "-1"]).unwrap();
        match cli.command {
            Commands::Player {
                view,
                action: PlayerCommands::Subtitle { index },
            } => {
                assert_eq!(view, 4);
                assert_eq!(index, -1);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_read_sources_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"url": "https://cdn.example/a.mp4"}}, {{"fileId": "42", "appId": 7}}]"#).unwrap();

        let sources: Vec<Source> = read_json(file.path()).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].file_id.as_deref(), Some("42"));
    }
}
