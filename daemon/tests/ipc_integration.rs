/// Integration tests for IPC communication
/// These tests verify that commands and responses serialize correctly,
/// that the dispatcher drives the engine, and that a client can talk to a
/// live socket
mod support;

use common::{
    Command, FeedError, PlaybackState, PlayerEvent, ResizeMode, ResolutionScope, Response, Source, VodStrategy,
};
use shortfeed::commands::handle_command;
use shortfeed::{DaemonState, ipc_server};
use std::sync::Arc;
use std::time::Duration;
use support::{FeedCall, Harness, sources};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, broadcast};

#[test]
fn test_command_response_roundtrip() {
    let cmd = Command::SetSources {
        controller: 3,
        sources: vec![Source::from_file_id(1500, "5285890781763144364", Some("sig".to_string()))],
    };

    let json = serde_json::to_string(&cmd).unwrap();
    let deserialized: Command = serde_json::from_str(&json).unwrap();

    match deserialized {
        Command::SetSources { controller, sources } => {
            assert_eq!(controller, 3);
            assert_eq!(sources.len(), 1);
            assert_eq!(sources[0].file_id.as_deref(), Some("5285890781763144364"));
            assert_eq!(sources[0].p_sign.as_deref(), Some("sig"));
            assert!(sources[0].auto_play);
        }
        _ => panic!("Wrong command type"),
    }
}

#[test]
fn test_view_commands() {
    let commands = vec![
        Command::CreateView { view: 1 },
        Command::SetViewId { old: 1, new: 2 },
        Command::SetViewSize {
            view: 2,
            width: 1080,
            height: 1920,
        },
        Command::SetResizeMode {
            view: 2,
            mode: ResizeMode::Cover,
        },
        Command::SwitchResolution {
            view: 2,
            resolution: 720,
            scope: ResolutionScope::Global,
        },
        Command::DisposeView { view: 2 },
        Command::ListViews,
    ];

    for cmd in commands {
        let json = serde_json::to_string(&cmd).unwrap();
        let _deserialized: Command = serde_json::from_str(&json).unwrap();
    }
}

#[test]
fn test_response_types() {
    let resp = Response::State(PlaybackState::Paused);
    let json = serde_json::to_string(&resp).unwrap();
    let deserialized: Response = serde_json::from_str(&json).unwrap();
    assert!(matches!(deserialized, Response::State(PlaybackState::Paused)));

    let resp = Response::Event(PlayerEvent::ViewDisposed { view_id: 5 });
    let json = serde_json::to_string(&resp).unwrap();
    let deserialized: Response = serde_json::from_str(&json).unwrap();
    assert!(matches!(
        deserialized,
        Response::Event(PlayerEvent::ViewDisposed { view_id: 5 })
    ));
}

#[tokio::test]
async fn test_dispatch_controller_commands() {
    let harness = Harness::new();
    let engine = &harness.engine;

    let id = match handle_command(engine, Command::CreateController).await {
        Response::ControllerCreated(id) => id,
        other => panic!("unexpected response {:?}", other),
    };

    let resp = handle_command(
        engine,
        Command::SetSources {
            controller: id,
            sources: sources(4),
        },
    )
    .await;
    assert!(matches!(resp, Response::Revision(1)));

    handle_command(engine, Command::CreateView { view: 9 }).await;
    let resp = handle_command(
        engine,
        Command::Bind {
            controller: id,
            view: 9,
            index: 2,
        },
    )
    .await;
    assert!(matches!(resp, Response::Ok));
    harness.flush().await;
    assert_eq!(harness.fake.feed(id).binds().len(), 1);

    let resp = handle_command(
        engine,
        Command::SetVodStrategy {
            controller: id,
            strategy: VodStrategy {
                preload_count: Some(2),
                ..Default::default()
            },
        },
    )
    .await;
    assert!(matches!(resp, Response::Ok));

    let resp = handle_command(engine, Command::ReleaseController { controller: id }).await;
    assert!(matches!(resp, Response::Ok));
    let resp = handle_command(engine, Command::ReleaseController { controller: id }).await;
    assert!(matches!(resp, Response::Ok));
    assert!(harness.fake.feed(id).calls().contains(&FeedCall::Release));

    let resp = handle_command(engine, Command::Start { controller: id }).await;
    assert!(matches!(resp, Response::Error(FeedError::NotFound(_))));
}

#[tokio::test]
async fn test_dispatch_view_commands() {
    let harness = Harness::new();
    let engine = &harness.engine;

    handle_command(engine, Command::CreateView { view: 1 }).await;
    handle_command(
        engine,
        Command::SetViewSize {
            view: 1,
            width: 320,
            height: 240,
        },
    )
    .await;

    match handle_command(engine, Command::GetViewLayout { view: 1 }).await {
        Response::Layout(layout) => {
            assert_eq!((layout.container_width, layout.container_height), (320, 240));
            assert_eq!((layout.width, layout.height), (320, 240));
        }
        other => panic!("unexpected response {:?}", other),
    }

    // Unbound views answer with neutral values
    assert!(matches!(
        handle_command(engine, Command::GetPlaybackState { view: 1 }).await,
        Response::State(PlaybackState::Unbound)
    ));
    assert!(matches!(
        handle_command(engine, Command::IsPlaying { view: 1 }).await,
        Response::Playing(false)
    ));
    assert!(matches!(
        handle_command(engine, Command::Pause { view: 1 }).await,
        Response::Ok
    ));

    assert!(matches!(
        handle_command(engine, Command::SetViewId { old: 1, new: 6 }).await,
        Response::Ok
    ));
    assert!(matches!(
        handle_command(engine, Command::GetDuration { view: 1 }).await,
        Response::Error(FeedError::NotFound(_))
    ));
    assert!(matches!(
        handle_command(engine, Command::GetDuration { view: 6 }).await,
        Response::Seconds(_)
    ));

    assert!(matches!(
        handle_command(engine, Command::DisposeView { view: 6 }).await,
        Response::Ok
    ));
    assert!(engine.views().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reusing_a_live_view_id_replaces_the_view() {
    let mut harness = Harness::new();
    let engine = Arc::clone(&harness.engine);
    let within = Duration::from_secs(3);

    handle_command(&engine, Command::CreateView { view: 5 }).await;
    let first = engine.view(5).unwrap().key();
    let recreated = tokio::time::timeout(within, handle_command(&engine, Command::CreateView { view: 5 })).await;
    assert!(matches!(recreated, Ok(Response::Ok)));
    assert_ne!(engine.view(5).unwrap().key(), first);

    handle_command(&engine, Command::CreateView { view: 6 }).await;
    let moved = engine.view(6).unwrap().key();
    let rekeyed = tokio::time::timeout(within, handle_command(&engine, Command::SetViewId { old: 6, new: 5 })).await;
    assert!(matches!(rekeyed, Ok(Response::Ok)));
    assert_eq!(engine.view(5).unwrap().key(), moved);
    assert!(engine.view(6).is_none());

    match handle_command(&engine, Command::ListViews).await {
        Response::Views(ids) => assert_eq!(ids, vec![5]),
        other => panic!("unexpected response {:?}", other),
    }
    assert!(tokio::time::timeout(within, engine.ui().flush()).await.is_ok());

    // Both displaced views were disposed
    let disposed = harness
        .drain_events()
        .into_iter()
        .filter(|e| *e == PlayerEvent::ViewDisposed { view_id: 5 })
        .count();
    assert_eq!(disposed, 2);
}

async fn connect(path: &std::path::Path) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never came up");
}

async fn send(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
    command: &Command,
) -> Response {
    let mut json = serde_json::to_string(command).unwrap();
    json.push('\n');
    writer.write_all(json.as_bytes()).await.unwrap();
    read_response(reader).await
}

async fn read_response(reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>) -> Response {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn test_socket_session_and_event_stream() {
    let Harness { engine, events, .. } = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("shortfeed.sock");

    let (event_tx, _) = broadcast::channel(64);
    tokio::spawn(ipc_server::pump_events(events, event_tx.clone()));

    let state = Arc::new(Mutex::new(DaemonState::new()));
    let server = {
        let path = socket_path.clone();
        let state = state.clone();
        let engine = engine.clone();
        tokio::spawn(async move { ipc_server::start(&path, state, engine, event_tx).await })
    };

    // Subscriber connection
    let (sub_read, mut sub_write) = connect(&socket_path).await.into_split();
    let mut sub_read = BufReader::new(sub_read);
    assert!(matches!(
        send(&mut sub_write, &mut sub_read, &Command::Subscribe).await,
        Response::Subscribed
    ));

    // Command connection
    let (read, mut write) = connect(&socket_path).await.into_split();
    let mut read = BufReader::new(read);
    assert!(matches!(send(&mut write, &mut read, &Command::Ping).await, Response::Pong));
    assert!(matches!(
        send(&mut write, &mut read, &Command::CreateView { view: 12 }).await,
        Response::Ok
    ));
    assert!(matches!(
        send(&mut write, &mut read, &Command::DisposeView { view: 12 }).await,
        Response::Ok
    ));

    let event = tokio::time::timeout(Duration::from_secs(2), read_response(&mut sub_read))
        .await
        .unwrap();
    assert!(matches!(
        event,
        Response::Event(PlayerEvent::ViewDisposed { view_id: 12 })
    ));

    // Garbage is answered, not fatal
    write.write_all(b"not json\n").await.unwrap();
    assert!(matches!(read_response(&mut read).await, Response::Error(FeedError::Ipc(_))));

    assert!(matches!(send(&mut write, &mut read, &Command::Kill).await, Response::Ok));
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!socket_path.exists());
}
