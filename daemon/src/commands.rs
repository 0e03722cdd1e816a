//! Inward command dispatch.
//!
//! Controller and engine commands go straight to their objects; anything
//! touching a view runs on the UI context and waits for the result.

use crate::adapter::PlaybackAdapter;
use crate::controller::FeedController;
use crate::engine::Engine;
use common::{Command, ControllerId, FeedError, PlaybackState, Response, ViewId};
use std::sync::Arc;

pub async fn handle_command(engine: &Arc<Engine>, command: Command) -> Response {
    log::debug!("Handling command: {:?}", command);

    match command {
        Command::Ping => Response::Pong,

        Command::SetConfiguration { config } => {
            engine.set_configuration(&config);
            Response::Ok
        }

        Command::ProbeEnhancement { info } => {
            engine.probe_optional_capability(&info);
            Response::Ok
        }

        Command::CreateController => Response::ControllerCreated(engine.create_controller()),

        Command::SetSources { controller, sources } => {
            reply(find_controller(engine, controller), |c| Response::Revision(c.set_sources(sources)))
        }

        Command::AppendSources { controller, sources } => reply(find_controller(engine, controller), |c| {
            Response::Revision(c.append_sources(sources))
        }),

        Command::Start { controller } => {
            reply(find_controller(engine, controller), |c| Response::Revision(c.start()))
        }

        Command::Bind { controller, view, index } => reply(find_controller(engine, controller), |c| {
            c.bind(view, index);
            Response::Ok
        }),

        Command::PreBind { controller, view, index } => reply(find_controller(engine, controller), |c| {
            c.pre_bind(view, index);
            Response::Ok
        }),

        Command::SetLoop { controller, enabled } => reply(find_controller(engine, controller), |c| {
            c.set_loop(enabled);
            Response::Ok
        }),

        Command::SetVodStrategy { controller, strategy } => reply(find_controller(engine, controller), |c| {
            c.set_vod_strategy(&strategy);
            Response::Ok
        }),

        Command::ReleaseController { controller } => {
            // Releasing twice is not an error
            if let Some(c) = engine.get_controller(controller) {
                c.release();
            }
            Response::Ok
        }

        Command::CreateView { view } => {
            let engine_ui = Arc::clone(engine);
            match engine.ui().call(move || engine_ui.create_view(view).key()).await {
                Some(_) => Response::Ok,
                None => ui_gone(),
            }
        }

        Command::SetViewId { old, new } => {
            let views = Arc::clone(engine.views());
            let found = engine
                .ui()
                .call(move || views.get(old).map(|view| view.set_id(new)).is_some())
                .await;
            match found {
                Some(true) => Response::Ok,
                Some(false) => Response::Error(view_not_found(old)),
                None => ui_gone(),
            }
        }

        Command::DisposeView { view } => {
            let views = Arc::clone(engine.views());
            // Disposing an unknown view is a no-op
            match engine.ui().call(move || views.get(view).map(|v| v.dispose())).await {
                Some(_) => Response::Ok,
                None => ui_gone(),
            }
        }

        Command::ListViews => {
            Response::Views(engine.views().snapshot().into_iter().map(|(id, _)| id).collect())
        }

        Command::SetViewSize { view, width, height } => {
            ok(on_view(engine, view, move |a| a.set_container_size(width, height)).await)
        }
        Command::SetResizeMode { view, mode } => ok(on_view(engine, view, move |a| a.set_resize_mode(mode)).await),
        Command::GetViewLayout { view } => reply(on_view(engine, view, |a| a.layout()).await, Response::Layout),

        Command::Play { view, source } => ok(on_view(engine, view, move |a| a.play(source.normalized())).await),
        Command::Pause { view } => ok(on_view(engine, view, |a| a.pause()).await),
        Command::Resume { view } => ok(on_view(engine, view, |a| a.resume()).await),
        Command::Seek { view, seconds } => ok(on_view(engine, view, move |a| a.seek(seconds)).await),
        Command::SetRate { view, rate } => ok(on_view(engine, view, move |a| a.set_rate(rate)).await),
        Command::SetMute { view, muted } => ok(on_view(engine, view, move |a| a.set_mute(muted)).await),
        Command::SetMirror { view, mirrored } => ok(on_view(engine, view, move |a| a.set_mirror(mirrored)).await),
        Command::SwitchResolution { view, resolution, scope } => {
            ok(on_view(engine, view, move |a| a.switch_resolution(resolution, scope)).await)
        }
        Command::SetRenderMode { view, mode } => ok(on_view(engine, view, move |a| a.set_render_mode(mode)).await),
        Command::SelectSubtitleTrack { view, index } => {
            ok(on_view(engine, view, move |a| a.select_subtitle_track(index)).await)
        }
        Command::SetStringOption { view, key, value } => {
            ok(on_view(engine, view, move |a| a.set_string_option(&key, &value)).await)
        }

        Command::GetDuration { view } => reply(on_view(engine, view, |a| a.duration()).await, Response::Seconds),
        Command::GetCurrentPlayTime { view } => {
            reply(on_view(engine, view, |a| a.current_play_time()).await, Response::Seconds)
        }
        Command::IsPlaying { view } => reply(on_view(engine, view, |a| a.is_playing()).await, Response::Playing),
        Command::GetSupportedResolutions { view } => {
            reply(on_view(engine, view, |a| a.supported_resolutions()).await, Response::Resolutions)
        }
        Command::GetPlaybackState { view } => reply(
            on_view(engine, view, |a| a.state()).await,
            |state: PlaybackState| Response::State(state),
        ),

        Command::Subscribe | Command::Kill => Response::Error(FeedError::InvalidArgument(
            "command is only valid on a client connection".to_string(),
        )),
    }
}

fn find_controller(engine: &Engine, id: ControllerId) -> Result<Arc<FeedController>, FeedError> {
    engine
        .get_controller(id)
        .ok_or_else(|| FeedError::NotFound(format!("Controller {} not found", id)))
}

fn view_not_found(id: ViewId) -> FeedError {
    FeedError::NotFound(format!("View {} not found", id))
}

fn ui_gone() -> Response {
    Response::Error(FeedError::Engine("UI context stopped".to_string()))
}

/// Run `f` on the adapter of view `id` on the UI context
async fn on_view<T, F>(engine: &Engine, id: ViewId, f: F) -> Result<T, FeedError>
where
    F: FnOnce(&mut PlaybackAdapter) -> T + Send + 'static,
    T: Send + 'static,
{
    let views = Arc::clone(engine.views());
    engine
        .ui()
        .call(move || views.get(id).map(|view| view.with_adapter(f)))
        .await
        .ok_or_else(|| FeedError::Engine("UI context stopped".to_string()))?
        .ok_or_else(|| view_not_found(id))
}

fn reply<T>(result: Result<T, FeedError>, into: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => into(value),
        Err(e) => {
            log::warn!("{}", e);
            Response::Error(e)
        }
    }
}

fn ok(result: Result<(), FeedError>) -> Response {
    reply(result, |()| Response::Ok)
}
