//! Tapduel probe: joins a room through a Parse server and logs what the
//! session engine sees.

use std::{env, sync::Arc};

use anyhow::{Context, bail};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tapduel_client::{
    EngineConfig, Notification, SessionController,
    backend::{
        RoomBackend,
        parse::{ParseBackend, ParseConfig},
    },
    render::AnimationHitEngine,
    services::{RoomCode, lobby_service},
};

/// Surface the probe pretends to draw on when auto-tapping.
const PROBE_SURFACE: (f64, f64) = (1080.0, 1920.0);

const USAGE: &str = "usage: tapduel-probe <room-code> [--create] [--auto-tap]";

struct ProbeArgs {
    code: RoomCode,
    create: bool,
    auto_tap: bool,
}

impl ProbeArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut code = None;
        let mut create = false;
        let mut auto_tap = false;
        for arg in args {
            match arg.as_str() {
                "--create" => create = true,
                "--auto-tap" => auto_tap = true,
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                raw if code.is_none() => code = Some(RoomCode::parse(raw)?),
                extra => bail!("unexpected argument {extra}\n{USAGE}"),
            }
        }
        let Some(code) = code else {
            bail!(USAGE);
        };
        Ok(Self {
            code,
            create,
            auto_tap,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = ProbeArgs::parse(env::args().skip(1))?;
    let config = EngineConfig::load();

    let parse_config = ParseConfig::from_env().context("reading Parse settings")?;
    let parse = ParseBackend::connect(parse_config).context("building Parse client")?;
    let player = parse
        .current_user()
        .await
        .context("resolving the signed-in player")?;
    info!(%player, "signed in");

    let backend: Arc<dyn RoomBackend> = Arc::new(parse);
    let room_id = if args.create {
        lobby_service::create_room(backend.as_ref(), &args.code).await?
    } else {
        lobby_service::join_room(backend.as_ref(), args.code.as_str()).await?
    };

    let session = SessionController::new(backend, config.clone(), player);
    session
        .init_session(room_id)
        .await
        .context("starting the session")?;

    let mut engine = AnimationHitEngine::new(config.hit_radius);
    engine.resize(PROBE_SURFACE.0, PROBE_SURFACE.1);

    let mut states = session.watch();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                info!(
                    status = state.status.as_str(),
                    lobby = ?state.lobby_phase(),
                    round = state.round,
                    max_rounds = state.max_rounds,
                    scores = ?state.scores,
                    objective = ?state.current_objective.as_ref().map(|objective| &objective.id),
                    "state changed"
                );
                if engine.sync(&state) && args.auto_tap {
                    tap_center(&mut engine, &session);
                }
            }
            notification = session.next_notification() => match notification {
                Some(Notification::GameEnded(ended)) => {
                    let outcome = ended.outcome_for(session.local_player());
                    info!(
                        result = ?outcome.result,
                        my_score = outcome.my_score,
                        opponent_score = outcome.opponent_score,
                        "match over"
                    );
                    break;
                }
                Some(Notification::Error { kind, message }) => {
                    warn!(?kind, %message, "session error");
                }
                None => break,
            },
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    session.leave_session();
    Ok(())
}

/// Press the middle of the objective currently shown.
fn tap_center(engine: &mut AnimationHitEngine, session: &SessionController) {
    let Some(body) = engine.frame().objective.map(|sprite| sprite.body) else {
        return;
    };
    if let Some(tap) = engine.pointer_down(body.x, body.y) {
        if let Err(err) = session.on_objective_tapped(tap) {
            warn!(error = %err, "could not submit tap");
        }
    }
}

/// Configure tracing subscribers; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tapduel_client=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
