use crate::config::{AskRequest, Settings};
use anyhow::Context;
use ggsbridge_lib::board::Cell;
use ggsbridge_lib::connection::Connection;
use ggsbridge_lib::engine::{engine_time_budget, EngineBridge, EngineProcess};
use ggsbridge_lib::error::BridgeError;
use ggsbridge_lib::protocol::{self, ServerCommand, LOGIN_PROMPT, PASSWORD_PROMPT};
use ggsbridge_lib::session::{Session, Transition};
use ggsbridge_lib::translate::{translate, BoardSnapshot};
use log::{debug, error, info, trace, warn};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::signal;

// the server sends this many READY-terminated banners after a successful login
const LOGIN_BANNERS: usize = 5;

pub async fn run(settings: Settings) -> anyhow::Result<()> {
   info!("connecting to {}:{}", settings.server, settings.port);
   let stream = TcpStream::connect((settings.server.as_str(), settings.port))
      .await
      .with_context(|| format!("connecting to {}:{}", settings.server, settings.port))?;
   let (read_half, write_half) = stream.into_split();
   let mut connection = Connection::new(read_half, write_half);

   info!("starting engine {}", settings.engine.display());
   let (engine_process, mut engine) =
      match EngineProcess::spawn(&settings.engine, &settings.engine_args, settings.engine_timeout) {
         Ok(spawned) => spawned,
         Err(e) => {
            let _ = connection.shutdown().await;
            return Err(e).with_context(|| format!("starting {}", settings.engine.display()));
         }
      };

   let mut session = Session::new(settings.id.clone());
   let outcome = tokio::select! {
      result = drive(&mut connection, &mut engine, &mut session, &settings) => result,
      _ = signal::ctrl_c() => {
         info!("interrupted, shutting down");
         Ok(())
      }
   };

   if let Err(e) = &outcome {
      error!("bridge stopped: {}", e);
   }
   drop(engine);
   if let Err(e) = connection.shutdown().await {
      warn!("closing the server connection failed: {}", e);
   }
   if let Err(e) = engine_process.shutdown().await {
      warn!("stopping the engine failed: {}", e);
   }
   outcome.map_err(anyhow::Error::from)
}

async fn drive<R, W, EW, ER>(
   connection: &mut Connection<R, W>,
   engine: &mut EngineBridge<EW, ER>,
   session: &mut Session,
   settings: &Settings,
) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
   EW: AsyncWrite + Unpin,
   ER: AsyncRead + Unpin,
{
   login(connection, &settings.id, &settings.password, settings.frame_timeout).await?;
   setup(connection, settings.frame_timeout).await?;
   info!("Initialized!");
   main_loop(connection, engine, session, settings.ask.as_ref(), settings.frame_timeout).await
}

pub async fn login<R, W>(
   connection: &mut Connection<R, W>,
   id: &str,
   password: &str,
   frame_timeout: Option<Duration>,
) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
{
   connection.read_until(LOGIN_PROMPT).await?;
   connection.send(&ServerCommand::Login(id)).await?;
   connection.read_until(PASSWORD_PROMPT).await?;
   connection.send(&ServerCommand::Password(password)).await?;
   for _ in 0..LOGIN_BANNERS {
      log_frame(&connection.read_frame(frame_timeout).await?);
   }
   info!("logged in as {}", id);
   Ok(())
}

pub async fn setup<R, W>(connection: &mut Connection<R, W>, frame_timeout: Option<Duration>) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
{
   connection.send(&ServerCommand::MonitorOs).await?;
   log_frame(&connection.read_frame(frame_timeout).await?);
   connection.send(&ServerCommand::ClientMode).await?;
   log_frame(&connection.read_frame(frame_timeout).await?);
   Ok(())
}

/// Runs until the server or the engine fails. Per-frame parse problems are logged and skipped.
pub async fn main_loop<R, W, EW, ER>(
   connection: &mut Connection<R, W>,
   engine: &mut EngineBridge<EW, ER>,
   session: &mut Session,
   ask: Option<&AskRequest>,
   frame_timeout: Option<Duration>,
) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
   EW: AsyncWrite + Unpin,
   ER: AsyncRead + Unpin,
{
   loop {
      if let Some(ask) = ask {
         if session.wants_request() {
            info!("asking {} for a {} game", ask.user, ask.game_type);
            connection
               .send(&ServerCommand::Ask {
                  game_type: &ask.game_type,
                  time_limits: ask.time_limits,
                  user: &ask.user,
               })
               .await?;
            session.mark_asked();
         }
      }
      let frame = connection.read_frame(frame_timeout).await?;
      log_frame(&frame);
      if let Err(e) = handle_frame(connection, engine, session, &frame).await {
         if e.is_fatal() {
            return Err(e);
         }
         warn!("skipping board update: {}", e);
      }
   }
}

/// Applies one frame. A board for the tracked match is fully handled (engine and server)
/// before this returns.
pub async fn handle_frame<R, W, EW, ER>(
   connection: &mut Connection<R, W>,
   engine: &mut EngineBridge<EW, ER>,
   session: &mut Session,
   frame: &str,
) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
   EW: AsyncWrite + Unpin,
   ER: AsyncRead + Unpin,
{
   let event = protocol::parse_event(frame, session.own_id());
   match session.step(&event) {
      Transition::Accept { request_id } => connection.send(&ServerCommand::Accept(&request_id)).await,
      Transition::Translate { raw_match_id } => {
         let snapshot = translate(frame, session.own_id())?;
         play_position(connection, engine, session, &raw_match_id, snapshot).await
      }
      Transition::Started { .. } | Transition::Ended | Transition::Terminated | Transition::Ignored => Ok(()),
   }
}

async fn play_position<R, W, EW, ER>(
   connection: &mut Connection<R, W>,
   engine: &mut EngineBridge<EW, ER>,
   session: &mut Session,
   raw_match_id: &str,
   snapshot: BoardSnapshot,
) -> Result<(), BridgeError>
where
   R: AsyncRead + Unpin,
   W: AsyncWrite + Unpin,
   EW: AsyncWrite + Unpin,
   ER: AsyncRead + Unpin,
{
   info!(
      "board for {}: we are {} with {}s, {} to move, X {} O {}",
      raw_match_id,
      snapshot.own_color,
      snapshot.own_remaining,
      snapshot.side_to_move(),
      snapshot.board.count(Cell::Dark),
      snapshot.board.count(Cell::Light),
   );
   engine.set_board(&snapshot.board).await?;

   if !snapshot.is_own_turn() {
      session.ponder.note_opponent_turn(snapshot.board);
      return Ok(());
   }

   let budget = engine_time_budget(snapshot.own_remaining);
   engine.set_time_budget(snapshot.own_color, budget).await?;
   info!("thinking with {}s on {}", budget, raw_match_id);
   let response = engine.request_move().await?;
   info!("playing {} (score {}) in {}", response.coord, response.score, raw_match_id);
   connection
      .send(&ServerCommand::Play {
         match_id: raw_match_id,
         response: &response,
      })
      .await?;

   if let Some(seed) = session.ponder.rotate_after_own_move(snapshot.board, response.coord) {
      debug!("reloading ponder seed {}", seed.board);
      engine.set_board(&seed.board).await?;
      if let Some(committed) = seed.committed_move {
         engine.notify_opponent_move(committed).await?;
      }
   }
   Ok(())
}

fn log_frame(frame: &str) {
   if !frame.is_empty() {
      debug!("received a {} byte frame", frame.len());
      trace!("{}", frame);
   }
}
