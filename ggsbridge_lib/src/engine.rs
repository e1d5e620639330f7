use crate::board::{BoardState, Color, Coord};
use crate::error::{BridgeError, Result};
use crate::messages::{EngineCommand, EngineResponse};
use futures::StreamExt;
use log::{debug, trace};
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::{self, Instant};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Seconds held back from the server clock when handing time to the engine.
pub const TIME_MARGIN_SECS: u64 = 10;

// an answer is a coordinate and a score, anything near this long is not one
const MAX_LINE_LENGTH: usize = 1024;

/// Thinking time for the engine, never less than a second.
pub fn engine_time_budget(remaining: u64) -> u64 {
   remaining.saturating_sub(TIME_MARGIN_SECS).max(1)
}

/// Strictly sequential command channel to the search engine.
pub struct EngineBridge<W, R> {
   stdin: W,
   stdout: FramedRead<R, LinesCodec>,
   response_timeout: Option<Duration>,
}

impl<W: AsyncWrite + Unpin, R: AsyncRead + Unpin> EngineBridge<W, R> {
   pub fn new(stdin: W, stdout: R, response_timeout: Option<Duration>) -> EngineBridge<W, R> {
      EngineBridge {
         stdin,
         stdout: FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
         response_timeout,
      }
   }

   async fn send(&mut self, command: EngineCommand<'_>) -> Result<()> {
      debug!("engine <- {}", command);
      let line = format!("{}\n", command);
      self.stdin.write_all(line.as_bytes()).await?;
      self.stdin.flush().await?;
      Ok(())
   }

   pub async fn set_board(&mut self, board: &BoardState) -> Result<()> {
      self.send(EngineCommand::SetBoard(board)).await
   }

   pub async fn set_time_budget(&mut self, color: Color, seconds: u64) -> Result<()> {
      self.send(EngineCommand::SetTime(color, seconds)).await
   }

   pub async fn notify_opponent_move(&mut self, coord: Coord) -> Result<()> {
      self.send(EngineCommand::Play(coord)).await
   }

   /// Sends `go` and waits for exactly one `<coord> <score>` line.
   pub async fn request_move(&mut self) -> Result<EngineResponse> {
      self.send(EngineCommand::Go).await?;
      let started = Instant::now();
      let line = match self.response_timeout {
         None => self.stdout.next().await,
         Some(limit) => time::timeout(limit, self.stdout.next())
            .await
            .map_err(|_| BridgeError::EngineUnresponsive(limit))?,
      };
      let line = match line {
         Some(Ok(line)) => line,
         Some(Err(LinesCodecError::Io(e))) => return Err(BridgeError::Io(e)),
         Some(Err(e)) => return Err(BridgeError::EngineProtocol(e.to_string())),
         None => return Err(BridgeError::EngineProtocol("engine closed its output".into())),
      };
      trace!("engine -> {} after {:?}", line, started.elapsed());
      line.trim().parse().map_err(BridgeError::EngineProtocol)
   }
}

pub type ChildBridge = EngineBridge<ChildStdin, ChildStdout>;

/// Owns the engine subprocess for the lifetime of the bridge.
pub struct EngineProcess {
   child: Child,
}

impl EngineProcess {
   pub fn spawn<I, S>(
      program: impl AsRef<OsStr>,
      args: I,
      response_timeout: Option<Duration>,
   ) -> Result<(EngineProcess, ChildBridge)>
   where
      I: IntoIterator<Item = S>,
      S: AsRef<OsStr>,
   {
      let mut child = Command::new(program)
         .args(args)
         .stdin(Stdio::piped())
         .stdout(Stdio::piped())
         .stderr(Stdio::null())
         .kill_on_drop(true)
         .spawn()?;
      let stdin = child
         .stdin
         .take()
         .ok_or_else(|| BridgeError::EngineProtocol("engine stdin was not captured".into()))?;
      let stdout = child
         .stdout
         .take()
         .ok_or_else(|| BridgeError::EngineProtocol("engine stdout was not captured".into()))?;
      debug!("engine started with pid {:?}", child.id());
      Ok((EngineProcess { child }, EngineBridge::new(stdin, stdout, response_timeout)))
   }

   /// Kills the engine if it is still running and reaps it.
   pub async fn shutdown(mut self) -> Result<()> {
      if let Some(status) = self.child.try_wait()? {
         debug!("engine already exited: {}", status);
         return Ok(());
      }
      self.child.kill().await?;
      debug!("engine stopped");
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::board::Cell;
   use tokio::io::{self, AsyncReadExt, DuplexStream};

   fn empty_board() -> BoardState {
      BoardState::from_cells(&[Cell::Empty; 64], Color::Dark).unwrap()
   }

   #[test]
   fn safety_margin() {
      assert_eq!(engine_time_budget(5), 1);
      assert_eq!(engine_time_budget(10), 1);
      assert_eq!(engine_time_budget(11), 1);
      assert_eq!(engine_time_budget(12), 2);
      assert_eq!(engine_time_budget(100), 90);
      assert_eq!(engine_time_budget(0), 1);
   }

   /// Two one-way pipes standing in for the child's stdin and stdout.
   fn pipes() -> (EngineBridge<DuplexStream, DuplexStream>, DuplexStream, DuplexStream) {
      let (bridge_stdin, engine_stdin) = io::duplex(4096);
      let (engine_stdout, bridge_stdout) = io::duplex(4096);
      (EngineBridge::new(bridge_stdin, bridge_stdout, None), engine_stdin, engine_stdout)
   }

   #[tokio::test]
   async fn writes_commands_and_reads_answer() {
      let (mut bridge, mut engine_stdin, mut engine_stdout) = pipes();

      engine_stdout.write_all(b"c4 +6\r\n").await.unwrap();
      bridge.set_board(&empty_board()).await.unwrap();
      bridge.set_time_budget(Color::Dark, 90).await.unwrap();
      let response = bridge.request_move().await.unwrap();
      assert_eq!(response.coord.to_string(), "c4");
      assert_eq!(response.score, 6);
      bridge.notify_opponent_move("d3".parse().unwrap()).await.unwrap();
      drop(bridge);

      let mut received = String::new();
      engine_stdin.read_to_string(&mut received).await.unwrap();
      assert_eq!(
         received,
         format!("setboard {} X\nsettime X 90\ngo\nplay d3\n", "-".repeat(64))
      );
   }

   #[tokio::test]
   async fn garbled_answer_is_a_protocol_error() {
      let (mut bridge, _engine_stdin, mut engine_stdout) = pipes();
      engine_stdout.write_all(b"thinking...\n").await.unwrap();
      assert!(matches!(bridge.request_move().await, Err(BridgeError::EngineProtocol(_))));
   }

   #[tokio::test]
   async fn runaway_line_is_a_protocol_error() {
      let (mut bridge, _engine_stdin, mut engine_stdout) = pipes();
      let mut line = "x".repeat(MAX_LINE_LENGTH * 2);
      line.push('\n');
      engine_stdout.write_all(line.as_bytes()).await.unwrap();
      assert!(matches!(bridge.request_move().await, Err(BridgeError::EngineProtocol(_))));
   }

   #[tokio::test]
   async fn closed_engine_is_a_protocol_error() {
      let (mut bridge, _engine_stdin, engine_stdout) = pipes();
      drop(engine_stdout);
      assert!(matches!(bridge.request_move().await, Err(BridgeError::EngineProtocol(_))));
   }

   #[tokio::test]
   async fn silent_engine_times_out() {
      let (bridge_stdin, _engine_stdin) = io::duplex(4096);
      let (_engine_stdout, bridge_stdout) = io::duplex(4096);
      let limit = Duration::from_millis(30);
      let mut bridge = EngineBridge::new(bridge_stdin, bridge_stdout, Some(limit));

      match bridge.request_move().await {
         Err(BridgeError::EngineUnresponsive(d)) => assert_eq!(d, limit),
         other => panic!("expected a timeout, got {:?}", other.map(|r| r.coord)),
      }
   }
}
