//! The server link: sentinel-delimited frames in, newline-terminated commands out.

use crate::error::{BridgeError, Result};
use crate::protocol::{ServerCommand, SENTINEL};
use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time;
use tokio_util::codec::{Decoder, FramedRead};

/// Splits a byte stream into frames that end with a marker (the server's `READY`).
/// The marker is part of the returned frame.
pub struct SentinelCodec {
   sentinel: Vec<u8>,
   // where to resume searching on the next call
   next_index: usize,
}

impl SentinelCodec {
   pub fn new(sentinel: &str) -> SentinelCodec {
      SentinelCodec {
         sentinel: sentinel.as_bytes().to_vec(),
         next_index: 0,
      }
   }

   pub fn set_sentinel(&mut self, sentinel: &str) {
      self.sentinel = sentinel.as_bytes().to_vec();
      self.next_index = 0;
   }

   fn reset(&mut self) {
      self.next_index = 0;
   }
}

impl Decoder for SentinelCodec {
   type Item = String;
   type Error = BridgeError;

   fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
      let width = self.sentinel.len();
      if buf.len() < width {
         return Ok(None);
      }
      let found = buf[self.next_index..]
         .windows(width)
         .position(|window| window == self.sentinel.as_slice());
      match found {
         Some(offset) => {
            let frame = buf.split_to(self.next_index + offset + width);
            self.next_index = 0;
            Ok(Some(String::from_utf8_lossy(&frame).into_owned()))
         }
         None => {
            self.next_index = buf.len() + 1 - width;
            Ok(None)
         }
      }
   }

   fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
      match self.decode(buf)? {
         Some(frame) => Ok(Some(frame)),
         None if buf.is_empty() => Ok(None),
         None => Err(BridgeError::Connection(format!(
            "server closed the connection with {} bytes of an unfinished frame",
            buf.len()
         ))),
      }
   }
}

pub struct Connection<R, W> {
   frames: FramedRead<R, SentinelCodec>,
   writer: W,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Connection<R, W> {
   pub fn new(reader: R, writer: W) -> Connection<R, W> {
      Connection {
         frames: FramedRead::new(reader, SentinelCodec::new(SENTINEL)),
         writer,
      }
   }

   /// Reads up to and including the next `READY`. With a timeout, whatever arrived before
   /// it expired is returned instead, possibly nothing.
   pub async fn read_frame(&mut self, timeout: Option<Duration>) -> Result<String> {
      let next = match timeout {
         None => self.frames.next().await,
         Some(timeout) => match time::timeout(timeout, self.frames.next()).await {
            Ok(next) => next,
            Err(_) => {
               let partial = self.frames.read_buffer_mut().split();
               self.frames.decoder_mut().reset();
               let partial = String::from_utf8_lossy(&partial).into_owned();
               if !partial.is_empty() {
                  debug!("frame timed out with {} bytes buffered", partial.len());
               }
               return Ok(partial);
            }
         },
      };
      match next {
         Some(Ok(frame)) => {
            trace!("server -> {}", frame);
            Ok(frame)
         }
         Some(Err(e)) => Err(e),
         None => Err(BridgeError::Connection("server closed the connection".into())),
      }
   }

   /// Reads until an arbitrary marker, used for the login prompts.
   pub async fn read_until(&mut self, marker: &str) -> Result<String> {
      self.frames.decoder_mut().set_sentinel(marker);
      let result = self.read_frame(None).await;
      self.frames.decoder_mut().set_sentinel(SENTINEL);
      result
   }

   pub async fn send(&mut self, command: &ServerCommand<'_>) -> Result<()> {
      match command {
         ServerCommand::Password(_) => debug!("server <- <password>"),
         command => debug!("server <- {}", command),
      }
      let line = format!("{}\n", command);
      self.writer.write_all(line.as_bytes()).await?;
      self.writer.flush().await?;
      Ok(())
   }

   pub async fn shutdown(&mut self) -> Result<()> {
      self.writer.shutdown().await?;
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use tokio::io::{self, AsyncReadExt};

   fn decode_all(codec: &mut SentinelCodec, input: &[&str]) -> Vec<String> {
      let mut buf = BytesMut::new();
      let mut frames = Vec::new();
      for chunk in input {
         buf.extend_from_slice(chunk.as_bytes());
         while let Some(frame) = codec.decode(&mut buf).unwrap() {
            frames.push(frame);
         }
      }
      frames
   }

   #[test]
   fn splits_on_sentinel_across_chunks() {
      let mut codec = SentinelCodec::new("READY");
      let frames = decode_all(&mut codec, &["hello\nRE", "ADY\n/os: end", " .1 x\nREADY", "tail"]);
      assert_eq!(frames, vec!["hello\nREADY", "\n/os: end .1 x\nREADY"]);
   }

   #[test]
   fn eof_with_leftovers_is_a_connection_error() {
      let mut codec = SentinelCodec::new("READY");
      let mut buf = BytesMut::from("half a fra");
      assert!(matches!(codec.decode_eof(&mut buf), Err(BridgeError::Connection(_))));
      let mut empty = BytesMut::new();
      assert!(codec.decode_eof(&mut empty).unwrap().is_none());
   }

   #[tokio::test]
   async fn reads_frames_and_writes_commands() {
      let (ours, theirs) = io::duplex(4096);
      let (reader, writer) = io::split(ours);
      let (mut server_reader, mut server_writer) = io::split(theirs);
      let mut connection = Connection::new(reader, writer);

      server_writer.write_all(b"first\nREADYsecond\nREADY").await.unwrap();
      assert_eq!(connection.read_frame(None).await.unwrap(), "first\nREADY");
      assert_eq!(connection.read_frame(None).await.unwrap(), "second\nREADY");

      connection.send(&ServerCommand::Accept("12345")).await.unwrap();
      connection.send(&ServerCommand::MonitorOs).await.unwrap();
      let mut sent = vec![0u8; 64];
      let n = server_reader.read(&mut sent).await.unwrap();
      assert_eq!(&sent[..n], b"ts accept 12345\nms /os\n");
   }

   #[tokio::test]
   async fn timeout_returns_partial_frame() {
      let (ours, theirs) = io::duplex(4096);
      let (reader, writer) = io::split(ours);
      let (_server_reader, mut server_writer) = io::split(theirs);
      let mut connection = Connection::new(reader, writer);

      server_writer.write_all(b"no sentinel yet").await.unwrap();
      let frame = connection.read_frame(Some(Duration::from_millis(50))).await.unwrap();
      assert_eq!(frame, "no sentinel yet");
      let frame = connection.read_frame(Some(Duration::from_millis(20))).await.unwrap();
      assert_eq!(frame, "");

      server_writer.write_all(b"next\nREADY").await.unwrap();
      assert_eq!(connection.read_frame(None).await.unwrap(), "next\nREADY");
   }

   #[tokio::test]
   async fn login_prompts() {
      let (ours, theirs) = io::duplex(4096);
      let (reader, writer) = io::split(ours);
      let (_server_reader, mut server_writer) = io::split(theirs);
      let mut connection = Connection::new(reader, writer);

      server_writer.write_all(b"welcome\n: Enter your password.\nREADY").await.unwrap();
      let prompt = connection.read_until(": Enter your password.").await.unwrap();
      assert!(prompt.ends_with(": Enter your password."));
      assert_eq!(connection.read_frame(None).await.unwrap(), "\nREADY");
   }

   #[tokio::test]
   async fn closed_server_is_fatal() {
      let (ours, theirs) = io::duplex(4096);
      let (reader, writer) = io::split(ours);
      let mut connection = Connection::new(reader, writer);
      drop(theirs);
      assert!(matches!(connection.read_frame(None).await, Err(BridgeError::Connection(_))));
   }
}
