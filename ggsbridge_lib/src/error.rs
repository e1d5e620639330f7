use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
   /// Malformed administrative line, clock or colour marker. Recoverable.
   #[error("could not parse server text: {0}")]
   ProtocolParse(String),
   /// Board extraction produced the wrong number of cells. Recoverable.
   #[error("board render had {0} cells, expected 64")]
   BoardShape(usize),
   #[error("server connection lost: {0}")]
   Connection(String),
   #[error("engine protocol violation: {0}")]
   EngineProtocol(String),
   #[error("engine gave no answer within {0:?}")]
   EngineUnresponsive(Duration),
   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),
}

impl BridgeError {
   /// Per-frame failures only cost us the frame; everything else ends the process.
   pub fn is_fatal(&self) -> bool {
      !matches!(self, BridgeError::ProtocolParse(_) | BridgeError::BoardShape(_))
   }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn parse_failures_are_local() {
      assert!(!BridgeError::ProtocolParse("bad marker".into()).is_fatal());
      assert!(!BridgeError::BoardShape(63).is_fatal());
      assert!(BridgeError::Connection("eof".into()).is_fatal());
      assert!(BridgeError::EngineProtocol("garbage".into()).is_fatal());
      assert!(BridgeError::EngineUnresponsive(Duration::from_secs(3)).is_fatal());
   }
}
