use crate::board::{BoardState, Color, Coord};
use std::fmt;
use std::str::FromStr;

// Engine subprocess wire messages

// Bridge to Engine
pub enum EngineCommand<'a> {
   SetBoard(&'a BoardState), // Full position replacement
   SetTime(Color, u64),      // Seconds the engine may spend for the given colour
   Go,                       // Search and answer with "<coord> <score>"
   Play(Coord),              // Move already played on the current position
}

impl fmt::Display for EngineCommand<'_> {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         EngineCommand::SetBoard(board) => write!(f, "setboard {}", board),
         EngineCommand::SetTime(color, seconds) => write!(f, "settime {} {}", color, seconds),
         EngineCommand::Go => f.write_str("go"),
         EngineCommand::Play(coord) => write!(f, "play {}", coord),
      }
   }
}

// Engine to Bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineResponse {
   pub coord: Coord,
   pub score: i32,
}

impl FromStr for EngineResponse {
   type Err = String;

   fn from_str(s: &str) -> Result<EngineResponse, String> {
      let mut fields = s.split_whitespace();
      let coord = fields
         .next()
         .ok_or_else(|| "empty engine response".to_string())?
         .parse::<Coord>()?;
      let score = fields
         .next()
         .ok_or_else(|| format!("engine response '{}' is missing a score", s))?;
      let score = score
         .parse::<i32>()
         .map_err(|e| format!("engine score '{}' is not an integer: {}", score, e))?;
      if fields.next().is_some() {
         return Err(format!("engine response '{}' has trailing fields", s));
      }
      Ok(EngineResponse { coord, score })
   }
}
