//! Turns a GGS board render into a canonical position.
//!
//! A render is a block of `|`-prefixed lines: one clock line per player, the grid
//! framed by column headers, and a "`<marker> to move`" line. The board is always
//! rebuilt from scratch; nothing is carried over from previous frames.

use crate::board::{BoardState, Cell, Color};
use crate::error::BridgeError;
use crate::protocol::parse_clock;
use log::warn;

pub const GRID_HEADER: &str = "A B C D E F G H";
const TO_MOVE: &str = " to move";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardSnapshot {
   pub own_color: Color,
   pub own_remaining: u64,
   pub board: BoardState,
}

impl BoardSnapshot {
   pub fn side_to_move(&self) -> Color {
      self.board.side_to_move
   }

   pub fn is_own_turn(&self) -> bool {
      self.own_color == self.board.side_to_move
   }
}

pub fn translate(frame: &str, own_id: &str) -> Result<BoardSnapshot, BridgeError> {
   let rows: Vec<&str> = frame.lines().filter(|line| line.starts_with('|')).collect();

   let (own_color, own_remaining) = rows
      .iter()
      .find_map(|row| own_clock(row, own_id))
      .ok_or_else(|| BridgeError::ProtocolParse(format!("no readable clock line for {}", own_id)))?;
   let side_to_move = side_to_move(&rows)?;
   let cells = grid_cells(&rows);

   Ok(BoardSnapshot {
      own_color,
      own_remaining,
      board: BoardState::from_cells(&cells, side_to_move)?,
   })
}

/// Colour and remaining seconds from a player line such as
/// `|nyanyan (1800.3 * 04:51,N:0//02:00)`.
fn own_clock(row: &str, own_id: &str) -> Option<(Color, u64)> {
   let tokens: Vec<&str> = row.trim_start_matches('|').split_whitespace().collect();
   let at = tokens.iter().position(|t| *t == own_id)?;
   let after = &tokens[at + 1..];

   let color = at
      .checked_sub(1)
      .and_then(|before| lone_marker(tokens[before]))
      .or_else(|| after.iter().find_map(|t| lone_marker(t)))?;
   let remaining = after.iter().find_map(|t| t.split(',').next().and_then(remaining_seconds));
   if remaining.is_none() {
      warn!("no readable clock for {} in '{}'", own_id, row);
   }
   Some((color, remaining?))
}

/// An overdrawn clock (`-00:05`) leaves nothing to spend.
fn remaining_seconds(clock: &str) -> Option<u64> {
   match clock.strip_prefix('-') {
      Some(overdrawn) => parse_clock(overdrawn).ok().map(|_| 0),
      None => parse_clock(clock).ok(),
   }
}

fn lone_marker(token: &str) -> Option<Color> {
   let mut chars = token.chars();
   match (chars.next(), chars.next()) {
      (Some(c), None) => Color::from_server_marker(c),
      _ => None,
   }
}

fn side_to_move(rows: &[&str]) -> Result<Color, BridgeError> {
   let (row, at) = rows
      .iter()
      .find_map(|row| row.find(TO_MOVE).map(|at| (row, at)))
      .ok_or_else(|| BridgeError::ProtocolParse("no side-to-move line in board render".into()))?;
   let marker = row[..at].chars().last();
   marker
      .and_then(Color::from_server_marker)
      .ok_or_else(|| BridgeError::ProtocolParse(format!("unrecognized side to move in '{}'", row)))
}

/// Cells between the first column header and the second one (or the end of the render).
fn grid_cells(rows: &[&str]) -> Vec<Cell> {
   let mut grid = String::new();
   let mut headers_seen = 0;
   for row in rows {
      if row.contains(GRID_HEADER) {
         headers_seen += 1;
         if headers_seen == 2 {
            break;
         }
      }
      if headers_seen == 1 && !row.contains(TO_MOVE) {
         grid.push_str(row);
      }
   }
   grid.replace(GRID_HEADER, "")
      .chars()
      .filter(|c| !matches!(c, '|' | '1'..='8') && !c.is_whitespace())
      .map(Cell::from_server_symbol)
      .collect()
}
