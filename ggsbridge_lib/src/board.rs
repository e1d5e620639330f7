use crate::error::BridgeError;
use std::fmt::{self, Write};
use std::str::FromStr;

pub const NUM_CELLS: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
   Dark,
   Light,
}

impl Color {
   /// Colour markers used by the server's board renders: `*` moves first, `O` second.
   pub fn from_server_marker(marker: char) -> Option<Color> {
      match marker {
         '*' => Some(Color::Dark),
         'O' => Some(Color::Light),
         _ => None,
      }
   }

   /// Symbol the engine expects for this colour.
   pub fn symbol(self) -> char {
      match self {
         Color::Dark => 'X',
         Color::Light => 'O',
      }
   }
}

impl fmt::Display for Color {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      f.write_char(self.symbol())
   }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
   Empty,
   Dark,
   Light,
}

impl Cell {
   pub fn from_server_symbol(symbol: char) -> Cell {
      match symbol {
         '*' | 'X' => Cell::Dark,
         '-' | '.' => Cell::Empty,
         _ => Cell::Light,
      }
   }

   pub fn symbol(self) -> char {
      match self {
         Cell::Empty => '-',
         Cell::Dark => 'X',
         Cell::Light => 'O',
      }
   }
}

/// Canonical position: 64 cells in row-major order (a1, b1, ..., h8) and the side to move.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoardState {
   pub cells: [Cell; NUM_CELLS],
   pub side_to_move: Color,
}

impl BoardState {
   pub fn from_cells(cells: &[Cell], side_to_move: Color) -> Result<BoardState, BridgeError> {
      if cells.len() != NUM_CELLS {
         return Err(BridgeError::BoardShape(cells.len()));
      }
      let mut board = [Cell::Empty; NUM_CELLS];
      board.copy_from_slice(cells);
      Ok(BoardState {
         cells: board,
         side_to_move,
      })
   }

   pub fn count(&self, cell: Cell) -> usize {
      self.cells.iter().filter(|x| **x == cell).count()
   }
}

impl fmt::Display for BoardState {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      for cell in self.cells.iter() {
         f.write_char(cell.symbol())?;
      }
      write!(f, " {}", self.side_to_move)
   }
}

/// A square on the board, as written by the engine (`f5`) and sent to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coord(u8);

impl Coord {
   pub fn index(self) -> usize {
      self.0 as usize
   }
}

impl fmt::Display for Coord {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      f.write_char((b'a' + self.0 % 8) as char)?;
      write!(f, "{}", (self.0 / 8) + 1)
   }
}

impl FromStr for Coord {
   type Err = String;

   fn from_str(s: &str) -> Result<Coord, String> {
      if s.len() != 2 {
         return Err(format!("{} not a valid board coordinate; expected 2 bytes", s));
      }
      let col = match s.as_bytes()[0].to_ascii_lowercase() {
         file @ b'a'..=b'h' => file - b'a',
         file => return Err(format!("{} is not a valid column, expected a..=h", file as char)),
      };
      let row = match s.as_bytes()[1] {
         rank @ b'1'..=b'8' => rank - b'1',
         rank => return Err(format!("{} is not a valid row, expected 1..=8", rank as char)),
      };
      Ok(Coord(row * 8 + col))
   }
}
