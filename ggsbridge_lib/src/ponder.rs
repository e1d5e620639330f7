use crate::board::{BoardState, Coord};

/// A position the engine can think about while the opponent is on the move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PonderEntry {
   pub board: BoardState,
   pub committed_move: Option<Coord>,
}

/// Holds at most one ponder seed.
#[derive(Debug, Default)]
pub struct PonderCache {
   slot: Option<PonderEntry>,
}

impl PonderCache {
   pub fn new() -> PonderCache {
      PonderCache { slot: None }
   }

   /// Replaces whatever seed is held, returning the displaced one.
   pub fn push(&mut self, entry: PonderEntry) -> Option<PonderEntry> {
      self.slot.replace(entry)
   }

   pub fn pop(&mut self) -> Option<PonderEntry> {
      self.slot.take()
   }

   pub fn peek(&self) -> Option<&PonderEntry> {
      self.slot.as_ref()
   }

   pub fn is_empty(&self) -> bool {
      self.slot.is_none()
   }

   pub fn clear(&mut self) {
      self.slot = None;
   }

   /// Opponent on the move: remember the position with no move committed yet.
   pub fn note_opponent_turn(&mut self, board: BoardState) {
      self.push(PonderEntry {
         board,
         committed_move: None,
      });
   }

   /// We just answered on `board` with `chosen`. If a seed was held, it is handed back
   /// so the engine can be reloaded with it, and the new position plus our move
   /// becomes the next seed.
   pub fn rotate_after_own_move(&mut self, board: BoardState, chosen: Coord) -> Option<PonderEntry> {
      let seed = self.pop()?;
      self.push(PonderEntry {
         board,
         committed_move: Some(chosen),
      });
      Some(seed)
   }
}
