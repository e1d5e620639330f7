use crate::ponder::PonderCache;
use crate::protocol::{strip_synchro_suffix, MatchEvent};
use log::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
   Idle,
   Playing(String),
}

/// What the caller has to do after an event was applied.
#[derive(Debug, PartialEq, Eq)]
pub enum Transition {
   /// Send `ts accept` for this request.
   Accept { request_id: String },
   Started { match_id: String },
   Ended,
   Terminated,
   /// The frame carries a board for the tracked match; translate it.
   Translate { raw_match_id: String },
   Ignored,
}

/// Single-match session state. Lives for the whole process.
#[derive(Debug)]
pub struct Session {
   own_id: String,
   phase: Phase,
   asking: bool,
   pub ponder: PonderCache,
}

impl Session {
   pub fn new(own_id: impl Into<String>) -> Session {
      Session {
         own_id: own_id.into(),
         phase: Phase::Idle,
         asking: false,
         ponder: PonderCache::new(),
      }
   }

   pub fn own_id(&self) -> &str {
      &self.own_id
   }

   pub fn phase(&self) -> &Phase {
      &self.phase
   }

   pub fn match_id(&self) -> Option<&str> {
      match &self.phase {
         Phase::Playing(id) => Some(id.as_str()),
         Phase::Idle => None,
      }
   }

   /// True when we are free and have no outgoing request pending.
   pub fn wants_request(&self) -> bool {
      self.phase == Phase::Idle && !self.asking
   }

   pub fn mark_asked(&mut self) {
      self.asking = true;
   }

   pub fn step(&mut self, event: &MatchEvent) -> Transition {
      match (event, &self.phase) {
         (
            MatchEvent::GameRequest {
               request_id,
               opponent,
               time_limits,
               game_type,
            },
            Phase::Idle,
         ) => {
            info!(
               "{} requests a {} game ({}), accepting {}",
               opponent, game_type, time_limits, request_id
            );
            Transition::Accept {
               request_id: request_id.clone(),
            }
         }
         (MatchEvent::GameStarted { match_id }, _) => {
            info!("match {} started", match_id);
            self.phase = Phase::Playing(match_id.clone());
            self.asking = false;
            self.ponder.clear();
            Transition::Started {
               match_id: match_id.clone(),
            }
         }
         (MatchEvent::GameEnded, Phase::Playing(match_id)) => {
            info!("match {} ended", match_id);
            self.phase = Phase::Idle;
            Transition::Ended
         }
         (MatchEvent::GameTerminated, phase) => {
            self.asking = false;
            if let Phase::Playing(match_id) = phase {
               info!("match {} terminated, abandoning", match_id);
               self.phase = Phase::Idle;
               Transition::Terminated
            } else {
               Transition::Ignored
            }
         }
         (MatchEvent::BoardUpdate { raw_match_id }, Phase::Playing(match_id)) => {
            let canonical = strip_synchro_suffix(raw_match_id);
            if canonical == match_id.as_str() {
               Transition::Translate {
                  raw_match_id: raw_match_id.clone(),
               }
            } else {
               debug!("dropping board for {}, tracking {}", raw_match_id, match_id);
               Transition::Ignored
            }
         }
         (event, phase) => {
            debug!("no transition for {:?} while {:?}", event, phase);
            Transition::Ignored
         }
      }
   }
}
