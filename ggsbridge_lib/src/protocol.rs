//! GGS text protocol: administrative `/os:` line classification and outgoing commands.
//!
//! The server interleaves human-oriented text with one structured line per frame
//! that starts with [`ADMIN_PREFIX`]. Everything the session needs to track a match
//! is carried on that line; board renders are handled by [`crate::translate`].

use crate::error::BridgeError;
use crate::messages::EngineResponse;
use log::warn;
use std::fmt;

pub const ADMIN_PREFIX: &str = "/os:";
pub const SENTINEL: &str = "READY";
pub const LOGIN_PROMPT: &str = ": Enter login (yours, or one you'd like to use).";
pub const PASSWORD_PROMPT: &str = ": Enter your password.";

/// Main, secondary and byo-yomi time in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeBudget {
   pub main: u64,
   pub secondary: u64,
   pub byoyomi: u64,
}

impl fmt::Display for TimeBudget {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write_clock(f, self.main)?;
      f.write_str("/")?;
      write_clock(f, self.secondary)?;
      f.write_str("/")?;
      write_clock(f, self.byoyomi)
   }
}

fn write_clock(f: &mut fmt::Formatter, seconds: u64) -> fmt::Result {
   write!(f, "{:02}:{:02}", seconds / 60, seconds % 60)
}

/// `mm:ss` or `h:mm:ss` to seconds.
pub fn parse_clock(clock: &str) -> Result<u64, BridgeError> {
   let bad = || BridgeError::ProtocolParse(format!("'{}' is not a mm:ss clock", clock));
   let parts: Vec<&str> = clock.split(':').collect();
   if !(2..=3).contains(&parts.len()) {
      return Err(bad());
   }
   parts.iter().try_fold(0u64, |total, part| {
      let value: u64 = part.parse().map_err(|_| bad())?;
      total
         .checked_mul(60)
         .and_then(|total| total.checked_add(value))
         .ok_or_else(bad)
   })
}

/// Parses `A/B/C` where each part is `mm:ss`; empty or missing parts are zero.
pub fn parse_time_spec(spec: &str) -> Result<TimeBudget, BridgeError> {
   let mut limits = [0u64; 3];
   for (i, part) in spec.split('/').enumerate() {
      if i >= limits.len() {
         return Err(BridgeError::ProtocolParse(format!(
            "time spec '{}' has more than three parts",
            spec
         )));
      }
      if !part.is_empty() {
         limits[i] = parse_clock(part)?;
      }
   }
   Ok(TimeBudget {
      main: limits[0],
      secondary: limits[1],
      byoyomi: limits[2],
   })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchEvent {
   GameRequest {
      request_id: String,
      opponent: String,
      time_limits: TimeBudget,
      game_type: String,
   },
   GameStarted {
      match_id: String,
   },
   GameEnded,
   GameTerminated,
   BoardUpdate {
      raw_match_id: String,
   },
   Unknown,
}

/// First line of the frame that starts with the administrative prefix.
pub fn admin_line(frame: &str) -> Option<&str> {
   frame.lines().find(|line| line.starts_with(ADMIN_PREFIX))
}

/// Classifies an administrative line. Rules are tried in order; the first match wins.
pub fn classify(line: &str, own_id: &str) -> Result<MatchEvent, BridgeError> {
   let tokens: Vec<&str> = line.split_whitespace().collect();

   if tokens.len() >= 10 && tokens[1] == "+" && tokens.last() == Some(&own_id) {
      // Requests may carry a one-letter kind tag right after the '+'.
      let fields = match tokens.len() {
         10 => Some(&tokens[2..]),
         11 if is_kind_tag(tokens[2]) => Some(&tokens[3..]),
         _ => None,
      };
      if let Some(fields) = fields {
         return Ok(MatchEvent::GameRequest {
            request_id: fields[0].to_string(),
            opponent: fields[2].to_string(),
            time_limits: parse_time_spec(fields[3])?,
            game_type: fields[4].to_string(),
         });
      }
   }
   if tokens.len() >= 2 && tokens[1] == "end" {
      return Ok(MatchEvent::GameEnded);
   }
   if tokens.len() > 3 && tokens[1] == "+" && tokens[2] == "match" {
      return Ok(MatchEvent::GameStarted {
         match_id: tokens[3].to_string(),
      });
   }
   if tokens.len() > 3 && tokens[1] == "-" {
      return Ok(MatchEvent::GameTerminated);
   }
   if tokens.len() > 2 && (tokens[1] == "update" || tokens[1] == "join") {
      return Ok(MatchEvent::BoardUpdate {
         raw_match_id: tokens[2].to_string(),
      });
   }
   Ok(MatchEvent::Unknown)
}

fn is_kind_tag(token: &str) -> bool {
   token.len() == 1 && token.chars().all(|c| c.is_ascii_alphabetic())
}

/// Extracts and classifies the administrative line of a frame. Parse failures are
/// logged and downgraded to [`MatchEvent::Unknown`].
pub fn parse_event(frame: &str, own_id: &str) -> MatchEvent {
   let line = match admin_line(frame) {
      Some(line) => line,
      None => return MatchEvent::Unknown,
   };
   match classify(line, own_id) {
      Ok(event) => event,
      Err(e) => {
         warn!("ignoring administrative line '{}': {}", line, e);
         MatchEvent::Unknown
      }
   }
}

/// Drops the sub-connection part of a synchro id (`.12.0` -> `.12`).
pub fn strip_synchro_suffix(match_id: &str) -> &str {
   if match_id.split('.').count() == 3 {
      match match_id.rfind('.') {
         Some(cut) => &match_id[..cut],
         None => match_id,
      }
   } else {
      match_id
   }
}

pub enum ServerCommand<'a> {
   Login(&'a str),
   Password(&'a str),
   MonitorOs,
   ClientMode,
   Ask {
      game_type: &'a str,
      time_limits: TimeBudget,
      user: &'a str,
   },
   Accept(&'a str),
   Play {
      match_id: &'a str,
      response: &'a EngineResponse,
   },
}

impl fmt::Display for ServerCommand<'_> {
   fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      match self {
         ServerCommand::Login(id) => f.write_str(id),
         ServerCommand::Password(password) => f.write_str(password),
         ServerCommand::MonitorOs => f.write_str("ms /os"),
         ServerCommand::ClientMode => f.write_str("ts client -"),
         ServerCommand::Ask {
            game_type,
            time_limits,
            user,
         } => write!(f, "ts ask {} {} {}", game_type, time_limits, user),
         ServerCommand::Accept(request_id) => write!(f, "ts accept {}", request_id),
         ServerCommand::Play { match_id, response } => {
            write!(f, "t /os play {} {}/{}", match_id, response.coord, response.score)
         }
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   const ME: &str = "nyanyan";

   #[test]
   fn time_specs() {
      let limits = parse_time_spec("05:00//00:30").unwrap();
      assert_eq!(
         limits,
         TimeBudget {
            main: 300,
            secondary: 0,
            byoyomi: 30
         }
      );
      assert_eq!(parse_time_spec("").unwrap(), TimeBudget::default());
      assert_eq!(parse_time_spec("01:30").unwrap().main, 90);
      assert_eq!(parse_time_spec("//02:00").unwrap().byoyomi, 120);
      assert!(parse_time_spec("5m/00:00/00:00").is_err());
      assert!(parse_time_spec("01:00/01:00/01:00/01:00").is_err());
   }

   #[test]
   fn clocks() {
      assert_eq!(parse_clock("04:51").unwrap(), 291);
      assert_eq!(parse_clock("1:02:03").unwrap(), 3723);
      assert!(parse_clock("99999999999999999999:00").is_err());
      assert!(parse_clock(&format!("{}:00", u64::MAX)).is_err());
      assert!(parse_clock("1:2:3:4").is_err());
      assert!(parse_clock("05").is_err());
      assert!(parse_clock("-00:05").is_err());
   }

   #[test]
   fn time_budget_renders_padded() {
      let limits = parse_time_spec("05:00//00:30").unwrap();
      assert_eq!(limits.to_string(), "05:00/00:00/00:30");
   }

   #[test]
   fn game_request() {
      let line = format!("/os: + t 12345 r opponent1 05:00/00:00/00:00 s8r8 0 1 {}", ME);
      assert_eq!(
         classify(&line, ME).unwrap(),
         MatchEvent::GameRequest {
            request_id: "12345".into(),
            opponent: "opponent1".into(),
            time_limits: TimeBudget {
               main: 300,
               secondary: 0,
               byoyomi: 0
            },
            game_type: "s8r8".into(),
         }
      );
      let line = format!("/os: + .4567 1650.0 opponent1 05:00//02:00 s8r18 R 0 {}", ME);
      match classify(&line, ME).unwrap() {
         MatchEvent::GameRequest {
            request_id,
            time_limits,
            game_type,
            ..
         } => {
            assert_eq!(request_id, ".4567");
            assert_eq!(time_limits.byoyomi, 120);
            assert_eq!(game_type, "s8r18");
         }
         other => panic!("expected a request, got {:?}", other),
      }
   }

   #[test]
   fn request_for_someone_else_is_not_ours() {
      let line = "/os: + .4567 1650.0 opponent1 05:00//02:00 s8r18 R 0 someoneelse";
      assert_eq!(classify(line, ME).unwrap(), MatchEvent::Unknown);
   }

   #[test]
   fn malformed_request_downgrades_to_unknown() {
      let frame = format!("/os: + .4567 1650.0 opponent1 5min s8r18 R 0 {}\nREADY", ME);
      assert!(classify(admin_line(&frame).unwrap(), ME).is_err());
      assert_eq!(parse_event(&frame, ME), MatchEvent::Unknown);
   }

   #[test]
   fn lifecycle_lines() {
      assert_eq!(
         classify("/os: + match .12 1800.3 nyanyan 1650.0 opponent1 s8r18 R", ME).unwrap(),
         MatchEvent::GameStarted {
            match_id: ".12".into()
         }
      );
      assert_eq!(classify("/os: end .12 nyanyan 40 24", ME).unwrap(), MatchEvent::GameEnded);
      assert_eq!(classify("/os: - match .12 aborted", ME).unwrap(), MatchEvent::GameTerminated);
      assert_eq!(
         classify("/os: update .12.1 s8r18 K?", ME).unwrap(),
         MatchEvent::BoardUpdate {
            raw_match_id: ".12.1".into()
         }
      );
      assert_eq!(
         classify("/os: join .12 s8r18", ME).unwrap(),
         MatchEvent::BoardUpdate {
            raw_match_id: ".12".into()
         }
      );
      assert_eq!(classify("/os: update", ME).unwrap(), MatchEvent::Unknown);
      assert_eq!(classify("/os: + match", ME).unwrap(), MatchEvent::Unknown);
   }

   #[test]
   fn frames_without_admin_line() {
      assert_eq!(parse_event("|hello\nREADY", ME), MatchEvent::Unknown);
      assert_eq!(parse_event("", ME), MatchEvent::Unknown);
      let frame = "some chatter\r\n/os: end .12 x\r\nREADY";
      assert_eq!(admin_line(frame), Some("/os: end .12 x"));
      assert_eq!(parse_event(frame, ME), MatchEvent::GameEnded);
   }

   #[test]
   fn synchro_suffix() {
      assert_eq!(strip_synchro_suffix(".12.1"), ".12");
      assert_eq!(strip_synchro_suffix(".12"), ".12");
      assert_eq!(strip_synchro_suffix("A"), "A");
      assert_eq!(strip_synchro_suffix("a.b.c.d"), "a.b.c.d");
      for id in [".12.1", ".12", "A", "7.3.0", "x.y"] {
         let once = strip_synchro_suffix(id);
         assert_eq!(strip_synchro_suffix(once), once);
      }
   }

   #[test]
   fn outgoing_commands() {
      let limits = TimeBudget {
         main: 300,
         secondary: 0,
         byoyomi: 120,
      };
      let ask = ServerCommand::Ask {
         game_type: "s8r18",
         time_limits: limits,
         user: "opponent1",
      };
      assert_eq!(ask.to_string(), "ts ask s8r18 05:00/00:00/02:00 opponent1");
      assert_eq!(ServerCommand::Accept("12345").to_string(), "ts accept 12345");
      let response: EngineResponse = "f5 -2".parse().unwrap();
      let play = ServerCommand::Play {
         match_id: ".12.1",
         response: &response,
      };
      assert_eq!(play.to_string(), "t /os play .12.1 f5/-2");
      assert_eq!(ServerCommand::MonitorOs.to_string(), "ms /os");
      assert_eq!(ServerCommand::ClientMode.to_string(), "ts client -");
   }
}
