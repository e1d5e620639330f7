use anyhow::{anyhow, Context};
use ggsbridge_lib::protocol::{parse_time_spec, TimeBudget};
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use structopt::StructOpt;

const PASSWORD_VAR: &str = "GGS_PASSWORD";

/// Plays Othello on GGS with a local search engine
#[derive(StructOpt, Debug)]
#[structopt(name = "ggsbridge")]
pub struct Opt {
   /// JSON file with any of "id", "password", "server" and "port"
   #[structopt(short = "c", long = "config", parse(from_os_str))]
   pub config: Option<PathBuf>,
   /// Server host name
   #[structopt(short = "s", long = "server")]
   pub server: Option<String>,
   /// Server port
   #[structopt(short = "p", long = "port")]
   pub port: Option<u16>,
   /// Login id on the server
   #[structopt(short = "i", long = "id")]
   pub id: Option<String>,
   /// Engine executable
   #[structopt(short = "e", long = "engine", parse(from_os_str))]
   pub engine: PathBuf,
   /// Engine argument, repeatable. Replaces the default search flags when given
   #[structopt(long = "engine-arg", allow_hyphen_values = true, number_of_values = 1)]
   pub engine_args: Vec<String>,
   /// Engine search threads
   #[structopt(short = "t", long = "threads", default_value = "8")]
   pub threads: u32,
   /// Engine hash table size (log2 of entries)
   #[structopt(long = "hash", default_value = "27")]
   pub hash: u32,
   /// Log file for the engine's own output
   #[structopt(long = "engine-log", parse(from_os_str))]
   pub engine_log: Option<PathBuf>,
   /// Seconds to wait for a complete server frame; waits forever when absent
   #[structopt(long = "frame-timeout")]
   pub frame_timeout: Option<u64>,
   /// Seconds to wait for the engine's move; 0 waits forever
   #[structopt(long = "engine-timeout", default_value = "600")]
   pub engine_timeout: u64,
   /// Game type to request while idle, e.g. s8r18
   #[structopt(long = "ask")]
   pub ask: Option<String>,
   /// Time limits for requested games, as mm:ss/mm:ss/mm:ss
   #[structopt(long = "ask-time", default_value = "05:00/00:00/00:00")]
   pub ask_time: String,
   /// Player to request games from
   #[structopt(long = "ask-user")]
   pub ask_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
   pub id: Option<String>,
   pub password: Option<String>,
   pub server: Option<String>,
   pub port: Option<u16>,
}

impl Credentials {
   pub fn load(path: &Path) -> anyhow::Result<Credentials> {
      let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
      serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
   }
}

#[derive(Debug, Clone)]
pub struct AskRequest {
   pub game_type: String,
   pub time_limits: TimeBudget,
   pub user: String,
}

#[derive(Debug)]
pub struct Settings {
   pub server: String,
   pub port: u16,
   pub id: String,
   pub password: String,
   pub engine: PathBuf,
   pub engine_args: Vec<String>,
   pub frame_timeout: Option<Duration>,
   pub engine_timeout: Option<Duration>,
   pub ask: Option<AskRequest>,
}

impl Settings {
   /// Merges command line and credentials file; the command line wins.
   pub fn resolve(opt: Opt) -> anyhow::Result<Settings> {
      let file = match &opt.config {
         Some(path) => Credentials::load(path)?,
         None => Credentials::default(),
      };
      let server = opt
         .server
         .or(file.server)
         .ok_or_else(|| anyhow!("no server given (--server or config file)"))?;
      let port = opt
         .port
         .or(file.port)
         .ok_or_else(|| anyhow!("no port given (--port or config file)"))?;
      let id = opt
         .id
         .or(file.id)
         .ok_or_else(|| anyhow!("no login id given (--id or config file)"))?;
      let password = match file.password.or_else(password_from_env) {
         Some(password) => password,
         None => read_password().context("reading password from stdin")?,
      };

      let engine_args = if opt.engine_args.is_empty() {
         default_engine_args(opt.threads, opt.hash, opt.engine_log.as_deref())
      } else {
         opt.engine_args
      };

      let ask = match opt.ask {
         Some(game_type) => Some(AskRequest {
            game_type,
            time_limits: parse_time_spec(&opt.ask_time).context("parsing --ask-time")?,
            user: opt
               .ask_user
               .ok_or_else(|| anyhow!("--ask needs --ask-user"))?,
         }),
         None => None,
      };

      Ok(Settings {
         server,
         port,
         id,
         password,
         engine: opt.engine,
         engine_args,
         frame_timeout: opt.frame_timeout.map(Duration::from_secs),
         engine_timeout: match opt.engine_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
         },
         ask,
      })
   }
}

fn password_from_env() -> Option<String> {
   match env::var(PASSWORD_VAR) {
      Ok(password) => {
         info!("Found GGS password in environment, using that and proceeding.");
         Some(password)
      }
      Err(env::VarError::NotPresent) => None,
      Err(env::VarError::NotUnicode(_)) => {
         warn!("GGS password environment variable found, but with invalid unicode. Ignoring.");
         None
      }
   }
}

fn read_password() -> Result<String, std::io::Error> {
   let mut line_buf = String::new();

   println!("GGS password: ");

   let _ = std::io::stdin().read_line(&mut line_buf)?;
   let trimmed = line_buf.trim_end_matches(|c| c == '\r' || c == '\n').len();
   line_buf.truncate(trimmed);

   Ok(line_buf)
}

pub fn default_engine_args(threads: u32, hash: u32, log: Option<&Path>) -> Vec<String> {
   let mut args: Vec<String> = vec!["-t".into(), threads.to_string()];
   for flag in ["-quiet", "-noise", "-ponder", "-showvalue", "-noautopass"] {
      args.push(flag.into());
   }
   args.push("-hash".into());
   args.push(hash.to_string());
   if let Some(log) = log {
      args.push("-logfile".into());
      args.push(log.display().to_string());
   }
   args
}
