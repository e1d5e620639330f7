mod config;
mod ggs;

use structopt::StructOpt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
   pretty_env_logger::init();
   let opt = config::Opt::from_args();
   let settings = config::Settings::resolve(opt)?;
   ggs::run(settings).await
}
