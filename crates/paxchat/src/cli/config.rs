//! `paxchat-node config` — validates and dumps a node's effective TOML
//! config without starting it.

use std::path::PathBuf;

use clap::Parser;

use crate::config::NodeSettings;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(long)]
    pub dump_toml: bool,
}

pub fn execute(args: Args) -> anyhow::Result<()> {
    let settings = NodeSettings::from_file(&args.config)?;
    settings.validate()?;

    if args.dump_toml {
        println!("{}", toml::to_string_pretty(&settings)?);
    } else {
        println!("valid configuration: {}", args.config.display());
        println!("  id: {}", settings.id);
        println!("  target: {}:{}", settings.target_host, settings.target_port);
        println!("  num_servers: {}", settings.num_servers);
    }

    Ok(())
}
