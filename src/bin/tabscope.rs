use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use tabscope::common::config::{self, Config};
use tabscope::common::log::{DEFAULT_FILTER, init_logging};
use tabscope::layout_engine::GridLayout;
use tabscope::replay::{self, Scenario};
use tabscope::sys::geometry::Rect;
use tracing::debug;

#[derive(Parser)]
#[command(name = "tabscope", version, about = "Window switcher core: layout preview and session replay")]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cells the switcher would use for COUNT windows.
    Layout {
        #[arg(long)]
        count: usize,
        /// A monitor work area as X,Y,WIDTH,HEIGHT. Repeat for more monitors,
        /// primary first.
        #[arg(long = "monitor", value_parser = parse_rect, required = true)]
        monitors: Vec<Rect>,
        #[arg(long)]
        json: bool,
    },
    /// Run a RON scenario against the headless platform and print a JSON report.
    Replay {
        scenario: PathBuf,
    },
    /// Print the effective configuration.
    Config,
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts[..] {
        [x, y, width, height] if width >= 0 && height >= 0 => Ok(Rect::new(x, y, width, height)),
        [_, _, _, _] => Err("width and height must not be negative".into()),
        _ => Err(format!("expected X,Y,WIDTH,HEIGHT, got {s:?}")),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path.or_else(config::config_file) else {
        debug!("no config directory, using defaults");
        return Ok(Config::default());
    };
    Config::read(&path).with_context(|| format!("loading config from {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = match cli.verbose {
        0 => DEFAULT_FILTER,
        1 => "tabscope=debug",
        _ => "tabscope=trace",
    };
    init_logging(filter);

    let config = load_config(cli.config)?;
    match cli.command {
        Command::Layout { count, monitors, json } => {
            let rects = GridLayout::from(config.settings.layout).compute(count, &monitors)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&rects)?);
            } else {
                for (i, r) in rects.iter().enumerate() {
                    println!("{}\t{}\t{}\t{}\t{}", i + 1, r.x, r.y, r.width, r.height);
                }
            }
        }
        Command::Replay { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let report = replay::run(&scenario, &config);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.leaked > 0 || report.invalid_releases > 0 {
                bail!(
                    "{} native resources leaked, {} invalid releases",
                    report.leaked,
                    report.invalid_releases
                );
            }
        }
        Command::Config => print!("{}", config.to_toml()),
    }
    Ok(())
}
