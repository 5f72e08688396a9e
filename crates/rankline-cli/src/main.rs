use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rankline_core::BestScore;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "rankline")]
#[command(about = "Leaderboard session client")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session against the loopback service and submit scores
    Play {
        #[arg(short, long, default_value = "rankline.toml")]
        config: PathBuf,

        /// Override the configured game secret
        #[arg(long, env = "RANKLINE_GAME_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Score already stored on the loopback board, as RESULT,MINOR,LEVEL
        #[arg(long, value_parser = parse_score)]
        seed: Option<BestScore>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Seconds to wait for each event
        #[arg(long, default_value_t = 5)]
        timeout: u64,

        /// Scores to submit in order, each as RESULT,MINOR,LEVEL
        #[arg(value_parser = parse_score)]
        scores: Vec<BestScore>,
    },
    /// Print the resolved configuration
    CheckConfig {
        #[arg(short, long, default_value = "rankline.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rankline=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Play {
            config,
            secret,
            seed,
            json,
            timeout,
            scores,
        } => {
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Console
            };
            commands::play::run(commands::play::PlayOptions {
                config_path: &config,
                secret,
                seed,
                format,
                timeout_secs: timeout,
                scores: &scores,
            })
        }
        Command::CheckConfig { config } => commands::check_config::run(&config),
    }
}

/// Parse `RESULT,MINOR,LEVEL`; missing trailing parts default to zero
fn parse_score(value: &str) -> std::result::Result<BestScore, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.is_empty() || parts.len() > 3 || parts[0].is_empty() {
        return Err(format!(
            "expected RESULT[,MINOR[,LEVEL]], got {:?}",
            value
        ));
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|e| format!("invalid number {:?}: {}", part, e))?;
    }

    Ok(BestScore::new(numbers[0], numbers[1], numbers[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_full() {
        assert_eq!(parse_score("150,0,4").unwrap(), BestScore::new(150, 0, 4));
        assert_eq!(parse_score(" 7 , 2 ,1").unwrap(), BestScore::new(7, 2, 1));
    }

    #[test]
    fn test_parse_score_defaults() {
        assert_eq!(parse_score("150").unwrap(), BestScore::new(150, 0, 0));
        assert_eq!(parse_score("150,3").unwrap(), BestScore::new(150, 3, 0));
    }

    #[test]
    fn test_parse_score_invalid() {
        assert!(parse_score("").is_err());
        assert!(parse_score("a,b").is_err());
        assert!(parse_score("1,2,3,4").is_err());
        assert!(parse_score("-1").is_err());
    }

    #[test]
    fn test_args_parse_play() {
        let args = Args::try_parse_from([
            "rankline", "play", "--seed", "100,2,3", "--json", "150,0,4", "90",
        ])
        .unwrap();
        match args.command {
            Command::Play {
                seed, json, scores, ..
            } => {
                assert_eq!(seed, Some(BestScore::new(100, 2, 3)));
                assert!(json);
                assert_eq!(scores.len(), 2);
            }
            Command::CheckConfig { .. } => panic!("expected play"),
        }
    }
}
