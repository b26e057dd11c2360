use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, Parser, Subcommand};

use crate::form::FormStep;

const DATA_DIR_NAME: &str = ".brewlog";

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Parser)]
#[command(name = "brewlog")]
#[command(bin_name = "brewlog")]
#[command(version)]
#[command(about = "A journal for hand-brewed coffee")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        long,
        env = "BREWLOG_DATA_DIR",
        help = "Directory holding brewlog.sqlite3 and settings.json (default: ~/.brewlog)."
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long,
        help = "Keep entries in memory for this run only. Settings still use the data dir."
    )]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// `$HOME/.brewlog`, or `.brewlog` in the working directory when no home is
/// set.
pub fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DATA_DIR_NAME),
        _ => PathBuf::from(DATA_DIR_NAME),
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "List entries, newest first.")]
    List(ListArgs),
    #[command(about = "Show one entry with its pour breakdown.")]
    Show(ShowArgs),
    #[command(about = "Record an entry by hand.")]
    Add(AddArgs),
    #[command(about = "Edit fields of an existing entry.")]
    Edit(EditArgs),
    #[command(about = "Delete an entry.")]
    Delete(DeleteArgs),
    #[command(about = "Show summary statistics.")]
    Stats(StatsArgs),
    #[command(about = "Time a brew interactively, then save it.")]
    Brew(BrewArgs),
    #[command(about = "Show or change brew timer settings.")]
    Settings(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(
        long,
        value_name = "TEXT",
        help = "Only entries whose bean type contains TEXT, ignoring case."
    )]
    pub search: Option<String>,

    #[arg(long, help = "Print JSON instead of a table.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Entry id.")]
    pub id: String,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(help = "Entry id.")]
    pub id: String,
}

/// Parses `TIME:GRAMS`, e.g. `30:120` for 120 g poured at 30 s.
pub fn parse_step(raw: &str) -> Result<FormStep, String> {
    let (time, grams) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected TIME:GRAMS, got '{raw}'"))?;
    let time = time
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid step time '{}'", time.trim()))?;
    let grams = grams
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid step grams '{}'", grams.trim()))?;
    Ok(FormStep { time, grams })
}

#[derive(Debug, Args)]
pub struct TasteArgs {
    #[arg(long, help = "Acidity rating, 1-5.")]
    pub acidity: Option<String>,

    #[arg(long, help = "Sweetness rating, 1-5.")]
    pub sweetness: Option<String>,

    #[arg(long, help = "Bitterness rating, 1-5.")]
    pub bitterness: Option<String>,

    #[arg(long, help = "Aroma rating, 1-5.")]
    pub aroma: Option<String>,

    #[arg(long, help = "Overall rating, 1-5.")]
    pub overall: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long, help = "Bean type or origin.")]
    pub bean: String,

    #[arg(long = "temp", help = "Water temperature in °C.")]
    pub temperature: String,

    #[arg(long, help = "Dose in grams.")]
    pub bean_amount: String,

    #[arg(
        long = "step",
        value_name = "TIME:GRAMS",
        value_parser = parse_step,
        help = "Pour at TIME seconds of GRAMS grams. Repeat in pour order."
    )]
    pub steps: Vec<FormStep>,

    #[command(flatten)]
    pub taste: TasteArgs,

    #[arg(long, help = "Free-text tasting notes.")]
    pub notes: Option<String>,

    #[arg(long, help = "Brew time as RFC 3339 (default: now).")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(help = "Entry id.")]
    pub id: String,

    #[arg(long, help = "Bean type or origin.")]
    pub bean: Option<String>,

    #[arg(long = "temp", help = "Water temperature in °C.")]
    pub temperature: Option<String>,

    #[arg(long, help = "Dose in grams.")]
    pub bean_amount: Option<String>,

    #[arg(
        long = "step",
        value_name = "TIME:GRAMS",
        value_parser = parse_step,
        help = "Replace all pours. Repeat in pour order."
    )]
    pub steps: Vec<FormStep>,

    #[command(flatten)]
    pub taste: TasteArgs,

    #[arg(long, help = "Replace the tasting notes.")]
    pub notes: Option<String>,
}

#[derive(Debug, Args)]
pub struct BrewArgs {
    #[arg(long, help = "Bean type or origin.")]
    pub bean: String,

    #[arg(long, help = "Dose in grams.")]
    pub bean_amount: String,

    #[arg(long = "temp", help = "Water temperature in °C.")]
    pub temperature: String,

    #[arg(long, help = "Bloom pour in grams, recorded at 0 s.")]
    pub bloom: Option<String>,

    #[arg(long, help = "Tasting notes to save with the entry.")]
    pub notes: Option<String>,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[arg(
        long,
        value_name = "GRAMS",
        value_delimiter = ',',
        allow_hyphen_values = true,
        conflicts_with = "reset",
        help = "Comma-separated pour adjustments, e.g. 100,50,10,-10."
    )]
    pub increments: Option<Vec<f64>>,

    #[arg(
        long,
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(1..),
        conflicts_with = "reset",
        help = "Timer display tick in milliseconds."
    )]
    pub tick_ms: Option<u64>,

    #[arg(long, help = "Restore the default settings.")]
    pub reset: bool,

    #[arg(long, help = "Print JSON instead of text.")]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(args)
    }

    #[test]
    fn add_collects_repeated_steps_in_order() {
        let cli = parse(&[
            "brewlog",
            "add",
            "--bean",
            "Kenya",
            "--temp",
            "92",
            "--bean-amount",
            "15",
            "--step",
            "0:40",
            "--step",
            "35:180",
            "--overall",
            "4",
        ]);
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.bean, "Kenya");
                assert_eq!(
                    args.steps,
                    vec![
                        FormStep {
                            time: 0,
                            grams: 40.0
                        },
                        FormStep {
                            time: 35,
                            grams: 180.0
                        },
                    ]
                );
                assert_eq!(args.taste.overall.as_deref(), Some("4"));
                assert!(args.taste.acidity.is_none());
                assert!(args.date.is_none());
            }
            other => panic!("expected Add, got {:?}", other),
        }
    }

    #[test]
    fn step_parser_rejects_malformed_values() {
        assert!(parse_step("30").is_err());
        assert!(parse_step("a:10").is_err());
        assert!(parse_step("10:b").is_err());
        assert_eq!(
            parse_step(" 12 : 50.5 "),
            Ok(FormStep {
                time: 12,
                grams: 50.5
            })
        );
    }

    #[test]
    fn global_flags_parse_before_the_subcommand() {
        let cli = parse(&["brewlog", "--data-dir", "/tmp/beans", "--ephemeral", "stats"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/beans")));
        assert!(cli.ephemeral);
        assert!(matches!(cli.command, Commands::Stats(StatsArgs { json: false })));
    }

    #[test]
    fn brew_accepts_optional_bloom() {
        let cli = parse(&[
            "brewlog",
            "brew",
            "--bean",
            "Rwanda",
            "--bean-amount",
            "12",
            "--temp",
            "90",
            "--bloom",
            "30",
        ]);
        match cli.command {
            Commands::Brew(args) => {
                assert_eq!(args.bloom.as_deref(), Some("30"));
                assert!(args.notes.is_none());
            }
            other => panic!("expected Brew, got {:?}", other),
        }
    }

    #[test]
    fn list_takes_an_optional_search() {
        let cli = parse(&["brewlog", "list", "--search", "kenya"]);
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.search.as_deref(), Some("kenya"));
                assert!(!args.json);
            }
            other => panic!("expected List, got {:?}", other),
        }
        let cli = parse(&["brewlog", "list"]);
        assert!(matches!(
            cli.command,
            Commands::List(ListArgs { search: None, .. })
        ));
    }

    #[test]
    fn settings_splits_increments_and_accepts_negatives() {
        let cli = parse(&[
            "brewlog",
            "settings",
            "--increments",
            "-10,25,5",
            "--tick-ms",
            "200",
        ]);
        match cli.command {
            Commands::Settings(args) => {
                assert_eq!(args.increments, Some(vec![-10.0, 25.0, 5.0]));
                assert_eq!(args.tick_ms, Some(200));
                assert!(!args.reset);
            }
            other => panic!("expected Settings, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["brewlog", "settings", "--tick-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["brewlog", "settings", "--reset", "--tick-ms", "5"]).is_err());
    }

    #[test]
    fn show_requires_an_id() {
        assert!(Cli::try_parse_from(["brewlog", "show"]).is_err());
    }
}
