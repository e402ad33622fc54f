mod config;
mod session;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use dtm_core::arith::{
    continued_fraction_value, convergence_table, convergent_phi, fibonacci, fibonacci_prefix_len,
    parse_number_list, phi, MAX_CONVERGENCE_STEPS,
};
use dtm_core::event::HEADER;
use dtm_core::gate::fibonacci_scoreboard;
use dtm_core::lessons::PART_C;
use dtm_core::log::{read_or_empty, record, UnavailableLog};
use dtm_core::machine::checkpoint_overview;
use dtm_core::{
    AnswerRule, BusProblem, Catalog, FibonacciTable, InteractionEvent, InteractionLog,
    QuizMachine, Roster,
};
use dtm_store::{MirroredLog, SqliteLog, TsvLog};

use config::Config;
use session::Session;

#[derive(Parser)]
#[command(
    name = "dtm",
    version,
    about = "Dragon Tail Math - golden ratio and logic lessons for two students"
)]
struct Cli {
    /// Path to the SQLite interaction log
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the nth Fibonacci number and the nth convergent of phi
    Fib {
        /// Index (1-based)
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },

    /// Show phi and how 1 + 1/x converges to it
    Phi {
        /// Number of iterations to show
        #[arg(
            short,
            long,
            default_value = "10",
            value_parser = clap::value_parser!(u64).range(0..=MAX_CONVERGENCE_STEPS as u64)
        )]
        steps: u64,
    },

    /// Work through the bus-ride sequence with and without the mistake
    Bus,

    /// Start an interactive lesson
    Play {
        /// Student name (must be on the roster)
        #[arg(short, long)]
        student: String,
    },

    /// List as many Fibonacci numbers as you can, comma-separated
    Challenge {
        /// Student name (must be on the roster)
        #[arg(short, long)]
        student: String,

        /// The list, e.g. "1, 1, 2, 3, 5"
        numbers: String,
    },

    /// Show which checkpoints each student has passed
    Status,

    /// Best Fibonacci listing per student
    Scoreboard,

    /// Print the most recent interactions
    Log {
        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Show interaction log statistics
    Stats,

    /// Outline the active lesson catalog
    Catalog,

    /// Show the resolved configuration
    Config,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "dtm", "dtm")
        .map(|dirs| dirs.data_dir().join("interactions.db"))
        .unwrap_or_else(|| PathBuf::from("interactions.db"))
}

fn db_path(cfg: &Config, db: Option<PathBuf>) -> PathBuf {
    db.or_else(|| cfg.store.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn local_log_path(cfg: &Config, db: &Path) -> PathBuf {
    match &cfg.local_log.path {
        Some(p) => PathBuf::from(p),
        None => db
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("interactions.tsv"),
    }
}

/// Opens the shared log, degrading to "unavailable" instead of failing.
fn open_log(cfg: &Config, db: Option<PathBuf>) -> Box<dyn InteractionLog> {
    let path = db_path(cfg, db);

    let remote: Box<dyn InteractionLog> = if cfg.store.enabled {
        let timeout = Duration::from_millis(cfg.store.busy_timeout_ms);
        match SqliteLog::with_busy_timeout(&path, timeout) {
            Ok(log) => Box::new(log),
            Err(e) => {
                tracing::warn!(path = %path.display(), "shared log unavailable: {e}");
                Box::new(UnavailableLog)
            }
        }
    } else {
        Box::new(UnavailableLog)
    };

    if cfg.local_log.enabled {
        Box::new(MirroredLog::new(
            TsvLog::new(local_log_path(cfg, &path)),
            remote,
        ))
    } else {
        remote
    }
}

fn check_student(roster: &Roster, student: &str) -> Result<()> {
    if !roster.contains(student) {
        bail!(
            "unknown student {student:?}; expected one of: {}",
            roster.names().join(", ")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fib { n } => cmd_fib(n),
        Commands::Phi { steps } => cmd_phi(usize::try_from(steps)?),
        Commands::Bus => cmd_bus(),
        Commands::Play { student } => {
            let roster = cfg.roster.roster()?;
            check_student(&roster, &student)?;
            let catalog = cfg.session.load_catalog()?;
            let log = open_log(&cfg, cli.db);
            cmd_play(&cfg, &catalog, &roster, log.as_ref(), &student)
        }
        Commands::Challenge { student, numbers } => {
            let roster = cfg.roster.roster()?;
            check_student(&roster, &student)?;
            let catalog = cfg.session.load_catalog()?;
            let log = open_log(&cfg, cli.db);
            cmd_challenge(&catalog, &roster, log.as_ref(), &student, &numbers)
        }
        Commands::Status => {
            let roster = cfg.roster.roster()?;
            let catalog = cfg.session.load_catalog()?;
            let log = open_log(&cfg, cli.db);
            cmd_status(&catalog, &roster, log.as_ref())
        }
        Commands::Scoreboard => {
            let roster = cfg.roster.roster()?;
            let log = open_log(&cfg, cli.db);
            cmd_scoreboard(&roster, log.as_ref())
        }
        Commands::Log { limit, json } => {
            let log = open_log(&cfg, cli.db);
            cmd_log(log.as_ref(), limit, json)
        }
        Commands::Stats => {
            let log = open_log(&cfg, cli.db);
            cmd_stats(log.as_ref())
        }
        Commands::Catalog => {
            let catalog = cfg.session.load_catalog()?;
            cmd_catalog(&catalog)
        }
        Commands::Config => cmd_config(&cfg, cli.config.as_deref(), cli.db),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_fib(n: i64) -> Result<()> {
    let value = fibonacci(n);
    if value == u128::MAX {
        println!("F({n}) is too large to represent (saturated)");
    } else {
        println!("F({n}) = {value}");
    }
    println!("F({})/F({n}) = {:.12}", n.saturating_add(1), convergent_phi(n));
    Ok(())
}

fn cmd_phi(steps: usize) -> Result<()> {
    println!("phi = (1 + sqrt(5))/2 = {:.15}", phi());
    println!();
    println!("{:<6} {:<20} Distance", "Step", "x");
    println!("{}", "-".repeat(44));
    for row in convergence_table(steps) {
        println!("{:<6} {:<20.15} {:.3e}", row.step, row.value, row.distance);
    }
    println!();
    println!(
        "Dragon tail {} layers deep: {:.15}",
        steps + 1,
        continued_fraction_value(steps as i64 + 1)
    );
    Ok(())
}

fn cmd_bus() -> Result<()> {
    let bus = BusProblem::default();
    let correct = bus.sequence();
    let perturbed = bus.perturbed_sequence();

    println!("{:<8} {:>10} {:>10}", "Teacher", "Correct", "Said");
    println!("{}", "-".repeat(30));
    for (i, (c, p)) in correct.iter().zip(&perturbed).enumerate() {
        let marker = if i == bus.error_index { "  <- mistake" } else { "" };
        println!("{:<8} {c:>10} {p:>10}{marker}", i + 1);
    }
    println!();
    println!(
        "The {}th number should have been {} larger.",
        bus.length,
        bus.final_difference()
    );
    Ok(())
}

fn cmd_play(
    cfg: &Config,
    catalog: &Catalog,
    roster: &Roster,
    log: &dyn InteractionLog,
    student: &str,
) -> Result<()> {
    let machine = QuizMachine::new(catalog, roster, student)?
        .log_incorrect(cfg.session.log_incorrect_answers);
    let stdin = io::stdin();
    let state = Session::new(machine, log, stdin.lock(), io::stdout()).run()?;
    tracing::debug!(
        completed = state.completed.len(),
        finished = state.finished,
        "session ended"
    );
    Ok(())
}

/// Opens once both students have earned the Part C reward. Catalogs without
/// a Part C leave the challenge open.
fn cmd_challenge(
    catalog: &Catalog,
    roster: &Roster,
    log: &dyn InteractionLog,
    student: &str,
    numbers: &str,
) -> Result<()> {
    let machine = QuizMachine::new(catalog, roster, student)?;
    if let Some(part_c) = catalog.module_index(PART_C) {
        let missing = machine.missing_for_reward(&read_or_empty(log), part_c);
        if !missing.is_empty() {
            bail!(
                "the Fibonacci challenge is locked until both students finish: {}",
                missing.join(", ")
            );
        }
    }

    let numbers = parse_number_list(numbers).context("could not read the list")?;
    if numbers.is_empty() {
        bail!("no numbers given");
    }
    let mut table = FibonacciTable::new();
    let count = fibonacci_prefix_len(&numbers, &mut table);

    if count == numbers.len() {
        println!("All {count} numbers are correct Fibonacci numbers!");
    } else {
        println!(
            "The first {count} numbers are correct; number {} should have been {}.",
            count + 1,
            table.get(count as i64 + 1)
        );
    }

    let event = InteractionEvent::fibonacci_challenge(student, PART_C, count);
    if !record(log, &event) {
        println!("(not saved to the interaction log)");
    }
    Ok(())
}

fn cmd_status(catalog: &Catalog, roster: &Roster, log: &dyn InteractionLog) -> Result<()> {
    let overview = checkpoint_overview(catalog, roster, &read_or_empty(log));
    if overview.is_empty() {
        println!("{} has no checkpoints; every section is open.", catalog.title);
        return Ok(());
    }

    let mark = |done: bool| if done { "yes" } else { "-" };
    println!(
        "{:<12} {:<8} {:<8} Unlocked",
        "Checkpoint", roster.first, roster.second
    );
    println!("{}", "-".repeat(44));
    for progress in &overview {
        println!(
            "{:<12} {:<8} {:<8} {}",
            progress.checkpoint.name,
            mark(progress.status.first_completed),
            mark(progress.status.second_completed),
            mark(progress.status.both_completed)
        );
    }
    Ok(())
}

fn cmd_scoreboard(roster: &Roster, log: &dyn InteractionLog) -> Result<()> {
    let board = fibonacci_scoreboard(&read_or_empty(log), roster, PART_C);
    println!("Fibonacci challenge, best run");
    println!("  {:<10} {}", roster.first, board.first_best);
    println!("  {:<10} {}", roster.second, board.second_best);
    Ok(())
}

fn cmd_log(log: &dyn InteractionLog, limit: usize, json: bool) -> Result<()> {
    let recent = log.recent(limit).context("failed to read interaction log")?;

    if json {
        for event in &recent {
            println!("{}", event.to_json()?);
        }
        return Ok(());
    }

    if recent.is_empty() {
        println!("No interactions yet.");
        return Ok(());
    }
    println!("{}", HEADER.join("\t"));
    for event in &recent {
        println!("{}", event.to_row().join("\t"));
    }
    Ok(())
}

fn cmd_stats(log: &dyn InteractionLog) -> Result<()> {
    let stats = log.stats().context("failed to read interaction log")?;
    println!("Interactions: {}", stats.total_events);
    println!("Students:     {}", stats.total_participants);
    if let Some(oldest) = stats.oldest_event {
        println!("Oldest:       {}", oldest.format("%Y-%m-%d %H:%M"));
    }
    if let Some(newest) = stats.newest_event {
        println!("Newest:       {}", newest.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn cmd_catalog(catalog: &Catalog) -> Result<()> {
    println!("{} ({})", catalog.title, catalog.name);
    for (m, module) in catalog.modules.iter().enumerate() {
        println!();
        println!("{}. {}", m + 1, module.section);
        for (s, sub) in module.subproblems.iter().enumerate() {
            let kind = match &sub.rule {
                AnswerRule::ExactChoice { .. } => "choice",
                AnswerRule::AcceptedForms { .. } => "fraction",
                AnswerRule::KeywordThreshold { .. } => "free text",
                AnswerRule::Integer { .. } => "number",
            };
            let gate = if sub.requires.is_empty() {
                String::new()
            } else {
                format!("  [needs {}]", sub.requires.join(", "))
            };
            println!("   {}.{} {} ({kind}){gate}", m + 1, s + 1, sub.key);
        }
        if let Some(reward) = &module.reward {
            println!("   reward: {}", reward.title);
        }
    }
    Ok(())
}

fn cmd_config(cfg: &Config, explicit: Option<&Path>, db: Option<PathBuf>) -> Result<()> {
    let path = db_path(cfg, db);
    println!("Config: {}", config::show_config_path(explicit));
    println!();
    println!("[store]");
    println!("  path = {}", path.display());
    println!("  busy_timeout_ms = {}", cfg.store.busy_timeout_ms);
    println!("  enabled = {}", cfg.store.enabled);
    println!();
    println!("[local_log]");
    println!("  enabled = {}", cfg.local_log.enabled);
    println!("  path = {}", local_log_path(cfg, &path).display());
    println!();
    println!("[roster]");
    println!("  participants = {}", cfg.roster.participants.join(", "));
    println!();
    println!("[session]");
    println!("  catalog = {}", cfg.session.catalog);
    println!(
        "  log_incorrect_answers = {}",
        cfg.session.log_incorrect_answers
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtm_core::{lessons, MemoryLog, ProgressState};

    /// Both students solve Part C, which opens the Fibonacci challenge.
    fn solve_part_c(catalog: &Catalog, roster: &Roster, log: &dyn InteractionLog) {
        for name in roster.names() {
            let machine = QuizMachine::new(catalog, roster, name).unwrap();
            let mut state = ProgressState::default();
            machine.jump_to(&mut state, log, 1, 0).unwrap();
            for answer in ["3/2", "5/3", "21/13"] {
                machine.submit(&mut state, log, answer).unwrap();
            }
        }
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["dtm", "--db", "/tmp/x.db", "play", "--student", "Soren"])
            .unwrap();
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
        assert!(matches!(cli.command, Commands::Play { ref student } if student == "Soren"));

        let cli = Cli::try_parse_from(["dtm", "fib", "-3"]).unwrap();
        assert!(matches!(cli.command, Commands::Fib { n: -3 }));
    }

    #[test]
    fn test_phi_steps_are_bounded() {
        let cli = Cli::try_parse_from(["dtm", "phi", "--steps", "15"]).unwrap();
        assert!(matches!(cli.command, Commands::Phi { steps: 15 }));
        assert!(Cli::try_parse_from(["dtm", "phi", "--steps", "18446744073709551615"]).is_err());
        assert!(Cli::try_parse_from(["dtm", "phi", "--steps", "101"]).is_err());
    }

    #[test]
    fn test_check_student() {
        let roster = Roster::default();
        assert!(check_student(&roster, "Ayushi").is_ok());
        assert!(check_student(&roster, "Eve").is_err());
    }

    #[test]
    fn test_local_log_defaults_next_to_db() {
        let cfg = Config::default();
        let path = local_log_path(&cfg, Path::new("/data/dtm/interactions.db"));
        assert_eq!(path, PathBuf::from("/data/dtm/interactions.tsv"));
    }

    #[test]
    fn test_open_log_mirrors_to_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("interactions.db");
        let log = open_log(&Config::default(), Some(db.clone()));
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        solve_part_c(&catalog, &roster, log.as_ref());

        cmd_challenge(&catalog, &roster, log.as_ref(), "Soren", "1, 1, 2, 3, 4").unwrap();
        let events = log.recent(1).unwrap();
        assert_eq!(events[0].details, "Listed 4 correct Fibonacci numbers");
        assert_eq!(events[0].section, PART_C);

        assert!(db.exists());
        assert!(dir.path().join("interactions.tsv").exists());
    }

    #[test]
    fn test_disabled_store_uses_local_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.store.enabled = false;
        cfg.local_log.path = Some(dir.path().join("local.tsv").display().to_string());
        let log = open_log(&cfg, Some(dir.path().join("interactions.db")));

        log.append(&InteractionEvent::login("Ayushi")).unwrap();
        assert_eq!(log.count().unwrap(), 1);
        assert!(!dir.path().join("interactions.db").exists());
    }

    #[test]
    fn test_challenge_rejects_malformed_list() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let log = MemoryLog::new();
        solve_part_c(&catalog, &roster, &log);
        let before = log.count().unwrap();

        assert!(cmd_challenge(&catalog, &roster, &log, "Soren", "1, 1, two").is_err());
        assert_eq!(log.count().unwrap(), before);
    }

    #[test]
    fn test_challenge_locked_until_part_c_rewarded() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let log = MemoryLog::new();

        let err = cmd_challenge(&catalog, &roster, &log, "Soren", "1, 1, 2, 3, 5").unwrap_err();
        assert!(err.to_string().contains("puzzle-1, puzzle-2"));
        assert_eq!(log.count().unwrap(), 0);

        // One student alone is not enough
        let soren = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let mut state = ProgressState::default();
        soren.jump_to(&mut state, &log, 1, 0).unwrap();
        for answer in ["3/2", "5/3", "21/13"] {
            soren.submit(&mut state, &log, answer).unwrap();
        }
        assert!(cmd_challenge(&catalog, &roster, &log, "Soren", "1, 1, 2").is_err());
    }

    #[test]
    fn test_challenge_open_after_part_c_rewarded() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let log = MemoryLog::new();
        solve_part_c(&catalog, &roster, &log);

        cmd_challenge(&catalog, &roster, &log, "Ayushi", "1, 1, 2, 3, 5").unwrap();
        let board = fibonacci_scoreboard(&log.read_all().unwrap(), &roster, PART_C);
        assert_eq!(board.second_best, 5);
    }

    #[test]
    fn test_challenge_ungated_without_part_c() {
        let catalog = lessons::logic_puzzles();
        let roster = Roster::default();
        let log = MemoryLog::new();
        cmd_challenge(&catalog, &roster, &log, "Soren", "1, 1, 2").unwrap();
        assert_eq!(log.count().unwrap(), 1);
    }
}
