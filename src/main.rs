use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use maxfoot::api_sports::ApiSportsClient;
use maxfoot::config::ApiConfig;
use maxfoot::dataset::{Outcome, Side};
use maxfoot::forest::{ForestConfig, RandomForest};
use maxfoot::form::{form_string, recent_form};
use maxfoot::pipeline::{self, PipelineOutcome, PredictionReport, PredictionRequest};

const SEASONS: std::ops::RangeInclusive<u16> = 2018..=2024;
const DEFAULT_FORM: usize = 5;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maxfoot=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(command) = args.first().map(|s| s.as_str()) else {
        print_usage();
        return Ok(());
    };

    match command {
        "seasons" => {
            for season in SEASONS.rev() {
                println!("{season}");
            }
            Ok(())
        }
        "leagues" => list_leagues(),
        "teams" => list_teams(&args),
        "predict" => predict(&args),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command {other:?} (try `maxfoot help`)")),
    }
}

fn list_leagues() -> Result<()> {
    let client = ApiSportsClient::new(ApiConfig::from_env())?;
    let leagues = client.leagues()?;
    if leagues.is_empty() {
        println!("No leagues returned.");
        return Ok(());
    }
    for league in leagues {
        match league.country {
            Some(country) => println!("{:>6}  {} ({country})", league.id, league.name),
            None => println!("{:>6}  {}", league.id, league.name),
        }
    }
    Ok(())
}

fn list_teams(args: &[String]) -> Result<()> {
    let league_id = parse_u32_arg(args, "--league").context("--league <id> is required")?;
    let season = parse_season_arg(args)?;
    let client = ApiSportsClient::new(ApiConfig::from_env())?;
    let teams = client.teams(league_id, season)?;
    if teams.is_empty() {
        println!("No teams for this league/season.");
        return Ok(());
    }
    for team in teams {
        println!("{team}");
    }
    Ok(())
}

fn predict(args: &[String]) -> Result<()> {
    let league_id = parse_u32_arg(args, "--league").context("--league <id> is required")?;
    let season = parse_season_arg(args)?;
    let home = parse_str_arg(args, "--home").context("--home <team> is required")?;
    let away = parse_str_arg(args, "--away").context("--away <team> is required")?;
    let form_len = if has_flag(args, "--form") || parse_str_arg(args, "--form").is_some() {
        Some(
            parse_u32_arg(args, "--form")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_FORM),
        )
    } else {
        None
    };

    let request = PredictionRequest::new(league_id, season, &home, &away);
    request.validate()?;

    let config = ApiConfig::from_env();
    let mut forest = RandomForest::new(ForestConfig {
        n_trees: config.trees,
        seed: config.seed,
        ..ForestConfig::default()
    });
    let client = ApiSportsClient::new(config)?;

    match pipeline::run(&client, &mut forest, &request)? {
        PipelineOutcome::InsufficientData => {
            println!("No match data for this league/season.");
        }
        PipelineOutcome::Prediction(report) => {
            print_report(&report, &request);
            if let Some(limit) = form_len {
                print_form(&report, &request, limit);
            }
        }
    }
    Ok(())
}

fn print_report(report: &PredictionReport, request: &PredictionRequest) {
    let prediction = &report.prediction;
    println!(
        "Trained on {} matches ({} features)",
        report.training.len(),
        report.schema().len()
    );
    if !report.home_seen {
        println!("Note: {} has no home matches this season.", request.home_team);
    }
    if !report.away_seen {
        println!("Note: {} has no away matches this season.", request.away_team);
    }
    println!();
    println!("Predicted result:");
    match prediction.outcome {
        Outcome::Draw => println!("  Draw likely."),
        _ => println!("  {} is most likely to win.", prediction.display_name),
    }
    println!();
    println!("Probabilities:");
    for class in &prediction.probabilities {
        println!("  {}: {:.2}%", class.display_name, class.probability * 100.0);
    }
}

fn print_form(report: &PredictionReport, request: &PredictionRequest, limit: usize) {
    println!();
    println!("Recent form (newest first):");
    for team in [&request.home_team, &request.away_team] {
        let entries = recent_form(&report.fixtures, team, limit);
        if entries.is_empty() {
            println!("  {team}: no dated results");
            continue;
        }
        println!("  {team}: {}", form_string(&entries));
        for e in &entries {
            let venue = match e.venue {
                Side::Home => "vs",
                Side::Away => "at",
            };
            println!(
                "    {} {venue} {} {}-{}",
                e.kickoff.format("%Y-%m-%d"),
                e.opponent,
                e.goals_for,
                e.goals_against
            );
        }
    }
}

fn print_usage() {
    println!("maxfoot - match outcome predictor");
    println!();
    println!("USAGE:");
    println!("  maxfoot seasons");
    println!("  maxfoot leagues");
    println!("  maxfoot teams --league <id> --season <year>");
    println!(
        "  maxfoot predict --league <id> --season <year> --home <team> --away <team> [--form [n]]"
    );
    println!();
    println!("Environment: APISPORTS_KEY (required), APISPORTS_BASE_URL, APISPORTS_TIMEOUT_SECS,");
    println!("             APISPORTS_CACHE_TTL_SECS, MAXFOOT_SEED, MAXFOOT_TREES, RUST_LOG");
}

fn parse_season_arg(args: &[String]) -> Result<u16> {
    let season = parse_str_arg(args, "--season").context("--season <year> is required")?;
    season
        .trim()
        .parse::<u16>()
        .with_context(|| format!("invalid season {season:?}"))
}

fn parse_u32_arg(args: &[String], name: &str) -> Option<u32> {
    parse_str_arg(args, name).and_then(|v| v.trim().parse::<u32>().ok())
}

fn parse_str_arg(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            if !value.trim().is_empty() {
                return Some(value.to_string());
            }
        }
        if arg == name {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.starts_with("--") && !next.trim().is_empty() {
                return Some(next.clone());
            }
        }
    }
    None
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}
