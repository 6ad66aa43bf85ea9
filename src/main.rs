mod aggregator;
mod classifier;
mod error;
mod export;
mod fetcher;
mod harvester;
mod labeler;
mod models;
mod normalizer;
mod pipeline;
mod query;
mod session;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fetcher::VacancyFetcher;
use harvester::{HarvestObserver, Harvester};
use models::{CanonicalRecord, Config, Dataset, InstitutionType};
use query::{paginate, LikelihoodTier, Query, SortKey};
use session::SessionContext;
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Prints the running record count on one console line.
struct ConsoleProgress;

impl HarvestObserver for ConsoleProgress {
    fn on_progress(&self, records_so_far: usize) {
        print!("\r📥 Retrieved {} vacancies...", records_so_far);
        let _ = std::io::stdout().flush();
    }

    fn on_complete(&self, dataset: &Dataset) {
        println!("\n✅ Harvest finished: {} unique vacancies", dataset.len());
    }
}

fn harvest_args() -> Vec<Arg> {
    vec![
        Arg::new("refresh")
            .long("refresh")
            .action(ArgAction::SetTrue)
            .help("Ignore the saved session and harvest again"),
        Arg::new("search")
            .short('s')
            .long("search")
            .value_name("KEYWORD")
            .help("Keyword matched against institution, position and location"),
        Arg::new("type")
            .short('t')
            .long("type")
            .value_name("TYPE")
            .help("Institution type: government, private or unknown"),
        Arg::new("sort")
            .long("sort")
            .value_name("KEY")
            .help("Sort by likelihood, quota, registered, published or title"),
        Arg::new("desc")
            .long("desc")
            .action(ArgAction::SetTrue)
            .help("Sort in descending order"),
        Arg::new("page")
            .short('p')
            .long("page")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .default_value("1"),
        Arg::new("page-size")
            .long("page-size")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .default_value("25"),
        Arg::new("no-export")
            .long("no-export")
            .action(ArgAction::SetTrue)
            .help("Do not write the CSV export"),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("vacancy-harvester")
        .version("1.0")
        .about("Harvests internship vacancies and estimates acceptance chances")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true)
                .default_value("config.toml"),
        )
        .args(harvest_args())
        .args_conflicts_with_subcommands(true)
        .subcommand(
            Command::new("harvest")
                .about("Harvest, classify and list vacancies (default)")
                .args(harvest_args()),
        )
        .subcommand(
            Command::new("label")
                .about("Build a rule-labeled company dataset for the offline trainer")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Destination CSV (default: <output_directory>/dataset_manual.csv)"),
                ),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .ok_or_else(|| anyhow!("missing --config value"))?;

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} and run the program again.", config_file);
        return Ok(());
    };
    config.validate().with_context(|| format!("Invalid configuration in {}", config_file))?;

    telemetry::init(&config.log_level)?;

    match matches.subcommand() {
        Some(("label", sub)) => run_label(&config, sub).await,
        Some(("harvest", sub)) => run_harvest(&config, sub).await,
        _ => run_harvest(&config, &matches).await,
    }
}

async fn run_harvest(config: &Config, args: &ArgMatches) -> Result<()> {
    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;
    let snapshot_path = Path::new(output_dir).join("session.json");

    let mut context = SessionContext::new(config.snapshot_ttl_secs);
    if !args.get_flag("refresh") {
        context.load_snapshot(&snapshot_path);
    }

    if context.is_fresh(Utc::now()) {
        if let Some(session) = context.current() {
            println!(
                "♻️  Reusing session from {} ({} vacancies)",
                session.finished_at.format("%d %b %Y %H:%M"),
                session.dataset.len()
            );
        }
    } else {
        println!("🔄 Harvesting vacancies from: {}", config.base_url);
        let classifier = classifier::select_classifier(config);
        println!("🏷️  Institution classifier: {}", classifier.name());

        let fetcher = VacancyFetcher::from_config(config);
        let session = pipeline::run_session(&fetcher, classifier.as_ref(), config, &ConsoleProgress).await;
        context.replace(session);
        context.save_snapshot(&snapshot_path)?;
    }

    let dataset = match context.current() {
        Some(session) if !session.dataset.is_empty() => &session.dataset,
        _ => {
            println!("⚠️  No data found.");
            return Ok(());
        }
    };

    let query = build_query(args)?;
    let rows = query.apply(dataset);

    let page_number = args.get_one::<usize>("page").copied().unwrap_or(1);
    let page_size = args.get_one::<usize>("page-size").copied().unwrap_or(25);
    let page = paginate(&rows, page_number, page_size);

    if query.keyword.is_some() || query.institution_type.is_some() {
        println!("🔍 {} matching vacancies", rows.len());
    }
    println!("\n📄 Page {}/{} ({} vacancies)", page.number, page.total_pages, page.total_items);
    for record in page.items {
        print_record(record);
    }

    if !args.get_flag("no-export") {
        let csv_path = Path::new(output_dir).join(format!("vacancies_{}.csv", Utc::now().timestamp()));
        export::write_csv_file(rows.iter().copied(), &csv_path)?;
        println!("\n💾 Exported {} rows to {}", rows.len(), csv_path.display());
    }

    print_summary(dataset);
    Ok(())
}

fn build_query(args: &ArgMatches) -> Result<Query> {
    let institution_type = args
        .get_one::<String>("type")
        .map(|value| InstitutionType::parse(value).ok_or_else(|| anyhow!("unknown institution type: {}", value)))
        .transpose()?;

    let sort = args
        .get_one::<String>("sort")
        .map(|value| value.parse::<SortKey>().map_err(anyhow::Error::msg))
        .transpose()?
        .map(|key| (key, args.get_flag("desc")));

    Ok(Query {
        keyword: args.get_one::<String>("search").cloned(),
        institution_type,
        sort,
    })
}

fn print_record(record: &CanonicalRecord) {
    println!("{}", format_record(record));
}

fn format_record(record: &CanonicalRecord) -> String {
    let tier = LikelihoodTier::of(record.acceptance_likelihood);
    let published = record
        .published_at
        .map(|at| at.format("%d %b %Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {:>3}% ({}) | {} | {} ({}) | {} | quota {} / registered {} | published {}",
        tier.marker(),
        record.acceptance_likelihood,
        tier,
        record.title,
        record.institution_name,
        record.classification(),
        record.location,
        record.quota,
        record.registered,
        published
    )
}

fn print_summary(dataset: &Dataset) {
    println!("\n📊 SUMMARY");
    println!("==========");
    println!("Total vacancies: {}", dataset.len());
    println!("🏛️  Government: {}", dataset.count_by_type(InstitutionType::Government));
    println!("🏢 Private: {}", dataset.count_by_type(InstitutionType::Private));
    let unknown = dataset.count_by_type(InstitutionType::Unknown);
    if unknown > 0 {
        println!("❔ Unknown: {}", unknown);
    }

    let high = dataset
        .iter()
        .filter(|r| LikelihoodTier::of(r.acceptance_likelihood) == LikelihoodTier::High)
        .count();
    println!("🟢 High acceptance likelihood (75%+): {}", high);
}

async fn run_label(config: &Config, args: &ArgMatches) -> Result<()> {
    let output_dir = config.output_directory.as_deref().unwrap_or("output");
    fs::create_dir_all(output_dir)?;
    let output_path = args
        .get_one::<String>("output")
        .map(|p| Path::new(p).to_path_buf())
        .unwrap_or_else(|| Path::new(output_dir).join("dataset_manual.csv"));

    println!("🚀 Fetching vacancies from: {}", config.base_url);
    let fetcher = VacancyFetcher::from_config(config);
    let token = Uuid::new_v4().to_string();
    let harvester = Harvester::new(&fetcher, &token, config.empty_page_threshold, &ConsoleProgress);
    let outcome = harvester.harvest(config.max_pages, config.concurrency).await;
    println!();

    if outcome.records.is_empty() {
        println!("⚠️  No data found.");
        return Ok(());
    }

    let rows = labeler::label_companies(&outcome.records);
    let file = fs::File::create(&output_path)
        .with_context(|| format!("Failed to create dataset file: {}", output_path.display()))?;
    labeler::write_labeled(&rows, file)?;

    println!("✅ Labeled dataset saved to {} ({} rows)", output_path.display(), rows.len());
    Ok(())
}
