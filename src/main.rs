// Entry point and console flow.
//
// Without `--interactive` the binary loads the configured source once,
// applies the filters given on the command line, prints the dashboard and
// optionally exports it. With `--interactive` it stays in a menu loop where
// filters can be changed and the source refreshed.
use clap::Parser;
use district_pulse::config::AppConfig;
use district_pulse::controller::Controller;
use district_pulse::engine::options;
use district_pulse::ingest::Ingestor;
use district_pulse::logging;
use district_pulse::output::{self, ConsolePublisher};
use district_pulse::types::{FilterUpdate, ALL};
use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "district_pulse",
    version,
    about = "District social-media metrics: filtered KPIs and platform targets"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "district_pulse.toml")]
    config: PathBuf,

    /// Override the primary source (URL or local .csv/.xlsx path)
    #[arg(short, long)]
    source: Option<String>,

    #[arg(long, default_value = ALL)]
    district: String,

    #[arg(long, default_value = ALL)]
    month: String,

    #[arg(long, default_value = ALL)]
    platform: String,

    /// Write records.csv and snapshot.json here after loading
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Stay in the selection menu after the first render
    #[arg(short, long)]
    interactive: bool,
}

type Dashboard = Controller<ConsolePublisher>;

/// Read a single line of input after printing the common prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Run a refresh and wait for it so the menu never shows a half-loaded state.
fn refresh(dashboard: &mut Dashboard, ingestor: &Ingestor, timeout: Duration) {
    println!("Loading data from {}...\n", ingestor.primary());
    let seq = dashboard.request_refresh(ingestor);
    if !dashboard.wait_for_refresh(seq, timeout) {
        println!("Still waiting on the source; results will appear on the next action.\n");
    }
}

/// Let the user pick one of `values` by number. `None` if the input was invalid.
fn pick(label: &str, values: &[String]) -> Option<String> {
    println!("Select {}:", label);
    for (idx, v) in values.iter().enumerate() {
        println!("[{}] {}", idx, v);
    }
    let choice = read_choice();
    match choice.parse::<usize>().ok().and_then(|i| values.get(i)) {
        Some(v) => Some(v.clone()),
        None => {
            println!("Invalid choice.\n");
            None
        }
    }
}

fn handle_select(dashboard: &mut Dashboard, field: &str) {
    let dataset = dashboard.dataset();
    let records = &dataset.records;
    let values = match field {
        "district" => options(records.iter().map(|r| r.district.as_str())),
        "month" => options(records.iter().map(|r| r.month.as_str())),
        _ => options(records.iter().map(|r| r.platform.as_str())),
    };
    let Some(value) = pick(field, &values) else {
        return;
    };
    let update = match field {
        "district" => FilterUpdate::district(&value),
        "month" => FilterUpdate::month(&value),
        _ => FilterUpdate::platform(&value),
    };
    dashboard.select(update);
    if !dashboard.pump() {
        println!("Selection unchanged.\n");
    }
}

fn handle_export(dashboard: &Dashboard, dir: &Path) {
    match output::export(dir, &dashboard.dataset(), dashboard.filter()) {
        Ok((records, snapshot)) => println!(
            "Exported {} and {}\n",
            records.display(),
            snapshot.display()
        ),
        Err(e) => eprintln!("Write error: {}\n", e),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(&cli.config)?;
    logging::init(&config.logging.filter);
    if let Some(source) = cli.source {
        config.source.primary = source;
    }
    let timeout = Duration::from_secs(config.source.timeout_secs + 5);

    let ingestor = Ingestor::from_config(&config.source)?;
    let mut dashboard = Controller::new(ConsolePublisher::default());
    dashboard.select(FilterUpdate {
        district: Some(cli.district),
        month: Some(cli.month),
        platform: Some(cli.platform),
    });
    refresh(&mut dashboard, &ingestor, timeout);

    if !cli.interactive {
        if let Some(dir) = &cli.export_dir {
            handle_export(&dashboard, dir);
        }
        return Ok(());
    }
    let export_dir = cli.export_dir.unwrap_or(config.export.dir);

    loop {
        println!("Dashboard Menu:");
        println!("[1] Refresh data");
        println!("[2] Select district");
        println!("[3] Select month");
        println!("[4] Select platform");
        println!("[5] Export snapshot");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => refresh(&mut dashboard, &ingestor, timeout),
            "2" => handle_select(&mut dashboard, "district"),
            "3" => handle_select(&mut dashboard, "month"),
            "4" => handle_select(&mut dashboard, "platform"),
            "5" => handle_export(&dashboard, &export_dir),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-5.\n"),
        }
    }
    Ok(())
}
