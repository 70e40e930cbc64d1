use clap::Parser;
use mend_chrome::ChromeDriver;
use mend_core::config::{ConfigLoader, ConfigPatch};
use mend_core::strategy::HealOptions;
use mend_core::{Driver, Healer, Interaction};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mend", version, about = "Heal a broken selector against a live page")]
struct Args {
    /// Page to load before healing
    #[arg(long)]
    url: String,

    /// The selector that no longer resolves
    #[arg(long)]
    selector: String,

    /// Expected tag of the target element (e.g. button)
    #[arg(long)]
    expected_type: Option<String>,

    /// Launch the browser in visible mode
    #[arg(long)]
    visible: bool,

    /// Config file overriding ./mend.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print engine health instead of healing
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let programmatic: Option<ConfigPatch> = match &args.config {
        Some(path) => Some(ConfigLoader::load_file(path).await?),
        None => None,
    };
    let config = ConfigLoader::load(programmatic).await?;
    mend_core::telemetry::init(&config.telemetry);

    let mut healer = Healer::new(config)?;
    let mut driver = ChromeDriver::launch(args.visible).await?;

    driver
        .interact("", &Interaction::Goto(args.url.clone()))
        .await?;

    if args.health {
        let report = healer.health_check().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        driver.close().await?;
        return Ok(());
    }

    let options = HealOptions {
        expected_type: args.expected_type.clone(),
    };
    let result = healer.heal(&mut driver, &args.selector, &options).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let flaky = healer.flakiness_stats();
    if !flaky.is_empty() {
        eprintln!("flaky selectors: {}", serde_json::to_string(&flaky)?);
    }

    driver.close().await?;
    if result.success { Ok(()) } else { std::process::exit(1) }
}
