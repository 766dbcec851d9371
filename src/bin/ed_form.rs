use std::process::ExitCode;

use clap::Parser;

use avoidable_ed::client::{render, FormInput, PredictionClient};
use avoidable_ed::config::DEFAULT_API_URL;
use avoidable_ed::models::{BodySystem, ChronicFlag, Race, Sex};

#[derive(Debug, Parser)]
#[command(
    name = "ed-form",
    version,
    about = "Predict whether an emergency department visit is avoidable",
    long_about = "Collects patient demographics and the clinical classification of the primary\n\
        diagnosis, sends them to the prediction service, and prints the probability\n\
        that the ED visit was avoidable.\n\n\
        EXAMPLES:\n\
        \n  ed-form --age 42 --sex Female --body-system Respiratory\n\
        \n  ed-form --chronic Yes --total-paid 1250.75 --dry-run\n\
        \n  ed-form --list-body-systems"
)]
struct Cli {
    /// Patient age at end of reference year
    #[arg(long, default_value_t = 65, value_parser = clap::value_parser!(u32).range(0..=120))]
    age: u32,

    /// Biological sex (Male, Female)
    #[arg(long, default_value = "Male")]
    sex: Sex,

    /// Self-reported race (White, Black, Asian, Hispanic, Other, "North American Native", Unknown)
    #[arg(long, default_value = "White")]
    race: Race,

    /// Reference year for the visit
    #[arg(long, default_value_t = 2023, value_parser = clap::value_parser!(u16).range(2020..=2100))]
    year: u16,

    /// Total amount paid for the visit
    #[arg(long = "total-paid", default_value_t = 0.0)]
    total_paid: f64,

    /// Does the patient have a chronic condition? (No, Yes)
    #[arg(long, default_value = "No")]
    chronic: ChronicFlag,

    /// Clinical classification of the primary diagnosis
    #[arg(long = "body-system", default_value = "Blood/Immune")]
    body_system: BodySystem,

    /// Prediction endpoint
    #[arg(long = "api-url", env = "ED_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Print the body systems the form accepts and exit
    #[arg(long)]
    list_body_systems: bool,

    /// Print the JSON payload instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn form(&self) -> FormInput {
        FormInput {
            age: self.age,
            sex: self.sex,
            race: self.race,
            year: self.year,
            total_paid_amt: self.total_paid,
            chronic: self.chronic,
            body_system: self.body_system,
        }
    }
}

#[actix_rt::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.list_body_systems {
        for body_system in BodySystem::ALL {
            println!("{:<24} {}", body_system.label(), body_system.wire_key());
        }
        return ExitCode::SUCCESS;
    }

    let record = match cli.form().to_record() {
        Ok(record) => record,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dry_run {
        match serde_json::to_string_pretty(&record) {
            Ok(payload) => println!("{}", payload),
            Err(e) => {
                eprintln!("failed to encode payload: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let client = PredictionClient::new(cli.api_url.clone());
    log::info!("Posting to {}", client.url());

    match client.submit(&record).await {
        Ok(response) => {
            println!("{}", render(&response));
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
