pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use commands::compare::ComparisonArgs;
use commands::import::ImportArgs;
use commands::set_prices::SetPricesArgs;
use commands::transition::TransitionArgs;

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura procurement operator CLI",
    long_about = "Compare supplier quotations, project team price lists, import quotation workbooks and drive the approval workflow.",
    after_help = "Examples:\n  procura seed\n  procura compare --period 2024-02-01 --region North\n  procura import --period 2024-03-01 --region North fresh.xlsx ocean.xlsx\n  procura transition --quotation Q-202402-NORTH-OCEAN --event approve"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify it")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Build the supplier comparison matrix with variances and KPIs")]
    Compare {
        #[command(flatten)]
        selection: ComparisonArgs,
    },
    #[command(about = "Project a team's approved price list for a period")]
    PriceList {
        /// Team code.
        #[arg(long)]
        team: String,
        #[arg(long)]
        period: String,
    },
    #[command(about = "Import quotation workbooks for one period and region")]
    Import {
        #[arg(long)]
        period: String,
        #[arg(long)]
        region: String,
        /// Replace the line items of quotations that already exist.
        #[arg(long)]
        overwrite: bool,
        #[arg(long, env = "PROCURA_ACTOR", default_value = "operator")]
        actor: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    #[command(about = "Write the comparison matrix to an xlsx workbook")]
    Export {
        #[command(flatten)]
        selection: ComparisonArgs,
        #[arg(long, short)]
        output: PathBuf,
    },
    #[command(about = "Apply a workflow event (negotiate, approve, cancel) to a quotation")]
    Transition {
        /// Quotation code, e.g. Q-202402-NORTH-OCEAN.
        #[arg(long)]
        quotation: String,
        #[arg(long)]
        event: String,
        /// Fail unless the stored version still matches.
        #[arg(long)]
        expected_version: Option<i64>,
        #[arg(long, env = "PROCURA_ACTOR", default_value = "operator")]
        actor: String,
    },
    #[command(about = "Edit a line item's prices within its quotation's status rules")]
    SetPrices {
        /// Line item id.
        #[arg(long)]
        item: String,
        #[arg(long)]
        initial: Option<Decimal>,
        #[arg(long)]
        negotiated: Option<Decimal>,
        #[arg(long)]
        approved: Option<Decimal>,
        #[arg(long)]
        vat: Option<Decimal>,
        #[arg(long, env = "PROCURA_ACTOR", default_value = "operator")]
        actor: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Compare { selection } => commands::compare::run(selection),
        Command::PriceList { team, period } => commands::price_list::run(team, period),
        Command::Import { period, region, overwrite, actor, files } => {
            commands::import::run(ImportArgs { period, region, overwrite, actor, files })
        }
        Command::Export { selection, output } => commands::export::run(selection, output),
        Command::Transition { quotation, event, expected_version, actor } => {
            commands::transition::run(TransitionArgs { quotation, event, expected_version, actor })
        }
        Command::SetPrices { item, initial, negotiated, approved, vat, actor } => {
            commands::set_prices::run(SetPricesArgs { item, initial, negotiated, approved, vat, actor })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
