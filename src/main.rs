use clap::{Args as ClapArgs, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use feature_e2e::config;
use feature_e2e::steps::{resolve_url, verify_target, wait_duration};
use feature_e2e::{
    ActionKind, FeatureResult, ProcessGateway, RouteTable, RunOptions, classify, extract_input,
    extract_target, find_feature, load_features, run_all, run_feature_test,
};

/// Feature E2E - run natural-language feature steps in a real browser
#[derive(Parser, Debug)]
#[command(
    name = "feature-e2e",
    about = "Drive agent-browser from natural-language feature steps",
    after_help = "ENVIRONMENT VARIABLES:\n\
        FEATURE_E2E_BASE_URL      Base URL of the application under test\n\
        FEATURE_E2E_HEADLESS      Run without a browser window (true/false)\n\
        FEATURE_E2E_TIMEOUT_MS    Uniform per-command timeout in milliseconds\n\
        FEATURE_E2E_OUTPUT_DIR    Directory for failure screenshots\n\
        FEATURE_E2E_BROWSER_BIN   agent-browser executable\n\
        FEATURE_E2E_STUDENT_ID    Student id used by login steps\n\
        FEATURE_E2E_PASSWORD      Password used by login steps\n\
        RUST_LOG                  Log filter (overrides --verbose)"
)]
struct Args {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct GlobalArgs {
    /// Base URL of the application under test
    #[arg(long, global = true, env = "FEATURE_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,

    /// Uniform timeout for every browser command, in milliseconds
    #[arg(long, global = true, env = "FEATURE_E2E_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Directory for failure screenshots
    #[arg(short, long, global = true, env = "FEATURE_E2E_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// JSON route table (label -> path) replacing the built-in one
    #[arg(long, global = true)]
    routes: Option<PathBuf>,

    /// agent-browser executable
    #[arg(long, global = true, env = "FEATURE_E2E_BROWSER_BIN")]
    browser_bin: Option<String>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single feature by id
    Run {
        /// Feature id
        id: String,

        /// Feature list (JSON)
        #[arg(short, long, default_value = "feature_list.json")]
        features: PathBuf,
    },

    /// Run every accepted feature in order
    RunAll {
        /// Feature list (JSON)
        #[arg(short, long, default_value = "feature_list.json")]
        features: PathBuf,

        /// Include features that are not accepted yet
        #[arg(long)]
        all: bool,
    },

    /// Show how steps would be interpreted, without a browser
    Classify {
        /// Step texts
        #[arg(required = true)]
        steps: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "feature_e2e=debug" } else { "feature_e2e=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_options(global: &GlobalArgs) -> Result<RunOptions, Box<dyn Error>> {
    let mut options = RunOptions::default();
    if let Some(base_url) = &global.base_url {
        options = options.base_url(base_url.as_str());
    }
    if global.headless {
        options = options.headless(true);
    }
    if global.timeout_ms.is_some() {
        options = options.timeout_ms(global.timeout_ms);
    }
    if let Some(dir) = &global.output {
        options = options.output_dir(dir);
    }
    if let Some(path) = &global.routes {
        options = options.routes(RouteTable::load(path)?);
    }
    Ok(options)
}

fn print_feature(result: &FeatureResult) {
    for line in result.summary_lines() {
        println!("{}", line);
    }
}

fn describe_step(step: &str, options: &RunOptions) -> String {
    let kind = classify(step);
    let detail = match kind {
        ActionKind::Navigate => {
            let target = extract_target(step, &options.routes);
            format!("-> {}", resolve_url(&options.base_url, &target))
        }
        ActionKind::Click => format!("-> '{}'", extract_target(step, &options.routes)),
        ActionKind::Fill => {
            let input = extract_input(step, None);
            format!("-> '{}' = '{}'", input.field, input.value)
        }
        ActionKind::Verify => format!("-> '{}'", verify_target(step)),
        ActionKind::Wait => format!("-> {}ms", wait_duration(step).as_millis()),
        ActionKind::Login | ActionKind::Default => String::new(),
    };
    format!("{:<8} {} {}", kind.to_string(), step, detail).trim_end().to_string()
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.global.verbose);

    let options = run_options(&args.global)?;
    let driver = match &args.global.browser_bin {
        Some(bin) => ProcessGateway::new(bin.as_str()),
        None => ProcessGateway::new(config::browser_binary()),
    };

    match args.command {
        Commands::Run { id, features } => {
            let features = load_features(&features)?;
            let feature = find_feature(&features, &id)?;
            let result = run_feature_test(&driver, feature, &options).await;

            if args.global.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_feature(&result);
            }
            Ok(if result.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::RunAll { features, all } => {
            let features = load_features(&features)?;
            let options = options.test_all(all);
            let batch = run_all(&driver, &features, &options).await;

            if args.global.json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                for result in &batch.results {
                    print_feature(result);
                }
                if let Some(error) = &batch.error {
                    println!("error: {}", error);
                }
                println!("{}", batch.summary_line());
            }
            Ok(if batch.all_passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Commands::Classify { steps } => {
            if args.global.json {
                let kinds: Vec<_> = steps
                    .iter()
                    .map(|step| serde_json::json!({ "step": step, "kind": classify(step) }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&kinds)?);
            } else {
                for step in &steps {
                    println!("{}", describe_step(step, &options));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
