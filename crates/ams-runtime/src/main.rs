use clap::Parser;

use ams_engine::cli::{CliArgs, Command};
use ams_engine::project_config;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    tracing::info!("ams-runtime v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Init { name } => {
            if let Err(e) = ams_engine::init::create_project(name) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Command::Run { seconds } => run(&args.project, *seconds),
        Command::Test { test_file } => test(&args.project, test_file.as_deref()),
        Command::Validate { strict } => validate(&args.project, *strict),
    }
}

fn project_root(project_arg: &str) -> std::path::PathBuf {
    let start = std::path::Path::new(project_arg)
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().expect("no current directory"));
    project_config::find_project_root(&start).unwrap_or(start)
}

fn run(project_arg: &str, seconds: f64) {
    let root = project_root(project_arg);
    let mut runtime = match ams_engine::test_runner::GameRuntime::load(&root) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    runtime.spawn_player();
    tracing::info!(game = %runtime.definition.name, seconds, "starting headless simulation");
    runtime.step_seconds(seconds);
    println!(
        "ran {:.2}s of simulated time; score={} lives={} state={}",
        runtime.entity_engine.elapsed_time,
        runtime.entity_engine.score,
        runtime.entity_engine.lives,
        runtime.entity_engine.state_tag
    );
}

fn test(project_arg: &str, test_file: Option<&str>) {
    let root = project_root(project_arg);

    if let Some(file) = test_file {
        let test_path = root.join(file);
        if !test_path.exists() {
            eprintln!("Test file not found: {}", test_path.display());
            std::process::exit(1);
        }
        report_results(&ams_engine::test_runner::run_test_file(&root, &test_path));
        return;
    }

    let config = match project_config::load_config(&root) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let test_files = project_config::discover_test_files(&config, &root);
    if test_files.is_empty() {
        println!("No test files found.");
        return;
    }

    println!("Running {} test file(s)...\n", test_files.len());
    let mut all_results = Vec::new();
    for test_path in &test_files {
        println!("--- {} ---", test_path.display());
        all_results.extend(ams_engine::test_runner::run_test_file(&root, test_path));
    }
    report_results(&all_results);
}

fn report_results(results: &[ams_engine::test_runner::TestResult]) {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    for r in results {
        let status = if r.passed { "PASS" } else { "FAIL" };
        println!("  [{status}] {} (t={:.2}s)", r.name, r.game_time);
        if let Some(err) = &r.error {
            println!("         {err}");
        }
    }
    println!("\n{passed} passed, {failed} failed.");
    if failed > 0 {
        std::process::exit(1);
    }
}

fn validate(project_arg: &str, strict: bool) {
    let root = project_root(project_arg);
    match ams_engine::test_runner::GameRuntime::load(&root) {
        Ok(runtime) => {
            println!("'{}' is valid ({} entity type(s))", runtime.definition.name, runtime.definition.entity_types.len());
            if strict && runtime.definition.player.is_none() {
                eprintln!("strict validation failed: no 'player' declared");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
