//! Specforge CLI - compile module specifications into tested code.
//!
//! ## Commands
//!
//! - `compile`: run the full pipeline (gate, generate, verify) over a spec
//! - `check`: run only the ambiguity gate and report findings

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use specforge_core::{
    init_tracing, load_spec, resolve, Agent, AmbiguityCache, AmbiguityGate, AmbiguityVerdict,
    CancelFlag, CliAgent, CompileConfig, FsArtifactStore, HttpAgent, ModuleStatus, Pipeline,
    RunOptions,
};

#[derive(Parser)]
#[command(name = "specforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile natural-language module specs into working, tested code", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct AgentArgs {
    /// Agent command line (first word is the executable),
    /// e.g. "claude" or "claudebox -p"
    #[arg(long, default_value = "claude")]
    agent_command: String,

    /// Use an HTTP agent endpoint instead of a subprocess
    #[arg(long, conflicts_with = "agent_command")]
    agent_url: Option<String>,

    /// Timeout per agent call, in seconds
    #[arg(long, default_value_t = 300)]
    agent_timeout: u64,
}

impl AgentArgs {
    fn build(&self) -> Result<Arc<dyn Agent>> {
        let timeout = Duration::from_secs(self.agent_timeout);
        if let Some(url) = &self.agent_url {
            return Ok(Arc::new(HttpAgent::new(url.clone(), timeout)?));
        }
        let command: Vec<String> = self
            .agent_command
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if command.is_empty() {
            bail!("--agent-command must not be empty");
        }
        Ok(Arc::new(CliAgent::new(command, timeout)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile all modules in a spec file
    Compile {
        /// TOML spec file declaring the module set
        spec: PathBuf,

        /// Output directory (default: compiled_src/ beside the spec file)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Skip the ambiguity gate (escape hatch)
        #[arg(long)]
        force: bool,

        /// Maximum generate/test iterations per module
        #[arg(long, default_value_t = 3)]
        max_iterations: u32,

        /// Timeout per independent test run, in seconds
        #[arg(long, default_value_t = 120)]
        test_timeout: u64,

        /// Do not read or write the ambiguity-verdict cache
        #[arg(long)]
        no_cache: bool,

        /// Write the structured JSON report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        agent: AgentArgs,
    },

    /// Run only the ambiguity gate over a spec file
    Check {
        /// TOML spec file declaring the module set
        spec: PathBuf,

        /// Directory holding the ambiguity cache (default: compiled_src/
        /// beside the spec file)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Do not read or write the ambiguity-verdict cache
        #[arg(long)]
        no_cache: bool,

        #[command(flatten)]
        agent: AgentArgs,
    },
}

fn default_output_dir(spec: &std::path::Path, output_dir: Option<PathBuf>) -> PathBuf {
    output_dir.unwrap_or_else(|| {
        spec.parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("compiled_src")
    })
}

async fn cmd_compile(
    spec: PathBuf,
    output_dir: Option<PathBuf>,
    force: bool,
    max_iterations: u32,
    test_timeout: u64,
    no_cache: bool,
    report_path: Option<PathBuf>,
    agent_args: AgentArgs,
) -> Result<i32> {
    let output_dir = default_output_dir(&spec, output_dir);
    let set = load_spec(&spec).context("loading spec file")?;
    println!(
        "Loaded {} module(s) from {}: {}",
        set.len(),
        spec.display(),
        set.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    let agent = agent_args.build()?;
    let store = Arc::new(FsArtifactStore::open(&output_dir).context("opening output directory")?);
    let config = CompileConfig {
        max_iterations,
        agent_timeout: Duration::from_secs(agent_args.agent_timeout),
        test_timeout: Duration::from_secs(test_timeout),
    };
    let pipeline = Pipeline::new(agent, store, config);

    let cache = if no_cache {
        None
    } else {
        Some(AmbiguityCache::open(&output_dir).context("opening ambiguity cache")?)
    };

    // Ctrl-C cancels between iterations/modules; sealed records survive.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("cancellation requested");
                cancel.cancel();
            }
        });
    }

    let report = pipeline
        .run(&set, RunOptions { force, cache }, &cancel)
        .await?;

    println!();
    for entry in &report.modules {
        let mark = match &entry.status {
            ModuleStatus::Compiled { .. } => "✅",
            ModuleStatus::Ambiguous { .. } => "❌",
            ModuleStatus::Failed { .. } => "❌",
            ModuleStatus::Error { .. } => "❌",
        };
        println!("{mark} {}: {}", entry.module, entry.status.describe());
        if let ModuleStatus::Ambiguous { findings } = &entry.status {
            for finding in findings {
                println!("     - {finding}");
            }
        }
    }
    if report.cancelled {
        println!("\nRun cancelled; {} module(s) not attempted.", set.len() - report.modules.len());
    }
    println!(
        "\n{}/{} module(s) compiled in {}ms → {}",
        report.compiled_count(),
        set.len(),
        report.duration_ms,
        output_dir.display()
    );

    if let Some(path) = report_path {
        std::fs::write(&path, serde_json::to_vec_pretty(&report)?)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(if report.all_compiled() { 0 } else { 1 })
}

async fn cmd_check(
    spec: PathBuf,
    output_dir: Option<PathBuf>,
    no_cache: bool,
    agent_args: AgentArgs,
) -> Result<i32> {
    let output_dir = default_output_dir(&spec, output_dir);
    let set = load_spec(&spec).context("loading spec file")?;

    // Surface spec-level errors before any agent call.
    let order = resolve(&set).context("resolving dependency order")?;
    for blocked in order.blocked() {
        println!("❌ {}", blocked.detail());
    }

    let agent = agent_args.build()?;
    let gate = AmbiguityGate::new(agent);
    let mut cache = if no_cache {
        None
    } else {
        Some(AmbiguityCache::open(&output_dir).context("opening ambiguity cache")?)
    };

    let mut ambiguous = 0usize;
    for &idx in order.sequence() {
        let module = set.at(idx);
        let cached_verdict = cache.as_ref().and_then(|c| c.get(module));
        let (verdict, cached) = match cached_verdict {
            Some(verdict) => (verdict, true),
            None => {
                // Checked upfront, before any compilation, so no dependency
                // artifacts exist yet; the gate judges the spec on its own.
                let (verdict, _) = gate.check(module, &[]).await?;
                if let Some(cache) = cache.as_mut() {
                    cache.put(module, &verdict)?;
                }
                (verdict, false)
            }
        };

        let suffix = if cached { " (cached)" } else { "" };
        match &verdict {
            AmbiguityVerdict::Clear => println!("✅ {}: clear{suffix}", module.name),
            AmbiguityVerdict::Ambiguous { .. } => {
                ambiguous += 1;
                println!("❌ {}: ambiguous{suffix}", module.name);
                for finding in verdict.rendered_findings() {
                    println!("     - {finding}");
                }
            }
        }
    }

    Ok(if ambiguous == 0 && order.blocked().is_empty() {
        0
    } else {
        1
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Compile {
            spec,
            output_dir,
            force,
            max_iterations,
            test_timeout,
            no_cache,
            report,
            agent,
        } => {
            cmd_compile(
                spec,
                output_dir,
                force,
                max_iterations,
                test_timeout,
                no_cache,
                report,
                agent,
            )
            .await?
        }
        Commands::Check {
            spec,
            output_dir,
            no_cache,
            agent,
        } => cmd_check(spec, output_dir, no_cache, agent).await?,
    };

    std::process::exit(code);
}
