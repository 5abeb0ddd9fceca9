//! CLI Entry Point for the rust-daq acquisition profile selector
//!
//! Runs selector operations against a recorded environment snapshot (registry
//! contents, device pools, live groups). Mutating commands write the snapshot
//! back so successive invocations see each other's effects.
//!
//! # Usage
//!
//! ```bash
//! daq-selector --env beamline.json components
//! daq-selector --env beamline.json preselect --reset
//! daq-selector --env beamline.json fragment ct01 ct02 --init temp
//! daq-selector --env beamline.json sync
//! daq-selector --env beamline.json status
//! daq-selector --env beamline.json switch mg2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daq_selector::logging::{self, LogConfig, OutputFormat};
use daq_selector::{
    FragmentRequest, FragmentSynthesizer, GroupSynchronizer, Profile, SelectorConfig,
};
use daq_selector_mock::MockEnvironment;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "daq-selector")]
#[command(about = "Acquisition profile selection and group synchronization", long_about = None)]
struct Cli {
    /// Environment snapshot (JSON)
    #[arg(long, short)]
    env: PathBuf,

    /// Selector configuration file
    #[arg(long, default_value = daq_selector::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Acquisition group; defaults to the active group
    #[arg(long, short)]
    group: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log format (pretty, compact, json)
    #[arg(long, default_value = "compact")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show mandatory, available and active components
    Components,

    /// Recompute the component preselection and store the profile
    Preselect {
        /// Rebuild from the configured defaults instead of the current flags
        #[arg(long)]
        reset: bool,
    },

    /// Synthesize and register a dynamic fragment
    Fragment {
        /// Channels recorded at every step
        step: Vec<String>,

        /// Channels recorded once at scan start
        #[arg(long, num_args = 1..)]
        init: Vec<String>,

        /// Print the document without registering it
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove a dynamic fragment
    RemoveFragment { name: String },

    /// Push the profile to its live acquisition group
    Sync,

    /// Compare the profile with its live acquisition group
    Status,

    /// Switch the active acquisition group
    Switch { name: String },

    /// Rebuild a profile from a live acquisition group and store it
    Import { name: String },
}

#[derive(Serialize)]
struct ComponentsReport {
    group: String,
    mandatory: Vec<String>,
    available: Vec<String>,
    active: Vec<String>,
    data_sources: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SelectorConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let log_format: OutputFormat = cli.log_format.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    logging::init(
        LogConfig::from_selector_config(&config)
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .with_format(log_format),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let env = MockEnvironment::load(&cli.env)
        .with_context(|| format!("Failed to load environment from {}", cli.env.display()))?;
    let mut sync = GroupSynchronizer::new(
        env.registry.clone(),
        env.discovery.clone(),
        env.live.clone(),
        &config,
    );
    let mut profile = sync
        .session()
        .load(cli.group.as_deref())
        .context("Failed to load profile")?;
    info!(group = %profile.group(), "profile loaded");

    let mutated = run(&cli, &config, &env, &mut sync, &mut profile)?;
    if mutated {
        save_environment(&env, &cli.env)?;
    }
    Ok(())
}

fn run(
    cli: &Cli,
    config: &SelectorConfig,
    env: &MockEnvironment,
    sync: &mut GroupSynchronizer,
    profile: &mut Profile,
) -> Result<bool> {
    match &cli.command {
        Commands::Components => {
            let resolver = sync.resolver();
            let report = ComponentsReport {
                group: profile.group().clone(),
                mandatory: resolver.mandatory_components()?,
                available: resolver.available_components()?,
                active: resolver.components(profile)?.into_iter().collect(),
                data_sources: resolver.data_sources(profile)?.into_iter().collect(),
            };
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Text => {
                    println!("group:        {}", report.group);
                    println!("mandatory:    {}", report.mandatory.join(", "));
                    println!("available:    {}", report.available.join(", "));
                    println!("active:       {}", report.active.join(", "));
                    println!("data sources: {}", report.data_sources.join(", "));
                }
            }
            Ok(false)
        }
        Commands::Preselect { reset } => {
            let resolver = sync.resolver();
            let errors = if *reset {
                resolver.reset_preselected_components(profile)?
            } else {
                resolver.preselect_components(profile)?
            };
            sync.session().save(profile).context("Failed to store profile")?;
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&errors)?),
                Format::Text => {
                    for (name, on) in profile.component_preselection() {
                        println!("{name}: {on}");
                    }
                    for error in &errors {
                        eprintln!("unresolved: {error}");
                    }
                }
            }
            Ok(true)
        }
        Commands::Fragment {
            step,
            init,
            dry_run,
        } => {
            let request = FragmentRequest::step(step.iter().cloned()).with_init(init.iter().cloned());
            let mut synthesizer =
                FragmentSynthesizer::new(env.registry.clone(), env.discovery.clone(), config);
            if *dry_run {
                println!("{}", synthesizer.synthesize(profile, &request)?);
                return Ok(false);
            }
            let handle = synthesizer.create_fragment(profile, &request)?;
            let name = synthesizer
                .fragment_name(handle)
                .context("Fragment vanished right after creation")?;
            println!("{name}");
            Ok(true)
        }
        Commands::RemoveFragment { name } => {
            let mut synthesizer =
                FragmentSynthesizer::new(env.registry.clone(), env.discovery.clone(), config);
            synthesizer
                .remove_fragment(name)
                .with_context(|| format!("Failed to remove fragment '{name}'"))?;
            Ok(true)
        }
        Commands::Sync => {
            let descriptor = sync.update_group(profile)?;
            print_value(cli.format, &descriptor, || {
                format!(
                    "{}: {} controllers, timer {}",
                    descriptor.label,
                    descriptor.controllers.len(),
                    descriptor.timer
                )
            })?;
            Ok(true)
        }
        Commands::Status => {
            let updated = sync.is_group_updated(profile)?;
            match cli.format {
                Format::Json => println!("{}", serde_json::json!({ "group": profile.group(), "updated": updated })),
                Format::Text => {
                    println!("{}: {}", profile.group(), if updated { "up to date" } else { "out of date" });
                    if let Some(diff) = sync.describe_drift(profile)? {
                        print!("{diff}");
                    }
                }
            }
            Ok(false)
        }
        Commands::Switch { name } => {
            let incoming = sync
                .switch_profile(profile, name)
                .with_context(|| format!("Failed to switch to '{name}'"))?;
            println!("active group: {}", incoming.group());
            Ok(true)
        }
        Commands::Import { name } => {
            let imported = sync.import_group(name)?;
            sync.session().save(&imported)?;
            print_value(cli.format, &imported, || {
                format!("{}: {} channels", name, imported.ordered_channels().len())
            })?;
            Ok(true)
        }
    }
}

fn print_value<T: Serialize>(format: Format, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => println!("{}", text()),
    }
    Ok(())
}

fn save_environment(env: &MockEnvironment, path: &Path) -> Result<()> {
    env.save(path)
        .with_context(|| format!("Failed to write environment to {}", path.display()))
}
