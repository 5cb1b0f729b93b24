//! Tessera command-line shell
//!
//! This is the thin shell around the engine crates. It wires configuration,
//! descriptor loading, candidate generation, the HTTP transport and the
//! worker pool together, and prints the found accounts as JSON at the end.

#![warn(clippy::all)]

pub mod cli;
pub mod prompt;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use prompt::{spawn_interrupt_handler, LogProgress, StdinResolver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{AppConfig, CandidatePattern, ServiceKey};
use tessera_descriptor::{DescriptorLoader, DescriptorRegistry};
use tessera_probe::{
    HttpTransport, ProbeSettings, ReqwestTransport, ServiceChecker, SignerRegistry,
};
use tessera_proxy::load_proxies;
use tessera_scheduler::{Coordinator, RunSettings};
use tracing::{info, warn};

const DEBUG_REQUESTS_ENV: &str = "TESSERA_DEBUG_REQUESTS";

/// Initialize tracing.
///
/// `RUST_LOG` wins over the configured filter; `-v` raises the default.
fn init_tracing(default_filter: &str, verbose: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fallback = match verbose {
        0 => default_filter.to_string(),
        1 => format!("{default_filter},tessera=debug,tessera_app=debug"),
        _ => "trace".to_string(),
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    if std::env::var(DEBUG_REQUESTS_ENV).is_ok_and(|v| v == "1") {
        if let Ok(directive) = "tessera::requests=info".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Directories searched for descriptors, in load order.
#[must_use]
pub fn descriptor_dirs(config: &AppConfig, cli: &Cli) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(dir) = AppConfig::descriptor_dir() {
        dirs.push(dir);
    }
    dirs.extend(config.descriptors.extra_dirs.iter().cloned());
    dirs.extend(cli.descriptor_dirs.iter().cloned());
    dirs
}

/// Load every descriptor found in `dirs`.
///
/// # Errors
/// Returns error if a descriptor directory cannot be read.
pub fn load_registry(dirs: &[PathBuf]) -> Result<DescriptorRegistry> {
    let loader = DescriptorLoader::from_dirs(dirs.iter().cloned());
    let registry =
        DescriptorRegistry::from_loader(&loader).context("failed to load service descriptors")?;

    for warning in registry.duplicate_warnings() {
        warn!("{warning}");
    }
    Ok(registry)
}

/// Combine configuration, flags and descriptor hints into run settings.
///
/// Without `--delay` the slowest recommended delay of the selected services
/// applies, unless the configured delay is longer.
#[must_use]
pub fn build_settings(
    config: &AppConfig,
    cli: &Cli,
    registry: &DescriptorRegistry,
    services: &[ServiceKey],
) -> RunSettings {
    let mut settings = RunSettings::from_config(config);

    if let Some(threads) = cli.threads {
        settings.threads = threads;
    }
    settings.delay = match cli.delay {
        Some(secs) => Duration::from_secs(secs),
        None => registry
            .max_recommended_delay(Some(services))
            .max(settings.delay),
    };
    settings.pause_on_found &= !cli.no_pause;
    settings.auto_continue |= cli.auto_continue;
    settings
}

fn print_services(registry: &DescriptorRegistry) {
    if registry.count() == 0 {
        println!("No service descriptors loaded.");
    }
    for descriptor in registry.get_all() {
        let source = registry
            .source_of(descriptor.key().as_str())
            .map(tessera_descriptor::DescriptorSource::selected_file)
            .unwrap_or_default();
        println!(
            "{:<20} {:<24} proxy: {:<5} delay: {}s endpoints: {} {}",
            descriptor.key().as_str(),
            descriptor.display_name,
            descriptor.requires_proxy,
            descriptor.recommended_delay().as_secs(),
            descriptor.endpoints.len(),
            source
        );
    }
    for warning in registry.duplicate_warnings() {
        println!("note: {warning}");
    }
}

/// Run the CLI.
///
/// # Errors
/// Returns error for invalid input or when the run cannot be started.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    init_tracing(&config.general.log_filter, cli.verbose);

    info!("Starting Tessera v{}", env!("CARGO_PKG_VERSION"));

    let registry = load_registry(&descriptor_dirs(&config, &cli))?;
    if cli.show_services {
        print_services(&registry);
        return Ok(());
    }

    let services = registry.validate_services(cli.services.as_deref());
    if services.is_empty() {
        bail!("no services to check; add descriptors with --descriptors or select loaded ones with --services");
    }

    let Some(raw_pattern) = cli.pattern.as_deref() else {
        bail!("a phone number pattern is required");
    };
    let pattern = CandidatePattern::parse(raw_pattern, config.candidates.max_wildcards)?;
    if let Some(country) = pattern.prefix_country().filter(|_| !cli.country_prefixes) {
        info!(
            country = country.name,
            code = country.code,
            "pattern supports --country-prefixes for better coverage"
        );
    }

    let max_variations = cli
        .max_variations
        .unwrap_or(config.candidates.max_variations);
    let items = pattern.work_items(cli.country_prefixes, cli.start_index, max_variations);
    if items.is_empty() {
        bail!("no variations to process (start index past the end or more than {max_variations} variations)");
    }

    let proxies = match &cli.proxies {
        Some(path) => load_proxies(path)?,
        None => Vec::new(),
    };
    let proxy_required = registry.proxy_required_services(Some(&services));
    if proxies.is_empty() && !proxy_required.is_empty() {
        let names: Vec<&str> = proxy_required.iter().map(ServiceKey::as_str).collect();
        warn!(
            services = %names.join(", "),
            "services recommend proxies; consider --proxies"
        );
    }

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(&config.probing.user_agent)?);
    let checker = ServiceChecker::new(
        &registry,
        &services,
        &transport,
        &Arc::new(SignerRegistry::new()),
        &ProbeSettings::from_config(&config.probing),
    )?;

    let settings = build_settings(&config, &cli, &registry, &services);
    info!(
        services = %checker.service_names().join(", "),
        variations = items.len(),
        threads = settings.threads,
        delay_secs = settings.delay.as_secs(),
        "ready"
    );

    let mut coordinator = Coordinator::new(Arc::new(checker), settings)
        .with_progress_sink(Arc::new(LogProgress::default()));
    if coordinator.settings().pause_on_found && !coordinator.settings().auto_continue {
        coordinator = coordinator.with_resolver(Arc::new(StdinResolver::spawn()?));
    }

    spawn_interrupt_handler(coordinator.control())
        .context("failed to install the interrupt handler")?;

    let report = coordinator.run(items, proxies)?;
    info!(
        checked = report.summary.total_checked,
        found = report.found.len(),
        errors = report.summary.errors,
        rate_limited = report.summary.rate_limited,
        stopped = report.stopped,
        "summary"
    );

    println!("{}", serde_json::to_string_pretty(&report.found)?);
    Ok(())
}
