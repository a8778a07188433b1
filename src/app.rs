use crate::{
    cli::{TargetList, args::Cli},
    config::{ConfigLoader, ProxyConfig},
    core::ScanOrchestrator,
    reporters::{BatchReport, writer},
    ui::{ProgressManager, printer},
    utils::logging,
};
use anyhow::Result;
use futures::stream::{self, StreamExt};

pub async fn run(cli: Cli) -> Result<()> {
    let level = logging::level_from_cli(&cli);
    logging::init(level)?;

    tracing::info!("Starting onionscan for input: {}", cli.target);

    let mut settings = ConfigLoader::load_with_custom_path(cli.config.as_deref())?;
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(max_targets) = cli.max_targets {
        settings.concurrency.max_targets = max_targets;
    }
    ConfigLoader::validate(&settings)?;

    let proxy = ProxyConfig::from_env(cli.proxy_host.as_deref(), cli.proxy_port.as_deref());
    tracing::info!("Routing all probes through socks5h proxy {}", proxy.address());

    let list = TargetList::load(&cli.target)?;
    let max_targets = settings.concurrency.max_targets;
    let orchestrator = ScanOrchestrator::new(&proxy, settings)?;

    let progress = ProgressManager::new(list.targets.len());
    for (input, err) in &list.rejected {
        progress.print_error(&format!("skipping {}: {}", input, err));
    }
    if list.targets.is_empty() {
        progress.finish();
        anyhow::bail!("no valid targets in {:?}", cli.target);
    }

    let orchestrator = &orchestrator;
    let progress_ref = &progress;
    let reports: BatchReport = stream::iter(&list.targets)
        .map(move |target| async move {
            progress_ref.target_started(&target.host);
            let report = orchestrator.scan_target(target).await;
            progress_ref.target_finished(&report);
            report
        })
        .buffer_unordered(max_targets)
        .map(|report| (report.target.clone(), report))
        .collect()
        .await;
    progress.finish();

    writer::write_json(&reports, &cli.output)?;
    printer::print_summary(&reports, list.rejected.len(), &cli.output);

    Ok(())
}
