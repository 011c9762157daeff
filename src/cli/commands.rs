//! CLI command implementations
//!
//! Every command loads the configuration, opens the store read path, wires
//! the subsystems it needs, and maps the outcome to an exit code: 0 for a
//! healthy result, 1 for a degraded health grade, 2 for critical grades and
//! any error.

use std::path::Path;
use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::context::LifecycleContext;
use crate::health::{default_probes, BasicValidation, HealthScorer};
use crate::observability::Logger;
use crate::restore::RecoveryCoordinator;
use crate::snapshot::{compute_file_checksum, format_checksum, SnapshotStore};
use crate::store::{ChecksumFileOpener, ChecksumFileStore};
use crate::verify::IntegrityVerifier;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

type Ctx = Arc<LifecycleContext<ChecksumFileStore>>;

/// Parse arguments, dispatch, and return the process exit code.
pub fn run() -> CliResult<i32> {
    let cli = Cli::parse_args();

    match cli.command {
        Command::Health { config } => health(&config),
        Command::Snapshot {
            config,
            description,
            incremental,
        } => snapshot(&config, &description, incremental),
        Command::List { config } => list(&config),
        Command::Verify { config, id } => verify(&config, &id),
        Command::Restore { config, id, target } => restore(&config, &id, target.as_deref()),
        Command::Prune { config } => prune(&config),
        Command::Schedule { config } => schedule(&config),
    }
}

fn open_context(config_path: &Path) -> CliResult<Ctx> {
    let config = LifecycleConfig::load(config_path)?;
    let store = ChecksumFileStore::open(&config.db_path)?;
    Ok(Arc::new(LifecycleContext::new(store, config)))
}

fn snapshot_store(ctx: &Ctx) -> CliResult<Arc<SnapshotStore<ChecksumFileStore>>> {
    Ok(Arc::new(SnapshotStore::new(ctx.clone())?))
}

/// custodia health
pub fn health(config_path: &Path) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;
    let verifier = IntegrityVerifier::new(ctx.clone(), ChecksumFileOpener);
    let scorer = HealthScorer::new(
        ctx,
        snapshots,
        verifier,
        BasicValidation,
        default_probes(),
    );

    let report = scorer.run();
    scorer.write_report(&report)?;
    println!("{}", report.to_json()?);

    Ok(report.overall_status.exit_code())
}

/// custodia snapshot
pub fn snapshot(config_path: &Path, description: &str, incremental: bool) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;

    if incremental {
        match snapshots.create_incremental_snapshot(description)? {
            Some(record) => println!("created snapshot {}", record.id),
            None => println!("store unchanged since last snapshot, skipped"),
        }
    } else {
        let record = snapshots.create_snapshot(description)?;
        println!("created snapshot {}", record.id);
    }

    Ok(0)
}

/// custodia list
pub fn list(config_path: &Path) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;

    let records = snapshots.list_snapshots()?;
    if records.is_empty() {
        println!("no snapshots");
        return Ok(0);
    }

    for record in records {
        println!(
            "{}  {:>10} bytes  {}",
            record.id, record.artifact_size_bytes, record.description
        );
    }
    Ok(0)
}

/// custodia verify
pub fn verify(config_path: &Path, id: &str) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;
    let verifier = IntegrityVerifier::new(ctx, ChecksumFileOpener);

    let record = snapshots
        .find_snapshot(id)?
        .ok_or_else(|| CliError::io_error(format!("snapshot not found: {}", id)))?;

    let actual = compute_file_checksum(&record.artifact_path)?;
    let checksum_ok = format_checksum(actual) == record.checksum;
    let structure_ok = checksum_ok && verifier.verify(&record.artifact_path);

    if checksum_ok && structure_ok {
        println!("snapshot {} verified ok", id);
        Ok(0)
    } else {
        println!(
            "snapshot {} FAILED verification (checksum {}, structure {})",
            id,
            if checksum_ok { "ok" } else { "mismatch" },
            if structure_ok { "ok" } else { "bad" },
        );
        Ok(2)
    }
}

/// custodia restore
pub fn restore(config_path: &Path, id: &str, target: Option<&Path>) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;
    let verifier = IntegrityVerifier::new(ctx.clone(), ChecksumFileOpener);
    let coordinator = RecoveryCoordinator::new(ctx, snapshots, verifier);

    let outcome = coordinator.restore(id, target)?;
    println!("restored {} onto {}", outcome.snapshot_id, outcome.target.display());
    if let Some(safety) = outcome.safety_copy {
        println!("previous contents preserved at {}", safety.display());
    }
    Ok(0)
}

/// custodia prune
pub fn prune(config_path: &Path) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;

    let outcome = snapshots.enforce_retention(&ctx.config.retention)?;
    println!(
        "deleted {} snapshot(s), freed {} bytes",
        outcome.deleted_count, outcome.freed_bytes
    );
    Ok(0)
}

/// custodia schedule
///
/// Blocks until interrupted; jobs run on their configured calendars.
pub fn schedule(config_path: &Path) -> CliResult<i32> {
    let ctx = open_context(config_path)?;
    let snapshots = snapshot_store(&ctx)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let scheduler = crate::scheduler::Scheduler::new();
        crate::scheduler::register_standard_jobs(&scheduler, snapshots, &ctx.config)?;
        scheduler.start()?;

        for status in scheduler.status()? {
            let next = status
                .next_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("{}  next run {}", status.name, next);
        }

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| CliError::io_error(e.to_string()))?;
        Logger::info("SCHEDULER_SHUTDOWN", &[]);
        scheduler.stop()?;
        Ok::<_, CliError>(())
    })?;

    Ok(0)
}
