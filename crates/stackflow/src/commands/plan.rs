use colored::Colorize;
use stackflow_cloud::{
    Checkpoint, DiffKind, Executor, ExecutorOptions, InMemoryBackend, RunReport, StateManager,
};
use stackflow_config::EngineConfig;
use stackflow_core::DefinitionTree;
use std::path::Path;

pub async fn handle(path: &Path, save: bool, config: &EngineConfig) -> anyhow::Result<()> {
    println!("{}", "Planning against an in-memory backend...".blue());

    let mut tree = super::load_definition(path)?;
    let backend = InMemoryBackend::new();
    let result = Executor::new(&mut tree, &backend)
        .with_options(ExecutorOptions::from(config))
        .run()
        .await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Plan failed".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    print_report(&report);

    if save {
        save_checkpoint(&tree, &report, config).await?;
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("Order: {}", report.order.join(" -> ").cyan());
    println!();
    for diff in &report.diffs {
        let line = format!("{} {}", diff.kind, diff.target);
        match diff.kind {
            DiffKind::Create => println!("  {} {}", "+".green(), line.green()),
            DiffKind::Modify => println!("  {} {}", "~".yellow(), line.yellow()),
            DiffKind::Destroy => println!("  {} {}", "-".red(), line.red()),
            DiffKind::Noop => println!("  {} {}", "=".dimmed(), line.dimmed()),
        }
        for change in &diff.changes {
            println!(
                "      {}: {} -> {}",
                change.attribute, change.current, change.desired
            );
        }
    }

    if !report.created.is_empty() {
        println!();
        println!("Created:");
        for created in &report.created {
            println!(
                "  {} ({}) id={}",
                created.name.cyan(),
                created.kind,
                created.id
            );
        }
    }

    if !report.attachments.is_empty() {
        println!();
        println!("Attached:");
        for attachment in &report.attachments {
            println!(
                "  {}.{} = {}",
                attachment.resource.cyan(),
                attachment.path.join("."),
                attachment.value
            );
        }
    }

    println!();
    println!(
        "{} after {} pass(es)",
        report.summary.to_string().bold(),
        report.passes
    );
}

async fn save_checkpoint(
    tree: &DefinitionTree,
    report: &RunReport,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let manager = StateManager::from_config(std::env::current_dir()?, config);
    let lock = manager.acquire_lock().await?;
    manager
        .save(&Checkpoint::from_report(tree, report))
        .await?;
    lock.release().await?;

    println!(
        "{} {}",
        "✓ Checkpoint saved to".green(),
        manager.state_path().display()
    );
    Ok(())
}
