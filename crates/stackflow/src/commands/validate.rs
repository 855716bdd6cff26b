use colored::Colorize;
use stackflow_core::{DefinitionTree, Sorter, TopologicalSorter, default_validators};
use std::path::Path;

pub fn handle(path: &Path) -> anyhow::Result<()> {
    println!("{}", "Validating definition...".blue());

    let result = super::load_definition(path).and_then(|mut tree| {
        let order = check(&mut tree)?;
        Ok((tree, order))
    });

    match result {
        Ok((tree, order)) => {
            println!("{}", "✓ Definition is valid".green().bold());
            println!();
            println!("Provisioning order for {}:", tree.name().cyan());
            for (index, name) in order.iter().enumerate() {
                let kind = tree.resource(name).map(|r| r.kind()).unwrap_or("?");
                println!("  {}. {} ({})", index + 1, name.cyan(), kind);
            }
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Definition error".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn check(tree: &mut DefinitionTree) -> stackflow_core::Result<Vec<String>> {
    tree.fill_defaults()?;
    for validator in default_validators() {
        validator.validate(tree)?;
    }
    TopologicalSorter::new().sort(tree)
}
