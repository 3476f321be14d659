//! The `info` command: list the sources this build understands.

use console::style;

use speechcorpus::models::Source;
use speechcorpus::Config;

use crate::cli::icons::dim_arrow;

fn description(source: Source) -> (&'static str, &'static str) {
    match source {
        Source::ViePublique => ("Public speeches from vie-publique.fr", "1974+"),
        Source::Senat => ("Senate session transcripts", "2003+"),
        Source::Assemblee => ("National Assembly debates", "2011+ structured"),
        Source::Europarl => ("European Parliament, French members", "1999+"),
    }
}

pub fn cmd_info(config: &Config) -> anyhow::Result<()> {
    println!("{}", style("speechcorpus sources").bold());
    println!();

    let enabled = config.enabled_sources();
    for source in Source::ALL {
        let (about, coverage) = description(source);
        let status = if enabled.contains(&source) {
            style("enabled").green()
        } else {
            style("disabled").dim()
        };
        println!(
            "  {} {:<40} {:<18} {}",
            style(format!("{:<14}", source.as_str())).cyan(),
            about,
            coverage,
            status
        );
    }

    println!();
    println!("{} speechcorpus run", dim_arrow());
    println!("{} speechcorpus run --source senat", dim_arrow());
    println!("{} speechcorpus validate-config speechcorpus.yaml", dim_arrow());
    Ok(())
}
