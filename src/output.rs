use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    CollectResult, IndexResult, ListResult, LoadResult, ProgressEvent, ProgressSink,
    PublishResult, RegisterResult,
};
use crate::registry::{IndexStatus, RegisterOutcome};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_show(result: &LoadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_register(result: &RegisterResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_publish(result: &PublishResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_index(result: &IndexResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_collect(result: &CollectResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Plain-text summaries on stdout, progress lines on stderr.
pub struct TextOutput;

impl TextOutput {
    pub fn print_list(result: &ListResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if result.collections.is_empty() {
            writeln!(stdout, "no gene set collections found")?;
        }
        for entry in &result.collections {
            let organism = match (&entry.organism, &entry.organism_name) {
                (Some(id), Some(name)) if name != id => format!("{name} ({id})"),
                (Some(id), _) => id.clone(),
                (None, _) => "any organism".to_string(),
            };
            let availability = if entry.local { "local" } else { "remote" };
            writeln!(
                stdout,
                "{:<40} {:<32} {availability}",
                entry.hierarchy.join("/"),
                organism
            )?;
        }
        Ok(())
    }

    pub fn print_show(result: &LoadResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}: {} gene sets", result.key, result.count)?;
        for geneset in &result.genesets {
            let name = geneset.name.as_deref().unwrap_or("");
            writeln!(stdout, "  {:<24} {:>6}  {name}", geneset.id, geneset.size())?;
        }
        Ok(())
    }

    pub fn print_register(result: &RegisterResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}: {} collections", result.source, result.registered.len())?;
        for outcome in &result.registered {
            write_outcome(&mut stdout, outcome)?;
        }
        Ok(())
    }

    pub fn print_publish(result: &PublishResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "published {} collections", result.registered.len())?;
        for outcome in &result.registered {
            write_outcome(&mut stdout, outcome)?;
        }
        for failure in &result.failures {
            writeln!(
                stdout,
                "  failed {} for {}: {}",
                failure.source, failure.organism, failure.message
            )?;
        }
        Ok(())
    }

    pub fn print_index(result: &IndexResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "catalog lists {} files", result.files.len())?;
        if let Some(generated_at) = &result.generated_at {
            writeln!(stdout, "  generated at {generated_at}")?;
        }
        Ok(())
    }

    pub fn print_collect(result: &CollectResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        match &result.output {
            Some(path) => writeln!(stdout, "wrote {} gene sets to {path}", result.count),
            None => {
                stdout.write_all(crate::providers::gmt::write_gmt(&result.genesets).as_bytes())
            }
        }
    }
}

fn write_outcome(out: &mut impl Write, outcome: &RegisterOutcome) -> io::Result<()> {
    let index = match &outcome.index {
        Some(IndexStatus::Updated { files }) => format!(", catalog updated ({files} files)"),
        Some(IndexStatus::Failed { message }) => format!(", catalog NOT updated: {message}"),
        None => String::new(),
    };
    writeln!(
        out,
        "  {} -> {} [{}] {} gene sets{index}",
        outcome.key, outcome.filename, outcome.destination, outcome.genesets
    )
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
