use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::PipelineOutput;

pub mod formatters;

pub use formatters::*;

fn render(output: &PipelineOutput, format: &OutputFormat, preview_words: Option<usize>) -> Result<String> {
    let content = match format {
        OutputFormat::Text => format_as_text(output, preview_words),
        OutputFormat::Json => format_as_json(output)?,
        OutputFormat::Timestamped => format_as_timestamped(output),
    };
    Ok(content)
}

/// Save a transcript to file
pub async fn save_to_file(
    output: &PipelineOutput,
    path: &Path,
    format: &OutputFormat,
    preview_words: Option<usize>,
) -> Result<()> {
    let content = render(output, format, preview_words)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a transcript to stdout
pub fn print_to_console(
    output: &PipelineOutput,
    format: &OutputFormat,
    preview_words: Option<usize>,
) -> Result<()> {
    let content = render(output, format, preview_words)?;
    println!("{}", content);
    Ok(())
}
