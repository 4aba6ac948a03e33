//! mdxtab CLI - validate and render mdxtab documents

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdxtab::prelude::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "mdxtab")]
#[command(author, version, about = "Compile markdown documents with typed tables")]
struct Cli {
    /// Log compiler progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a document and report the first problem
    Validate {
        /// Input document
        input: PathBuf,

        /// Print diagnostics as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Compile a document and print it with aggregate values filled in
    Render {
        /// Input document
        input: PathBuf,

        /// Leave the schema section out of the output
        #[arg(long)]
        no_frontmatter: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full compile result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let stderr = io::stderr();
    match execute(&cli.command, &mut stdout.lock(), &mut stderr.lock()) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Run a command, returning the process exit status
fn execute(command: &Commands, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
    match command {
        Commands::Validate { input, json } => validate_file(input, *json, out, err),
        Commands::Render {
            input,
            no_frontmatter,
            output,
            json,
        } => {
            let options = CompileOptions {
                include_frontmatter: !no_frontmatter,
            };
            render_file(input, &options, output.as_deref(), *json, out, err)
        }
    }
}

fn read_document(input: &Path) -> Result<String> {
    std::fs::read_to_string(input).with_context(|| format!("Failed to read '{}'", input.display()))
}

fn validate_file(input: &Path, json: bool, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
    let raw = read_document(input)?;
    let diagnostics = validate(&raw);
    tracing::debug!(file = %input.display(), count = diagnostics.len(), "validated");

    if json {
        let body = serde_json::json!({ "diagnostics": diagnostics });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else if diagnostics.is_empty() {
        writeln!(out, "OK")?;
    } else {
        for diagnostic in &diagnostics {
            writeln!(err, "{}", format_diagnostic(input, diagnostic))?;
        }
    }

    Ok(if diagnostics.is_empty() { 0 } else { 1 })
}

fn render_file(
    input: &Path,
    options: &CompileOptions,
    output: Option<&Path>,
    json: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<u8> {
    let raw = read_document(input)?;
    let result = match compile(&raw, options) {
        Ok(result) => result,
        Err(diagnostic) => {
            writeln!(err, "{}", format_diagnostic(input, &diagnostic))?;
            return Ok(1);
        }
    };

    let mut text = if json {
        serde_json::to_string_pretty(&result).context("Failed to serialize compile result")?
    } else {
        result.rendered
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }

    match output {
        Some(path) => std::fs::write(path, &text)
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => out.write_all(text.as_bytes())?,
    }
    Ok(0)
}

/// `file:line:col: [CODE] message (context)`, one-based positions
fn format_diagnostic(input: &Path, diagnostic: &Diagnostic) -> String {
    let mut line = input.display().to_string();
    if let Some(range) = diagnostic.range {
        line.push_str(&format!(
            ":{}:{}",
            range.start.line + 1,
            range.start.character + 1
        ));
    }
    line.push_str(&format!(": {}", diagnostic));
    if let Some(context) = diagnostic.context_label() {
        line.push_str(&format!(" ({})", context));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const DOC: &str = "---
mdxtab: \"1.0\"
tables:
  items:
    columns: [id, price]
    aggregates:
      total: sum(price)
---

## items
| id | price |
|----|-------|
| a  | 3     |
| b  | 4     |

Total: {{ items.total }}";

    fn fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn run(command: Commands) -> (u8, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let status = execute(&command, &mut out, &mut err).unwrap();
        (
            status,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_validate_ok() {
        let file = fixture(DOC);
        let (status, out, err) = run(Commands::Validate {
            input: file.path().to_path_buf(),
            json: false,
        });
        assert_eq!(status, 0);
        assert_eq!(out, "OK\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_validate_failure() {
        let file = fixture(&DOC.replace("items.total", "items.missing"));
        let (status, out, err) = run(Commands::Validate {
            input: file.path().to_path_buf(),
            json: false,
        });
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert!(err.contains(":16:8: [E_AGG_REF] Unknown aggregate reference items.missing"), "{}", err);
        assert!(err.contains("(table=items, aggregate=missing)"), "{}", err);
    }

    #[test]
    fn test_validate_json() {
        let file = fixture(&DOC.replace("items.total", "items.missing"));
        let (status, out, _) = run(Commands::Validate {
            input: file.path().to_path_buf(),
            json: true,
        });
        assert_eq!(status, 1);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        let diagnostics = value["diagnostics"].as_array().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0]["code"], "E_AGG_REF");

        let file = fixture(DOC);
        let (status, out, _) = run(Commands::Validate {
            input: file.path().to_path_buf(),
            json: true,
        });
        assert_eq!(status, 0);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["diagnostics"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_render() {
        let file = fixture(DOC);
        let (status, out, _) = run(Commands::Render {
            input: file.path().to_path_buf(),
            no_frontmatter: false,
            output: None,
            json: false,
        });
        assert_eq!(status, 0);
        assert!(out.starts_with("---\nmdxtab"));
        assert!(out.ends_with("Total: 7\n"));

        let (_, out, _) = run(Commands::Render {
            input: file.path().to_path_buf(),
            no_frontmatter: true,
            output: None,
            json: false,
        });
        assert!(out.starts_with("\n\n## items"));
    }

    #[test]
    fn test_render_to_file_and_json() {
        let file = fixture(DOC);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.md");
        let (status, out, _) = run(Commands::Render {
            input: file.path().to_path_buf(),
            no_frontmatter: true,
            output: Some(target.clone()),
            json: false,
        });
        assert_eq!(status, 0);
        assert!(out.is_empty());
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.ends_with("Total: 7\n"));

        let (_, out, _) = run(Commands::Render {
            input: file.path().to_path_buf(),
            no_frontmatter: false,
            output: None,
            json: true,
        });
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["tables"]["items"]["aggregates"]["total"], 7.0);
    }

    #[test]
    fn test_missing_file() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = execute(
            &Commands::Validate {
                input: PathBuf::from("/nonexistent/doc.md"),
                json: false,
            },
            &mut out,
            &mut err,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["mdxtab", "-v", "render", "doc.md", "--no-frontmatter", "-o", "out.md"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Render {
                no_frontmatter,
                output,
                json,
                ..
            } => {
                assert!(no_frontmatter);
                assert!(!json);
                assert_eq!(output, Some(PathBuf::from("out.md")));
            }
            Commands::Validate { .. } => panic!("expected render"),
        }
    }
}
