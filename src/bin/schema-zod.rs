//! Schema Zod CLI
//!
//! Command-line interface for compiling schema graphs into Zod validators
//! and tool contracts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_zod::{
    build_tools, compile, compile_entities, lint, load_graph_auto, Compilation, EmitOptions,
    FileStatus, SchemaGraph, Severity, ToolOptions,
};

use report::{Style, CONCERNS};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-zod")]
#[command(about = "Compile schema graphs into Zod validators and tool contracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a graph into a TypeScript module of Zod validators
    Zod {
        /// Graph source: file path or URL (http:// or https://)
        graph: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also emit per-entity Get/Create/Update/Delete validators
        #[arg(long)]
        entities: bool,

        /// Skip `export type X = z.infer<typeof X>` aliases
        #[arg(long)]
        no_infer: bool,

        /// Module the generated file imports `z` from
        #[arg(long, default_value = "zod")]
        zod_module: String,
    },

    /// Print tool descriptors for the graph's entities as JSON
    Tools {
        /// Graph source: file path or URL (http:// or https://)
        graph: String,

        /// Restrict tools to these entity models (repeatable)
        #[arg(long = "entity")]
        entities: Vec<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Strict mode: set additionalProperties=false to reject unknown fields (default: false)
        #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
        strict: bool,
    },

    /// Dispatch one tool request to a REST backend
    #[cfg(feature = "remote")]
    Call {
        /// Graph source: file path or URL (http:// or https://)
        graph: String,

        /// Backend base URL; each entity lives under /<snake plural>
        #[arg(long)]
        base_url: String,

        /// Request JSON: {"name": "...", "arguments": {...}}
        #[arg(long)]
        request: String,

        /// Strict mode: reject unknown arguments (default: false)
        #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
        strict: bool,
    },

    /// Serve tool requests read line by line from stdin
    #[cfg(feature = "remote")]
    Serve {
        /// Graph source: file path or URL (http:// or https://)
        graph: String,

        /// Backend base URL; each entity lives under /<snake plural>
        #[arg(long)]
        base_url: String,

        /// Strict mode: reject unknown arguments (default: false)
        #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
        strict: bool,
    },

    /// Lint graph documents (syntax, entity keys, tool names, unresolved references)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Zod {
            graph,
            output,
            entities,
            no_infer,
            zod_module,
        } => {
            let options = EmitOptions::new()
                .zod_module(zod_module)
                .infer_types(!no_infer);
            run_zod(&graph, output, entities, &options)
        }

        Commands::Tools {
            graph,
            entities,
            pretty,
            strict,
        } => {
            let mut options = ToolOptions::new().strict(strict);
            if !entities.is_empty() {
                options = options.entities(entities);
            }
            run_tools(&graph, &options, pretty)
        }

        #[cfg(feature = "remote")]
        Commands::Call {
            graph,
            base_url,
            request,
            strict,
        } => serve::run_call(&graph, &base_url, &request, strict),

        #[cfg(feature = "remote")]
        Commands::Serve {
            graph,
            base_url,
            strict,
        } => serve::run_serve(&graph, &base_url, strict),

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load(source: &str) -> Result<SchemaGraph, u8> {
    load_graph_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_zod(
    source: &str,
    output: Option<PathBuf>,
    entities: bool,
    options: &EmitOptions,
) -> Result<(), u8> {
    let graph = load(source)?;

    let compiled = if entities {
        compile_entities(&graph, None, options)
    } else {
        compile(&graph, options)
    };
    let compilation: Compilation = compiled.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    for diag in compilation.diagnostics() {
        eprintln!("{}", report::diagnostic(diag, Style::Plain));
    }

    let source = compilation.render();
    match output {
        Some(path) => {
            std::fs::write(&path, &source).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            print!("{}", source);
        }
    }

    Ok(())
}

fn run_tools(source: &str, options: &ToolOptions, pretty: bool) -> Result<(), u8> {
    let graph = load(source)?;

    let tools = build_tools(&graph, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let listing = tools.to_json();
    let json_output = if pretty {
        serde_json::to_string_pretty(&listing)
    } else {
        serde_json::to_string(&listing)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    println!("{}", json_output);
    Ok(())
}

#[cfg(feature = "remote")]
mod serve {
    use std::io::{BufRead, Write};
    use std::sync::Arc;

    use schema_zod::{build_tools, RestHandler, ToolOptions, ToolResponse, ToolRouter};

    use super::load;

    fn router(source: &str, base_url: &str, strict: bool) -> Result<ToolRouter, u8> {
        let graph = load(source)?;
        let tools = build_tools(&graph, &ToolOptions::new().strict(strict)).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
        let mut router = ToolRouter::new(tools).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

        for entity in router.entities() {
            let handler = RestHandler::for_entity(base_url, &entity).map_err(|e| {
                eprintln!("Error: {}", e);
                3u8
            })?;
            router.register(entity, Arc::new(handler));
        }
        Ok(router)
    }

    fn envelope(response: &ToolResponse) -> Result<String, u8> {
        serde_json::to_string(response).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })
    }

    pub fn run_call(source: &str, base_url: &str, request: &str, strict: bool) -> Result<(), u8> {
        let router = router(source, base_url, strict)?;
        let response = router.call_json(request);
        println!("{}", envelope(&response)?);
        if response.is_error() {
            Err(1)
        } else {
            Ok(())
        }
    }

    pub fn run_serve(source: &str, base_url: &str, strict: bool) -> Result<(), u8> {
        let router = router(source, base_url, strict)?;
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout().lock();

        for line in stdin.lock().lines() {
            let line = line.map_err(|e| {
                eprintln!("Error reading stdin: {}", e);
                3u8
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let response = router.call_json(&line);
            writeln!(stdout, "{}", envelope(&response)?)
                .and_then(|()| stdout.flush())
                .map_err(|e| {
                    eprintln!("Error writing stdout: {}", e);
                    3u8
                })?;
        }
        Ok(())
    }
}

/// Diagnostic rendering shared by `zod` and `lint`.
mod report {
    use schema_zod::{Diagnostic, GraphSummary, Severity};

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RESET: &str = "\x1b[0m";

    /// Lint codes grouped by the part of the graph they concern.
    pub const CONCERNS: [(&str, &[&str]); 4] = [
        ("document", &["E001", "W002"]),
        ("references", &["W001"]),
        ("entities", &["E002"]),
        ("tools", &["E003"]),
    ];

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub enum Style {
        Plain,
        Color,
    }

    /// `warning[W001] Todo/owner: unresolved reference ...`
    pub fn diagnostic(diag: &Diagnostic, style: Style) -> String {
        let (color, label) = match diag.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        match style {
            Style::Plain => format!("{label}[{}] {}: {}", diag.code, diag.path, diag.message),
            Style::Color => format!(
                "{color}{label}[{}]{RESET} {}: {}",
                diag.code, diag.path, diag.message
            ),
        }
    }

    fn plural(n: usize, one: &str, many: &str) -> String {
        format!("{n} {}", if n == 1 { one } else { many })
    }

    /// `3 declarations, 1 entity, 5 tools`
    pub fn summary(summary: &GraphSummary) -> String {
        format!(
            "{}, {}, {}",
            plural(summary.declarations, "declaration", "declarations"),
            plural(summary.entities.len(), "entity", "entities"),
            plural(summary.tools, "tool", "tools"),
        )
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let json_output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json_output);
        return if passed { Ok(()) } else { Err(1) };
    }

    if !quiet {
        println!("Linting {} ...\n", path.display());
    }

    let mut entities = 0;
    let mut tools = 0;
    for file_result in &result.results {
        let (color, icon) = match file_result.status {
            FileStatus::Ok => (report::GREEN, "✓"),
            FileStatus::Warning => (report::YELLOW, "⚠"),
            FileStatus::Error => (report::RED, "✗"),
        };
        if let Some(summary) = &file_result.summary {
            entities += summary.entities.len();
            tools += summary.tools;
        }

        if !quiet || file_result.status != FileStatus::Ok {
            match &file_result.summary {
                Some(summary) => println!(
                    "  {color}{icon}{} {} ({})",
                    report::RESET,
                    file_result.file.display(),
                    report::summary(summary)
                ),
                None => println!("  {color}{icon}{} {}", report::RESET, file_result.file.display()),
            }
        }

        for (concern, codes) in CONCERNS {
            let shown: Vec<_> = file_result
                .diagnostics
                .iter()
                .filter(|d| codes.contains(&d.code.as_str()))
                .filter(|d| !quiet || d.severity == Severity::Error)
                .collect();
            if shown.is_empty() {
                continue;
            }
            println!("    {concern}");
            for diag in shown {
                println!("      {}", report::diagnostic(diag, Style::Color));
            }
        }
    }

    println!();
    if passed {
        println!(
            "{}✓ {} files checked, all passed ({} entities, {} tools){}",
            report::GREEN,
            result.files_checked,
            entities,
            tools,
            report::RESET
        );
        Ok(())
    } else {
        println!(
            "{}✗ {} files checked: {} passed, {} failed ({} errors, {} warnings){}",
            report::RED,
            result.files_checked,
            result.passed,
            result.failed,
            result.errors,
            result.warnings,
            report::RESET
        );
        Err(1)
    }
}
