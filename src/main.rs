use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use resumegen::compile::{CommandCompiler, DocumentCompiler};
use resumegen::document::{DocumentRecord, DocumentStore, TitleFormatter};
use resumegen::source::{fetch_or_none, Credential, FileResumeSource, ResumeSource, TokenDirectorySource};
use resumegen::{gallery, spawn_prerender, AppConfig, RenderService, ResumeData};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct DataArgs {
    /// Resume data file (JSON or YAML); a local file is read without --token
    #[arg(short, long, conflicts_with = "data_dir")]
    data: Option<PathBuf>,

    /// Directory of per-user resume data files, selected by --token
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Bearer token of the signed-in user
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in templates
    Templates {
        /// Render every template into the cache in the background
        #[arg(long)]
        prerender: bool,

        #[command(flatten)]
        data: DataArgs,
    },
    /// Print a template resolved with the user's data, or with defaults
    Render {
        /// Built-in template id or path to a template file
        #[arg(long)]
        template: String,

        #[command(flatten)]
        data: DataArgs,
    },
    /// Create a resume document from a built-in template
    New {
        /// Built-in template id
        #[arg(long)]
        template: String,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory (overrides config if provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Dry run mode - don't write files
        #[arg(long)]
        dry_run: bool,
    },
    /// Compile LaTeX markup into a PDF
    Compile {
        /// LaTeX source file
        #[arg(long)]
        input: PathBuf,

        /// PDF output path (defaults to the input with a .pdf extension)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) if path.exists() => {
            info!("Loading config from {:?}", path);
            AppConfig::load(path).context("Failed to load config")?
        }
        Some(path) => {
            warn!("Config file {:?} not found, using defaults", path);
            AppConfig::default()
        }
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Templates { prerender, data } => list_templates(&config, prerender, &data),
        Commands::Render { template, data } => render(&config, &template, &data),
        Commands::New {
            template,
            data,
            output,
            dry_run,
        } => new_document(&config, &template, &data, output, dry_run),
        Commands::Compile { input, out } => compile(&config, &input, out),
    }
}

impl DataArgs {
    fn credential(&self) -> Option<Credential> {
        self.token.clone().and_then(Credential::new)
    }

    fn source(&self) -> Option<Box<dyn ResumeSource>> {
        if let Some(path) = &self.data {
            Some(Box::new(FileResumeSource::new(path)))
        } else {
            self.data_dir
                .as_ref()
                .map(|dir| Box::new(TokenDirectorySource::new(dir)) as Box<dyn ResumeSource>)
        }
    }

    fn fetch(&self) -> Option<ResumeData> {
        let source = self.source()?;
        fetch_or_none(source.as_ref(), self.credential().as_ref())
    }
}

fn list_templates(config: &AppConfig, prerender: bool, data: &DataArgs) -> Result<()> {
    for template in gallery::all() {
        println!("{:<14} {:<14} {}", template.id, template.name, template.description);
    }

    if prerender {
        let service = Arc::new(Mutex::new(RenderService::from_config(config)));
        let handle = spawn_prerender(
            Arc::clone(&service),
            gallery::all(),
            data.fetch(),
            config.prerender.chunk_size,
        );
        let rendered = handle
            .join()
            .map_err(|_| anyhow::anyhow!("Prerender thread panicked"))?;
        let stats = service
            .lock()
            .map_err(|_| anyhow::anyhow!("Render service lock was poisoned"))?
            .cache_stats();
        info!(
            "Prerendered {} templates ({}/{} cache entries)",
            rendered, stats.len, stats.capacity
        );
    }
    Ok(())
}

/// Looks up a built-in template by id, falling back to a template file.
fn template_content(template: &str) -> Result<(String, String)> {
    if let Some(builtin) = gallery::find(template) {
        return Ok((builtin.id.to_string(), builtin.content.to_string()));
    }
    let content = std::fs::read_to_string(template)
        .with_context(|| format!("'{}' is neither a built-in template nor a readable file", template))?;
    Ok((template.to_string(), content))
}

fn render(config: &AppConfig, template: &str, data: &DataArgs) -> Result<()> {
    let (id, content) = template_content(template)?;
    let mut service = RenderService::from_config(config);
    let resolved = match data.source() {
        Some(source) => service.resolve(&id, &content, source.as_ref(), data.credential().as_ref()),
        None => service.render_template(&id, &content, None),
    };
    println!("{}", resolved);
    Ok(())
}

fn new_document(
    config: &AppConfig,
    template: &str,
    data: &DataArgs,
    output: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let builtin = gallery::find(template)
        .ok_or_else(|| anyhow::anyhow!("Unknown template '{}'", template))?;

    if dry_run {
        info!("=== DRY RUN MODE ===");
    }

    let resume = data.fetch();
    let mut service = RenderService::from_config(config);
    let content = service.render_template(builtin.id, builtin.content, resume.as_ref());

    let titles = TitleFormatter::new(config.documents.title_template.as_str());
    let record = DocumentRecord::from_template(builtin, content, &titles, resume.as_ref())
        .context("Failed to create document")?;

    let output_dir = output.unwrap_or_else(|| config.documents.output_dir.clone());
    let store = DocumentStore::new(output_dir, dry_run);
    let path = store.save(&record).context("Failed to save document")?;
    info!("✓ Created '{}' ({})", record.title, record.id);
    println!("{}", path.display());

    if dry_run {
        info!("=== DRY RUN COMPLETE ===");
    }
    Ok(())
}

fn compile(config: &AppConfig, input: &Path, out: Option<PathBuf>) -> Result<()> {
    let markup = std::fs::read_to_string(input).with_context(|| format!("Failed to read {:?}", input))?;
    let title = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document");

    let compiler = CommandCompiler::new(config.compiler.clone());
    match compiler.compile(title, &markup) {
        Ok(pdf) => {
            let out = out.unwrap_or_else(|| input.with_extension("pdf"));
            std::fs::write(&out, pdf).with_context(|| format!("Failed to write {:?}", out))?;
            info!("✓ Wrote {:?}", out);
            Ok(())
        }
        Err(failure) => {
            error!("Compilation failed ({})", failure.category);
            if !failure.stdout.is_empty() {
                println!("{}", failure.stdout);
            }
            if !failure.stderr.is_empty() {
                eprintln!("{}", failure.stderr);
            }
            Err(failure.into())
        }
    }
}
