//! CLI binary for edgequake-examgen.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_examgen::{
    extract_only, generate_from_source, generate_from_text, generate_to_file, DocumentExporter,
    ExamGenError, GenerationConfig, GenerationOutput, GenerationProgressCallback, InputContent,
    ModelPolicy, ProgressCallback, RenderLine, SpanKind, DEFAULT_EXPORT_FILE_NAME,
};
use edgequake_examgen::config::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Single spinner that follows the request through extraction and generation.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, name: &str, kind: &str) {
        self.bar.set_prefix("Extracting");
        self.bar.set_message(format!("{kind} {name}"));
    }

    fn on_extraction_complete(&self, content_len: usize) {
        self.bar.println(format!(
            "  {} Input extracted  {}",
            green("✓"),
            dim(&format!("{content_len} chars"))
        ));
    }

    fn on_generation_start(&self, model: &str) {
        self.bar.set_prefix("Generating");
        self.bar.set_message(format!("waiting for {model}…"));
    }

    fn on_generation_complete(&self, text_len: usize, duration_ms: u64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Exam generated  {}  {}",
            green("✔"),
            dim(&format!("{text_len} chars")),
            dim(&format!("{:.1}s", duration_ms as f64 / 1000.0)),
        );
    }

    fn on_error(&self, _message: &str) {
        // main() prints the message once the error reaches it.
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate from a PDF exam (stdout)
  examgen de-thi.pdf

  # From a photo of an exam, export to Word
  examgen scan.jpg -o de-thi-tuong-tu.docx

  # From pasted text
  examgen --text "Câu 1. Giải phương trình $$x^2 - 4 = 0$$"

  # From stdin
  cat de-thi.txt | examgen --text-file -

  # One model for everything
  examgen --provider openai --model gpt-4.1 de-thi.docx

  # Show what would be sent (no API key needed)
  examgen --extract-only de-thi.pdf

  # JSON output with usage stats
  examgen --json de-thi.pdf > output.json

SUPPORTED INPUT:
  Images (PNG, JPEG, GIF, WebP, BMP, TIFF), PDF, DOCX. At most 10 MiB.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  PDFIUM_LIB_PATH         Path to libpdfium, needed for PDF input
"#;

/// Generate a similar exam from an existing one.
#[derive(Parser, Debug)]
#[command(
    name = "examgen",
    version,
    about = "Generate a similar exam from an image, PDF, DOCX or pasted text",
    long_about = "Read an existing exam (image, PDF, DOCX, or text) and ask a generative model \
for a new exam of the same structure and difficulty. Formulas in the result are wrapped in $$…$$.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL of the source exam.
    #[arg(required_unless_present_any = ["text", "text_file"], conflicts_with_all = ["text", "text_file"])]
    source: Option<String>,

    /// Exam content as text instead of a file.
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read exam text from this file (`-` for stdin).
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Export to this file (.docx, or .txt/.md for plain text).
    #[arg(short, long, env = "EXAMGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, env = "EXAMGEN_JSON")]
    json: bool,

    /// Print the extracted input content only, no generation.
    #[arg(long, conflicts_with = "output")]
    extract_only: bool,

    /// Do not highlight formulas.
    #[arg(long, env = "EXAMGEN_PLAIN")]
    plain: bool,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EXAMGEN_PROVIDER")]
    provider: Option<String>,

    /// Use one model for both text and image input.
    #[arg(long, env = "EXAMGEN_MODEL", conflicts_with_all = ["text_model", "image_model"])]
    model: Option<String>,

    /// Model for text input (pasted text, PDF, DOCX).
    #[arg(long, env = "EXAMGEN_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    text_model: String,

    /// Vision-capable model for image input.
    #[arg(long, env = "EXAMGEN_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "EXAMGEN_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "EXAMGEN_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "EXAMGEN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EXAMGEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "EXAMGEN_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "EXAMGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAMGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAMGEN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless -v was given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli, show_progress).await {
        tracing::error!("{:#}", e);
        match e.downcast_ref::<ExamGenError>() {
            Some(err) => eprintln!("{} {}", red("✘"), err.user_message()),
            None => eprintln!("{} {:#}", red("✘"), e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb)?;
    let text = read_text_input(cli)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let content = match (&text, &cli.source) {
            (Some(t), _) => InputContent::text(t.as_str())?,
            (None, Some(source)) => extract_only(source, &config)
                .await
                .context("Extraction failed")?,
            (None, None) => anyhow::bail!("no input given"),
        };
        print_content(&content, cli.json)?;
        return Ok(());
    }

    // ── Generate ─────────────────────────────────────────────────────────
    match (&text, &cli.source, &cli.output) {
        (None, Some(source), Some(path)) if !cli.json => {
            let stats = generate_to_file(source, path, &config)
                .await
                .context("Generation failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}ms  →  {}",
                    green("✔"),
                    stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&stats.input_tokens.to_string()),
                    dim(&stats.output_tokens.to_string()),
                );
            }
        }
        _ => {
            let output = match (&text, &cli.source) {
                (Some(t), _) => generate_from_text(t, &config).await,
                (None, Some(source)) => generate_from_source(source, &config).await,
                (None, None) => anyhow::bail!("no input given"),
            }
            .context("Generation failed")?;

            if let Some(ref path) = cli.output {
                export(&output.text, path).await?;
                if !cli.quiet {
                    eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
                }
            }
            print_output(&output, cli)?;
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let policy = match cli.model {
        Some(ref model) => ModelPolicy::Unified(model.clone()),
        None => ModelPolicy::PerModality {
            text_model: cli.text_model.clone(),
            image_model: cli.image_model.clone(),
        },
    };

    let mut builder = GenerationConfig::builder()
        .model_policy(policy)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--text` or `--text-file` content, if either was given.
fn read_text_input(cli: &Cli) -> Result<Option<String>> {
    if let Some(ref text) = cli.text {
        return Ok(Some(text.clone()));
    }
    match cli.text_file {
        Some(ref path) if path.as_os_str() == "-" => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            Ok(Some(buf))
        }
        Some(ref path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("Failed to read text from {}", path.display())),
        None => Ok(None),
    }
}

async fn export(text: &str, path: &Path) -> Result<()> {
    let text = text.to_string();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || DocumentExporter::for_path(&path).export(&text, &path))
        .await
        .context("Export task panicked")?
        .context("Export failed")
}

fn print_content(content: &InputContent, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(content).context("Failed to serialise content")?;
        println!("{json}");
        return Ok(());
    }
    match content {
        InputContent::Text { content } => {
            let mut out = io::stdout().lock();
            out.write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            if !content.ends_with('\n') {
                out.write_all(b"\n").ok();
            }
        }
        InputContent::Image { mime_type, data } => {
            println!("Image:   {mime_type}");
            println!("Base64:  {} chars", data.len());
        }
    }
    Ok(())
}

fn print_output(output: &GenerationOutput, cli: &Cli) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    // With -o the document is the result; stdout stays quiet.
    if cli.output.is_some() {
        return Ok(());
    }

    let stdout = io::stdout();
    let highlight = !cli.plain && stdout.is_terminal();
    let mut handle = stdout.lock();

    if highlight {
        for line in output.render_lines() {
            let rendered = match line {
                RenderLine::Blank => String::new(),
                RenderLine::Spans(spans) => spans
                    .iter()
                    .map(|s| match s.kind {
                        SpanKind::Prose => s.value.clone(),
                        SpanKind::Formula => cyan(&s.value),
                    })
                    .collect(),
            };
            writeln!(handle, "{rendered}").context("Failed to write to stdout")?;
        }
    } else {
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "{} tokens in / {} tokens out, {}ms total. Save with -o {}",
                output.stats.input_tokens,
                output.stats.output_tokens,
                output.stats.total_duration_ms,
                DEFAULT_EXPORT_FILE_NAME
            ))
        );
    }
    Ok(())
}
