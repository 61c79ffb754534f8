//! CLI tool for filling PowerPoint slide templates.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deckfill_core::{Mapping, ResponseValidator};
use deckfill_pipeline::{
    CannedOracle, CommandOracle, ContentOracle, FillRequest, Orchestrator, PipelineConfig,
};
use deckfill_pptx::{PlaceholderExtractor, SlideDeck, TemplateRenderer};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fill PowerPoint slide templates with generated content.
#[derive(Parser, Debug)]
#[command(name = "deckfill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the placeholders of a template slide as JSON
    Placeholders {
        /// Template file (.pptx)
        template: PathBuf,

        /// 0-based slide index
        #[arg(short, long, default_value = "0")]
        slide: usize,
    },

    /// Validate a mapping file against a template and render it locally
    Render {
        /// Template file (.pptx)
        template: PathBuf,

        /// JSON file mapping placeholder keys to content
        mapping: PathBuf,

        /// 0-based slide index
        #[arg(short, long, default_value = "0")]
        slide: usize,

        /// Output file (default: <template>-filled.pptx next to the template)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline: generate, validate, render and publish
    Fill {
        /// Template locator (path, file:// or http(s):// URL)
        #[arg(long)]
        template: String,

        /// Reference image locator
        #[arg(long)]
        image: String,

        /// Content to place on the slide
        #[arg(long, required_unless_present = "content_file")]
        content: Option<String>,

        /// Read the content from a file
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Program that answers generation requests (request JSON on stdin)
        #[arg(long, env = "DECKFILL_ORACLE_CMD")]
        oracle_cmd: Option<String>,

        /// Argument passed to the oracle program (repeatable)
        #[arg(long = "oracle-arg", allow_hyphen_values = true)]
        oracle_args: Vec<String>,

        /// Kill the oracle program after this many seconds
        #[arg(long)]
        oracle_timeout: Option<u64>,

        /// Use a saved oracle reply instead of calling a program
        #[arg(long)]
        oracle_reply: Option<PathBuf>,

        /// Directory filled decks are published into
        #[arg(long, env = "DECKFILL_PUBLISH_DIR", default_value = "public")]
        publish_dir: PathBuf,

        /// Public URL the publish directory is served under
        #[arg(long, env = "DECKFILL_BASE_URL")]
        base_url: Option<String>,

        /// 0-based slide index
        #[arg(short, long, default_value = "0")]
        slide: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match args.command {
        Command::Placeholders { template, slide } => print_placeholders(&template, slide),
        Command::Render {
            template,
            mapping,
            slide,
            output,
        } => render_local(&template, &mapping, slide, output.as_deref(), args.verbose),
        Command::Fill {
            template,
            image,
            content,
            content_file,
            oracle_cmd,
            oracle_args,
            oracle_timeout,
            oracle_reply,
            publish_dir,
            base_url,
            slide,
        } => {
            let content = match (content, content_file) {
                (Some(content), _) => content,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Either --content or --content-file is required"),
            };

            let oracle: Box<dyn ContentOracle> = match (oracle_reply, oracle_cmd) {
                (Some(path), _) => {
                    let reply = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Box::new(CannedOracle::new(reply))
                }
                (None, Some(program)) => {
                    let mut oracle = CommandOracle::new(program).with_args(oracle_args);
                    if let Some(secs) = oracle_timeout {
                        oracle = oracle.with_timeout(Duration::from_secs(secs));
                    }
                    Box::new(oracle)
                }
                (None, None) => bail!("Either --oracle-cmd or --oracle-reply is required"),
            };

            let mut config = PipelineConfig::new()
                .with_slide_index(slide)
                .with_publish_dir(publish_dir);
            if let Some(url) = base_url {
                config = config.with_public_base_url(url);
            }

            let request = FillRequest {
                template,
                image,
                content,
            };
            fill(oracle, config, &request)
        }
    }
}

/// Print the placeholder set of one slide.
fn print_placeholders(template: &Path, slide: usize) -> Result<()> {
    let deck = open_deck(template)?;
    let placeholders = PlaceholderExtractor::new()
        .extract(&deck, slide)
        .with_context(|| format!("Failed to extract placeholders from {}", template.display()))?;

    println!("{}", serde_json::to_string_pretty(&placeholders)?);
    Ok(())
}

/// Validate and render a mapping file without calling an oracle.
fn render_local(
    template: &Path,
    mapping_path: &Path,
    slide: usize,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let deck = open_deck(template)?;
    let placeholders = PlaceholderExtractor::new().extract(&deck, slide)?;

    let text = std::fs::read_to_string(mapping_path)
        .with_context(|| format!("Failed to read {}", mapping_path.display()))?;
    let mapping = Mapping::from_reply(&text)
        .with_context(|| format!("Failed to parse {}", mapping_path.display()))?;
    let validated = ResponseValidator::new()
        .validate(mapping, &placeholders)
        .with_context(|| format!("Mapping {} does not fit the template", mapping_path.display()))?;

    let rendered = TemplateRenderer::new().render(&deck, slide, &validated)?;

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => get_output_path(template),
    };
    write_output(&output_path, &rendered.to_bytes()?)?;

    if verbose {
        eprintln!("Written to: {}", output_path.display());
    }
    Ok(())
}

/// Run the pipeline, printing the artifact or the failure report.
fn fill(oracle: Box<dyn ContentOracle>, config: PipelineConfig, request: &FillRequest) -> Result<()> {
    let orchestrator = Orchestrator::with_default_source(oracle, config)?;

    match orchestrator.run(request) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome.artifact)?);
            Ok(())
        }
        Err(err) => {
            log::debug!("{:?}", err);
            println!("{}", serde_json::to_string_pretty(&err.report())?);
            std::process::exit(1);
        }
    }
}

fn open_deck(path: &Path) -> Result<SlideDeck> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    SlideDeck::open(BufReader::new(file))
        .with_context(|| format!("Failed to read presentation {}", path.display()))
}

/// Default output path: `<stem>-filled.pptx` next to the template.
fn get_output_path(template: &Path) -> PathBuf {
    let stem = template
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let output_filename = format!("{}-filled.pptx", stem);

    match template.parent() {
        Some(parent) => parent.join(output_filename),
        None => PathBuf::from(output_filename),
    }
}

/// Write output to a file.
fn write_output(path: &Path, content: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_next_to_template() {
        assert_eq!(
            get_output_path(Path::new("decks/q3.pptx")),
            PathBuf::from("decks/q3-filled.pptx")
        );
    }

    #[test]
    fn test_fill_arguments_parse() {
        let args = Args::try_parse_from([
            "deckfill",
            "fill",
            "--template",
            "t.pptx",
            "--image",
            "https://cdn.example.com/ref.png",
            "--content",
            "Q3",
            "--oracle-cmd",
            "oracle",
            "--oracle-arg",
            "--model=fast",
        ])
        .unwrap();

        match args.command {
            Command::Fill {
                oracle_args, slide, ..
            } => {
                assert_eq!(oracle_args, vec!["--model=fast"]);
                assert_eq!(slide, 0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
