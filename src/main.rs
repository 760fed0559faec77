use clap::{Parser, Subcommand};
use ditherpic::config::{self, GlobalOptions, OptionsOverride};
use ditherpic::options::{OptionsRef, resolve};
use ditherpic::pipeline::Pipeline;
use ditherpic::process::ProcessEvent;
use ditherpic::types::ImageRequest;
use ditherpic::{output, plan, transform};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Per-image option selection shared by `image` and `plan`.
#[derive(clap::Args, Clone)]
struct OptionArgs {
    /// Named preset from the config file
    #[arg(long, conflicts_with = "options")]
    preset: Option<String>,

    /// Inline overrides as TOML, e.g. 'sizes = [800, 400]'
    #[arg(long)]
    options: Option<String>,
}

impl OptionArgs {
    fn to_ref(&self) -> Result<OptionsRef, Box<dyn std::error::Error>> {
        Ok(match (&self.preset, &self.options) {
            (Some(name), _) => OptionsRef::Preset(name.clone()),
            (None, Some(inline)) => OptionsRef::Inline(toml::from_str::<OptionsOverride>(inline)?),
            (None, None) => OptionsRef::default(),
        })
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "ditherpic")]
#[command(about = "Responsive, dithered image derivatives for static sites")]
#[command(long_about = "\
Responsive, dithered image derivatives for static sites

Run after your site generator has written its HTML. Every <img> is replaced
by a <picture> whose sources are resized, palette-dithered derivatives:

  <img src=\"/photos/cat.jpg\" alt=\"Cat\">

becomes

  <picture>
    <source srcset=\"/images/<hash>-1800.webp\" type=\"image/webp\" media=\"(min-width: 1800px)\">
    ...
    <img src=\"/images/<hash>-1800.png\" alt=\"Cat\">
  </picture>

Local references are read from input_directory, remote (http/https) ones are
downloaded. Derivatives are written to output_directory + image_folder.

Run 'ditherpic gen-config' to generate a documented ditherpic.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Log debug diagnostics (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite every .html file under the site directory in place
    Transform {
        /// Site directory (defaults to the configured output_directory)
        #[arg(long)]
        site: Option<PathBuf>,

        /// Continue past documents with failed images and exit successfully
        #[arg(long)]
        keep_going: bool,
    },
    /// Produce derivatives for one source and print its <picture> markup
    Image {
        /// Remote URL or site-relative path
        source: String,

        #[arg(long, default_value = "")]
        alt: String,

        #[arg(long)]
        caption: Option<String>,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Print the derivative plan for one source as JSON
    Plan {
        source: String,

        #[command(flatten)]
        options: OptionArgs,
    },
    /// Validate the config file
    Check,
    /// Print a stock ditherpic.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Transform { site, keep_going } => {
            let global = config::load_config(&cli.config)?;
            init_thread_pool(&global.processing);
            let site = match site {
                Some(dir) => dir,
                None => resolve(&global, &OptionsRef::default())?.output_directory,
            };
            println!("==> Transforming {}", site.display());
            run_transform(&global, &site, keep_going)?;
        }
        Command::Image {
            source,
            alt,
            caption,
            options,
        } => {
            let global = config::load_config(&cli.config)?;
            init_thread_pool(&global.processing);
            let mut request = ImageRequest::new(source, alt).with_options(options.to_ref()?);
            request.caption = caption;

            let (tx, printer) = spawn_printer();
            let pipeline = Pipeline::standard()?.with_events(tx);
            let result = pipeline.render_image(&global, &request);
            drop(pipeline);
            join_printer(printer)?;
            println!("{}", result?);
        }
        Command::Plan { source, options } => {
            let global = config::load_config(&cli.config)?;
            let resolved = resolve(&global, &options.to_ref()?)?;
            let plan = plan::plan(&source, &resolved);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.display());
            let global = config::load_config(&cli.config)?;
            println!("    {} preset(s)", global.presets.len());
            for name in global.presets.keys() {
                println!("    {}", name);
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_transform(
    global: &GlobalOptions,
    site: &Path,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, printer) = spawn_printer();
    let pipeline = Pipeline::standard()?.with_events(tx);

    let mut documents = 0;
    let mut rewritten = 0;
    let mut errors = Vec::new();
    for entry in walkdir::WalkDir::new(site).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !transform::is_html_output(path) {
            continue;
        }
        let outcome = transform::transform_file(&pipeline, global, path)?;
        documents += 1;
        rewritten += outcome.rewritten;
        if let Err(e) = outcome.into_result() {
            errors.push(e);
            if !keep_going {
                break;
            }
        }
    }
    drop(pipeline);
    join_printer(printer)?;

    let failed: usize = errors
        .iter()
        .map(|e| match e {
            transform::TransformError::Images { failures, .. } => failures.len(),
            transform::TransformError::Io(_) => 1,
        })
        .sum();
    for error in &errors {
        for line in output::format_transform_error(error) {
            eprintln!("{}", line);
        }
    }
    println!(
        "{}",
        output::format_transform_summary(documents, rewritten, failed)
    );
    if failed > 0 && !keep_going {
        return Err(format!("{failed} image(s) failed").into());
    }
    Ok(())
}

/// Print progress events on a dedicated thread until every sender is gone.
fn spawn_printer() -> (Sender<ProcessEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) -> Result<(), Box<dyn std::error::Error>> {
    printer
        .join()
        .map_err(|_| "progress printer thread panicked".into())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ditherpic=debug" } else { "ditherpic=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
