//! Prin CLI - Print the contents of files, repositories and sites for LLMs.

use std::io::{self, Write};
use std::process;

use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::{generate, Shell};
use prin::builder::run;
use prin::context::{Context, DepthLimits};
use prin::errors::{exit_code, PrinError};
use prin::output::OutputTag;

#[derive(Parser)]
#[command(name = "prin")]
#[command(about = "Print the contents of files, repositories and websites for LLMs")]
#[command(version)]
struct Cli {
    /// Pattern to match (glob, regex or extension). An existing path or a
    /// URL given alone is printed as a root instead.
    pattern: Option<String>,

    /// Roots: local paths, GitHub URLs or website URLs
    paths: Vec<String>,

    /// Include test files and directories
    #[arg(short = 'T', long)]
    include_tests: bool,

    /// Include lock files
    #[arg(short = 'K', long)]
    include_lock: bool,

    /// Include binary files (printed as self-closing entries)
    #[arg(short = 'a', long, aliases = ["text", "binary"])]
    include_binary: bool,

    /// Include files with no meaningful content
    #[arg(short = 'M', long)]
    include_empty: bool,

    /// Include hidden files and directories
    #[arg(short = 'H', long)]
    hidden: bool,

    /// Exclude documentation files
    #[arg(short = 'd', long)]
    no_docs: bool,

    /// Exclude dependency manifests
    #[arg(long)]
    no_dependencies: bool,

    /// Exclude configuration files
    #[arg(long)]
    no_config: bool,

    /// Exclude scripts
    #[arg(long)]
    no_scripts: bool,

    /// Exclude stylesheets
    #[arg(long, alias = "no-css")]
    no_style: bool,

    /// Print only file paths
    #[arg(short = 'l', long)]
    only_headers: bool,

    /// Only print files with this extension (repeatable)
    #[arg(short = 'e', long = "extension", action = ArgAction::Append)]
    extensions: Vec<String>,

    /// Exclude paths matching this glob or path segment (repeatable)
    #[arg(short = 'E', long = "exclude", alias = "ignore", action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Disable every default and user exclusion
    #[arg(long, alias = "include-all")]
    no_exclude: bool,

    /// Do not read .gitignore, .ignore or .prinignore files
    #[arg(short = 'I', long, alias = "no-gitignore")]
    no_ignore: bool,

    /// -u: no ignore files; -uu: also hidden; -uuu: no exclusions at all
    #[arg(short = 'u', action = ArgAction::Count)]
    unrestricted: u8,

    /// Output style
    #[arg(short = 't', long, value_enum, default_value_t = OutputTag::Xml)]
    tag: OutputTag,

    /// Stop after printing this many files
    #[arg(long, env = "PRIN_MAX_FILES")]
    max_files: Option<usize>,

    /// Do not descend below this depth (1 = direct children of a root)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Skip files shallower than this depth
    #[arg(long)]
    min_depth: Option<usize>,

    /// Only print files at exactly this depth
    #[arg(long)]
    exact_depth: Option<usize>,

    /// Verbose logging to stderr (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Silence all logging
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Cli {
    fn into_context(self) -> Context {
        let unrestricted = self.unrestricted;
        Context {
            pattern: self.pattern.unwrap_or_default(),
            paths: self.paths,
            include_hidden: self.hidden || unrestricted >= 2,
            include_tests: self.include_tests,
            include_lock: self.include_lock,
            include_binary: self.include_binary,
            include_empty: self.include_empty,
            include_docs: !self.no_docs,
            include_dependencies: !self.no_dependencies,
            include_config: !self.no_config,
            include_scripts: !self.no_scripts,
            include_stylesheets: !self.no_style,
            no_exclude: self.no_exclude || unrestricted >= 3,
            no_ignore: self.no_ignore || unrestricted >= 1,
            only_headers: self.only_headers,
            extensions: self.extensions,
            exclude: self.exclude,
            tag: self.tag,
            max_files: self.max_files,
            depth: DepthLimits {
                max_depth: self.max_depth,
                min_depth: self.min_depth,
                exact_depth: self.exact_depth,
            },
            anchor: None,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn is_broken_pipe(error: &PrinError) -> bool {
    matches!(error, PrinError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "prin", &mut io::stdout());
        return;
    }

    setup_logging(cli.verbose, cli.quiet);
    let ctx = cli.into_context();

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let result = run(&ctx, &mut out).and_then(|report| {
        out.flush()?;
        Ok(report)
    });

    match result {
        Ok(report) => {
            for failure in &report.failures {
                eprintln!("error: {failure}");
            }
            let code = report.exit_code();
            if code != 0 {
                process::exit(code);
            }
        }
        Err(e) if is_broken_pipe(&e) => {}
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(exit_code(&e));
        }
    }
}
