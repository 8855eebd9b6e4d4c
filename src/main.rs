use babble_gen::{Generator, Grammar, GrammarConfig, Lexicon};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Grammar-based babble generator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the grammar file
    #[arg(help = "Path to the grammar file")]
    grammar_file: PathBuf,

    /// The rule to start expanding from
    #[arg(help = "Start rule", default_value = "RESULT")]
    start_rule: String,

    /// Number of texts to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// JSON word table for [Column] lookups
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the maximum recursion depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only compile and analyse the grammar, then print it
    #[arg(long)]
    check: bool,

    /// Print up to LIMIT distinct output templates instead of generating
    #[arg(long, value_name = "LIMIT")]
    formats: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => GrammarConfig::from_json_file(path)?,
        None => GrammarConfig::default(),
    };
    if let Some(depth) = cli.max_depth {
        config.max_recursion_depth = depth;
    }
    config.validate()?;

    info!(path = %cli.grammar_file.display(), "loading grammar");
    let source = std::fs::read_to_string(&cli.grammar_file)?;
    let grammar = Grammar::compile_with(&source, &config)?;

    let analysis = grammar.analyze(&cli.start_rule)?;
    for name in &analysis.unreachable {
        warn!(rule = %name, "rule is unreachable from {}", cli.start_rule);
    }
    for name in &analysis.non_terminating {
        warn!(rule = %name, "rule can never finish expanding");
    }

    let lexicon = match &cli.lexicon {
        Some(path) => {
            let lexicon = Lexicon::from_json_file(path)?;
            lexicon.check(&grammar)?;
            Some(lexicon)
        }
        None => None,
    };

    if cli.check {
        print!("{}", grammar);
        return Ok(());
    }

    if let Some(limit) = cli.formats {
        for format in grammar.terminal_sequences(&cli.start_rule, limit)? {
            println!("{}", format);
        }
        return Ok(());
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut generator = Generator::new(&grammar).with_config(config);
    if let Some(lexicon) = &lexicon {
        generator = generator.with_lexicon(lexicon);
    }

    for text in generator.generate_many(&cli.start_rule, cli.count, &mut rng)? {
        println!("{}", text);
    }

    Ok(())
}
