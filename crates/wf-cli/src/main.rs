use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;
use wf_core::{
    Gate, GateSequence, Mode, SpinSignature, SymmetryStep, WavefieldSystem, clock,
    export_json, import_json,
};

#[derive(Parser)]
#[command(name = "wf", about = "Wavefield attention substrate CLI")]
struct Cli {
    /// Override the state file path
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an occurrence to the event graph
    Observe {
        /// Mode tag: unity, duality, or relation
        #[arg(long, default_value = "unity")]
        mode: String,
        /// Payload, parsed as JSON when possible, else kept as a string
        payload: String,
    },

    /// Teach the emotion field one labeled observation
    Learn {
        label: String,
        /// Comma-separated feature vector, e.g. "0.9,0.1,0.0"
        vector: String,
        /// Optional example string stored with the pattern
        #[arg(long)]
        example: Option<String>,
    },

    /// Infer the closest learned label for a vector
    Infer {
        /// Comma-separated feature vector
        vector: String,
    },

    /// Record an operator transformation between two labels
    Teach {
        from: String,
        to: String,
        /// Comma-separated operator tags, e.g. "up,strange"
        operators: String,
    },

    /// Query a transformation path (direct, inverted, or composed)
    Path { from: String, to: String },

    /// Walk provenance backward from a label
    WalkBack {
        label: String,
        #[arg(long, default_value_t = 10)]
        max_steps: usize,
    },

    /// Apply a gate pipeline to the attention container
    Gate {
        /// Pipeline spec: semicolon-separated gates, e.g.
        /// "phase:up:1.57;transfer:up:down:0.5;swap:up:down"
        pipeline: String,
        /// Re-normalize every channel afterward
        #[arg(long)]
        normalize: bool,
    },

    /// Show system statistics
    Stats,

    /// Export state to a JSON file
    Export { path: PathBuf },

    /// Import state from a JSON file
    Import { path: PathBuf },

    /// Build a small deterministic demo scene and walk through it
    Demo {
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Deserialize, Default)]
struct Config {
    state_path: Option<PathBuf>,
}

/// Optional wavefield.toml next to the working directory.
fn load_config() -> Config {
    match std::fs::read_to_string("wavefield.toml") {
        Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed wavefield.toml: {e}");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

/// State path resolution: --state flag, then WF_STATE, then config, then
/// ./wavefield.json.
fn state_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.state {
        return path.clone();
    }
    if let Ok(path) = std::env::var("WF_STATE") {
        return PathBuf::from(path);
    }
    load_config()
        .state_path
        .unwrap_or_else(|| PathBuf::from("wavefield.json"))
}

fn load_system(path: &Path) -> Result<WavefieldSystem> {
    if !path.exists() {
        tracing::debug!("no state at {}, starting fresh", path.display());
        return Ok(WavefieldSystem::new("wavefield"));
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn save_system(path: &Path, system: &WavefieldSystem) -> Result<()> {
    let json = export_json(system).context("failed to serialize state")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let path = state_path(&cli);

    match &cli.command {
        Commands::Observe { mode, payload } => cmd_observe(&path, mode, payload),
        Commands::Learn {
            label,
            vector,
            example,
        } => cmd_learn(&path, label, vector, example.as_deref()),
        Commands::Infer { vector } => cmd_infer(&path, vector),
        Commands::Teach {
            from,
            to,
            operators,
        } => cmd_teach(&path, from, to, operators),
        Commands::Path { from, to } => cmd_path(&path, from, to),
        Commands::WalkBack { label, max_steps } => cmd_walk_back(&path, label, *max_steps),
        Commands::Gate {
            pipeline,
            normalize,
        } => cmd_gate(&path, pipeline, *normalize),
        Commands::Stats => cmd_stats(&path),
        Commands::Export { path: out } => cmd_export(&path, out),
        Commands::Import { path: input } => cmd_import(&path, input),
        Commands::Demo { seed } => cmd_demo(&path, *seed),
    }
}

fn parse_vector(text: &str) -> Result<Vec<f64>> {
    text.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid vector component '{}'", part.trim()))
        })
        .collect()
}

fn cmd_observe(path: &Path, mode: &str, payload: &str) -> Result<()> {
    let mut system = load_system(path)?;
    let mode = Mode::from_str_lossy(mode);
    let payload = serde_json::from_str(payload)
        .unwrap_or_else(|_| serde_json::Value::String(payload.to_string()));

    let id = system.observe(mode, payload);
    save_system(path, &system)?;

    println!("observed {} as {}", id, mode.as_str());
    Ok(())
}

fn cmd_learn(path: &Path, label: &str, vector: &str, example: Option<&str>) -> Result<()> {
    let mut system = load_system(path)?;
    let vector = parse_vector(vector)?;

    system.emotions.learn(label, &vector, example);
    // One merge pass keeps near-duplicates from accumulating
    if let Some((absorbed, kept)) = system.emotions.restructure() {
        println!("merged '{absorbed}' into '{kept}'");
    }
    save_system(path, &system)?;

    let pattern = system.emotions.get(label);
    let count = pattern.map(|p| p.count).unwrap_or(0);
    println!("learned '{label}' ({count} observations)");
    Ok(())
}

fn cmd_infer(path: &Path, vector: &str) -> Result<()> {
    let system = load_system(path)?;
    let vector = parse_vector(vector)?;

    let result = system.emotions.infer(&vector);
    match &result.label {
        Some(label) => println!("{label} (similarity {:.3})", result.similarity),
        None => println!("(no match, best similarity {:.3})", result.similarity),
    }
    Ok(())
}

fn cmd_teach(path: &Path, from: &str, to: &str, operators: &str) -> Result<()> {
    let mut system = load_system(path)?;

    let steps: Vec<SymmetryStep> = operators
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(SymmetryStep::new)
        .collect();
    if steps.is_empty() {
        bail!("no operators given");
    }

    system.symmetry.record_transformation(from, to, steps);
    save_system(path, &system)?;

    println!("taught {from} -> {to}");
    Ok(())
}

fn cmd_path(path: &Path, from: &str, to: &str) -> Result<()> {
    let system = load_system(path)?;

    match system.symmetry.find_path(from, to) {
        Some(found) => println!("{}", found.sequence()),
        None => println!("(no path)"),
    }
    Ok(())
}

fn cmd_walk_back(path: &Path, label: &str, max_steps: usize) -> Result<()> {
    let system = load_system(path)?;

    let walk = system.symmetry.walk_back(label, max_steps);
    if !walk.can_reproduce {
        println!("(no provenance for '{label}')");
        return Ok(());
    }
    for hop in &walk.chain {
        println!("{} -> {}  [{}]", hop.start, hop.end, hop.sequence());
    }
    Ok(())
}

/// Parse "kind:arg:arg" gate specs joined by semicolons.
fn parse_pipeline(spec: &str) -> Result<GateSequence> {
    let mut sequence = GateSequence::new();
    for part in spec.split(';').filter(|p| !p.trim().is_empty()) {
        let fields: Vec<&str> = part.trim().split(':').collect();
        let gate = match fields.as_slice() {
            ["swap", a, b] => Gate::Swap {
                a: a.to_string(),
                b: b.to_string(),
            },
            ["phase", channel, theta] => Gate::Phase {
                channel: channel.to_string(),
                theta: theta.parse().context("invalid phase angle")?,
            },
            ["hadamard", a, b] => Gate::Hadamard {
                a: a.to_string(),
                b: b.to_string(),
            },
            ["scale", channel, factor] => Gate::Scale {
                channel: channel.to_string(),
                factor: factor.parse().context("invalid scale factor")?,
            },
            ["transfer", from, to, fraction] => Gate::Transfer {
                from: from.to_string(),
                to: to.to_string(),
                fraction: fraction.parse().context("invalid transfer fraction")?,
            },
            _ => bail!("unrecognized gate spec '{part}'"),
        };
        sequence = sequence.then(gate);
    }
    if sequence.is_empty() {
        bail!("empty gate pipeline");
    }
    Ok(sequence)
}

fn cmd_gate(path: &Path, pipeline: &str, normalize: bool) -> Result<()> {
    let mut system = load_system(path)?;
    let sequence = parse_pipeline(pipeline)?;

    system.apply(&sequence);
    if normalize {
        system.attention.normalize_all();
    }
    save_system(path, &system)?;

    println!("applied {} gate(s)", sequence.len());
    Ok(())
}

fn cmd_stats(path: &Path) -> Result<()> {
    let system = load_system(path)?;
    let stats = system.stats();

    println!("agent:       {}", system.agent_name);
    println!("occurrences: {}", stats.occurrences);
    println!("relations:   {}", stats.relations);
    println!("emotions:    {}", stats.emotion_patterns);
    println!("connectors:  {}", stats.connector_patterns);
    println!("paths:       {}", stats.cached_paths);
    for channel in &stats.channels {
        let dominant = channel.dominant.as_deref().unwrap_or("-");
        println!(
            "  {:<8} energy={:.4} dominant={}",
            channel.channel, channel.energy, dominant
        );
    }

    let now = clock::now_unix_secs();
    if let Some(freshest) = system.emotions.patterns().map(|p| p.last_seen).max() {
        println!(
            "last learn:  {} ago",
            clock::format_age(now.saturating_sub(freshest))
        );
    }
    Ok(())
}

fn cmd_export(path: &Path, out: &Path) -> Result<()> {
    let system = load_system(path)?;
    let json = export_json(&system).context("failed to serialize state")?;
    std::fs::write(out, &json).with_context(|| format!("failed to write {}", out.display()))?;
    println!("exported to {}", out.display());
    Ok(())
}

fn cmd_import(path: &Path, input: &Path) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let system = import_json(&json).context("failed to parse import")?;
    save_system(path, &system)?;

    let stats = system.stats();
    println!(
        "imported from {}. occurrences={}, relations={}, paths={}",
        input.display(),
        stats.occurrences,
        stats.relations,
        stats.cached_paths
    );
    Ok(())
}

fn cmd_demo(path: &Path, seed: u64) -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut system = WavefieldSystem::new("demo");

    // A tiny scene: a cat, an animal, and the aboutness between them
    let cat = system.observe(Mode::Unity, serde_json::json!("cat"));
    let animal = system.observe(Mode::Unity, serde_json::json!("animal"));
    let about = system.observe(Mode::Relation, serde_json::json!("is-a"));
    system.relate(cat, about, 1.0)?;
    system.relate(about, animal, 1.0)?;

    // Noisy observations of two emotions
    for _ in 0..5 {
        let noise: f64 = rng.random_range(-0.05..0.05);
        system
            .emotions
            .learn("calm", &[0.9 + noise, 0.1, 0.0], None);
        system
            .emotions
            .learn("alarm", &[0.05, 0.1, 0.9 + noise], None);
    }

    // A connector type and one taught transformation
    system
        .connectors
        .learn("is-a", &SpinSignature::from_values(&[0.5, 0.0, -0.5]));
    system
        .symmetry
        .record_transformation("cat", "animal", vec![SymmetryStep::new("up")]);

    let hit = system.emotions.infer(&[0.88, 0.12, 0.0]);
    println!(
        "infer [0.88,0.12,0.0] -> {} ({:.3})",
        hit.label.as_deref().unwrap_or("(miss)"),
        hit.similarity
    );

    let forward = system
        .symmetry
        .find_path("cat", "animal")
        .context("demo transformation missing")?;
    let backward = system
        .symmetry
        .find_path("animal", "cat")
        .context("demo inversion missing")?;
    println!("cat -> animal: {}", forward.sequence());
    println!("animal -> cat: {}", backward.sequence());

    system.apply(
        &GateSequence::new()
            .then(Gate::Transfer {
                from: "up".into(),
                to: "down".into(),
                fraction: 0.3,
            })
            .then(Gate::Phase {
                channel: "down".into(),
                theta: std::f64::consts::FRAC_PI_4,
            }),
    );
    system.attention.normalize_all();

    save_system(path, &system)?;
    println!("demo state written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vector() {
        assert_eq!(parse_vector("1, 2.5, -3").unwrap(), vec![1.0, 2.5, -3.0]);
        assert!(parse_vector("1,oops").is_err());
    }

    #[test]
    fn test_parse_pipeline() {
        let seq = parse_pipeline("phase:up:1.57;transfer:up:down:0.5;swap:up:down").unwrap();
        assert_eq!(seq.len(), 3);
        assert!(parse_pipeline("warp:up").is_err());
        assert!(parse_pipeline("").is_err());
    }
}
