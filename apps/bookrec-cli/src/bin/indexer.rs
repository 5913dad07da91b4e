use std::env;
use std::path::PathBuf;

use bookrec_cli::{init_tracing, load_engine, LoadOptions};
use bookrec_core::config::Config;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut opts = LoadOptions { show_progress: true, ..LoadOptions::default() };
    for arg in &args {
        match arg.as_str() {
            "--rebuild" | "-r" => opts.force_rebuild = true,
            "--quiet" | "-q" => opts.show_progress = false,
            _ if !arg.starts_with('-') => opts.corpus_path = Some(PathBuf::from(arg)),
            other => anyhow::bail!("unknown flag {}", other),
        }
    }

    println!("Book Index Builder\n==================");
    println!("Environment: {}", config.env_name());
    println!("Corpus: {}", opts.corpus_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| settings.data.corpus_path.clone()));
    println!("Snapshots: {}", settings.data.snapshot_dir);

    let (engine, meta) = load_engine(&settings, &opts)?;
    let sizes = engine.index().partition_sizes();
    println!("\nIndexed {} books with {} (dim {})", meta.books, meta.embedder_id, meta.dim);
    println!("Active snapshot: {} (built {})", meta.table, meta.built_at);
    println!("IVF cells: {} (largest {}, nprobes {})", sizes.len(), sizes.iter().max().copied().unwrap_or(0), engine.index().nprobes());
    println!("\nTo query, use: cargo run --bin bookrec-recommend -- '<description>' --strategy exact --k 5");
    Ok(())
}
