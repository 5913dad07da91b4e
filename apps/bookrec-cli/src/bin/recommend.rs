use std::env;

use bookrec_cli::{flag_value, init_tracing, load_engine, LoadOptions};
use bookrec_core::config::Config;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <description> [--strategy exact|approximate] [--k N] [--json]", args[0]);
        eprintln!("Example: {} 'a young wizard at a school of magic' --strategy approximate --k 5", args[0]);
        std::process::exit(1);
    }
    let description = &args[1];
    let mut strategy = "exact".to_string();
    let mut k = 5i64;
    let mut json = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--strategy" | "-s" => strategy = flag_value(&args, &mut i, "--strategy")?,
            "--k" | "-k" => k = flag_value(&args, &mut i, "--k")?,
            "--json" => json = true,
            other => anyhow::bail!("unknown argument {}", other),
        }
        i += 1;
    }

    let settings = Config::load()?.settings()?;
    let (engine, _) = load_engine(&settings, &LoadOptions::default())?;
    let hits = match engine.recommend_named(description, &strategy, k) {
        Ok(hits) => hits,
        Err(e) if e.is_client_error() => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    println!("Found {} recommendations ({}) for: \"{}\"", hits.len(), strategy, description);
    for (i, hit) in hits.iter().enumerate() {
        let authors = if hit.authors.is_empty() { "unknown".to_string() } else { hit.authors.join(", ") };
        println!("\n  {}. score={:.4}  id={}  {}  by {}", i + 1, hit.score, hit.id, hit.title, authors);
        println!("     {}", hit.description);
    }
    Ok(())
}
