use anyhow::Context;
use std::env;
use std::path::PathBuf;

use bookrec_cli::{flag_value, init_tracing, load_engine, LoadOptions};
use bookrec_core::config::Config;
use bookrec_engine::eval::{evaluate_hit_rate, evaluate_relevance, RelevanceCase};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    let mut sample = 0.2f64;
    let mut k = 5i64;
    let mut seed = 42u64;
    let mut cases_path: Option<PathBuf> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sample" => sample = flag_value(&args, &mut i, "--sample")?,
            "--k" | "-k" => k = flag_value(&args, &mut i, "--k")?,
            "--seed" => seed = flag_value(&args, &mut i, "--seed")?,
            "--cases" => cases_path = Some(flag_value(&args, &mut i, "--cases")?),
            other => anyhow::bail!("unknown argument {}", other),
        }
        i += 1;
    }

    let settings = Config::load()?.settings()?;
    let (engine, meta) = load_engine(&settings, &LoadOptions::default())?;
    println!("Strategy evaluation over {} books ({})\n", meta.books, meta.embedder_id);

    let report = evaluate_hit_rate(&engine, sample, k, seed)?;
    println!("Hit rate, {} sampled queries, k={}:", report.queries, report.k);
    for r in [&report.exact, &report.approximate] {
        println!("  {:<12} hit rate {:.2}  diversity {:.2}  serendipity {:.2}", r.strategy.as_str(), r.hit_rate, r.diversity, r.serendipity);
    }
    println!("  approximate/exact overlap {:.2}", report.overlap);
    if report.approximate.hit_rate > report.exact.hit_rate {
        println!("  approximate outperforms exact on hit rate");
    }

    if let Some(path) = cases_path {
        let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let cases: Vec<RelevanceCase> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        println!("\nRelevance, {} labelled queries:", cases.len());
        for r in evaluate_relevance(&engine, &cases, k)? {
            println!("  {:<12} precision {:.2}  recall {:.2}  mrr {:.2}", r.strategy.as_str(), r.precision, r.recall, r.mrr);
        }
    }
    Ok(())
}
