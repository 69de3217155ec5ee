//! GdC CLI
//!
//! Compiles the block-lists, classifies collected website evidence, and
//! computes the compliance sets and GdC score.

mod config;
mod results;
mod runner;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use gdc_analysis::{
    compute_gdc, load_evidence_dir, load_theoretical, summarize, Classifier, ComplianceReport,
    CorpusSummary, PracticalResults, RuleCatalogue,
};
use gdc_compiler::compile_list;
use gdc_core::types::ResourceRequest;

use config::{ConfigArgs, RunConfig};
use results::{ResultFiles, COMPLIANCE, SUMMARY};

#[derive(Parser)]
#[command(name = "gdc-cli")]
#[command(about = "Tracking classification and GdC compliance scoring")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the three filter lists and report rule counts
    Compile {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print every line that could not be compiled
        #[arg(long)]
        show_errors: bool,
    },

    /// Match one request string against the filter lists
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// URL, file name or domain to check
        #[arg(short, long)]
        url: String,

        /// Domain of the page the request was seen on
        #[arg(short, long)]
        page: Option<String>,

        /// Treat the request as third-party
        #[arg(long, conflicts_with = "first_party")]
        third_party: bool,

        /// Treat the request as first-party
        #[arg(long)]
        first_party: bool,

        /// Treat the request as a script
        #[arg(long)]
        script: bool,
    },

    /// Classify collected evidence and write result files
    Classify {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Compute A, B, Ao, Bo and GdC from written result files
    Gdc {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Classify and compute GdC in one run
    Run {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile {
            config,
            show_errors,
        } => config.resolve().and_then(|c| cmd_compile(&c, show_errors)),
        Commands::Check {
            config,
            url,
            page,
            third_party,
            first_party,
            script,
        } => config.resolve().and_then(|c| {
            let party = match (third_party, first_party) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            cmd_check(&c, &url, page.as_deref(), party, script)
        }),
        Commands::Classify { config } => config
            .resolve()
            .and_then(|c| cmd_classify(&c).map(|_| ())),
        Commands::Gdc { config } => config.resolve().and_then(|c| cmd_gdc(&c)),
        Commands::Run { config } => config.resolve().and_then(|c| cmd_run(&c)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .init();
}

fn load_catalogue(config: &RunConfig) -> Result<RuleCatalogue, String> {
    let start = Instant::now();
    let (catalogue, errors) =
        RuleCatalogue::load(&config.lists).map_err(|e| format!("Failed to load filter lists: {}", e))?;
    log::info!(
        "Compiled {} rules in {:.1}ms ({} lines skipped)",
        catalogue.rule_count(),
        start.elapsed().as_secs_f64() * 1000.0,
        errors.len()
    );
    Ok(catalogue)
}

fn cmd_compile(config: &RunConfig, show_errors: bool) -> Result<(), String> {
    let start = Instant::now();
    let mut total_rules = 0usize;

    for (source, path) in config.lists.iter() {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
        let compiled = compile_list(&content, source);

        println!("{} ({})", source, path.display());
        println!("  Lines:      {}", compiled.lines);
        println!(
            "  Rules:      {} -> {} (dedupe removed {}, badfilter removed {})",
            compiled.stats.before,
            compiled.stats.after,
            compiled.stats.deduped,
            compiled.stats.badfiltered_rules
        );
        println!("  Exceptions: {}", compiled.rule_set.exception_count());
        println!("  Skipped:    {}", compiled.errors.len());
        if show_errors {
            for err in &compiled.errors {
                println!("    {}", err);
            }
        }
        total_rules += compiled.rule_set.len();
    }

    println!(
        "Compiled {} rules in {:.1}ms",
        total_rules,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn cmd_check(
    config: &RunConfig,
    url: &str,
    page: Option<&str>,
    third_party: Option<bool>,
    script: bool,
) -> Result<(), String> {
    let catalogue = load_catalogue(config)?;
    let classifier = Classifier::new(&catalogue, config.classifier);

    let mut req = ResourceRequest::new(url);
    if let Some(page) = page {
        req = req.with_page_domain(page);
    }
    if let Some(third_party) = third_party {
        req = req.with_third_party(third_party);
    }
    if script {
        req = req.with_script(true);
    }

    let verdict = classifier.check(&req);
    println!("{}: {}", url, if verdict.tracking { "tracking" } else { "not tracking" });
    if let Some(rule) = verdict.rule {
        println!("  Rule: {}", rule);
    }
    Ok(())
}

fn cmd_classify(config: &RunConfig) -> Result<PracticalResults, String> {
    let catalogue = Arc::new(load_catalogue(config)?);

    let corpus = load_evidence_dir(&config.evidence_dir)
        .map_err(|e| format!("Failed to load evidence: {}", e))?;
    for diagnostic in &corpus.diagnostics {
        println!("  Excluded {}: {}", diagnostic.website, diagnostic.message);
    }

    let start = Instant::now();
    let classified = runner::classify_parallel(
        catalogue,
        config.classifier,
        corpus.websites,
        config.worker_count(),
    )?;
    log::info!(
        "Classified {} websites in {:.1}ms",
        classified.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let files = ResultFiles::from_classifications(&classified);
    files.write(&config.output_dir)?;
    println!("Wrote results for {} websites to '{}'", classified.len(), config.output_dir.display());

    let summary = summarize(&classified, config.top_n);
    results::write_json(&config.output_dir.join(SUMMARY), &summary)?;
    print_summary(&summary);

    Ok(files.into_practical())
}

fn cmd_gdc(config: &RunConfig) -> Result<(), String> {
    let practical = results::read_practical(&config.output_dir)?;
    gdc_from(config, &practical)
}

fn cmd_run(config: &RunConfig) -> Result<(), String> {
    let practical = cmd_classify(config)?;
    gdc_from(config, &practical)
}

fn gdc_from(config: &RunConfig, practical: &PracticalResults) -> Result<(), String> {
    let theoretical = load_theoretical(&config.theoretical)
        .map_err(|e| format!("Failed to load theoretical analysis: {}", e))?;
    let report = compute_gdc(&theoretical, practical)
        .map_err(|e| format!("Cannot compute GdC: {}", e))?;
    results::write_json(&config.output_dir.join(COMPLIANCE), &report)?;
    print_report(&report);
    Ok(())
}

fn print_summary(summary: &CorpusSummary) {
    let usage = &summary.usage;
    let pct = |n: usize| usage.percent(n).unwrap_or(0.0);

    println!();
    println!("Websites:                  {}", summary.websites);
    println!("  With cookies:            {} ({:.1}%)", usage.with_cookies, pct(usage.with_cookies));
    println!("  Without cookies:         {}", usage.without_cookies);
    println!(
        "  With third-party cookies: {} ({:.1}%)",
        usage.with_third_party_cookies,
        pct(usage.with_third_party_cookies)
    );
    println!(
        "  With tracking cookies:   {} ({:.1}%)",
        usage.with_tracking_cookies,
        pct(usage.with_tracking_cookies)
    );
    println!();
    for (label, counts) in [
        ("Tracking cookies", &summary.tracking_cookies),
        ("Web beacons", &summary.beacons),
        ("Tracking resources", &summary.tracking_resources),
    ] {
        println!(
            "{}: total {}, mean {}, std {}",
            label,
            counts.total,
            fmt_stat(counts.mean),
            fmt_stat(counts.std_dev)
        );
        if let Some(max) = &counts.max_website {
            println!("  Most: {} ({})", max.label, max.count);
        }
    }
    println!();
    println!("Top third-party cookie domains:");
    for entry in &summary.top_cookie_domains {
        println!("  {:>4}  {}", entry.count, entry.label);
    }
    println!("Top third-party beacon domains:");
    for entry in &summary.top_beacon_domains {
        println!("  {:>4}  {}", entry.count, entry.label);
    }
    for note in &summary.degenerate {
        println!("Undefined: {}", note);
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

fn print_report(report: &ComplianceReport) {
    let join = |set: &std::collections::BTreeSet<String>| {
        set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    };

    println!();
    println!("A  := {{{}}}", join(&report.sets.a));
    println!("B  := {{{}}}", join(&report.sets.b));
    println!("Ao := {{{}}}", join(&report.sets.ao));
    println!("Bo := {{{}}}", join(&report.sets.bo));
    println!();
    println!("|A| = {}, |B| = {}, |Ao| = {}, |Bo| = {}", report.sizes.a, report.sizes.b, report.sizes.ao, report.sizes.bo);
    println!("GdC = {:.4}", report.gdc);
    if !report.diagnostics.is_empty() {
        println!("Excluded {} website(s) without practical results", report.diagnostics.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use gdc_analysis::ListPaths;

    fn tmp_dir(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("gdc_cli_main_{}", name));
        let _ = fs::remove_dir_all(&p);
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn run_on_single_website_still_scores() {
        let root = tmp_dir("single_site");
        fs::write(root.join("easylist.txt"), "||ads.example^\n").unwrap();
        fs::write(root.join("easyprivacy.txt"), "||track.example^\n").unwrap();
        fs::write(root.join("fanboy.txt"), "").unwrap();

        let site = root.join("evidence").join("only.example");
        fs::create_dir_all(&site).unwrap();
        fs::write(
            site.join("inspection.json"),
            r#"{
                "cookies": [{"name": "lang", "domain": "only.example", "expires": -1}],
                "beacons": [],
                "hosts": {"cookies": {"firstParty": ["only.example"]}, "beacons": {}}
            }"#,
        )
        .unwrap();
        fs::write(
            root.join("theoretical.json"),
            r#"{"only.example": {"consent_type": "none", "has_cookies_wall": false, "default_active": false}}"#,
        )
        .unwrap();

        let config = RunConfig {
            lists: ListPaths {
                easylist: root.join("easylist.txt"),
                easyprivacy: root.join("easyprivacy.txt"),
                fanboy_annoyance: root.join("fanboy.txt"),
            },
            evidence_dir: root.join("evidence"),
            theoretical: root.join("theoretical.json"),
            output_dir: root.join("results"),
            workers: Some(1),
            ..RunConfig::default()
        };
        cmd_run(&config).unwrap();

        let summary: CorpusSummary = results::read_json(&config.output_dir.join(SUMMARY)).unwrap();
        assert_eq!(summary.websites, 1);
        assert_eq!(summary.tracking_cookies.std_dev, None);
        assert!(!summary.degenerate.is_empty());

        let report: ComplianceReport = results::read_json(&config.output_dir.join(COMPLIANCE)).unwrap();
        assert_eq!(report.gdc, 1.0);
        assert!(report.sets.ao.contains("only.example"));
    }
}
