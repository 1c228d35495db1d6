use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use regex::Regex;

use argos_core::port::memory::MemoryWatchStore;
use argos_core::watch::engine::{CancelFlag, WatchEngine};
use argos_core::watch::scheduler::WatchScheduler;
use argos_domain::config::ArgosConfig;
use argos_domain::watch::record::{SampleRecord, WatchRecord};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    // Initialize config from embedded YAML
    let yaml = include_str!("../../argos-core/resources/argos.yml");
    ArgosConfig::init_from_yaml(yaml);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let exit_code = run(args);
    std::process::exit(exit_code);
}

fn run(args: Vec<String>) -> i32 {
    match execute(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    }
}

struct CliOptions {
    rules_path: Option<String>,
    samples_path: Option<String>,
    interval: Duration,
    count: i32,
    once: bool,
    json: bool,
    verbose: bool,
}

fn execute(args: &[String]) -> anyhow::Result<i32> {
    let mut options = CliOptions {
        rules_path: None,
        samples_path: None,
        interval: ArgosConfig::get().scheduler_tick(),
        count: -1,
        once: false,
        json: false,
        verbose: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(0);
            }
            "--version" => {
                println!("Argos v{VERSION}");
                return Ok(0);
            }
            "--rules" | "-r" => {
                options.rules_path = iter.next().cloned();
            }
            "--samples" | "-s" => {
                options.samples_path = iter.next().cloned();
            }
            "--interval" | "-i" => {
                let value = iter.next().map(String::as_str).unwrap_or("1s");
                options.interval = parse_interval(value);
            }
            "--count" | "-c" => {
                options.count = iter
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(-1);
            }
            "--once" => options.once = true,
            "--json" | "-j" => options.json = true,
            "--verbose" | "-V" => options.verbose = true,
            other => {
                eprintln!("Opcion desconocida: {other}");
                print_usage();
                return Ok(1);
            }
        }
    }

    if options.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let rules_path = match options.rules_path {
        Some(path) => path,
        None => {
            eprintln!("Debe especificar --rules <archivo.yml>");
            print_usage();
            return Ok(1);
        }
    };

    // ── Build the engine ───────────────────────────────────────────────
    let engine = Arc::new(WatchEngine::new(Arc::new(MemoryWatchStore::new())));
    let now = Utc::now();

    let records = load_watch_records(&rules_path)?;
    for record in &records {
        engine
            .create_watch(record, now)
            .with_context(|| format!("definicion invalida: {}", record.name))?;
    }
    println!("{} watches registrados desde {rules_path}", records.len());

    if let Some(samples_path) = &options.samples_path {
        let samples = load_sample_records(samples_path)?;
        for sample in &samples {
            engine
                .ingest(sample)
                .with_context(|| format!("muestra invalida para {}", sample.watch_name))?;
        }
        println!("{} muestras ingeridas desde {samples_path}", samples.len());
    }

    let scheduler = WatchScheduler::new(Arc::clone(&engine)).with_tick(options.interval);
    let cancel = CancelFlag::new();

    // ── Mode: one-shot ─────────────────────────────────────────────────
    if options.once {
        let evaluations = scheduler.tick_once(Utc::now(), &cancel);
        print_evaluations(&evaluations, options.json)?;
        return Ok(0);
    }

    // ── Mode: periodic ─────────────────────────────────────────────────
    if options.count != 1 && !options.json {
        println!("Presione Ctrl+C para detener");
    }

    let mut remaining = options.count;
    loop {
        let evaluations = scheduler.tick_once(Utc::now(), &cancel);
        if !evaluations.is_empty() {
            print_evaluations(&evaluations, options.json)?;
        }

        if remaining > 0 {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
        thread::sleep(options.interval);
    }

    Ok(0)
}

fn load_watch_records(path: &str) -> anyhow::Result<Vec<WatchRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("no se pudo parsear {path}"))
}

fn load_sample_records(path: &str) -> anyhow::Result<Vec<SampleRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("no se pudo leer {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("no se pudo parsear {path}"))
}

fn print_evaluations(
    evaluations: &[argos_domain::watch::evaluation::Evaluation],
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(evaluations)?);
    } else {
        for evaluation in evaluations {
            println!("{}", evaluation.status_line());
        }
    }
    Ok(())
}

/// Parses a human-readable interval string such as `"1s"`, `"500ms"`, `"5m"`, `"1h"`.
fn parse_interval(input: &str) -> Duration {
    // Pattern: digits followed by an optional unit suffix.
    let re = Regex::new(r"^(\d+)(ms|s|m|h)?$").expect("Invalid interval regex");
    match re.captures(input.trim()) {
        Some(caps) => {
            let value: u64 = caps[1].parse().unwrap_or(1);
            let unit = caps.get(2).map_or("s", |m| m.as_str());

            match unit {
                "ms" => Duration::from_millis(value),
                "s" => Duration::from_secs(value),
                "m" => Duration::from_secs(value * 60),
                "h" => Duration::from_secs(value * 3600),
                _ => Duration::from_secs(value),
            }
        }
        None => Duration::from_secs(1),
    }
}

fn print_usage() {
    println!("Uso: argos --rules <archivo.yml> [opciones]");
    println!();
    println!("Opciones:");
    println!("  -r, --rules <archivo>     Definiciones de watches (YAML)");
    println!("  -s, --samples <archivo>   Muestras a ingerir al inicio (YAML)");
    println!("  -i, --interval <dur>      Intervalo entre pasadas (ej. 1s, 500ms)");
    println!("  -c, --count <n>           Numero de pasadas antes de salir");
    println!("      --once                Una sola pasada de evaluacion");
    println!("  -j, --json                Salida en JSON");
    println!("  -V, --verbose             Modo detallado");
    println!("  -h, --help                Esta ayuda");
    println!("      --version             Version");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("500ms"), Duration::from_millis(500));
        assert_eq!(parse_interval("30s"), Duration::from_secs(30));
        assert_eq!(parse_interval("5m"), Duration::from_secs(300));
        assert_eq!(parse_interval("1h"), Duration::from_secs(3600));
        assert_eq!(parse_interval("2"), Duration::from_secs(2));
        assert_eq!(parse_interval("garbage"), Duration::from_secs(1));
    }
}
