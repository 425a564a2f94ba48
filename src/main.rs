use std::path::PathBuf;
use std::sync::OnceLock;
use chrono::Local;
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use comfy_table::{Table, ContentArrangement};
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod classify;
mod export;
mod html;
mod markdown;
mod rules;
mod scanner;
mod source;
mod stats;

use rules::Dialect;
use stats::{DashboardStats, ScanReport};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

const DEFAULT_LOG: &str = "log.txt";
const DEFAULT_HTML: &str = "dashboard.html";
const DEFAULT_TITLE: &str = "Test Automation Report";
const DEFAULT_CONFIG: &str = "KwDash.toml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TextFormat { Lines, Table }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Theme { Dark, Light }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "KwDash",
    about = "Keyword log to HTML dashboard generator",
    long_about = "Scans a sequential test-automation log, splits it into keyword sections, classifies each as passed or failed and renders a self-contained HTML dashboard of the failures.",
    after_long_help = "Examples:\n  KwDash\n  KwDash --log run.log --html report.html\n  KwDash --log run.log --dialect framed --output json\n  cat run.log | KwDash --log - --no-html --text-format table\n  KwDash --log run.log --rules rules.json --csv-path failures.csv --fail-on-failures",
    color = ColorChoice::Auto
)]
struct Args {
    /// Log to scan, `-` for stdin (default log.txt)
    #[arg(long, short = 'l')]
    log: Option<String>,
    /// HTML dashboard path (default dashboard.html)
    #[arg(long)]
    html: Option<String>,
    #[arg(long, default_value_t = false, conflicts_with = "html")]
    no_html: bool,
    #[arg(long)]
    md_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long)]
    tsv_path: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long, value_enum, default_value = "lines")]
    text_format: TextFormat,
    #[arg(long, value_enum, default_value = "dark")]
    theme: Theme,
    #[arg(long, default_value_t = false)]
    no_emoji: bool,
    #[arg(long, short = 'd', value_enum, default_value = "component")]
    dialect: Dialect,
    /// Path to JSON rules overriding the dialect (default ./rules.json)
    #[arg(long)]
    rules: Option<String>,
    #[arg(long)]
    title: Option<String>,
    /// Exit with status 1 when any keyword failed
    #[arg(long, default_value_t = false)]
    fail_on_failures: bool,
    #[arg(long, default_value_t = false)]
    progress: bool,
    /// Open the HTML dashboard once written
    #[arg(long, default_value_t = false)]
    open: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    #[arg(long)]
    config: Option<String>,
}

#[derive(Deserialize, Default)]
struct AppConfig {
    log: Option<String>,
    html: Option<String>,
    no_html: Option<bool>,
    md_path: Option<String>,
    csv_path: Option<String>,
    tsv_path: Option<String>,
    json_path: Option<String>,
    output: Option<OutputFmt>,
    text_format: Option<TextFormat>,
    theme: Option<Theme>,
    no_emoji: Option<bool>,
    dialect: Option<Dialect>,
    rules: Option<String>,
    title: Option<String>,
    fail_on_failures: Option<bool>,
    progress: Option<bool>,
    force_color: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "KwDash", &mut f); } else { clap_complete::generate(sh, &mut cmd, "KwDash", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "KwDash", &mut std::io::stdout());
        }
        return;
    }
    if let Some(p) = args.config.clone() {
        match load_config(&p) {
            Ok(cfg) => apply_config(&mut args, cfg),
            Err(e) => {
                eprintln!("Config error: {:#}", e);
                std::process::exit(2);
            }
        }
    } else if let Ok(s) = std::fs::read_to_string(DEFAULT_CONFIG)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    init_logging(&args);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let rules_cfg = crate::rules::load_rules(args.rules.as_deref());
    let scan_rules = crate::rules::effective_rules(rules_cfg, args.dialect);
    log::debug!("Scan rules: {:?}", scan_rules);

    let log_path = args.log.clone().unwrap_or_else(|| DEFAULT_LOG.to_string());
    let report = scan_log(&log_path, &scan_rules, args.progress);
    if let Some(e) = report.interrupted.as_ref() && !args.quiet {
        eprintln!("{}", paint(&format!("Warning: {} (report covers what was read)", e), "1;33"));
    }
    let stats = &report.stats;
    let title = args.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string());

    if !args.no_html {
        let path = args.html.clone().unwrap_or_else(|| DEFAULT_HTML.to_string());
        let meta = crate::html::ReportMeta { title: title.clone(), source: log_path.clone(), generated_at: Local::now() };
        let html = crate::html::render_html(stats, &meta, args.theme, !args.no_emoji);
        match std::fs::write(&path, html) {
            Ok(_) => {
                if args.open { open_file_default(PathBuf::from(&path)); }
                announce(&args, &format!("Dashboard generated: {}", path));
            }
            Err(e) => { log::error!("HTML write failed for {}: {}", path, e); }
        }
    }
    match args.output {
        OutputFmt::Text => match args.text_format {
            TextFormat::Lines => print_text(stats, &report, !args.no_emoji),
            TextFormat::Table => print_text_table(stats, &report),
        },
        OutputFmt::Json => match serde_json::to_string_pretty(stats) {
            Ok(s) => println!("{}", s),
            Err(e) => log::error!("JSON encoding failed: {}", e),
        },
    }
    if let Some(p) = args.json_path.as_ref() {
        match crate::export::write_json(p, stats) {
            Ok(_) => announce(&args, &format!("JSON written: {}", p)),
            Err(e) => log::error!("JSON write failed: {:#}", e),
        }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = crate::export::write_csv(p, stats) { log::error!("CSV write failed: {:#}", e); } else { announce(&args, &format!("CSV written: {}", p)); }
    }
    if let Some(p) = args.tsv_path.as_ref() {
        if let Err(e) = crate::export::write_tsv(p, stats) { log::error!("TSV write failed: {:#}", e); } else { announce(&args, &format!("TSV written: {}", p)); }
    }
    if let Some(p) = args.md_path.as_ref() {
        let md = crate::markdown::render_markdown(stats, &title, &log_path);
        match std::fs::write(p, md) {
            Ok(_) => announce(&args, &format!("Markdown written: {}", p)),
            Err(e) => { log::error!("Markdown write failed for {}: {}", p, e); }
        }
    }
    if args.fail_on_failures && stats.failed_sections > 0 { std::process::exit(1); }
}

fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    use anyhow::Context;
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    let cfg = toml::from_str::<AppConfig>(&s).with_context(|| format!("parse {}", path))?;
    Ok(cfg)
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.log.is_none() && let Some(v) = cfg.log { args.log = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.html { args.html = Some(v); }
    if args.html.is_none() && let Some(v) = cfg.no_html { args.no_html = args.no_html || v; }
    if args.md_path.is_none() && let Some(v) = cfg.md_path { args.md_path = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if args.tsv_path.is_none() && let Some(v) = cfg.tsv_path { args.tsv_path = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if args.output == OutputFmt::Text && let Some(v) = cfg.output { args.output = v; }
    if args.text_format == TextFormat::Lines && let Some(v) = cfg.text_format { args.text_format = v; }
    if args.theme == Theme::Dark && let Some(v) = cfg.theme { args.theme = v; }
    if let Some(v) = cfg.no_emoji { args.no_emoji = args.no_emoji || v; }
    if args.dialect == Dialect::Component && let Some(v) = cfg.dialect { args.dialect = v; }
    if args.rules.is_none() && let Some(v) = cfg.rules { args.rules = Some(v); }
    if args.title.is_none() && let Some(v) = cfg.title { args.title = Some(v); }
    if let Some(v) = cfg.fail_on_failures { args.fail_on_failures = args.fail_on_failures || v; }
    if let Some(v) = cfg.progress { args.progress = args.progress || v; }
    if let Some(v) = cfg.force_color { args.force_color = args.force_color || v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().to_rfc3339();
                    let obj = serde_json::json!({
                        "ts": ts,
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => {
                builder.target(env_logger::Target::Pipe(Box::new(f)));
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path, e);
            }
        }
    }
    builder.init();
}

fn scan_log(path: &str, rules: &crate::rules::ScanRules, progress: bool) -> ScanReport {
    let lines = match crate::source::LineSource::open(path) {
        Ok(l) => l,
        Err(e) => return crate::stats::unavailable(e),
    };
    log::info!("Scanning {}", path);
    let pb = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    if let Some(ref pb) = pb { pb.set_message(format!("Scanning {}", path)); }
    let mut read: usize = 0;
    let report = crate::stats::scan_lines(lines.inspect(|_| {
        read += 1;
        if let Some(ref pb) = pb && read % 500 == 0 { pb.tick(); pb.set_message(format!("Read {} lines", read)); }
    }), rules);
    if let Some(pb) = pb { pb.finish_and_clear(); }
    report
}

fn print_text(stats: &DashboardStats, report: &ScanReport, emoji: bool) {
    println!("{}", paint(&format!("Test Case: {}", stats.primary_test_case_name), "1;36"));
    println!("{} {} lines, {} keywords", paint("Scanned:", "1"), report.lines_read, stats.total_sections);
    if stats.failed_sections == 0 {
        println!("{}", paint(&format!("Status: all {} keywords passed.", stats.passed_sections), "1;32"));
    } else {
        println!("{}", paint(&format!("Status: {} passed, {} failed ({:.1}% pass rate).", stats.passed_sections, stats.failed_sections, stats.pass_rate()), "1;33"));
    }
    if stats.failures.is_empty() { return; }
    println!("{}", paint("Failures:", "1"));
    let mark = if emoji { "❌" } else { "-" };
    for (i, f) in stats.failures.iter().enumerate() {
        let err = f.error_message.as_deref().unwrap_or(crate::rules::UNKNOWN_ERROR);
        println!("{} {:>3}. {} {} {}", mark, i + 1, paint(&f.keyword_name, "1;31"), paint(&format!("[{}]", f.test_case_name), "2"), truncate(err, 120));
    }
}

fn print_text_table(stats: &DashboardStats, report: &ScanReport) {
    println!("{}", paint(&format!("Test Case: {}", stats.primary_test_case_name), "1;36"));
    let mut summary = Table::new();
    summary.set_content_arrangement(ContentArrangement::Dynamic);
    summary.set_header(vec![paint("Lines", "1"), paint("Total", "1"), paint("Passed", "1"), paint("Failed", "1"), paint("Pass Rate", "1")]);
    summary.add_row(vec![report.lines_read.to_string(), stats.total_sections.to_string(), paint(&stats.passed_sections.to_string(), "32"), paint(&stats.failed_sections.to_string(), "31"), format!("{:.1}%", stats.pass_rate())]);
    println!("{}", summary);
    if stats.failures.is_empty() { return; }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![paint("Sn", "1"), paint("Test Case", "1"), paint("Keyword", "1"), paint("Line", "1"), paint("Error", "1")]);
    for (i, f) in stats.failures.iter().enumerate() {
        let err = f.error_message.as_deref().unwrap_or(crate::rules::UNKNOWN_ERROR);
        table.add_row(vec![(i + 1).to_string(), f.test_case_name.clone(), f.keyword_name.clone(), (f.start_line + 1).to_string(), truncate(err, 96)]);
    }
    println!("{}", table);
}

/// JSON output owns stdout, so status lines move to stderr.
fn status_on_stderr(args: &Args) -> bool { args.output == OutputFmt::Json }

fn announce(args: &Args, msg: &str) {
    if args.quiet { return; }
    let line = paint(msg, "1;36");
    if status_on_stderr(args) { eprintln!("{}", line); } else { println!("{}", line); }
}

fn truncate(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().count() > n { out.push_str("..."); }
    out
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&false) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(target_os = "windows")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("cmd").args(["/C", "start", "", &s]).spawn()
        .map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(target_os = "macos")]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn open_file_default(p: PathBuf) {
    let s = p.to_string_lossy().into_owned();
    let _ = std::process::Command::new("xdg-open").arg(&s).spawn().map_err(|e| log::error!("Failed to open file {}: {}", s, e));
}
