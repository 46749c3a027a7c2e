use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kdeck_core::WorkloadKind;
use kdeck_exec::{executor_for, Backend};
use kdeck_view::{ChildRows, Panel, RecordingNavigator, ViewConfig, ViewContext, WorkloadPanel, WorkloadRef, WorkloadView};
use metrics::counter;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "kdeckctl", version, about = "Show, scale, delete and edit one workload")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace the commands run against
    #[arg(short = 'n', long = "ns", global = true, env = "KDECK_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Command backend: kubectl | api | mock
    #[arg(long = "backend", global = true, env = "KDECK_BACKEND", default_value = "kubectl")]
    backend: Backend,

    /// Workload kind: deployment | statefulset | replicaset
    #[arg(long = "kind", global = true, default_value = "deployment")]
    kind: WorkloadKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the workload and its pods
    Show {
        name: String,
        /// Refresh every N seconds until Ctrl-C
        #[arg(long = "watch")]
        watch: Option<u64>,
    },
    /// Set the desired replica count
    Scale {
        name: String,
        /// Replica count as typed; validated before any command is issued
        replicas: String,
    },
    /// Delete the workload
    Delete { name: String },
    /// Print the edit route for the workload
    Edit { name: String },
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Show { .. } => "show",
            Commands::Scale { .. } => "scale",
            Commands::Delete { .. } => "delete",
            Commands::Edit { .. } => "edit",
        }
    }

    fn name(&self) -> &str {
        match self {
            Commands::Show { name, .. } | Commands::Scale { name, .. } | Commands::Delete { name } | Commands::Edit { name } => name,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KDECK_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KDECK_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KDECK_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let target = WorkloadRef::new(cli.namespace.clone(), cli.kind, cli.command.name());
    let nav = Arc::new(RecordingNavigator::new());
    let ctx = ViewContext::new(executor_for(cli.backend), nav).with_config(ViewConfig::from_env());
    info!(command = cli.command.label(), workload = %target, backend = ?cli.backend, "kdeckctl invoked");
    counter!("cli_invocations_total", 1u64, "command" => cli.command.label());

    match cli.command {
        Commands::Show { watch, .. } => {
            let mut view = WorkloadView::mount(ctx, target.clone());
            let panel = view.settle().await;
            print_panel(&panel, cli.output)?;
            if let Panel::Failed(e) = &panel {
                return Err(anyhow!("show {}: {}", target, e));
            }
            if let Some(secs) = watch {
                let every = Duration::from_secs(secs.max(1));
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(every) => {
                            view.refresh();
                            let panel = view.settle().await;
                            print_panel(&panel, cli.output)?;
                        }
                        _ = signal::ctrl_c() => {
                            info!("Ctrl-C received; stopping watch");
                            break;
                        }
                    }
                }
            }
        }
        Commands::Scale { replicas, .. } => {
            let mut view = WorkloadView::mount(ctx, target.clone());
            if let Panel::Failed(e) = view.settle().await {
                return Err(anyhow!("scale {}: {}", target, e));
            }
            view.set_replicas_text(&replicas);
            let ticket = view.apply_scale(replicas.as_str()).with_context(|| format!("scale {}", target))?;
            info!(command = %ticket.command(), "scale issued");
            ticket.wait().await.with_context(|| format!("scale {}", target))?;
            let panel = view.settle().await;
            print_panel(&panel, cli.output)?;
        }
        Commands::Delete { .. } => {
            let view = WorkloadView::mount(ctx, target.clone());
            match view.delete_resource().wait().await {
                Ok(outcome) => match cli.output {
                    Output::Human => println!("deleted {}; navigate to {}", target, outcome.route),
                    Output::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
                },
                Err(e) => {
                    error!(error = %e, workload = %target, "delete failed");
                    return Err(anyhow!("delete {}: {}", target, e));
                }
            }
        }
        Commands::Edit { .. } => {
            let view = WorkloadView::mount(ctx, target.clone());
            let path = view.request_edit();
            match cli.output {
                Output::Human => println!("{}", path),
                Output::Json => println!("{}", serde_json::json!({ "route": path })),
            }
        }
    }

    Ok(())
}

fn print_panel(panel: &Panel, output: Output) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string_pretty(panel)?),
        Output::Human => match panel {
            Panel::Loading => println!("loading..."),
            Panel::Failed(e) => eprintln!("error: {}", e),
            Panel::Ready(p) => print_ready(p),
        },
    }
    Ok(())
}

fn print_ready(p: &WorkloadPanel) {
    println!("{:<24} {:<10} {:<6} {:<10} {}", "NAME", "REPLICAS", "READY", "AVAILABLE", "UPDATED");
    println!("{:<24} {:<10} {:<6} {:<10} {}", p.name, replicas_col(p), p.ready, p.available, p.updated);
    if p.refreshing {
        println!("(refreshing)");
    }
    if let Some(n) = &p.notice {
        println!("! {}", n);
    }
    println!();
    match &p.children {
        ChildRows::Loading => println!("pods: loading..."),
        ChildRows::Failed(e) => println!("pods: error: {}", e),
        ChildRows::Rows(rows) => {
            println!("{:<32} {:<10} {:<8} {}", "NAME", "PHASE", "AGE", "INFO");
            for r in rows {
                println!("{:<32} {:<10} {:<8} {}", r.name, r.phase.to_string(), render_age(r.creation_ts), r.info_path);
            }
        }
    }
}

fn replicas_col(p: &WorkloadPanel) -> String {
    match p.replicas {
        Some(v) if p.dirty => format!("{}*", v),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn render_age(creation_ts: i64) -> String {
    if creation_ts <= 0 { return "-".to_string(); }
    let now = chrono::Utc::now().timestamp();
    let mut secs = (now - creation_ts).max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from(["kdeckctl", "--backend", "mock", "-n", "prod", "--kind", "sts", "scale", "db", "abc"]).unwrap();
        assert_eq!(cli.backend, Backend::Mock);
        assert_eq!(cli.namespace, "prod");
        assert_eq!(cli.kind, WorkloadKind::StatefulSet);
        assert!(matches!(cli.command, Commands::Scale { ref replicas, .. } if replicas == "abc"));
        assert_eq!(cli.command.name(), "db");
    }

    #[test]
    fn age_buckets() {
        assert_eq!(render_age(0), "-");
        let now = chrono::Utc::now().timestamp();
        assert!(render_age(now - 90).ends_with('m'));
        assert!(render_age(now - 2 * 86_400 - 3600).starts_with("2d"));
    }

    #[tokio::test]
    async fn mock_backend_renders_panel_json() {
        let ctx = ViewContext::new(executor_for(Backend::Mock), Arc::new(RecordingNavigator::new()));
        let mut view = WorkloadView::mount(ctx, WorkloadRef::deployment("default", "web"));
        let panel = view.settle().await;
        let v = serde_json::to_value(&panel).unwrap();
        assert_eq!(v["state"], "ready");
        assert_eq!(v["panel"]["replicas"], 3);
        assert_eq!(v["panel"]["children"]["rows"].as_array().unwrap().len(), 3);
    }
}
