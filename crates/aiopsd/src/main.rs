//! aiopsd — the AIOps daemon.
//!
//! Runs inside the cluster it manages. Every tick it samples cluster CPU
//! from Prometheus, deletes crash-looping backend pods, scales the
//! backend deployment (then the worker Auto Scaling group once the
//! deployment is at its cap) and alerts Slack and SNS when load is high.
//!
//! # Usage
//!
//! ```text
//! aiopsd --config /etc/aiops/aiops.toml --log-format json
//! ```
//!
//! Every setting can also come from the environment (`CPU_THRESHOLD`,
//! `MAX_REPLICAS`, `SLACK_WEBHOOK`, ...).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use aiops_alert::SlackWebhook;
use aiops_aws::AwsClients;
use aiops_core::{AiopsConfig, AlertChannel, MetricSink};
use aiops_kube::KubeClient;
use aiops_metrics::PrometheusClient;
use aiopsd::{Collaborators, ControlLoop};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "aiopsd", about = "AIOps self-healing and autoscaling daemon")]
struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, env = "AIOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, env = "AIOPS_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = AiopsConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    info!(
        deployment = %config.deployment_name,
        namespace = %config.namespace,
        asg = %config.asg_name,
        threshold = config.cpu_threshold,
        max_replicas = config.max_replicas,
        "aiopsd starting"
    );

    let backends = build_collaborators(&config).await?;
    let mut control = ControlLoop::new(&config, backends);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    control.run(shutdown_rx).await;

    info!("aiopsd stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new("info,aiops=debug")
            .context("building default log filter")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn build_collaborators(config: &AiopsConfig) -> anyhow::Result<Collaborators> {
    let timeout = config.call_timeout;

    let metrics = PrometheusClient::new(&config.prometheus_url, timeout)
        .context("building prometheus client")?;
    info!(url = %config.prometheus_url, "prometheus client initialized");

    let kube = KubeClient::in_cluster(timeout).context("loading in-cluster kubernetes credentials")?;
    info!(api = %kube.base_url(), "kubernetes client initialized");

    let aws = AwsClients::load(&config.aws_region).await;
    info!(region = %config.aws_region, "aws clients initialized");

    let metric_sink: Option<Arc<dyn MetricSink>> = if config.push_metrics {
        Some(Arc::new(aws.cloudwatch()))
    } else {
        None
    };

    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();
    match &config.slack_webhook {
        Some(url) => {
            let slack = SlackWebhook::new(url, timeout).context("building slack webhook client")?;
            channels.push(Arc::new(slack));
        }
        None => warn!("SLACK_WEBHOOK not set, slack alerts disabled"),
    }
    match &config.sns_topic_arn {
        Some(arn) => channels.push(Arc::new(aws.sns(arn, &config.sns_subject))),
        None => warn!("SNS_TOPIC_ARN not set, sns alerts disabled"),
    }

    Ok(Collaborators {
        metrics: Arc::new(metrics),
        orchestrator: Arc::new(kube),
        scaling_group: Arc::new(aws.autoscaling()),
        metric_sink,
        channels,
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "cannot install SIGTERM handler, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
