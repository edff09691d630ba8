//! # Network Tools
//!
//! One-shot tasks that document the acquired host: WHOIS record, DNS
//! resolution, HTTP response headers, route, TLS certificate, and the TLS key
//! log location. Each writes its artifact into the acquisition directory.

use crate::config::NetworkToolsConfig;
use crate::constants::{artifacts, class_names, tasks, SSL_KEYLOG_ENV};
use crate::registry::{TaskDefinition, TaskPackage};
use crate::task::{TaskProfile, TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info};

const WHOIS_PORT: u16 = 43;
const HTTPS_PORT: u16 = 443;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Host and explicit port of the acquisition URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub host: String,
    pub port: Option<u16>,
}

fn target(ctx: &WorkerContext, title_key: &str) -> Result<Target, WorkerFailure> {
    let malformed = |details: String| ctx.failure(title_key, "MALFORMED_URL_ERROR", details);
    let url = ctx
        .options()
        .url
        .clone()
        .ok_or_else(|| malformed("no url".to_string()))?;
    let parsed = reqwest::Url::parse(&url).map_err(|e| malformed(format!("{url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| malformed(format!("{url}: no host")))?
        .to_string();
    Ok(Target {
        port: parsed.port(),
        url,
        host,
    })
}

async fn write_artifact(
    ctx: &WorkerContext,
    title_key: &str,
    name: &str,
    contents: &[u8],
) -> Result<String, WorkerFailure> {
    let path = ctx.options().artifact_path(name);
    let io_failure = |e: std::io::Error| ctx.failure(title_key, &format!("{title_key}_EXECUTION_ERROR"), e);
    tokio::fs::create_dir_all(&ctx.options().acquisition_directory)
        .await
        .map_err(io_failure)?;
    tokio::fs::write(&path, contents).await.map_err(io_failure)?;
    debug!(task = %ctx.task_name(), artifact = %path.display(), bytes = contents.len(), "Artifact written");
    Ok(path.display().to_string())
}

/// Key log file inside the acquisition directory, when TLS key logging is on
pub fn ssl_keylog_path(ctx: &WorkerContext, enabled: bool) -> Option<PathBuf> {
    enabled.then(|| ctx.options().artifact_path(artifacts::SSL_KEYLOG))
}

/// Runs `program`; the key log location is handed to the child only, the
/// process environment is never touched
async fn command_output(
    program: &str,
    args: &[String],
    keylog: Option<&Path>,
) -> std::io::Result<std::process::Output> {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(path) = keylog {
        command.env(SSL_KEYLOG_ENV, path);
    }
    command.output().await
}

/// RFC 3912 lookup, following one IANA referral
#[derive(Debug, Clone)]
pub struct WhoisWorker {
    server: String,
    port: u16,
    timeout: Duration,
}

impl WhoisWorker {
    pub fn new(config: &NetworkToolsConfig) -> Self {
        Self {
            server: config.whois_server.clone(),
            port: WHOIS_PORT,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    async fn query(&self, server: &str, port: u16, domain: &str) -> std::io::Result<String> {
        let exchange = async {
            let mut stream = TcpStream::connect((server, port)).await?;
            stream.write_all(format!("{domain}\r\n").as_bytes()).await?;
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&response).into_owned())
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, format!("whois {server} timed out")))?
    }
}

/// Registrable part of the host: `www.` is not part of the WHOIS record
pub fn whois_domain(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Value of the first `refer:` / `whois:` line of an IANA answer
pub fn whois_referral(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

#[async_trait]
impl TaskWorker for WhoisWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let target = target(ctx, "WHOIS")?;
        let domain = whois_domain(&target.host);
        let failure = |e: std::io::Error| ctx.failure("WHOIS", "WHOIS_EXECUTION_ERROR", e);

        let mut record = self.query(&self.server, self.port, domain).await.map_err(failure)?;
        if let Some(referral) = whois_referral(&record) {
            if referral != self.server {
                debug!(referral = %referral, "Following WHOIS referral");
                record = self.query(&referral, WHOIS_PORT, domain).await.map_err(failure)?;
            }
        }
        if record.trim().is_empty() {
            return Err(ctx.failure("WHOIS", "WHOIS_EXECUTION_ERROR", format!("empty record for {domain}")));
        }

        let path = write_artifact(ctx, "WHOIS", artifacts::WHOIS, record.as_bytes()).await?;
        Ok(WorkerOutcome::success_with(path))
    }
}

/// Resolver lookup of the acquisition host
#[derive(Debug, Clone, Default)]
pub struct NslookupWorker;

#[async_trait]
impl TaskWorker for NslookupWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let target = target(ctx, "NSLOOKUP")?;

        let addresses: Vec<std::net::SocketAddr> = tokio::net::lookup_host((target.host.as_str(), 0))
            .await
            .map_err(|e| ctx.failure("NSLOOKUP", "NSLOOKUP_EXECUTION_ERROR", e))?
            .collect();
        if addresses.is_empty() {
            return Err(ctx.failure(
                "NSLOOKUP",
                "NSLOOKUP_EXECUTION_ERROR",
                format!("no address for {}", target.host),
            ));
        }

        let mut report = format!("Name: {}\n", target.host);
        for address in &addresses {
            report.push_str(&format!("Address: {}\n", address.ip()));
        }
        let path = write_artifact(ctx, "NSLOOKUP", artifacts::NSLOOKUP, report.as_bytes()).await?;
        Ok(WorkerOutcome::success_with(path))
    }
}

/// Response headers of the acquisition URL. Error statuses still carry headers
/// worth recording, so any response counts.
#[derive(Debug, Clone)]
pub struct HeadersWorker {
    timeout: Duration,
}

impl HeadersWorker {
    pub fn new(config: &NetworkToolsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl TaskWorker for HeadersWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let target = target(ctx, "HEADERS")?;
        let failure = |e: reqwest::Error| ctx.failure("HEADERS", "HEADERS_EXECUTION_ERROR", e);

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(failure)?;
        let response = client.get(&target.url).send().await.map_err(failure)?;

        let mut report = format!("{:?} {}\n", response.version(), response.status());
        for (name, value) in response.headers() {
            report.push_str(&format!("{}: {}\n", name, String::from_utf8_lossy(value.as_bytes())));
        }
        info!(task = %ctx.task_name(), status = %response.status(), "Headers collected");

        let path = write_artifact(ctx, "HEADERS", artifacts::HEADERS, report.as_bytes()).await?;
        Ok(WorkerOutcome::success_with(path))
    }
}

/// Route to the acquisition host via the system `traceroute`
#[derive(Debug, Clone)]
pub struct TracerouteWorker {
    program: String,
    ssl_keylog: bool,
}

impl TracerouteWorker {
    pub fn new(config: &NetworkToolsConfig) -> Self {
        Self {
            program: config.traceroute_program.clone(),
            ssl_keylog: config.ssl_keylog,
        }
    }
}

#[async_trait]
impl TaskWorker for TracerouteWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let target = target(ctx, "TRACEROUTE")?;
        let failure = |details: String| ctx.failure("TRACEROUTE", "TRACEROUTE_EXECUTION_ERROR", details);

        let keylog = ssl_keylog_path(ctx, self.ssl_keylog);
        let output = command_output(&self.program, &[target.host.clone()], keylog.as_deref())
            .await
            .map_err(|e| failure(format!("{}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let path = write_artifact(ctx, "TRACEROUTE", artifacts::TRACEROUTE, &output.stdout).await?;
        Ok(WorkerOutcome::success_with(path))
    }
}

/// Peer certificate of the acquisition host, saved as PEM
#[derive(Debug, Clone)]
pub struct SslCertificateWorker {
    program: String,
    ssl_keylog: bool,
}

impl SslCertificateWorker {
    pub fn new(config: &NetworkToolsConfig) -> Self {
        Self {
            program: config.openssl_program.clone(),
            ssl_keylog: config.ssl_keylog,
        }
    }
}

/// First PEM certificate block of `text`, markers included
pub fn first_pem_certificate(text: &str) -> Option<String> {
    let start = text.find(PEM_BEGIN)?;
    let end = text[start..].find(PEM_END)? + start + PEM_END.len();
    Some(format!("{}\n", &text[start..end]))
}

#[async_trait]
impl TaskWorker for SslCertificateWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let target = target(ctx, "SSLCERTIFICATE")?;
        let failure = |details: String| {
            ctx.failure("SSLCERTIFICATE", "SSLCERTIFICATE_EXECUTION_ERROR", details)
        };

        let connect = format!("{}:{}", target.host, target.port.unwrap_or(HTTPS_PORT));
        let args = vec![
            "s_client".to_string(),
            "-connect".to_string(),
            connect.clone(),
            "-servername".to_string(),
            target.host.clone(),
        ];
        let keylog = ssl_keylog_path(ctx, self.ssl_keylog);
        let output = command_output(&self.program, &args, keylog.as_deref())
            .await
            .map_err(|e| failure(format!("{}: {e}", self.program)))?;

        let certificate = first_pem_certificate(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| failure(format!("no certificate presented by {connect}")))?;

        let path = write_artifact(
            ctx,
            "SSLCERTIFICATE",
            artifacts::SSL_CERTIFICATE,
            certificate.as_bytes(),
        )
        .await?;
        Ok(WorkerOutcome::success_with(path))
    }
}

/// Prepares `sslkey.log`. TLS clients spawned by the other tools receive its
/// path as `SSLKEYLOGFILE` in their own environment.
#[derive(Debug, Clone, Default)]
pub struct SslKeyLogWorker;

#[async_trait]
impl TaskWorker for SslKeyLogWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let path = write_artifact(ctx, "SSLKEYLOG", artifacts::SSL_KEYLOG, b"").await?;
        info!(task = %ctx.task_name(), path = %path, "TLS key log enabled");
        Ok(WorkerOutcome::success_with(path))
    }
}

pub fn package() -> TaskPackage {
    TaskPackage::new("network_tools")
        .with_task(
            TaskDefinition::new(
                tasks::SSL_KEYLOG,
                TaskProfile::new(class_names::TASK_SSL_KEYLOG, "SSLKEYLOG"),
                |_| Arc::new(SslKeyLogWorker) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.ssl_keylog),
        )
        .with_task(
            TaskDefinition::new(
                tasks::SSL_CERTIFICATE,
                TaskProfile::new(class_names::TASK_SSL_CERTIFICATE, "SSLCERTIFICATE"),
                |deps| Arc::new(SslCertificateWorker::new(&deps.config.network_tools)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.ssl_certificate),
        )
        .with_task(
            TaskDefinition::new(
                tasks::HEADERS,
                TaskProfile::new(class_names::TASK_HEADERS, "HEADERS"),
                |deps| Arc::new(HeadersWorker::new(&deps.config.network_tools)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.headers),
        )
        .with_task(
            TaskDefinition::new(
                tasks::WHOIS,
                TaskProfile::new(class_names::TASK_WHOIS, "WHOIS"),
                |deps| Arc::new(WhoisWorker::new(&deps.config.network_tools)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.whois),
        )
        .with_task(
            TaskDefinition::new(
                tasks::NSLOOKUP,
                TaskProfile::new(class_names::TASK_NSLOOKUP, "NSLOOKUP"),
                |_| Arc::new(NslookupWorker) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.nslookup),
        )
        .with_task(
            TaskDefinition::new(
                tasks::TRACEROUTE,
                TaskProfile::new(class_names::TASK_TRACEROUTE, "TRACEROUTE"),
                |deps| Arc::new(TracerouteWorker::new(&deps.config.network_tools)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.network_tools.traceroute),
        )
}
