//! mailbak - incremental IMAP mailbox backup
//!
//! Mirrors an account to local disk, one `.eml` file per message, and
//! only downloads what is not already saved. Runs once by default or
//! repeatedly on a cron schedule.

use clap::Parser;
use mailbak_auth::StdinAuthorizer;
use mailbak_core::{run_backup, run_scheduled, BackupConfig, ImapSessionFactory};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "mailbak", version, about = "Incremental IMAP mailbox backup")]
struct Cli {
    /// Account email address
    #[arg(long, env = "MAILBAK_EMAIL")]
    email: String,

    /// IMAP password (app password for Gmail)
    #[arg(long, env = "MAILBAK_PASSWORD", conflicts_with_all = ["client_id", "client_secret"])]
    password: Option<String>,

    /// OAuth2 client ID
    #[arg(long, env = "MAILBAK_CLIENT_ID", requires = "client_secret")]
    client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "MAILBAK_CLIENT_SECRET", requires = "client_id")]
    client_secret: Option<String>,

    /// Where the OAuth2 token is persisted
    /// [default: ~/.config/mailbak/token.json]
    #[arg(long, env = "MAILBAK_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Root directory for downloaded messages
    #[arg(long, env = "MAILBAK_BACKUP_DIR", default_value = "./backups")]
    backup_dir: PathBuf,

    /// IMAP server hostname
    #[arg(long, env = "MAILBAK_IMAP_SERVER", default_value = "imap.gmail.com")]
    imap_server: String,

    /// IMAP server port
    #[arg(long, env = "MAILBAK_IMAP_PORT", default_value_t = 993)]
    imap_port: u16,

    /// Only back up these mailboxes (comma-separated; default all)
    #[arg(long, env = "MAILBAK_FOLDERS", value_delimiter = ',')]
    folders: Vec<String>,

    /// Mailboxes processed concurrently, each on its own connection
    #[arg(long, env = "MAILBAK_MAX_WORKERS", default_value_t = 1)]
    max_workers: usize,

    /// Scan and fetch but write nothing to disk
    #[arg(long, env = "MAILBAK_DRY_RUN")]
    dry_run: bool,

    /// Skip TLS certificate verification
    #[arg(long, env = "MAILBAK_TLS_SKIP_VERIFY")]
    tls_skip_verify: bool,

    /// Re-run on a 5-field cron schedule instead of exiting
    #[arg(long, env = "MAILBAK_SCHEDULE", value_name = "CRON")]
    schedule: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "MAILBAK_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> BackupConfig {
        let mut config = BackupConfig::new(self.email);
        config.password = self.password;
        config.client_id = self.client_id;
        config.client_secret = self.client_secret;
        config.token_file = self.token_file.unwrap_or_else(default_token_file);
        config.backup_dir = self.backup_dir;
        config.imap_server = self.imap_server;
        config.imap_port = self.imap_port;
        config.folder_allow_list = self.folders.into_iter().collect();
        config.max_workers = self.max_workers;
        config.dry_run = self.dry_run;
        config.tls_skip_verify = self.tls_skip_verify;
        config.cron_schedule = self.schedule;
        config
    }
}

fn default_token_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/mailbak/token.json"),
        None => PathBuf::from("token.json"),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = cli.into_config();
    let factory = Arc::new(ImapSessionFactory::from_config(
        &config,
        Box::new(StdinAuthorizer),
    ));

    let result = match config.cron_schedule.clone() {
        Some(expr) => run_scheduled(&config, factory, &expr).await,
        None => match run_backup(&config, factory).await {
            Ok(report) => {
                tracing::info!(
                    "Done: {} mailboxes, {} scanned, {} downloaded in {:.1}s",
                    report.mailboxes,
                    report.scanned,
                    report.downloaded,
                    report.elapsed.as_secs_f64()
                );
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        tracing::error!("mailbak failed: {}", e);
        std::process::exit(1);
    }
}
