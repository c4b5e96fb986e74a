//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{ApiServer, AppState};
use crate::core::cli::{self, CliConfig, Commands, KeyCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::secret::load_api_key_secret;
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::data::{EventRepository, NewApiKey, TransactionalService};
use crate::domain::bootstrap::ensure_internal_key;
use crate::domain::{
    AggregationWorker, PrometheusRegistry, ReportingTarget, RetentionPolicy, RetentionSweeper,
    SelfReporter,
};
use crate::utils::api_key::{generate_api_key, hash_api_key, key_prefix};
use crate::utils::time::micros_to_datetime;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<TransactionalService>,
    pub api_key_secret: Arc<[u8]>,
    pub registry: Arc<PrometheusRegistry>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;

        match command {
            Some(Commands::Keys { command }) => {
                let result = app.handle_key_command(command).await;
                app.database.close().await;
                result
            }
            Some(Commands::Start) | None => Self::start_server(app).await,
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init().await?;

        let database = TransactionalService::init(
            config.database.backend,
            &storage,
            config.database.postgres.as_ref(),
        )
        .await
        .with_context(|| {
            format!(
                "Failed to initialize {} database",
                config.database.backend
            )
        })?;
        let database = Arc::new(database);

        let api_key_secret =
            load_api_key_secret(config.api_key_secret.as_deref(), &storage).await?;
        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            api_key_secret: Arc::from(api_key_secret),
            registry: Arc::new(
                PrometheusRegistry::new().context("Failed to register metrics")?,
            ),
        })
    }

    async fn handle_key_command(&self, command: KeyCommands) -> Result<()> {
        let repo = self.database.repository();
        match command {
            KeyCommands::Create {
                tenant,
                name,
                environment,
                retention_days,
            } => {
                self.create_key(repo.as_ref(), tenant, name, environment, retention_days)
                    .await
            }
            KeyCommands::List { tenant } => {
                let keys = repo
                    .list_api_keys(tenant.as_deref())
                    .await
                    .context("Failed to list API keys")?;
                if keys.is_empty() {
                    println!("No API keys.");
                    return Ok(());
                }
                println!(
                    "{:<12} {:<16} {:<24} {:<12} {:>9}  {:<8} CREATED",
                    "PREFIX", "TENANT", "PROJECT", "ENV", "RETENTION", "ACTIVE"
                );
                for key in keys {
                    let retention = if key.retention_days > 0 {
                        format!("{}d", key.retention_days)
                    } else {
                        "global".to_string()
                    };
                    println!(
                        "{:<12} {:<16} {:<24} {:<12} {:>9}  {:<8} {}",
                        key.key_prefix,
                        key.tenant,
                        key.name,
                        key.environment,
                        retention,
                        if key.active { "yes" } else { "no" },
                        micros_to_datetime(key.created_at).format("%Y-%m-%d %H:%M")
                    );
                }
                Ok(())
            }
            KeyCommands::Deactivate { prefix } => {
                let prefix = prefix.trim();
                if prefix.is_empty() {
                    anyhow::bail!("Key prefix must not be empty");
                }
                let count = repo
                    .deactivate_api_keys(prefix)
                    .await
                    .context("Failed to deactivate API keys")?;
                println!("Deactivated {} key(s) matching '{}'", count, prefix);
                Ok(())
            }
        }
    }

    async fn create_key(
        &self,
        repo: &dyn EventRepository,
        tenant: String,
        name: String,
        environment: String,
        retention_days: u32,
    ) -> Result<()> {
        if tenant.trim().is_empty() || name.trim().is_empty() {
            anyhow::bail!("Tenant and name must not be empty");
        }

        let policy = RetentionPolicy::new(self.config.retention.days);
        let clamped = policy.clamp_key_days(retention_days);
        if clamped != retention_days {
            println!(
                "Retention {}d exceeds the global ceiling; using {}d",
                retention_days, clamped
            );
        }

        let token = generate_api_key();
        let row = repo
            .create_api_key(&NewApiKey {
                tenant,
                name,
                environment,
                key_hash: hash_api_key(&token, &self.api_key_secret),
                key_prefix: key_prefix(&token),
                retention_days: clamped,
            })
            .await
            .context("Failed to create API key")?;

        println!(
            "Created API key for {}/{} ({})",
            row.tenant, row.name, row.environment
        );
        println!();
        println!("  {}", token);
        println!();
        println!("Store it now; it cannot be shown again.");
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        let repo = app.database.repository();

        if let Some(key) = &app.config.reporting.internal_api_key {
            ensure_internal_key(
                repo.as_ref(),
                key,
                &app.config.reporting.internal_tenant,
                &app.api_key_secret,
            )
            .await
            .context("Failed to provision internal API key")?;
        }

        app.start_background_tasks(&repo).await;

        let reporter = match ReportingTarget::from_config(&app.config.server, &app.config.reporting)
        {
            Some(target) => {
                let (reporter, handle) = SelfReporter::start(target, app.shutdown.subscribe())
                    .context("Failed to start self-reporting")?;
                app.shutdown.register(handle).await;
                Some(reporter)
            }
            None => {
                tracing::debug!("Self-reporting disabled (no internal API key)");
                None
            }
        };

        tracing::info!(
            backend = %app.config.database.backend,
            data_dir = %app.storage.data_dir().display(),
            retention_days = app.config.retention.days,
            "Starting {}",
            APP_NAME_LOWER
        );

        let state = AppState {
            repo,
            registry: Arc::clone(&app.registry),
            api_key_secret: Arc::clone(&app.api_key_secret),
            retention: RetentionPolicy::new(app.config.retention.days),
            reporter,
        };

        let server = ApiServer::new(app.config.server.clone(), state, app.shutdown.clone());
        let result = server.start().await;
        app.shutdown.shutdown().await;
        result
    }

    pub async fn start_background_tasks(&self, repo: &Arc<dyn EventRepository>) {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        let aggregation =
            AggregationWorker::new(Arc::clone(repo), self.config.aggregation.catchup_hours);
        self.shutdown
            .register(aggregation.start(self.shutdown.subscribe()))
            .await;

        let retention = RetentionSweeper::new(Arc::clone(repo));
        self.shutdown
            .register(retention.start(self.shutdown.subscribe()))
            .await;

        tracing::debug!("Background tasks started");
    }
}
