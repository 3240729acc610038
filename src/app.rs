//! Application wiring.
//!
//! [`AppContext`] owns one instance of every long-lived component and is
//! shared by the HTTP server and the CLI. [`AppContext::open`] builds the
//! production graph (SQLite store, Naver sources, system clock);
//! [`AppContext::builder`] lets tests swap in an in-memory store, scripted
//! sources and a manual clock.

use std::sync::Arc;

use anyhow::Result;

use keyword_scout_core::clock::{Clock, SystemClock};
use keyword_scout_core::store::KeywordStore;

use crate::aggregate::{Aggregator, AggregatorSettings, Sources};
use crate::config::{Config, DispatchMode};
use crate::credentials::CredentialStore;
use crate::naver::NaverClient;
use crate::refresh::{InlineDispatcher, QueuedDispatcher, RefreshDispatcher, Refresher};
use crate::research::ResearchService;
use crate::sqlite_store::SqliteStore;

pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeywordStore>,
    pub credentials: Arc<CredentialStore>,
    pub naver: Arc<NaverClient>,
    pub research: Arc<ResearchService>,
}

impl AppContext {
    /// Connect to the configured database, apply migrations and build the
    /// production component graph. Must be called inside a tokio runtime
    /// when the research mode is `deferred`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = crate::db::connect(config).await?;
        crate::migrate::apply(&pool).await?;
        let store: Arc<dyn KeywordStore> = Arc::new(SqliteStore::new(pool));
        Self::builder(config.clone()).store(store).build()
    }

    pub fn builder(config: Config) -> AppContextBuilder {
        AppContextBuilder {
            config,
            store: None,
            credentials: None,
            sources: None,
            clock: None,
        }
    }
}

pub struct AppContextBuilder {
    config: Config,
    store: Option<Arc<dyn KeywordStore>>,
    credentials: Option<Arc<CredentialStore>>,
    sources: Option<Sources>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppContextBuilder {
    pub fn store(mut self, store: Arc<dyn KeywordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Replace the Naver-backed sources.
    pub fn sources(mut self, sources: Sources) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<AppContext> {
        let config = Arc::new(self.config);
        let store = match self.store {
            Some(store) => store,
            None => anyhow::bail!("no keyword store configured"),
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(CredentialStore::load(&config.credentials)));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let naver = Arc::new(NaverClient::new(config.sources.clone(), credentials.clone())?);
        let sources = self.sources.unwrap_or_else(|| Sources {
            metrics: naver.clone(),
            trends: naver.clone(),
            related: naver.clone(),
            tags: naver.clone(),
        });

        let settings = AggregatorSettings {
            call_timeout: config.sources.timeout(),
            related_timeout: config.sources.autocomplete_timeout(),
            trend_window: config.research.trend_window,
            related_limit: config.research.related_limit,
            tag_limit: config.research.tag_limit,
        };
        let policy = config.freshness.policy();
        let refresher = Arc::new(Refresher::new(
            store.clone(),
            Arc::new(Aggregator::new(sources, settings)),
            policy.clone(),
            clock.clone(),
        ));
        let dispatcher: Arc<dyn RefreshDispatcher> = match config.research.mode {
            DispatchMode::Inline => Arc::new(InlineDispatcher::new(refresher.clone())),
            DispatchMode::Deferred => Arc::new(QueuedDispatcher::spawn(refresher.clone())),
        };
        tracing::debug!(mode = ?config.research.mode, "research service ready");

        Ok(AppContext {
            research: Arc::new(ResearchService::new(refresher, dispatcher, policy, clock)),
            config,
            store,
            credentials,
            naver,
        })
    }
}
