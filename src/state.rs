//! Application state: config, the running session, and service wiring.
//!
//! This module owns:
//!   - the topic catalog (from TOML or defaults)
//!   - the session handle (actor spawned at startup)
//!   - the choice of generator: OpenAI when OPENAI_API_KEY is set, built-in seeds otherwise
//!
//! Stats are loaded once here; the data directory also hosts the JSONL archive.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::archive::Archive;
use crate::config::{load_config_from_env, AppConfig, Catalog};
use crate::generator::ProblemGenerator;
use crate::grader::{Grader, SandboxGrader};
use crate::openai::OpenAI;
use crate::runtime::{spawn_session, Services, SessionHandle};
use crate::seeds::SeedGenerator;
use crate::session::SessionState;
use crate::store::StatsStore;

#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub catalog: Catalog,
    /// "openai" or "seeds", reported by the health endpoint.
    pub generator: &'static str,
}

impl AppState {
    /// Build state from env: load config and stats, pick services, start the session actor.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> crate::error::Result<Self> {
        let cfg = load_config_from_env();
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: AppConfig) -> crate::error::Result<Self> {
        let data_dir = cfg.storage.data_dir.clone();

        // A broken data dir is not fatal: the session runs without persistence.
        let store = match StatsStore::new(&data_dir) {
            Ok(s) => Some(s),
            Err(e) => {
                error!(target: "practice_backend", error = %e, "Stats persistence disabled");
                None
            }
        };
        let archive = match Archive::new(&data_dir) {
            Ok(a) => Some(a),
            Err(e) => {
                error!(target: "practice_backend", error = %e, "Problem archive disabled");
                None
            }
        };
        let stats = store.as_ref().map(StatsStore::load).unwrap_or_default();
        if let Some(store) = &store {
            info!(target: "stats", topics = stats.iter().count(), path = %store.path().display(), "Startup stats inventory");
        }

        let (generator, generator_name): (Arc<dyn ProblemGenerator>, &'static str) =
            match OpenAI::from_env(cfg.prompts.clone(), cfg.catalog.clone(), cfg.timeouts.generation()) {
                Some(oa) => {
                    info!(target: "practice_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                    (Arc::new(oa), "openai")
                }
                None => {
                    info!(target: "practice_backend", "OpenAI disabled (no OPENAI_API_KEY). Serving built-in seed problems.");
                    (Arc::new(SeedGenerator::new(cfg.catalog.clone())), "seeds")
                }
            };

        let grader = SandboxGrader::from_env(cfg.timeouts.grading())?;
        info!(target: "grading", base_url = %grader.base_url, "Sandbox runner configured");
        let grader: Arc<dyn Grader> = Arc::new(grader);

        let services = Services {
            generator,
            grader,
            store,
            archive,
            generation_timeout: cfg.timeouts.generation(),
            grading_timeout: cfg.timeouts.grading(),
        };
        let session = spawn_session(SessionState::new(cfg.catalog.clone(), stats), services);

        Ok(Self { session, catalog: cfg.catalog, generator: generator_name })
    }
}
