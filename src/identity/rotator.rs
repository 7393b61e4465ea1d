use crate::config::{IdentityConfig, RotationMode};
use crate::identity::presets::{ACCEPT_LANGUAGES, USER_AGENTS};
use crate::identity::source::{FileUserAgentSource, UserAgentSource};
use crate::identity::Identity;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out request identities drawn from a pool of presets
///
/// Shared by all seeds; the only state it mutates is its counters.
pub struct IdentityRotator {
    user_agents: Vec<String>,
    accept_languages: Vec<String>,
    referer: Option<String>,
    mode: RotationMode,
    source: Option<Box<dyn UserAgentSource>>,
    source_warned: AtomicBool,
    issued: AtomicU64,
    fallbacks: AtomicU64,
}

impl IdentityRotator {
    /// Builds a rotator from configuration
    ///
    /// Configured pools replace the built-in presets when non-empty.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let source = config
            .user_agent_file
            .as_ref()
            .map(|path| Box::new(FileUserAgentSource::new(path)) as Box<dyn UserAgentSource>);

        Self {
            user_agents: pool_or_presets(&config.user_agents, USER_AGENTS),
            accept_languages: pool_or_presets(&config.accept_languages, ACCEPT_LANGUAGES),
            referer: config.referer.clone(),
            mode: config.rotation,
            source,
            source_warned: AtomicBool::new(false),
            issued: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Replaces the external user-agent source
    pub fn with_source(mut self, source: Box<dyn UserAgentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    /// Draws a fresh identity
    pub fn next(&self) -> Identity {
        self.issued.fetch_add(1, Ordering::Relaxed);

        Identity {
            user_agent: self.draw_user_agent(),
            accept_language: pick(&self.accept_languages),
            referer: self.referer.clone(),
            cache_buster: Identity::new_cache_buster(),
        }
    }

    /// Opens a per-seed session honouring the rotation mode
    pub fn session(self: &Arc<Self>) -> IdentitySession {
        IdentitySession {
            rotator: Arc::clone(self),
            pinned: None,
        }
    }

    /// Number of identities handed out so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Number of draws where the external source failed
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    fn draw_user_agent(&self) -> String {
        let Some(source) = &self.source else {
            return pick(&self.user_agents);
        };

        match source.generate() {
            Ok(user_agent) => user_agent,
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                if !self.source_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        "User-agent source {} failed, using built-in pool: {}",
                        source.describe(),
                        e
                    );
                }
                pick(&self.user_agents)
            }
        }
    }
}

/// Identity stream for one seed traversal
///
/// In per-session mode the first identity is kept for the whole session;
/// only the cache-buster changes between requests.
pub struct IdentitySession {
    rotator: Arc<IdentityRotator>,
    pinned: Option<Identity>,
}

impl IdentitySession {
    pub fn next(&mut self) -> Identity {
        match self.rotator.mode() {
            RotationMode::PerRequest => self.rotator.next(),
            RotationMode::PerSession => {
                let pinned = self.pinned.get_or_insert_with(|| self.rotator.next());
                Identity {
                    cache_buster: Identity::new_cache_buster(),
                    ..pinned.clone()
                }
            }
        }
    }
}

fn pool_or_presets(configured: &[String], presets: &[&str]) -> Vec<String> {
    if configured.is_empty() {
        presets.iter().map(|s| s.to_string()).collect()
    } else {
        configured.to_vec()
    }
}

fn pick(pool: &[String]) -> String {
    pool[rand::random_range(0..pool.len())].clone()
}
