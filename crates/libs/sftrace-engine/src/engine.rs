use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sftrace_tooling::ToolingApi;
use time::OffsetDateTime;

use crate::debug_level::{self, DebugLevel, DebugLevelResolution, ProvisionPolicy};
use crate::debug_mode::{self, DebugModeChange};
use crate::duration::{TraceDuration, DEFAULT_TRACE_DURATION};
use crate::error::TraceError;
use crate::session::{self, UpsertOutcome};
use crate::user::{self, ResolvedUser, TargetIdentity};
use crate::DEFAULT_DEBUG_LEVEL_NAME;

type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Everything needed to start or renew a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRequest {
    pub target: TargetIdentity,
    pub debug_level_name: String,
    pub duration: String,
    pub provision: ProvisionPolicy,
}

impl Default for TraceRequest {
    fn default() -> Self {
        Self {
            target: TargetIdentity::CurrentCaller,
            debug_level_name: DEFAULT_DEBUG_LEVEL_NAME.to_string(),
            duration: DEFAULT_TRACE_DURATION.to_string(),
            provision: ProvisionPolicy::AutoProvision,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceReport {
    pub user: ResolvedUser,
    pub debug_level: DebugLevelResolution,
    pub outcome: UpsertOutcome,
}

/// Creates or extends trace flags against one org.
///
/// Upserts for the same user are serialized inside this engine. Separate
/// processes (or separate engines) targeting the same user can still race
/// between the trace flag lookup and the write, leaving two flags or losing
/// one extension.
pub struct TraceEngine {
    api: Arc<dyn ToolingApi>,
    clock: Clock,
    serialize_per_user: bool,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TraceEngine {
    pub fn new(api: Arc<dyn ToolingApi>) -> Self {
        Self {
            api,
            clock: Arc::new(OffsetDateTime::now_utc),
            serialize_per_user: true,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> OffsetDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Let concurrent upserts for one user interleave freely.
    pub fn without_user_serialization(mut self) -> Self {
        self.serialize_per_user = false;
        self
    }

    pub fn api(&self) -> &dyn ToolingApi {
        self.api.as_ref()
    }

    pub async fn resolve_user(&self, target: &TargetIdentity) -> Result<ResolvedUser, TraceError> {
        user::resolve_user(self.api(), target).await
    }

    pub async fn resolve_debug_level(
        &self,
        name: &str,
        policy: ProvisionPolicy,
    ) -> Result<DebugLevelResolution, TraceError> {
        debug_level::resolve_or_create_debug_level(self.api(), name, policy).await
    }

    /// Create or extend the trace flag for `user`.
    ///
    /// The duration is validated before anything is read or written.
    pub async fn upsert_session(
        &self,
        user: &ResolvedUser,
        level: &DebugLevel,
        duration: &str,
    ) -> Result<UpsertOutcome, TraceError> {
        let duration: TraceDuration = duration.parse()?;
        self.upsert_parsed(user, level, &duration).await
    }

    async fn upsert_parsed(
        &self,
        user: &ResolvedUser,
        level: &DebugLevel,
        duration: &TraceDuration,
    ) -> Result<UpsertOutcome, TraceError> {
        if !self.serialize_per_user {
            return session::upsert_session(self.api(), user, level, duration, self.clock.as_ref())
                .await;
        }

        let lock = self.user_lock(&user.id);
        let guard = lock.lock().await;
        let outcome =
            session::upsert_session(self.api(), user, level, duration, self.clock.as_ref()).await;
        drop(guard);
        drop(lock);
        self.release_user_lock(&user.id);
        outcome
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Forget the user's lock once no upsert holds or waits on it.
    fn release_user_lock(&self, user_id: &str) {
        let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve the user and debug level, then create or extend the user's
    /// trace flag.
    pub async fn trace(&self, request: &TraceRequest) -> Result<TraceReport, TraceError> {
        let duration: TraceDuration = request.duration.parse()?;

        let (user, found) = tokio::try_join!(
            user::resolve_user(self.api(), &request.target),
            debug_level::find_debug_level(self.api(), &request.debug_level_name),
        )?;

        if found.is_none() && request.provision == ProvisionPolicy::AutoProvision {
            log::info!(
                "creating default DebugLevel {} for {}",
                request.debug_level_name,
                user.username
            );
        }
        let debug_level = debug_level::settle_debug_level(
            self.api(),
            &request.debug_level_name,
            found,
            request.provision,
        )
        .await?;

        let outcome = self
            .upsert_parsed(&user, debug_level.level(), &duration)
            .await?;

        Ok(TraceReport {
            user,
            debug_level,
            outcome,
        })
    }

    pub async fn toggle_debug_mode(
        &self,
        target_user: Option<&str>,
    ) -> Result<DebugModeChange, TraceError> {
        debug_mode::toggle_debug_mode(self.api(), target_user).await
    }
}
