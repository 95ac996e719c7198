use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use docket_core::datastore::DataStore;
use docket_core::model::Model;
use docket_shared::AuthResponse;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{TokenKeys, hash_password, verify_password};
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

const USERS_KEY: &str = "users";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the handlers share: the on-disk store, the user registry and
/// one lazily loaded model per account.
pub struct AppState {
    store: DataStore,
    users: Mutex<Vec<UserRecord>>,
    accounts: Mutex<HashMap<Uuid, Arc<Mutex<Model>>>>,
    keys: TokenKeys,
    tz: Tz,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    #[instrument(skip(cfg))]
    pub fn new(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let store = DataStore::open(&cfg.data_dir).with_context(|| {
            format!("failed to open server datastore at {}", cfg.data_dir.display())
        })?;
        let users: Vec<UserRecord> = store
            .load_json(USERS_KEY)
            .context("failed to load user registry")?
            .unwrap_or_default();
        info!(users = users.len(), data_dir = %cfg.data_dir.display(), "loaded user registry");

        Ok(Self {
            store,
            users: Mutex::new(users),
            accounts: Mutex::new(HashMap::new()),
            keys: TokenKeys::new(cfg.jwt_secret().as_bytes(), cfg.token_ttl_hours),
            tz: cfg.timezone(),
        })
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    pub fn user_exists(&self, id: Uuid) -> bool {
        self.users.lock().iter().any(|user| user.id == id)
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .lock()
            .iter()
            .any(|user| user.email.eq_ignore_ascii_case(email))
    }

    /// Hashing happens off the async workers and without the registry lock
    /// held; the duplicate check is repeated once the hash is ready.
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::bad_request("Email and password are required"));
        }
        if self.email_taken(email) {
            return Err(ApiError::bad_request("User already exists"));
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")?
            .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        };

        {
            let mut users = self.users.lock();
            if users
                .iter()
                .any(|user| user.email.eq_ignore_ascii_case(email))
            {
                return Err(ApiError::bad_request("User already exists"));
            }
            users.push(record.clone());

            if let Err(err) = self.store.save_json(USERS_KEY, &*users) {
                users.pop();
                return Err(ApiError::Internal(err.context("failed to save user registry")));
            }
        }

        info!(user = %record.id, "registered account");
        self.issue(&record)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        let record = self
            .users
            .lock()
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
            .ok_or_else(|| ApiError::bad_request("Invalid credentials"))?;

        let password = password.to_string();
        let hash = record.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("password check task failed")?;
        if !matches {
            debug!(user = %record.id, "password mismatch");
            return Err(ApiError::bad_request("Invalid credentials"));
        }

        info!(user = %record.id, "logged in");
        self.issue(&record)
    }

    pub fn read<R>(&self, user: Uuid, f: impl FnOnce(&Model) -> R) -> ApiResult<R> {
        let account = self.account(user)?;
        let model = account.lock();
        Ok(f(&model))
    }

    /// Runs `f` against the account's model and saves it when `f` succeeds.
    /// A failed save is logged; the in-memory change stands.
    pub fn update<R>(
        &self,
        user: Uuid,
        f: impl FnOnce(&mut Model) -> ApiResult<R>,
    ) -> ApiResult<R> {
        let account = self.account(user)?;
        let mut model = account.lock();
        let out = f(&mut model)?;

        let key = account_key(user);
        if let Err(err) = self.store.save(&key, &model.snapshot()) {
            warn!(user = %user, error = %format!("{err:#}"), "failed to save account snapshot");
        }
        Ok(out)
    }

    fn account(&self, user: Uuid) -> ApiResult<Arc<Mutex<Model>>> {
        let mut accounts = self.accounts.lock();
        if let Some(account) = accounts.get(&user) {
            return Ok(Arc::clone(account));
        }

        let key = account_key(user);
        let snapshot = self
            .store
            .load(&key)
            .with_context(|| format!("failed to load snapshot for {user}"))?
            .unwrap_or_default();
        debug!(user = %user, tasks = snapshot.tasks.len(), "loaded account");

        let account = Arc::new(Mutex::new(Model::from_snapshot(snapshot)));
        accounts.insert(user, Arc::clone(&account));
        Ok(account)
    }

    fn issue(&self, record: &UserRecord) -> ApiResult<AuthResponse> {
        let token = self
            .keys
            .issue(record.id, &record.email)
            .map_err(|err| anyhow::anyhow!("failed to sign token: {err}"))?;
        Ok(AuthResponse {
            token,
            user_id: record.id,
        })
    }
}

fn account_key(user: Uuid) -> String {
    format!("user-{user}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docket_core::task::TaskDraft;

    use super::AppState;
    use crate::config::ServerConfig;

    fn state(dir: &std::path::Path) -> AppState {
        let cfg = ServerConfig {
            data_dir: dir.to_path_buf(),
            jwt_secret: Some("test-secret".to_string()),
            ..ServerConfig::default()
        };
        AppState::new(&cfg).expect("state")
    }

    #[tokio::test]
    async fn accounts_persist_across_restarts() {
        let temp = tempfile::tempdir().expect("tempdir");

        let user = {
            let state = state(temp.path());
            let auth = state.register("a@example.com", "pw").await.expect("register");
            state
                .update(auth.user_id, |model| {
                    Ok(model.create_task(TaskDraft::titled("kept"), chrono::Utc::now()))
                })
                .expect("update");
            auth.user_id
        };

        let state = state(temp.path());
        assert!(state.user_exists(user));
        assert!(state.login("A@example.com", "pw").await.is_ok());
        let titles = state
            .read(user, |model| {
                model
                    .tasks()
                    .iter()
                    .map(|task| task.title.clone())
                    .collect::<Vec<_>>()
            })
            .expect("read");
        assert_eq!(titles, ["kept"]);
    }

    #[tokio::test]
    async fn duplicate_and_bad_logins_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = state(temp.path());
        state.register("a@example.com", "pw").await.expect("register");

        let dup = state
            .register(" a@example.com ", "other")
            .await
            .expect_err("duplicate");
        assert_eq!(dup.to_string(), "User already exists");

        let bad = state.login("a@example.com", "nope").await.expect_err("bad password");
        assert_eq!(bad.to_string(), "Invalid credentials");
        let unknown = state.login("b@example.com", "pw").await.expect_err("unknown user");
        assert_eq!(unknown.to_string(), "Invalid credentials");

        assert!(state.register("  ", "pw").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_registrations_keep_one_account() {
        let temp = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(state(temp.path()));

        let attempts = (0..4).map(|_| {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.register("race@example.com", "pw").await })
        });
        let mut ok = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            if attempt.await.expect("join").is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);

        let stored = state.users.lock().len();
        assert_eq!(stored, 1);
    }
}
