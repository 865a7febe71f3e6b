use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

pub struct ServerConfig {
    pub env: Env,
    pub port: u16,
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    /// Secret expected in `X-Auth-Hook-Secret`. The user-deleted webhook is
    /// disabled without one.
    pub auth_hook_secret: Option<String>,
    pub post_cleanup_interval: Duration,
    /// JSON fixture loaded into the in-memory store when there's no database.
    pub seed_file: Option<String>,
}

pub enum AuthConfig {
    Firebase { project_id: String },
    SharedSecret { secret: String },
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POST_CLEANUP_INTERVAL_HOURS: u64 = 24;

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(format!(
            "Could not get the environment variable `{key}` due to unicode error"
        )),
    }
}

fn optional_var(key: &str) -> Option<String> {
    match var(key) {
        Ok(val) => val.filter(|v| !v.is_empty()),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}

fn required_var(key: &str) -> String {
    match var(key) {
        Ok(Some(val)) => val,
        Ok(None) => {
            tracing::error!("Environment variable `{key}` is required");
            std::process::exit(1)
        }
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Invalid value for `{key}`, using the default");
            default
        }),
        None => default,
    }
}

fn parse_env(raw: Option<&str>) -> Env {
    match raw {
        Some("staging") => Env::Staging,
        Some("production") => Env::Production,
        _ => Env::Dev,
    }
}

impl Env {
    pub fn from_env() -> Self {
        parse_env(optional_var("ENVIRONMENT").as_deref())
    }
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let env = Env::from_env();

        let auth = match optional_var("FIREBASE_PROJECT_ID") {
            Some(project_id) => AuthConfig::Firebase { project_id },
            None => AuthConfig::SharedSecret {
                secret: required_var("AUTH_JWT_SECRET"),
            },
        };

        let database_url = optional_var("DATABASE_URL");
        if database_url.is_none() && env != Env::Dev {
            tracing::error!("Environment variable `DATABASE_URL` is required outside dev");
            std::process::exit(1)
        }

        let interval_hours = parsed_var(
            "POST_CLEANUP_INTERVAL_HOURS",
            DEFAULT_POST_CLEANUP_INTERVAL_HOURS,
        )
        .max(1);

        ServerConfig {
            env,
            port: parsed_var("PORT", DEFAULT_PORT),
            database_url,
            auth,
            auth_hook_secret: optional_var("AUTH_HOOK_SECRET"),
            post_cleanup_interval: Duration::from_secs(interval_hours * 60 * 60),
            seed_file: optional_var("SEED_FILE"),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            env: Env::Dev,
            port: DEFAULT_PORT,
            database_url: None,
            auth: AuthConfig::SharedSecret {
                secret: crate::identity::shared_secret::testing::SECRET.into(),
            },
            auth_hook_secret: Some("hook-secret".into()),
            post_cleanup_interval: Duration::from_secs(
                DEFAULT_POST_CLEANUP_INTERVAL_HOURS * 60 * 60,
            ),
            seed_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_environment_is_dev() {
        assert_eq!(parse_env(None), Env::Dev);
        assert_eq!(parse_env(Some("qa")), Env::Dev);
        assert_eq!(parse_env(Some("staging")), Env::Staging);
        assert_eq!(parse_env(Some("production")), Env::Production);
    }
}
