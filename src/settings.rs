use crate::auth::{CookieConfig, MAX_HASH_COST, MIN_HASH_COST};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Secret shipped in `config/default.toml`. Only good for development.
pub const DEVELOPMENT_SECRET: &str = "keep it secret, keep it safe!";

/// The HTTP server config.
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    /// Address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// The rust log parameter. Describes how much logging is wanted.
    pub rust_log: Option<String>,
}

/// This configuration object contains the database config.
#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    /// Database url.
    pub url: String,
    /// Maximum number of connections to the database.
    pub max_connections: u32,
}

/// Session cookie and session store config.
#[derive(Debug, Deserialize, Clone)]
pub struct Session {
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
    /// Key used to sign the session id in the cookie.
    pub secret: String,
    /// Whether the cookie gets the `Secure` attribute.
    pub secure: bool,
    /// Absolute lifetime of a session, counted from login.
    pub max_age_secs: u64,
    /// How often expired sessions are removed from the store.
    pub sweep_interval_secs: u64,
}

/// This configuration object contains the authentication config.
#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    /// Argon2 time cost used when hashing new passwords.
    pub hash_cost: u32,
}

/// This structure contains all the config parameters of the app.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// HTTP server settings.
    pub server: Server,
    /// Settings related to the database.
    pub database: Database,
    /// Session settings.
    pub session: Session,
    /// Authentication config.
    pub auth: Auth,
}

fn is_cookie_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

impl Settings {
    /// Creates a new configuration from defaults, config files and
    /// environment variables.
    ///
    /// `config_file` replaces `config/default` and must exist when given.
    pub fn new(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000_i64)?
            .set_default("database.url", "sqlite://auth.db3")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("session.cookie_name", "afternoon")?
            .set_default("session.secret", DEVELOPMENT_SECRET)?
            .set_default("session.secure", false)?
            .set_default("session.max_age_secs", 300_i64)?
            .set_default("session.sweep_interval_secs", 1800_i64)?
            .set_default("auth.hash_cost", 1_i64)?
            .add_source(
                File::with_name(config_file.unwrap_or("config/default"))
                    .required(config_file.is_some()),
            )
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("gate")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("session.secret", std::env::var("SESSION_SECRET").ok())?
            .set_override_option("session.secure", std::env::var("USE_SECURE_COOKIES").ok())?
            .set_override_option("auth.hash_cost", std::env::var("HASH_ROUNDS").ok())?
            .build()?;
        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.auth.hash_cost) {
            return Err(ConfigError::Message(format!(
                "auth.hash_cost must be between {} and {}, got {}",
                MIN_HASH_COST, MAX_HASH_COST, self.auth.hash_cost
            )));
        }
        if self.session.secret.is_empty() {
            return Err(ConfigError::Message("session.secret is empty".into()));
        }
        if self.session.cookie_name.is_empty()
            || !self.session.cookie_name.chars().all(is_cookie_name_char)
        {
            return Err(ConfigError::Message(format!(
                "session.cookie_name {:?} is not a valid cookie name",
                self.session.cookie_name
            )));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "session.sweep_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether any development-only default is still in use.
    pub fn uses_development_defaults(&self) -> bool {
        self.session.secret == DEVELOPMENT_SECRET || !self.session.secure
    }

    /// The cookie settings handed to the auth layer.
    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.session.cookie_name.clone(),
            secret: self.session.secret.clone().into_bytes(),
            secure: self.session.secure,
            max_age: Duration::from_secs(self.session.max_age_secs),
        }
    }

    /// Interval between two runs of the expired session sweeper.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Tests reading the process environment hold this lock.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 4] = [
        "SESSION_SECRET",
        "USE_SECURE_COOKIES",
        "HASH_ROUNDS",
        "GATE_SESSION__MAX_AGE_SECS",
    ];

    /// Removes the override variables when dropped, even if the test panics.
    struct EnvGuard;

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for var in OVERRIDE_VARS {
                std::env::remove_var(var);
            }
        }
    }

    fn sample() -> Settings {
        Settings {
            server: Server {
                host: "127.0.0.1".into(),
                port: 5000,
                rust_log: None,
            },
            database: Database {
                url: "sqlite::memory:".into(),
                max_connections: 1,
            },
            session: Session {
                cookie_name: "afternoon".into(),
                secret: DEVELOPMENT_SECRET.into(),
                secure: false,
                max_age_secs: 300,
                sweep_interval_secs: 1800,
            },
            auth: Auth { hash_cost: 1 },
        }
    }

    #[test]
    fn should_load_shipped_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.session.cookie_name, "afternoon");
        assert_eq!(settings.session.max_age_secs, 300);
        assert_eq!(settings.sweep_interval(), Duration::from_secs(1800));
    }

    #[test]
    fn should_apply_environment_overrides() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = EnvGuard;
        std::env::set_var("SESSION_SECRET", "prod-secret");
        std::env::set_var("USE_SECURE_COOKIES", "true");
        std::env::set_var("HASH_ROUNDS", "4");
        std::env::set_var("GATE_SESSION__MAX_AGE_SECS", "60");

        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.session.secret, "prod-secret");
        assert!(settings.session.secure);
        assert_eq!(settings.auth.hash_cost, 4);
        assert_eq!(settings.session.max_age_secs, 60);
        assert!(!settings.uses_development_defaults());

        std::env::set_var("HASH_ROUNDS", "12");
        assert!(Settings::new(None).is_err());
    }

    #[test]
    fn should_require_explicit_config_file() {
        assert!(Settings::new(Some("config/does-not-exist")).is_err());
    }

    #[test]
    fn should_accept_development_defaults() {
        let settings = sample();
        assert!(settings.validate().is_ok());
        assert!(settings.uses_development_defaults());
    }

    #[test]
    fn should_reject_out_of_range_hash_cost() {
        let mut settings = sample();
        settings.auth.hash_cost = 0;
        assert!(settings.validate().is_err());
        settings.auth.hash_cost = MAX_HASH_COST + 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn should_reject_empty_secret_and_zero_sweep() {
        let mut settings = sample();
        settings.session.secret = String::new();
        assert!(settings.validate().is_err());

        let mut settings = sample();
        settings.session.sweep_interval_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn should_reject_invalid_cookie_names() {
        for name in ["", "my cookie", "a=b", "semi;colon"] {
            let mut settings = sample();
            settings.session.cookie_name = name.into();
            assert!(settings.validate().is_err(), "{name}");
        }
        let mut settings = sample();
        settings.session.cookie_name = "__Host-sid".into();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn should_build_cookie_config() {
        let mut settings = sample();
        settings.session.secure = true;
        settings.session.secret = "s3cr3t".into();
        let cookie = settings.cookie_config();
        assert_eq!(cookie.name, "afternoon");
        assert_eq!(cookie.secret, b"s3cr3t".to_vec());
        assert!(cookie.secure);
        assert_eq!(cookie.max_age, Duration::from_secs(300));
        assert!(!settings.uses_development_defaults());
    }
}
