//! CLI argument parsing, validation, and startup helpers.

use crate::db::{Database, PrincipalRole};
use crate::jwt::ACCESS_TOKEN_DURATION_SECS;
use crate::password::hash_password;
use crate::ServerConfig;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::Parser;
use rand::RngCore;
use tracing::{error, info, warn};
use uuid::Uuid;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const GENERATED_SECRET_BYTES: usize = 48;
const GENERATED_PASSWORD_BYTES: usize = 16;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "gymgate", about = "Gym-management authentication service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7140")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "gymgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Create an admin account with this email on startup and print the
    /// generated password
    #[arg(long, value_name = "EMAIL")]
    pub seed_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the JWT secret from the environment or a file, or generate one for
/// the process lifetime when nothing is configured.
///
/// Generation rather than silent failure is a startup invariant: the issuer
/// must never run unsigned. A generated secret invalidates all sessions at
/// restart, hence the warning. Returns None only when an explicitly
/// configured secret is unusable.
pub fn load_or_generate_jwt_secret(jwt_secret_file: Option<&str>) -> Option<Vec<u8>> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        std::env::remove_var("JWT_SECRET");
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        let mut bytes = [0u8; GENERATED_SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        warn!(
            "No JWT secret configured; generated an ephemeral one. \
             All sessions will be invalidated at restart. \
             Set JWT_SECRET or --jwt-secret-file for stable sessions"
        );
        return Some(bytes.to_vec());
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret.into_bytes())
}

/// Handle the --seed-admin flag: create an admin account with a generated
/// password, or report the existing account.
pub async fn handle_seed_admin(db: &Database, email: &str) {
    match db.principals().get_by_email(email, PrincipalRole::Admin).await {
        Ok(Some(existing)) => {
            println!();
            println!("Admin already exists: {} ({})", existing.email, existing.uuid);
            println!();
        }
        Ok(None) => {
            let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
            rand::thread_rng().fill_bytes(&mut bytes);
            let password = URL_SAFE_NO_PAD.encode(bytes);

            let password_hash = match hash_password(&password) {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };

            let uuid = Uuid::new_v4().to_string();
            match db
                .principals()
                .create(&uuid, email, "Administrator", &password_hash, PrincipalRole::Admin)
                .await
            {
                Ok(_) => {
                    println!();
                    println!("Admin account created: {}", email);
                    println!("Password: {}", password);
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin account");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(db: Database, jwt_secret: Vec<u8>) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret,
        access_token_ttl_secs: ACCESS_TOKEN_DURATION_SECS,
    }
}
