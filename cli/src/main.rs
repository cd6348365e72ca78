//! mfagate command-line front end
//!
//! Runs the same authentication engine the PAM module and credential
//! provider embed, plus the setup commands a deployment needs: machine
//! key generation and secret encryption. `check` exits with the PAM
//! code of the result so it can sit directly in an `exec`-style hook.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mfagate_crypto::{LocalKeyCipher, SecretStore};
use mfagate_engine::{
    Config, Engine, FileContinuityStore, LoginAttempt, MachineInfo, host,
};
use mfagate_protocol::{AuthMethod, AuthResult};
use mfagate_transport::SigningTransport;
use rand::RngCore;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the TOML configuration file
    #[arg(long, default_value = "/etc/mfagate/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one authentication attempt and exit with its PAM code
    Check {
        /// Username, optionally `DOMAIN\user` or `user@domain`
        #[arg(long)]
        user: String,
        /// One-time code; omit to use push approval
        #[arg(long)]
        code: Option<String>,
        /// Domain, when not part of the username
        #[arg(long)]
        domain: Option<String>,
        /// Remote client address to report with a push
        #[arg(long)]
        client_host: Option<String>,
    },
    /// Query which methods the backend offers a user
    Capability {
        #[arg(long)]
        user: String,
    },
    /// Encrypt a secret (read from stdin) for the config file
    EncryptSecret,
    /// Generate the machine key file used to encrypt secrets
    InitKey,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();

    match args.command {
        Commands::Check {
            user,
            code,
            domain,
            client_host,
        } => check(&config, user, code, domain, client_host).await,
        Commands::Capability { user } => capability(&config, &user).await,
        Commands::EncryptSecret => encrypt_secret(&config),
        Commands::InitKey => init_key(&config),
    }
}

fn machine_key(config: &Config) -> Result<[u8; 32]> {
    let raw = std::fs::read(&config.api.machine_key_path)
        .with_context(|| format!("reading machine key {}", config.api.machine_key_path))?;
    let key: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("machine key must be exactly 32 bytes"))?;
    Ok(key)
}

fn secret_store(config: &Config) -> Result<SecretStore<LocalKeyCipher>> {
    Ok(SecretStore::new(LocalKeyCipher::new(&machine_key(config)?)))
}

fn local_computer_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

fn build_transport(config: &Config) -> Result<SigningTransport> {
    // Encrypted keys need the machine key; plaintext-only configs work
    // without one.
    let store = if config.api.integration_key_enc.is_empty() && config.api.secret_key_enc.is_empty()
    {
        SecretStore::new(LocalKeyCipher::new(&[0u8; 32]))
    } else {
        secret_store(config)?
    };

    let integration_key = config.integration_key(&store)?;
    let secret_key = config.secret_key(&store)?;

    Ok(SigningTransport::new(
        &config.api.endpoint,
        &integration_key,
        &secret_key,
        &config.auth.service_name,
        Duration::from_secs(config.api.timeout_secs),
    )?)
}

fn build_engine(config: &Config) -> Result<Engine> {
    let transport = build_transport(config)?;
    let engine = Engine::new(
        config.clone(),
        Arc::new(transport),
        MachineInfo::standalone(local_computer_name()),
    )?
    .with_continuity(Arc::new(FileContinuityStore::new(
        "/var/lib/mfagate/continuity.json",
    )));
    Ok(engine)
}

async fn check(
    config: &Config,
    user: String,
    code: Option<String>,
    domain: Option<String>,
    client_host: Option<String>,
) -> Result<ExitCode> {
    let engine = build_engine(config)?;

    let mut attempt = LoginAttempt::new(user);
    if let Some(domain) = domain {
        attempt = attempt.with_domain(domain);
    }
    if let Some(host) = client_host {
        attempt = attempt.with_client_host(host);
    }
    if let Some(code) = code {
        attempt = attempt.with_secret(code);
    }

    // The CLI has no interactive method picker: a second step prefers
    // push when it is on the table, otherwise prompts for a code.
    let first = engine.authenticate(&attempt).await?;
    let result = match first {
        AuthResult::NeedsSecondStep(methods) => {
            let method = if methods.contains(&AuthMethod::Push) {
                AuthMethod::Push
            } else {
                let code = prompt_code("Verification code: ")?;
                attempt = attempt.with_secret(code);
                AuthMethod::Totp
            };
            engine.second_step(&attempt, method).await?
        }
        terminal => terminal,
    };

    match &result {
        AuthResult::Success => println!("approved"),
        AuthResult::Bypassed(reason) => println!("bypassed: {reason:?}"),
        AuthResult::Failure(reason) => println!("denied: {}", reason.user_message()),
        AuthResult::TransientError(detail) => println!("error: {detail}"),
        AuthResult::NeedsSecondStep(_) => println!("denied: second factor required"),
    }

    let code = host::pam_code(&result);
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX)))
}

/// Prompt on stderr and read one line from stdin. Codes are short and
/// time-limited, so plain echoing input is acceptable here.
fn prompt_code(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn capability(config: &Config, user: &str) -> Result<ExitCode> {
    use mfagate_transport::MfaApi;

    let transport = build_transport(config)?;
    let token = transport
        .query_capability(user, &local_computer_name(), &config.auth.login_type)
        .await?;
    println!("{token:?}");
    Ok(ExitCode::SUCCESS)
}

fn encrypt_secret(config: &Config) -> Result<ExitCode> {
    let store = secret_store(config)?;

    let mut plaintext = String::new();
    std::io::stdin().read_to_string(&mut plaintext)?;
    let plaintext = plaintext.trim_end_matches(['\r', '\n']);
    if plaintext.is_empty() {
        bail!("no secret on stdin");
    }

    println!("{}", store.encrypt(plaintext)?);
    Ok(ExitCode::SUCCESS)
}

fn init_key(config: &Config) -> Result<ExitCode> {
    let path = PathBuf::from(&config.api.machine_key_path);
    if path.exists() {
        bail!("{} already exists, refusing to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    std::fs::write(&path, key)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("machine key written to {}", path.display());
    Ok(ExitCode::SUCCESS)
}
