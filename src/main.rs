//! PKI Lifecycle bootstrap
//!
//! Brings a CA directory to a usable state: root key, issuer key, self-signed
//! root certificate and an empty CRL bound to the root. Every step loads the
//! existing artifact when present, so running it again changes nothing.
//!
//! Settings come from `config.toml` in the working directory; without one the
//! built-in defaults are used. Log verbosity follows `RUST_LOG` (default `info`).

use std::path::Path;

use anyhow::{Context, Result};
use pki_lifecycle::authority::CertificateAuthority;
use pki_lifecycle::configs::AppConfig;
use pki_lifecycle::{crl::RevocationList, dump, issuance::Certificate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = if Path::new(CONFIG_PATH).exists() {
        AppConfig::load().context("Failed to load configuration")?
    } else {
        warn!(path = CONFIG_PATH, "configuration file not found, using defaults");
        AppConfig::default()
    };

    let ca = CertificateAuthority::open(config).context("Failed to open certificate authority")?;
    let boot = ca.bootstrap().context("Failed to bootstrap certificate authority")?;

    let root = Certificate::load(&boot.root_certificate)
        .context("Failed to read back root certificate")?;
    let crl = RevocationList::load(&boot.crl).context("Failed to read back CRL")?;
    info!(
        root = %root.subject_line(),
        serial = %root.serial()?,
        not_after = %root.not_after_text()?,
        crl_entries = crl.entries().len(),
        "certificate authority ready"
    );

    for dir in [ca.layout().root_certs_dir(), ca.layout().crl_dir()] {
        print!("{}", dump::listing(&dir)?);
    }
    Ok(())
}
