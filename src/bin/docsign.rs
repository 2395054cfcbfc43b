//! docsign CLI
//!
//! Issue self-signed identities into PKCS#12 keystores, create detached
//! CMS signatures over files and verify them.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use docsign::{
    config::{ConfigManager, DocSignConfiguration, ExportFormat},
    services::{cms_builder::SignatureEngine, verification::CertificateSummary},
    KeyAlias, KeystorePassword, IssueWorkflow, SignWorkflow, VerificationOutcome, VerifyWorkflow,
};

#[derive(Parser)]
#[command(name = "docsign")]
#[command(about = "Detached CMS/PKCS#7 document signing")]
#[command(long_about = "
docsign - detached document signatures with PKCS#12 keystores

EXAMPLES:
    # Create a self-signed identity in mykey.pfx
    docsign issue --cn alice --alias mykey

    # Sign a document, writing mykey.p7s
    docsign sign contract.pdf --keystore mykey.pfx --alias mykey

    # Verify the detached signature
    docsign verify contract.pdf mykey.p7s

ENVIRONMENT VARIABLES:
    DOCSIGN_PASSWORD    Keystore password (instead of --password)
    RUST_LOG            Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a self-signed identity and store it as <alias>.pfx
    Issue {
        /// Subject common name
        #[arg(long, value_name = "NAME")]
        cn: String,

        /// Keystore alias (defaults to the configured alias)
        #[arg(short, long)]
        alias: Option<String>,

        /// Keystore password
        #[arg(short, long, env = "DOCSIGN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Certificate validity in days (overrides config)
        #[arg(long)]
        days: Option<u32>,

        /// Output directory (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Replace an existing keystore file
        #[arg(long)]
        force: bool,
    },

    /// Create a detached signature <alias>.p7s for a file
    Sign {
        /// File to sign
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// PKCS#12 keystore holding the signing key
        #[arg(short, long, value_name = "KEYSTORE")]
        keystore: PathBuf,

        /// Keystore alias (defaults to the configured alias)
        #[arg(short, long)]
        alias: Option<String>,

        /// Keystore password
        #[arg(short, long, env = "DOCSIGN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Signature algorithm, e.g. SHA256withECDSA (derived from the key by default)
        #[arg(long)]
        algorithm: Option<String>,

        /// Output directory (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Verify a detached signature against the signed file
    Verify {
        /// Original file
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Detached signature (.p7s)
        #[arg(value_name = "SIGNATURE_FILE")]
        signature: PathBuf,
    },

    /// Show the certificates embedded in a detached signature
    Inspect {
        /// Detached signature (.p7s)
        #[arg(value_name = "SIGNATURE_FILE")]
        signature: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    // Config subcommands must work even when the file is broken
    let settings = match cli.command {
        Commands::Config(_) => DocSignConfiguration::default(),
        _ => load_settings(&config_manager)?,
    };

    let default_level = if cli.verbose || settings.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Issue {
            cn,
            alias,
            password,
            days,
            output_dir,
            force,
        } => {
            let alias = alias.unwrap_or_else(|| settings.default_alias.clone());
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir());
            let validity_days = days.unwrap_or(settings.validity_days);
            handle_issue_command(&cn, &alias, &password, validity_days, &output_dir, force)?;
        }

        Commands::Sign {
            input_file,
            keystore,
            alias,
            password,
            algorithm,
            output_dir,
        } => {
            let alias = alias.unwrap_or_else(|| settings.default_alias.clone());
            let output_dir = output_dir.unwrap_or_else(|| settings.output_dir());
            handle_sign_command(
                &settings,
                &input_file,
                &keystore,
                &alias,
                &password,
                algorithm.as_deref(),
                &output_dir,
            )?;
        }

        Commands::Verify {
            input_file,
            signature,
        } => {
            handle_verify_command(&input_file, &signature, cli.verbose)?;
        }

        Commands::Inspect { signature, json } => {
            handle_inspect_command(&signature, json)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

// An absent file means defaults; nothing is written until `config init`.
fn load_settings(config_manager: &ConfigManager) -> Result<DocSignConfiguration> {
    if config_manager.config_path().exists() {
        Ok(config_manager.load()?)
    } else {
        Ok(DocSignConfiguration::default())
    }
}

fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot read {what} {}", path.display()))
}

fn handle_issue_command(
    cn: &str,
    alias: &str,
    password: &str,
    validity_days: u32,
    output_dir: &Path,
    force: bool,
) -> Result<()> {
    let alias = KeyAlias::new(alias)?;
    let password = KeystorePassword::new(password)?;

    std::fs::create_dir_all(output_dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot create {}", output_dir.display()))?;

    let identity = IssueWorkflow::new()
        .with_validity_days(validity_days)
        .run(&password, &alias, cn)
        .wrap_err("Failed to issue identity")?;
    let path = identity.write_keystore(output_dir, force)?;

    let cert = CertificateSummary::from(identity.key.certificate());
    println!("✅ Keystore created: {}", path.display());
    println!("  Alias: {alias}");
    println!("  Subject: {}", cert.subject);
    println!("  Serial: {}", cert.serial);
    println!("  Valid until: {}", cert.not_after);
    Ok(())
}

fn handle_sign_command(
    settings: &DocSignConfiguration,
    input_file: &Path,
    keystore_path: &Path,
    alias: &str,
    password: &str,
    algorithm: Option<&str>,
    output_dir: &Path,
) -> Result<()> {
    let alias = KeyAlias::new(alias)?;
    let password = KeystorePassword::new(password)?;
    let payload = read_file(input_file, "input file")?;

    let mut engine = SignatureEngine::new();
    if let Some(name) = algorithm {
        engine = engine.with_algorithm_name(name)?;
    }
    let workflow = SignWorkflow::new()
        .with_loader(settings.keystore_loader()?)
        .with_engine(engine);

    let keystore = workflow
        .open_keystore(keystore_path, &password)
        .wrap_err("Failed to open keystore")?;
    let signed = workflow
        .run_with_keystore(&payload, &keystore, &password, alias.as_str())
        .wrap_err("Failed to sign document")?;

    std::fs::create_dir_all(output_dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot create {}", output_dir.display()))?;
    let path = signed.write_container(output_dir, &alias)?;

    let mut summary = signed.summary();
    summary.signature_path = Some(path);
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).into_diagnostic()?
    );
    Ok(())
}

fn handle_verify_command(input_file: &Path, signature: &Path, verbose: bool) -> Result<()> {
    let payload = read_file(input_file, "input file")?;
    let container = read_file(signature, "signature file")?;

    let report = VerifyWorkflow::new().run(&payload, &container);
    if verbose {
        for signer in &report.signers {
            let subject = signer.subject.as_deref().unwrap_or("<unknown>");
            match &signer.failure {
                None => println!("  Signer #{}: {subject} ✅", signer.index),
                Some(failure) => println!("  Signer #{}: {subject} ❌ {failure}", signer.index),
            }
        }
    }

    match &report.outcome {
        VerificationOutcome::Verified => {
            let subject = report
                .verified_signer()
                .and_then(|s| s.subject.clone())
                .unwrap_or_default();
            println!("✅ Signature verified (signer: {subject})");
            Ok(())
        }
        VerificationOutcome::NotVerified(reason) => {
            miette::bail!("Signature NOT verified: {reason}")
        }
    }
}

fn handle_inspect_command(signature: &Path, json: bool) -> Result<()> {
    let container = read_file(signature, "signature file")?;
    let certificates = VerifyWorkflow::new().inspect(&container)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&certificates).into_diagnostic()?
        );
        return Ok(());
    }

    println!("📋 {} embedded certificate(s)", certificates.len());
    for (index, cert) in certificates.iter().enumerate() {
        println!("  #{index}: {}", cert.subject);
        println!("     Issuer: {}", cert.issuer);
        println!("     Serial: {}", cert.serial);
        println!("     Valid: {} .. {}", cert.not_before, cert.not_after);
        if cert.self_signed {
            println!("     Self-signed");
        }
    }
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Default alias: {}", config.default_alias);
                println!("  Validity days: {}", config.validity_days);
                println!("  Keystore formats: {}", config.keystore_formats.join(", "));
                println!("  Output directory: {}", config.output_dir().display());
                println!("  Verbose: {}", config.verbose);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            let _config = config_manager.load_or_create_default()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager.update_value(&key, &value)?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager.export_config(format.into())?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager.import_config(&content, format.into())?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}
