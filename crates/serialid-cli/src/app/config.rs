use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use anyhow::{Context, anyhow, bail};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use serialid::{
    AllocatorConfig, AuthorizedRegions, MAX_SEQUENCE, MAX_YEAR, NumberingScheme, Principal, Region,
    RegionCatalog, RetryPolicy,
};

use crate::app::export::DEFAULT_HEADER;

/// Runtime configuration for the `serialid` binary.
///
/// Every global option can also be set through its environment variable,
/// including from a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "serialid",
    version,
    about = "Allocate, audit and export region-scoped serial numbers"
)]
pub struct CliArgs {
    /// Path of the SQLite database holding counters and the issuance ledger.
    ///
    /// Environment variable: `SERIALID_DB`
    #[arg(long, env = "SERIALID_DB", default_value = "serialid.db", global = true)]
    pub db: PathBuf,

    /// Largest number of serial numbers a single allocation may request.
    ///
    /// Environment variable: `SERIALID_MAX_BATCH`
    #[arg(long, env = "SERIALID_MAX_BATCH", default_value_t = serialid::DEFAULT_MAX_BATCH, global = true)]
    pub max_batch: u32,

    /// Whether sequences continue across years (`per-region`) or restart
    /// every year (`per-region-year`).
    ///
    /// Environment variable: `SERIALID_SCHEME`
    #[arg(long, env = "SERIALID_SCHEME", default_value = "per-region", global = true)]
    pub scheme: NumberingScheme,

    /// Attempts made before a contended or failing write is given up.
    ///
    /// Environment variable: `SERIALID_RETRY_ATTEMPTS`
    #[arg(long, env = "SERIALID_RETRY_ATTEMPTS", default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS, global = true)]
    pub retry_attempts: u32,

    /// Upper bound on the wait between retries, in milliseconds.
    ///
    /// Environment variable: `SERIALID_RETRY_MAX_BACKOFF_MS`
    #[arg(long, env = "SERIALID_RETRY_MAX_BACKOFF_MS", default_value_t = 1_000, global = true)]
    pub retry_max_backoff_ms: u64,

    /// Name recorded as the issuer of allocated serial numbers.
    ///
    /// Environment variable: `SERIALID_PRINCIPAL`
    #[arg(long, env = "SERIALID_PRINCIPAL", global = true)]
    pub principal: Option<String>,

    /// Regions the principal may allocate for: a comma-separated list of
    /// region codes or names, or `*` for every region.
    ///
    /// Environment variable: `SERIALID_AUTHORIZED`
    #[arg(long, env = "SERIALID_AUTHORIZED", default_value = "*", global = true)]
    pub authorized: String,

    /// Emit logs as JSON lines instead of human-readable text.
    ///
    /// Environment variable: `SERIALID_LOG_JSON`
    #[arg(long, env = "SERIALID_LOG_JSON", default_value_t = false, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Allocate serial numbers and export them to a CSV file.
    Allocate {
        /// Region code or name, e.g. `PT` or `Petrolina`.
        #[arg(long)]
        region: String,
        /// How many serial numbers to allocate.
        #[arg(long)]
        count: u32,
        /// Year stamped on the serial numbers. Defaults to the current year.
        #[arg(long)]
        year: Option<u16>,
        /// CSV file to write.
        #[arg(long)]
        out: PathBuf,
        /// Header of the CSV column.
        #[arg(long, default_value = DEFAULT_HEADER)]
        header: String,
    },
    /// Print every serial number issued for a region.
    Audit {
        /// Region code or name.
        #[arg(long)]
        region: String,
        /// Print one JSON object per line.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the highest sequence reserved for a region.
    Peek {
        /// Region code or name.
        #[arg(long)]
        region: String,
        /// Year, only relevant for the `per-region-year` scheme. Defaults to
        /// the current year.
        #[arg(long)]
        year: Option<u16>,
    },
    /// Raise every counter to the highest sequence in the ledger.
    Recover,
    /// List the known regions and the names that resolve to them.
    Regions,
}

/// What to do, with every name resolved and every bound checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Allocate {
        region: Region,
        year: u16,
        count: u32,
        out: PathBuf,
        header: String,
    },
    Audit {
        region: Region,
        json: bool,
    },
    Peek {
        region: Region,
        year: u16,
    },
    Recover,
    Regions,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub allocator: AllocatorConfig,
    pub principal: Option<Principal>,
    pub authorized: AuthorizedRegions,
    pub catalog: RegionCatalog,
    pub log_json: bool,
    pub task: Task,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_batch == 0 {
            bail!("SERIALID_MAX_BATCH must be greater than 0");
        }
        if args.max_batch > MAX_SEQUENCE {
            bail!(
                "SERIALID_MAX_BATCH ({}) exceeds the sequence space (max = {})",
                args.max_batch,
                MAX_SEQUENCE
            );
        }
        if args.retry_attempts == 0 {
            bail!("SERIALID_RETRY_ATTEMPTS must be greater than 0");
        }

        let catalog = RegionCatalog::default();
        let principal = args
            .principal
            .map(Principal::new)
            .transpose()
            .context("invalid SERIALID_PRINCIPAL")?;
        let authorized = parse_authorized(&catalog, &args.authorized)?;

        let task = match args.command {
            Command::Allocate {
                region,
                count,
                year,
                out,
                header,
            } => Task::Allocate {
                region: resolve(&catalog, &region)?,
                year: year_or_current(year)?,
                count,
                out,
                header,
            },
            Command::Audit { region, json } => Task::Audit {
                region: resolve(&catalog, &region)?,
                json,
            },
            Command::Peek { region, year } => Task::Peek {
                region: resolve(&catalog, &region)?,
                year: year_or_current(year)?,
            },
            Command::Recover => Task::Recover,
            Command::Regions => Task::Regions,
        };

        let retry = RetryPolicy {
            max_attempts: args.retry_attempts,
            max_backoff: Duration::from_millis(args.retry_max_backoff_ms),
            ..RetryPolicy::default()
        };

        Ok(Self {
            database: args.db,
            allocator: AllocatorConfig {
                max_batch: args.max_batch,
                scheme: args.scheme,
                retry,
            },
            principal,
            authorized,
            catalog,
            log_json: args.log_json,
            task,
        })
    }
}

fn resolve(catalog: &RegionCatalog, name: &str) -> anyhow::Result<Region> {
    catalog
        .resolve(name)
        .ok_or_else(|| anyhow!("unknown region {name:?}; run `serialid regions` for the list"))
}

fn parse_authorized(catalog: &RegionCatalog, raw: &str) -> anyhow::Result<AuthorizedRegions> {
    if raw.trim() == "*" {
        return Ok(AuthorizedRegions::All);
    }
    let regions = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| resolve(catalog, name))
        .collect::<anyhow::Result<BTreeSet<_>>>()
        .context("invalid SERIALID_AUTHORIZED")?;
    Ok(AuthorizedRegions::Only(regions))
}

fn year_or_current(year: Option<u16>) -> anyhow::Result<u16> {
    let year = match year {
        Some(year) => year,
        None => u16::try_from(chrono::Local::now().year()).context("current year out of range")?,
    };
    if year > MAX_YEAR {
        bail!("year {year} does not fit in four digits");
    }
    Ok(year)
}
