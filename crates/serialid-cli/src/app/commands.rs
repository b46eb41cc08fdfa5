use std::io::Write;

use anyhow::{Context, anyhow, bail};
use serialid::{AllocationContext, Allocator, Identifier, IssuanceLedger, Region};
use serialid_sqlite::{SqliteBackend, SqliteIssuanceLedger, SqliteSequenceStore};

use crate::app::{
    config::{AppConfig, Task},
    export::export,
};

type SqliteAllocator = Allocator<SqliteSequenceStore, SqliteIssuanceLedger>;

/// Opens the database named by `config` and runs its task, writing command
/// output to `out`.
pub fn run(config: AppConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let backend = SqliteBackend::open(&config.database, config.allocator.scheme)
        .with_context(|| format!("failed to open {}", config.database.display()))?;
    let (store, ledger) = backend.into_parts();
    let allocator = Allocator::new(store, ledger)
        .with_config(config.allocator)
        .with_catalog(config.catalog.clone());

    match &config.task {
        Task::Allocate {
            region,
            year,
            count,
            out: path,
            header,
        } => {
            let ids = allocate(&allocator, &config, *region, *year, *count)?;
            for id in &ids {
                writeln!(out, "{id}")?;
            }
            export(path, header, &ids)
        }
        Task::Audit { region, json } => audit(allocator.ledger(), *region, *json, out),
        Task::Peek { region, year } => {
            let highest = allocator.peek(*region, *year)?;
            writeln!(out, "{}\t{highest}", allocator.partition(*region, *year))?;
            Ok(())
        }
        Task::Recover => {
            for (partition, highest) in allocator.recover()? {
                writeln!(out, "{partition}\t{highest}")?;
            }
            Ok(())
        }
        Task::Regions => {
            let catalog = allocator.catalog();
            for region in catalog.regions() {
                let names: Vec<_> = catalog
                    .names_for(region)
                    .filter(|name| !name.eq_ignore_ascii_case(region.as_str()))
                    .collect();
                writeln!(out, "{region}\t{}", names.join(", "))?;
            }
            Ok(())
        }
    }
}

fn allocate(
    allocator: &SqliteAllocator,
    config: &AppConfig,
    region: Region,
    year: u16,
    count: u32,
) -> anyhow::Result<Vec<Identifier>> {
    let principal = config
        .principal
        .clone()
        .ok_or_else(|| {
            anyhow!("a principal is required to allocate (--principal or SERIALID_PRINCIPAL)")
        })?;
    let context = AllocationContext::new(principal, config.authorized.clone());

    let err = match allocator.allocate(region, year, count, &context) {
        Ok(ids) => return Ok(ids),
        Err(err) => err,
    };
    let Some(reservation) = err.reservation().copied() else {
        return Err(err.into());
    };

    tracing::warn!(%reservation, %err, "block reserved but not recorded; reconciling");
    match allocator.reconcile(reservation, &context) {
        Ok(ids) => Ok(ids),
        Err(err) => bail!(
            "block {reservation} was reserved but could not be recorded ({err}); \
             rerun `serialid recover` once the database is reachable"
        ),
    }
}

fn audit(
    ledger: &SqliteIssuanceLedger,
    region: Region,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut listed = 0usize;
    for record in ledger.list_by_region(region)? {
        let record = record?;
        if json {
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(
                out,
                "{}\t{}\t{}",
                record.identifier(),
                record.principal(),
                record.issued_at().to_rfc3339()
            )?;
        }
        listed += 1;
    }
    tracing::debug!(%region, listed, "audit complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;
    use crate::app::config::CliArgs;

    fn run_args(db: &Path, args: &[&str]) -> anyhow::Result<String> {
        let db = db.to_str().unwrap();
        let argv = ["serialid", "--db", db].into_iter().chain(args.iter().copied());
        let config = AppConfig::try_from(CliArgs::try_parse_from(argv)?)?;
        let mut out = Vec::new();
        run(config, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn allocate_prints_exports_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("serials.db");
        let csv = dir.path().join("batch.csv");
        let csv_arg = csv.to_str().unwrap();

        let printed = run_args(
            &db,
            &[
                "--principal", "ana", "allocate", "--region", "Petrolina", "--count", "3",
                "--year", "2024", "--out", csv_arg,
            ],
        )
        .unwrap();
        assert_eq!(printed, "2024PT00001\n2024PT00002\n2024PT00003\n");
        assert_eq!(
            std::fs::read_to_string(&csv).unwrap(),
            "Número de Série\n2024PT00001\n2024PT00002\n2024PT00003\n"
        );

        let peeked = run_args(&db, &["peek", "--region", "pt", "--year", "2024"]).unwrap();
        assert_eq!(peeked, "PT\t3\n");

        let audit = run_args(&db, &["audit", "--region", "PT"]).unwrap();
        let lines: Vec<_> = audit.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("2024PT00001\tana\t"));

        let json = run_args(&db, &["audit", "--region", "PT", "--json"]).unwrap();
        let first: serde_json::Value = serde_json::from_str(json.lines().next().unwrap()).unwrap();
        assert_eq!(first["identifier"], "2024PT00001");
        assert_eq!(first["principal"], "ana");
    }

    #[test]
    fn allocate_requires_principal_and_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("serials.db");
        let csv = dir.path().join("batch.csv");
        let csv_arg = csv.to_str().unwrap();

        let missing = run_args(
            &db,
            &["allocate", "--region", "PT", "--count", "1", "--out", csv_arg],
        );
        assert!(missing.is_err());

        let unauthorized = run_args(
            &db,
            &[
                "--principal", "ana", "--authorized", "GR", "allocate", "--region", "PT",
                "--count", "1", "--out", csv_arg,
            ],
        );
        let err = unauthorized.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<serialid::Error>(),
            Some(serialid::Error::UnauthorizedRegion { .. })
        ));
        assert!(!csv.exists());
    }

    #[test]
    fn recover_and_regions_list_state() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("serials.db");
        let csv = dir.path().join("batch.csv");
        let csv_arg = csv.to_str().unwrap();

        run_args(
            &db,
            &[
                "--principal", "ana", "allocate", "--region", "GR", "--count", "4",
                "--year", "2025", "--out", csv_arg,
            ],
        )
        .unwrap();

        let recovered = run_args(&db, &["recover"]).unwrap();
        assert!(recovered.lines().any(|line| line == "GR\t4"));

        let regions = run_args(&db, &["regions"]).unwrap();
        assert_eq!(regions.lines().count(), 7);
        assert!(regions.lines().any(|line| line == "PT\tpetrolina"));
    }
}
