use anyhow::{anyhow, bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use tax_filing::db::{
    insert_all, insert_company, insert_profile, insert_transaction, load_companies_csv,
    load_profiles_csv, load_transactions_csv,
};
use tax_filing::{load_generator, record_filing_event, setup_database, FilerConfig, FilingRequest, FormKind};

const USAGE: &str = "usage:
  tax-filing import <db> <companies|profiles|transactions> <csv>
  tax-filing generate <db> <config.json> <company_id> <tax_year> <nec|withholding> <out> [--test]";

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("import") => run_import(&args[1..]),
        Some("generate") => run_generate(&args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn run_import(args: &[String]) -> Result<()> {
    let [db_path, table, csv_path] = args else {
        bail!("import takes 3 arguments\n{}", USAGE);
    };
    let csv_path = Path::new(csv_path);

    println!("🗄️  Import {} → {}", csv_path.display(), db_path);

    let conn = Connection::open(db_path).with_context(|| format!("Failed to open {}", db_path))?;
    setup_database(&conn)?;

    let inserted = match table.as_str() {
        "companies" => insert_all(&conn, &load_companies_csv(csv_path)?, insert_company)?,
        "profiles" => insert_all(&conn, &load_profiles_csv(csv_path)?, insert_profile)?,
        "transactions" => insert_all(&conn, &load_transactions_csv(csv_path)?, insert_transaction)?,
        other => bail!("unknown table {:?}\n{}", other, USAGE),
    };

    println!("✓ Inserted {} {}", inserted, table);
    Ok(())
}

fn run_generate(args: &[String]) -> Result<()> {
    let (positional, flags): (Vec<&String>, Vec<&String>) =
        args.iter().partition(|a| !a.starts_with("--"));

    let [db_path, config_path, company_id, tax_year, form, out] = positional.as_slice() else {
        bail!("generate takes 6 arguments\n{}", USAGE);
    };

    let is_test = match flags.as_slice() {
        [] => false,
        [flag] if flag.as_str() == "--test" => true,
        other => bail!("unknown flags {:?}", other),
    };

    let company_id: i64 = company_id
        .parse()
        .with_context(|| format!("company_id must be an integer, got {:?}", company_id))?;
    let tax_year: i32 = tax_year
        .parse()
        .with_context(|| format!("tax_year must be an integer, got {:?}", tax_year))?;
    let form_kind = FormKind::parse(form).ok_or_else(|| anyhow!("unknown form {:?}", form))?;

    let config = FilerConfig::from_file(config_path.as_str())?;
    let conn = Connection::open(db_path.as_str()).with_context(|| format!("Failed to open {}", db_path))?;

    let request = FilingRequest::new(company_id, tax_year, form_kind).test_file(is_test);
    let generator = load_generator(&conn, config, request)?;

    let Some(output) = generator.process()? else {
        println!("⚠️  No eligible payees for company {} in {}, no file written", company_id, tax_year);
        return Ok(());
    };

    let out_path = Path::new(out.as_str());
    output
        .write_to(out_path)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    let event = record_filing_event(&conn, &request, &output)?;

    println!("✅ {} file written: {}", form_kind.code(), out_path.display());
    println!("   Records:  {}", output.records().len());
    println!("   Payees:   {}", output.payee_ids().len());
    println!("   SHA-256:  {}", output.digest());
    println!("   Event:    {}", event.event_id);

    Ok(())
}
