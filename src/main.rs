use anyhow::{bail, Context, Result};
use invoice_ledger::settings::db_path_from_env;
use invoice_ledger::voice::parse_voice_command;
use invoice_ledger::{Database, Ledger};
use log::info;

const USAGE: &str = "usage: invoice-ledger <dashboard | invoices | next-number | parse <text...>>";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    // Parsing needs no storage.
    if command == "parse" {
        let text = args[1..].join(" ");
        if text.trim().is_empty() {
            bail!("parse needs the dictated text");
        }
        println!("{}", serde_json::to_string_pretty(&parse_voice_command(&text))?);
        return Ok(());
    }

    let path = db_path_from_env();
    let db = Database::open(&path).with_context(|| format!("failed to open database at {}", path))?;
    let ledger = Ledger::new(db).context("failed to load settings")?;
    info!("using {}", path);

    match command.as_str() {
        "dashboard" => {
            let stats = ledger.dashboard().context("failed to compute dashboard")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "invoices" => {
            for inv in ledger.invoices().context("failed to load invoices")? {
                println!(
                    "{}  {}  {:<8} {:>12}  {}",
                    inv.invoice_number, inv.issue_date, inv.status, inv.total.to_string(), inv.client_name
                );
            }
        }
        "next-number" => println!("{}", ledger.next_invoice_number()?),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}
