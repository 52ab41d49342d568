mod config;
mod error;

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use clap::{Args, Parser, Subcommand};
use collectible::{
    AdminCredential, Collection, DelegateCredential, Metadata, Record, TransferPolicy, initialize,
    publish,
};
use ledger::{
    Event, EventKind, ObjectFilter, ObjectId, ObjectKind, ObjectStore, Principal, SqliteLedger,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "tokenctl.toml";
const LEDGER_FILE: &str = "ledger.db";
const DEFAULT_LOG_FILTER: &str = "warn,collectible=info,capability=info";

#[derive(Parser)]
#[command(name = "tokenctl")]
#[command(about = "Capability-gated collectible records", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (default: ./tokenctl.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a collection from the config and run its initializer
    Publish {
        /// Collection name as defined in the config
        collection: String,
        /// Publishing principal; receives the credentials
        #[arg(long = "as", value_name = "PRINCIPAL")]
        caller: String,
    },
    /// Mint records (requires the admin credential)
    Mint(MintArgs),
    /// Transfer a record you own
    Transfer {
        collection: String,
        /// Record ID
        record: String,
        #[arg(long = "as", value_name = "PRINCIPAL")]
        caller: String,
        /// Recipient principal
        #[arg(long)]
        to: String,
        /// Delegate credential to present (default: first one you hold)
        #[arg(long)]
        delegate: Option<String>,
    },
    /// Destroy a record you own
    Burn {
        collection: String,
        /// Record ID
        record: String,
        #[arg(long = "as", value_name = "PRINCIPAL")]
        caller: String,
    },
    /// Issue a delegate credential (requires the admin credential)
    Delegate {
        collection: String,
        #[arg(long = "as", value_name = "PRINCIPAL")]
        caller: String,
        /// Recipient principal
        #[arg(long)]
        to: String,
    },
    /// List objects in the ledger
    Objects {
        /// Show only objects owned by this principal
        #[arg(short, long)]
        owner: Option<String>,
        /// Show only objects of this collection
        #[arg(long)]
        collection: Option<String>,
    },
    /// Show an object, rendering records through their display binding
    Show {
        /// Object ID
        id: String,
    },
    /// Show the event log of an object or deployment
    History {
        /// Object or deployment ID
        id: String,
    },
}

#[derive(Args)]
struct MintArgs {
    collection: String,
    #[arg(long = "as", value_name = "PRINCIPAL")]
    caller: String,
    /// Number of identical records to mint
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,
    #[arg(long)]
    name: String,
    /// Image reference (e.g. an IPFS CID)
    #[arg(long)]
    image: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    project_url: Option<String>,
    #[arg(long)]
    link: Option<String>,
    /// Recipient principal
    #[arg(long)]
    to: String,
}

impl MintArgs {
    fn fields(&self) -> Metadata {
        Metadata {
            name: self.name.clone(),
            image_url: self.image.clone(),
            description: self.description.clone(),
            project_url: self.project_url.clone(),
            link: self.link.clone(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Publish { collection, caller } => {
            cmd_publish(&config, &collection, &Principal::new(caller))
        }
        Commands::Mint(args) => cmd_mint(&config, &args),
        Commands::Transfer {
            collection,
            record,
            caller,
            to,
            delegate,
        } => cmd_transfer(
            &config,
            &collection,
            &record,
            &Principal::new(caller),
            &Principal::new(to),
            delegate.as_deref(),
        ),
        Commands::Burn {
            collection,
            record,
            caller,
        } => cmd_burn(&config, &collection, &record, &Principal::new(caller)),
        Commands::Delegate {
            collection,
            caller,
            to,
        } => cmd_delegate(
            &config,
            &collection,
            &Principal::new(caller),
            &Principal::new(to),
        ),
        Commands::Objects { owner, collection } => {
            cmd_objects(&config, owner.map(Principal::new), collection)
        }
        Commands::Show { id } => cmd_show(&config, &id),
        Commands::History { id } => cmd_history(&config, &id),
    }
}

fn cmd_publish(config: &Config, name: &str, caller: &Principal) -> Result<()> {
    let def = config.collection(name)?;
    let mut ledger = open_ledger(config, true)?;

    let witness = publish::<Metadata>(&mut ledger, def, caller)?;
    let genesis = initialize(&mut ledger, witness)?;
    let collection = &genesis.collection;

    println!("Published: {}", collection.tag());
    println!("Transfer policy: {}", collection.policy());
    println!("Admin credential: {}", genesis.admin);
    println!("Display: {}", genesis.display);
    for id in &genesis.delegates {
        println!("Delegate credential: {id}");
    }
    Ok(())
}

fn cmd_mint(config: &Config, args: &MintArgs) -> Result<()> {
    let mut ledger = open_ledger(config, false)?;
    let collection = Collection::<Metadata>::open(&ledger, &args.collection)?;
    let caller = Principal::new(args.caller.as_str());
    let to = Principal::new(args.to.as_str());
    let admin_id = find_credential(&ledger, &collection, ObjectKind::AdminCredential, &caller)?;

    let ids = ledger.borrow_object(
        admin_id,
        &caller,
        |ledger, admin: &AdminCredential<Metadata>| {
            collection.mint(ledger, admin, args.count, args.fields(), &to)
        },
    )?;

    println!("Minted {} record(s) to {to}:", ids.len());
    for id in ids {
        println!("  {id}");
    }
    Ok(())
}

fn cmd_transfer(
    config: &Config,
    name: &str,
    record: &str,
    caller: &Principal,
    to: &Principal,
    delegate: Option<&str>,
) -> Result<()> {
    let mut ledger = open_ledger(config, false)?;
    let collection = Collection::<Metadata>::open(&ledger, name)?;
    let record_id = parse_id(record)?;

    // An explicit delegate always goes through the delegated entry point, so
    // presenting one to an owner-only collection is rejected, not ignored.
    let delegate_id = match delegate {
        Some(id) => Some(parse_id(id)?),
        None if collection.policy() == TransferPolicy::Delegated => Some(find_credential(
            &ledger,
            &collection,
            ObjectKind::DelegateCredential,
            caller,
        )?),
        None => None,
    };

    match delegate_id {
        Some(delegate_id) => ledger.borrow_object(
            delegate_id,
            caller,
            |ledger, delegate: &DelegateCredential<Metadata>| {
                ledger.consume_object(record_id, caller, |ledger, record: Record<Metadata>| {
                    collection.transfer(ledger, delegate, record, to)
                })
            },
        )?,
        None => ledger.consume_object(record_id, caller, |ledger, record: Record<Metadata>| {
            collection.transfer_owned(ledger, record, to)
        })?,
    }

    println!("Transferred {record_id} to {to}");
    Ok(())
}

fn cmd_burn(config: &Config, name: &str, record: &str, caller: &Principal) -> Result<()> {
    let mut ledger = open_ledger(config, false)?;
    let collection = Collection::<Metadata>::open(&ledger, name)?;
    let record_id = parse_id(record)?;

    ledger.consume_object(record_id, caller, |ledger, record: Record<Metadata>| {
        collection.burn(ledger, record)
    })?;

    println!("Burned {record_id}");
    Ok(())
}

fn cmd_delegate(config: &Config, name: &str, caller: &Principal, to: &Principal) -> Result<()> {
    let mut ledger = open_ledger(config, false)?;
    let collection = Collection::<Metadata>::open(&ledger, name)?;
    let admin_id = find_credential(&ledger, &collection, ObjectKind::AdminCredential, caller)?;

    let id = ledger.borrow_object(
        admin_id,
        caller,
        |ledger, admin: &AdminCredential<Metadata>| collection.issue_delegate(ledger, admin, to),
    )?;

    println!("Delegate credential {id} issued to {to}");
    Ok(())
}

fn cmd_objects(
    config: &Config,
    owner: Option<Principal>,
    collection: Option<String>,
) -> Result<()> {
    let ledger = open_ledger(config, false)?;
    let filter = ObjectFilter {
        owner,
        kind: None,
        type_name: collection,
    };
    let objects = ledger.list(&filter)?;

    if objects.is_empty() {
        println!("No objects found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<20}  {:<16}  {:<16}  UPDATED",
        "OBJECT ID", "KIND", "COLLECTION", "OWNER"
    );
    println!("{}", "-".repeat(110));

    for object in objects {
        let updated = Local
            .from_utc_datetime(&object.updated_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        println!(
            "{:<36}  {:<20}  {:<16}  {:<16}  {updated}",
            object.id, object.kind, object.type_name, object.owner
        );
    }

    Ok(())
}

fn cmd_show(config: &Config, id: &str) -> Result<()> {
    let ledger = open_ledger(config, false)?;
    let object = ledger.get(parse_id(id)?)?;

    println!("Object: {}", object.id);
    println!("Kind: {}", object.kind);
    println!("Collection: {} ({})", object.type_name, object.deployment);
    println!("Owner: {}", object.owner);

    if object.kind != ObjectKind::Record {
        return Ok(());
    }

    let fields: Metadata =
        serde_json::from_value(object.data.clone()).map_err(ledger::Error::from)?;
    let collection = Collection::<Metadata>::open(&ledger, &object.type_name)?;

    println!();
    match collection.display(&ledger) {
        Ok(display) if display.tag().deployment == object.deployment => {
            for (key, value) in display.render(object.id, &fields) {
                println!("{key}: {value}");
            }
        }
        Ok(_) | Err(collectible::Error::Ledger(ledger::Error::NotFound(_))) => {
            println!("name: {}", fields.name);
            println!("image_url: {}", fields.image_url);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn cmd_history(config: &Config, id: &str) -> Result<()> {
    let ledger = open_ledger(config, false)?;
    let id = parse_id(id)?;
    let events = ledger.history(id)?;

    if events.is_empty() {
        println!("No events found for {id}");
        return Ok(());
    }

    println!("Object: {id}\n");
    for event in events {
        print_event(&event);
    }
    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%Y-%m-%d %H:%M:%S");

    match &event.kind {
        EventKind::Published { name, publisher } => {
            println!("[{time}] PUBLISHED {name} by {publisher}");
        }
        EventKind::Initialized {
            admin,
            display,
            delegates,
        } => {
            println!(
                "[{time}] INITIALIZED admin={admin} display={display} delegates={}",
                delegates.len()
            );
        }
        EventKind::Minted { to } => println!("[{time}] MINTED to {to}"),
        EventKind::Transferred { to } => println!("[{time}] TRANSFERRED to {to}"),
        EventKind::Burned => println!("[{time}] BURNED"),
        EventKind::DelegateIssued { to } => println!("[{time}] DELEGATE ISSUED to {to}"),
        EventKind::Retired => println!("[{time}] RETIRED"),
    }
}

fn find_credential(
    ledger: &SqliteLedger,
    collection: &Collection<Metadata>,
    kind: ObjectKind,
    owner: &Principal,
) -> Result<ObjectId> {
    ledger
        .list(
            &ObjectFilter::owned_by(owner)
                .kind(kind)
                .type_name(collection.name()),
        )?
        .into_iter()
        .find(|o| o.deployment == collection.tag().deployment)
        .map(|o| o.id)
        .ok_or_else(|| Error::MissingCredential {
            kind: kind.as_str(),
            collection: collection.name().to_string(),
            owner: owner.to_string(),
        })
}

fn parse_id(s: &str) -> Result<ObjectId> {
    s.trim().parse().map_err(|_| Error::InvalidId(s.to_string()))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default_config()),
    }
}

fn open_ledger(config: &Config, create: bool) -> Result<SqliteLedger> {
    let data_dir = config
        .ledger
        .data_dir
        .clone()
        .or_else(dirs_data_dir)
        .unwrap_or_else(|| ".tokenctl".into());
    let path = data_dir.join(LEDGER_FILE);

    if create {
        std::fs::create_dir_all(&data_dir)?;
    } else if !path.exists() {
        return Err(Error::LedgerNotFound { path });
    }

    debug!(path = %path.display(), "Opening ledger");
    Ok(SqliteLedger::open(&path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/tokenctl"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("tokenctl"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("tokenctl"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, toml: &str) -> Config {
        let mut config = Config::parse(toml).unwrap();
        config.ledger.data_dir = Some(dir.to_path_buf());
        config
    }

    fn mint_args(collection: &str, caller: &str, count: usize, to: &str) -> MintArgs {
        MintArgs {
            collection: collection.to_string(),
            caller: caller.to_string(),
            count,
            name: "X".to_string(),
            image: "Y".to_string(),
            description: None,
            project_url: None,
            link: None,
            to: to.to_string(),
        }
    }

    fn records_of(config: &Config, owner: &str) -> Vec<ObjectId> {
        let ledger = open_ledger(config, false).unwrap();
        ledger
            .list(&ObjectFilter::owned_by(&owner.into()).kind(ObjectKind::Record))
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect()
    }

    #[test]
    fn test_commands_before_publish_need_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "[[collection]]\nname = \"cats\"\n");
        let result = cmd_mint(&config, &mint_args("cats", "admin", 1, "alice"));
        assert!(matches!(result, Err(Error::LedgerNotFound { .. })));
    }

    #[test]
    fn test_owner_only_flow() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "[[collection]]\nname = \"cats\"\n");
        let admin = Principal::new("admin");

        cmd_publish(&config, "cats", &admin).unwrap();
        assert!(cmd_publish(&config, "cats", &admin).is_err());

        cmd_mint(&config, &mint_args("cats", "admin", 3, "alice")).unwrap();
        let alice_records = records_of(&config, "alice");
        assert_eq!(alice_records.len(), 3);

        // Only the admin credential holder can mint.
        assert!(matches!(
            cmd_mint(&config, &mint_args("cats", "alice", 1, "alice")),
            Err(Error::MissingCredential { .. })
        ));

        let first = alice_records[0].to_string();
        let alice = Principal::new("alice");
        let bob = Principal::new("bob");

        // Bob cannot move Alice's record.
        assert!(cmd_transfer(&config, "cats", &first, &bob, &bob, None).is_err());
        cmd_transfer(&config, "cats", &first, &alice, &bob, None).unwrap();
        assert_eq!(records_of(&config, "bob"), vec![alice_records[0]]);

        cmd_burn(&config, "cats", &first, &bob).unwrap();
        assert!(records_of(&config, "bob").is_empty());
        assert!(cmd_burn(&config, "cats", &first, &bob).is_err());
    }

    #[test]
    fn test_delegated_flow() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(
            dir.path(),
            "[[collection]]\nname = \"cats\"\ntransfer = \"delegated\"\n",
        );
        let admin = Principal::new("admin");
        let alice = Principal::new("alice");
        let bob = Principal::new("bob");

        cmd_publish(&config, "cats", &admin).unwrap();
        cmd_mint(&config, &mint_args("cats", "admin", 2, "alice")).unwrap();
        let record = records_of(&config, "alice")[0].to_string();

        // Alice owns the record but holds no delegate credential yet.
        assert!(matches!(
            cmd_transfer(&config, "cats", &record, &alice, &bob, None),
            Err(Error::MissingCredential { .. })
        ));
        assert_eq!(records_of(&config, "alice").len(), 2);

        cmd_delegate(&config, "cats", &admin, &alice).unwrap();
        cmd_transfer(&config, "cats", &record, &alice, &bob, None).unwrap();
        assert_eq!(records_of(&config, "bob").len(), 1);
        assert_eq!(records_of(&config, "alice").len(), 1);
    }

    #[test]
    fn test_explicit_delegate_rejected_under_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "[[collection]]\nname = \"cats\"\n");
        let admin = Principal::new("admin");
        let alice = Principal::new("alice");

        cmd_publish(&config, "cats", &admin).unwrap();
        cmd_mint(&config, &mint_args("cats", "admin", 1, "alice")).unwrap();
        let record = records_of(&config, "alice")[0];

        let bogus = record.to_string();
        assert!(cmd_transfer(&config, "cats", &bogus, &alice, &admin, Some(&bogus)).is_err());
        // Still Alice's.
        assert_eq!(records_of(&config, "alice"), vec![record]);
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id(" 1b4e28ba-2fa1-11d2-883f-0016d3cca427 ").is_ok());
    }
}
