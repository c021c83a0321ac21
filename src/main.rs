use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use arango_rest::client::{CollectionType, CreateCollectionOptions, UserOptions};
use arango_rest::{
    Agency, Client, ClientConfig, HttpConnection, Lock, Query, RequestOptions,
};

/// Command line client for ArangoDB
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "ARANGO_CONFIG")]
    config: Option<PathBuf>,

    /// Server endpoint, may be repeated
    #[arg(short, long, global = true)]
    endpoint: Vec<String>,

    /// User name; enables basic authentication
    #[arg(short, long, global = true)]
    username: Option<String>,

    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Database to work in
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the server version
    Version,
    /// Show the server role
    Role,
    /// Database management commands
    Db(DbCommand),
    /// Collection management commands
    Collection(CollectionCommand),
    /// Document commands
    Doc(DocCommand),
    /// Run an AQL query and print every result
    Query {
        aql: String,
        /// Bind parameter as name=value; the value is parsed as JSON when possible
        #[arg(short, long)]
        bind: Vec<String>,
        #[arg(long)]
        batch_size: Option<u32>,
    },
    /// User management commands
    User(UserCommand),
    /// Cluster commands
    Cluster(ClusterCommand),
    /// Acquire an agency lock, hold it, then release it. Endpoints must
    /// point at the agents.
    Lock {
        /// Key path such as `locks/backup`
        key: String,
        /// Lock TTL in seconds
        #[arg(long, default_value_t = 30)]
        ttl: u64,
        /// Seconds to hold the lock before releasing it
        #[arg(long, default_value_t = 60)]
        hold: u64,
    },
}

#[derive(Args)]
struct DbCommand {
    #[command(subcommand)]
    action: DbAction,
}

#[derive(Subcommand)]
enum DbAction {
    /// List all databases
    List,
    /// Create a database
    Create { name: String },
    /// Drop a database
    Drop { name: String },
}

#[derive(Args)]
struct CollectionCommand {
    #[command(subcommand)]
    action: CollectionAction,
}

#[derive(Subcommand)]
enum CollectionAction {
    /// List collections of the database
    List,
    /// Create a new collection
    Create {
        name: String,
        /// Create an edge collection
        #[arg(long)]
        edge: bool,
        #[arg(long)]
        shards: Option<u32>,
    },
    /// Drop a collection
    Drop { name: String },
    /// Count documents in a collection
    Count { name: String },
    /// Remove all documents from a collection
    Truncate { name: String },
}

#[derive(Args)]
struct DocCommand {
    /// Collection name
    #[arg(short = 'C', long)]
    collection: String,

    #[command(subcommand)]
    action: DocAction,
}

#[derive(Subcommand)]
enum DocAction {
    /// Get a document by key
    Get { key: String },
    /// Insert a document given as JSON
    Insert { data: String },
    /// Remove a document by key
    Remove { key: String },
}

#[derive(Args)]
struct UserCommand {
    #[command(subcommand)]
    action: UserAction,
}

#[derive(Subcommand)]
enum UserAction {
    List,
    Create {
        name: String,
        #[arg(long)]
        user_password: Option<String>,
    },
    Drop { name: String },
}

#[derive(Args)]
struct ClusterCommand {
    #[command(subcommand)]
    action: ClusterAction,
}

#[derive(Subcommand)]
enum ClusterAction {
    /// Health of every server in the cluster
    Health,
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::load(self.config.as_deref()).context("loading configuration")?;
        if !self.endpoint.is_empty() {
            config.endpoints = self.endpoint.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
            if config.authentication == "none" {
                config.authentication = "basic".to_string();
            }
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "arango_rest=debug,arangoctl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `name=value`, the value taken as JSON when it parses and as string otherwise
fn parse_bind(pair: &str) -> anyhow::Result<(String, Value)> {
    let Some((name, raw)) = pair.split_once('=') else {
        bail!("bind parameter '{}' is not of the form name=value", pair);
    };
    if name.is_empty() {
        bail!("bind parameter '{}' has no name", pair);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.client_config()?;
    tracing::debug!(endpoints = ?config.endpoints, database = %config.database, "connecting");

    let client = config.connect()?;
    run(&client, &config, cli.command).await
}

async fn run(client: &Client, config: &ClientConfig, command: Commands) -> anyhow::Result<()> {
    let opts = RequestOptions::new();
    let database = config.database.as_str();
    match command {
        Commands::Version => {
            let info = client.version().await?;
            println!("{} {} ({})", info.server, info.version, info.license);
        }
        Commands::Role => println!("{}", client.server_role().await?),
        Commands::Db(cmd) => match cmd.action {
            DbAction::List => {
                for db in client.databases().await? {
                    println!("{}", db.name());
                }
            }
            DbAction::Create { name } => {
                client.create_database(&name, None).await?;
                println!("created database {}", name);
            }
            DbAction::Drop { name } => {
                client.database(&name).await?.remove().await?;
                println!("dropped database {}", name);
            }
        },
        Commands::Collection(cmd) => {
            let db = client.database(database).await?;
            match cmd.action {
                CollectionAction::List => {
                    for col in db.collections().await? {
                        println!("{}", col.name());
                    }
                }
                CollectionAction::Create { name, edge, shards } => {
                    let mut options = if edge { CreateCollectionOptions::edge() } else { CreateCollectionOptions::default() };
                    if let Some(shards) = shards {
                        options = options.with_number_of_shards(shards);
                    }
                    let col = db.create_collection(&name, Some(&options)).await?;
                    let kind = if edge { CollectionType::Edge } else { CollectionType::Document };
                    println!("created {:?} collection {}", kind, col.name());
                }
                CollectionAction::Drop { name } => {
                    db.collection(&name).await?.remove().await?;
                    println!("dropped collection {}", name);
                }
                CollectionAction::Count { name } => {
                    println!("{}", db.collection(&name).await?.count().await?);
                }
                CollectionAction::Truncate { name } => {
                    db.collection(&name).await?.truncate().await?;
                    println!("truncated collection {}", name);
                }
            }
        }
        Commands::Doc(cmd) => {
            let col = client.database(database).await?.collection(&cmd.collection).await?;
            match cmd.action {
                DocAction::Get { key } => {
                    let (doc, _meta): (Value, _) = col.read_document(&key, &opts).await?;
                    print_json(&doc)?;
                }
                DocAction::Insert { data } => {
                    let doc: Value = serde_json::from_str(&data).context("document is not valid JSON")?;
                    let resp = col.create_document(&doc, &opts).await?;
                    println!("{}", resp.meta.id);
                }
                DocAction::Remove { key } => {
                    col.remove_document(&key, &opts).await?;
                    println!("removed {}/{}", cmd.collection, key);
                }
            }
        }
        Commands::Query { aql, bind, batch_size } => {
            let db = client.database(database).await?;
            let mut query = Query::new(aql);
            for pair in &bind {
                let (name, value) = parse_bind(pair)?;
                query = query.bind_value(name, value);
            }
            if let Some(size) = batch_size {
                query = query.batch_size(size);
            }
            let mut cursor = db.query(&query, &opts).await?;
            while let Some(row) = cursor.next::<Value>().await? {
                println!("{}", serde_json::to_string(&row)?);
            }
            cursor.close().await?;
        }
        Commands::User(cmd) => match cmd.action {
            UserAction::List => {
                for user in client.users().await? {
                    println!("{}{}", user.name(), if user.is_active() { "" } else { " (inactive)" });
                }
            }
            UserAction::Create { name, user_password } => {
                let mut options = UserOptions::default().with_active(true);
                if let Some(password) = user_password {
                    options = options.with_password(password);
                }
                client.create_user(&name, &options).await?;
                println!("created user {}", name);
            }
            UserAction::Drop { name } => {
                client.user(&name).await?.remove().await?;
                println!("dropped user {}", name);
            }
        },
        Commands::Cluster(cmd) => match cmd.action {
            ClusterAction::Health => {
                let health = client.cluster().await?.health().await?;
                println!("cluster {}", health.id);
                let mut servers: Vec<_> = health.health.iter().collect();
                servers.sort_by(|a, b| a.0.cmp(b.0));
                for (id, server) in servers {
                    println!("{:<40} {:<12} {:?}", id, server.role, server.status);
                }
            }
        },
        Commands::Lock { key, ttl, hold } => run_lock(config, &key, ttl, hold).await?,
    }
    Ok(())
}

async fn run_lock(config: &ClientConfig, key: &str, ttl: u64, hold: u64) -> anyhow::Result<()> {
    let conn = HttpConnection::new(config.http_config())?.with_authentication(config.authentication()?);
    let agency = Agency::new(Arc::new(conn));
    let parts: Vec<&str> = key.split('/').filter(|part| !part.is_empty()).collect();
    let lock = Lock::new(agency, &parts, "", Duration::from_secs(ttl))?;

    lock.lock().await.with_context(|| format!("locking {}", lock.key()))?;
    println!("locked {} as {}", lock.key(), lock.id());

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(hold)) => {}
        _ = tokio::signal::ctrl_c() => println!("interrupted"),
    }

    if !lock.is_locked() {
        bail!("lost lock {} while holding it", lock.key());
    }
    lock.unlock().await?;
    println!("unlocked {}", lock.key());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        assert_eq!(parse_bind("n=3").unwrap(), ("n".to_string(), serde_json::json!(3)));
        assert_eq!(parse_bind("s=abc").unwrap(), ("s".to_string(), Value::String("abc".to_string())));
        assert_eq!(parse_bind("q=a=b").unwrap().1, Value::String("a=b".to_string()));
        assert!(parse_bind("novalue").is_err());
        assert!(parse_bind("=1").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "arangoctl", "-e", "http://a:8529", "query", "FOR d IN c RETURN d", "--bind", "x=1",
        ]).unwrap();
        assert_eq!(cli.endpoint, vec!["http://a:8529"]);
        assert!(matches!(cli.command, Commands::Query { ref bind, .. } if bind.len() == 1));
    }
}
