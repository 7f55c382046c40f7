use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tablecache::config::Config;
use tablecache::storage::dynamodb::{DynamoDbConnection, DynamoDbParams, DynamoDbStore};
use tablecache::{RequestContext, RequestId, TableDefinition};
use tablecache_core::cache::Cache;
use tablecache_core::storage::{
    table_error_to_status_code, AttributeNames, Condition, GetItemInput, Item, ItemsDetails,
    KeySchema, QueryInput, ScanInput, TableError, UpdateRequest,
};

/// tablecache - Cached reads and writes against a DynamoDB table
#[derive(Parser, Debug)]
#[command(name = "tablecache")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Table to operate on
    #[arg(long, short, env = "DYNAMODB_TABLE_NAME")]
    table: Option<String>,

    /// Partition key attribute name
    #[arg(long, default_value = "id")]
    partition_key: String,

    /// Range key attribute name, for composite keys
    #[arg(long)]
    range_key: Option<String>,

    /// Cache TTL in seconds; omit (or 0) to leave the cache untouched
    #[arg(long)]
    ttl: Option<u64>,

    /// Request id used in logs (generated when absent or not a UUID)
    #[arg(long, env = "REQUEST_ID")]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read one record by primary key
    Get {
        /// Key attributes as a JSON object
        key: String,
        /// Use a strongly consistent read on a cache miss
        #[arg(long)]
        consistent: bool,
    },
    /// Insert or overwrite a record
    Put {
        /// The record as a JSON object
        record: String,
        /// Condition expression the existing record must satisfy
        #[arg(long)]
        condition: Option<String>,
        #[command(flatten)]
        expression: ExpressionArgs,
    },
    /// Apply an update expression to one record
    Update {
        /// Key attributes as a JSON object
        key: String,
        /// Update expression, e.g. "SET #s = :s"
        #[arg(long)]
        set: String,
        /// Condition expression the existing record must satisfy
        #[arg(long)]
        condition: Option<String>,
        #[command(flatten)]
        expression: ExpressionArgs,
    },
    /// Delete one record by primary key
    Delete {
        /// Key attributes as a JSON object
        key: String,
    },
    /// Query one partition
    Query {
        /// Key condition expression, e.g. "userId = :u"
        key_condition: String,
        #[command(flatten)]
        read: ReadArgs,
        /// Return results in descending range key order
        #[arg(long)]
        descending: bool,
    },
    /// Scan the whole table
    Scan {
        #[command(flatten)]
        read: ReadArgs,
    },
}

#[derive(Args, Debug)]
struct ExpressionArgs {
    /// Attribute name placeholders as a JSON object, e.g. '{"#s":"status"}'
    #[arg(long)]
    names: Option<String>,
    /// Attribute value placeholders as a JSON object, e.g. '{":s":"paid"}'
    #[arg(long)]
    values: Option<String>,
}

#[derive(Args, Debug)]
struct ReadArgs {
    /// Filter expression applied after the key condition
    #[arg(long)]
    filter: Option<String>,
    /// Maximum number of items to evaluate
    #[arg(long)]
    limit: Option<i32>,
    /// Exclusive start key as a JSON object, from a previous page
    #[arg(long)]
    start_key: Option<String>,
    #[command(flatten)]
    expression: ExpressionArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tablecache=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let table_name = cli.table.clone().unwrap_or_else(|| config.table_name.clone());
    let key_schema = match &cli.range_key {
        Some(range_key) => KeySchema::composite(&cli.partition_key, range_key)
            .context("Invalid key schema")?,
        None => KeySchema::partition(&cli.partition_key),
    };

    let connection = DynamoDbConnection::Params(DynamoDbParams {
        region: config.aws_region.clone(),
        endpoint_url: config.dynamodb_endpoint_url.clone(),
    });
    let definition: TableDefinition<Item, DynamoDbStore> =
        TableDefinition::connect(table_name, key_schema, connection)
            .await
            .with_prefix(config.cache_key_prefix.clone())
            .with_default_ttl(config.cache_ttl());

    #[cfg(feature = "redis")]
    let cache = Arc::new(
        tablecache::cache::RedisCache::new(&config.redis_url)
            .await
            .context("Failed to connect to Redis")?,
    );
    #[cfg(not(feature = "redis"))]
    let cache = Arc::new(tablecache::cache::MemoryCache::new(config.cache_max_entries));

    run(cli, definition, cache).await
}

async fn run<C: Cache>(
    cli: Cli,
    definition: TableDefinition<Item, DynamoDbStore>,
    cache: Arc<C>,
) -> Result<()> {
    let request_id = cli
        .request_id
        .as_deref()
        .map(RequestId::parse_or_new)
        .unwrap_or_default();
    let context = RequestContext::new().with_request_id(request_id);
    let table = definition.initialize(context, Some(cache));
    let ttl = cli.ttl.map(Duration::from_secs);

    tracing::debug!(
        table = %table.table_name(),
        %request_id,
        ttl_secs = ?cli.ttl,
        "Running command"
    );

    let outcome = match cli.command {
        Command::Get { key, consistent } => {
            let input =
                GetItemInput::new(parse_object(&key, "key")?).with_consistent_read(consistent);
            table
                .get_item(&input, ttl)
                .await
                .map(|record| print_json(&record))
        }
        Command::Put {
            record,
            condition,
            expression,
        } => {
            let record = parse_object(&record, "record")?;
            let condition = match condition {
                Some(expr) => {
                    let (names, values) = expression.parse()?;
                    let mut condition = Condition::new(expr);
                    condition.expression_attribute_names = names;
                    condition.expression_attribute_values = values;
                    Some(condition)
                }
                None => None,
            };
            table
                .put(&record, ttl, condition.as_ref())
                .await
                .map(|()| print_json(&record))
        }
        Command::Update {
            key,
            set,
            condition,
            expression,
        } => {
            let (names, values) = expression.parse()?;
            let mut request = UpdateRequest::new(parse_object(&key, "key")?, set);
            request.expression_attribute_names = names;
            request.expression_attribute_values = values;
            let updated = match condition {
                Some(expr) => {
                    table
                        .update_conditional(&request, &Condition::new(expr), ttl)
                        .await
                }
                None => table.update(&request, ttl).await,
            };
            updated.map(|record| print_json(&record))
        }
        Command::Delete { key } => {
            let key = parse_object(&key, "key")?;
            table.delete(&key).await.map(|()| print_json(&key))
        }
        Command::Query {
            key_condition,
            read,
            descending,
        } => {
            let (names, values) = read.expression.parse()?;
            let mut input = QueryInput::new(key_condition);
            input.filter_expression = read.filter;
            input.expression_attribute_names = names;
            input.expression_attribute_values = values;
            input.limit = read.limit;
            input.exclusive_start_key = parse_optional_object(read.start_key.as_deref())?;
            input.scan_index_forward = !descending;
            table
                .query_details(&input, ttl)
                .await
                .map(print_details)
        }
        Command::Scan { read } => {
            let (names, values) = read.expression.parse()?;
            let mut input = ScanInput::new();
            input.filter_expression = read.filter;
            input.expression_attribute_names = names;
            input.expression_attribute_values = values;
            input.limit = read.limit;
            input.exclusive_start_key = parse_optional_object(read.start_key.as_deref())?;
            table
                .scan_details(&input, ttl)
                .await
                .map(print_details)
        }
    };

    tracing::debug!(stats = ?table.stats().snapshot(), "Cache statistics");

    match outcome {
        Ok(printed) => printed,
        Err(err) => report(err),
    }
}

fn report(err: TableError) -> Result<()> {
    let status = table_error_to_status_code(&err);
    if err.is_cache_failure() {
        tracing::warn!(error = %err, "Store call succeeded but the cache was not updated");
    }
    bail!("{err} (status {status})")
}

impl ExpressionArgs {
    fn parse(&self) -> Result<(AttributeNames, Item)> {
        let names = match &self.names {
            Some(raw) => serde_json::from_str(raw)
                .context("--names must be a JSON object of strings")?,
            None => AttributeNames::new(),
        };
        let values = parse_optional_object(self.values.as_deref())?.unwrap_or_default();
        Ok((names, values))
    }
}

fn parse_object(raw: &str, what: &str) -> Result<Item> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON for {what}"))?;
    match value {
        Value::Object(item) => Ok(item),
        _ => bail!("{what} must be a JSON object"),
    }
}

fn parse_optional_object(raw: Option<&str>) -> Result<Option<Item>> {
    raw.map(|raw| parse_object(raw, "argument")).transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Page {
    items: Vec<Item>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_evaluated_key: Option<Item>,
}

fn print_details(details: ItemsDetails<Item>) -> Result<()> {
    print_json(&Page {
        items: details.items,
        count: details.count,
        last_evaluated_key: details.last_evaluated_key,
    })
}
