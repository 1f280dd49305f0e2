mod config;
mod pool;
mod tcp;

use cdbpool_core::types::BigId;
use cdbpool_sql::{parse_sql, BufferPool, Outcome, RouteInfo};
use clap::Parser;
use config::Config;
use pool::ConnPool;
use tcp::TcpConnector;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cdbpool", about = "Run SQL statements against a sharded cdbpool backend")]
struct Args {
    #[arg(long, default_value = "cdbpool.toml")]
    config: String,
    /// Routing key; its upper bits select the virtual shard.
    #[arg(long)]
    big_id: u64,
    /// Overrides the connection's default database.
    #[arg(long)]
    db: Option<String>,
    sql: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_path(&args.config)?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let buffers = BufferPool::new(
        config.pool.max_idle_buffers,
        config.pool.max_buffer_capacity,
    );
    let pool = ConnPool::new(
        TcpConnector::new(&config.backend),
        config.pool.max_idle_connections,
    );
    let ctx = config.call_context();

    let big_id = BigId::new(args.big_id);
    info!(addr = %config.backend.addr, vsid = big_id.vsid(), "cdbpool driver starting");

    for stmt in parse_sql(&args.sql)? {
        let mut route = RouteInfo::new(big_id);
        if let Some(db) = &args.db {
            route = route.with_db_name(db.clone());
        }
        match pool.run(&stmt, route, &ctx, &buffers).await {
            Ok(Outcome::Exec(result)) => {
                println!(
                    "OK {} (last insert id {})",
                    result.rows_affected, result.last_insert_id
                );
            }
            Ok(Outcome::Rows(rows)) => {
                println!("{}", rows.columns.join("\t"));
                for row in &rows.rows {
                    let cells: Vec<String> = row.iter().map(|value| value.to_string()).collect();
                    println!("{}", cells.join("\t"));
                }
            }
            Err(err) => {
                error!(error = %err, statement = %stmt, "statement failed");
                return Err(err.into());
            }
        }
    }
    info!(idle_connections = pool.idle_count(), "cdbpool driver finished");
    Ok(())
}
