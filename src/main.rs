use clap::Parser;
use coglearn::{db::Db, AppState};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// libSQL database: a `file:` path or a remote URL.
    #[clap(long, env)]
    database_url: String,

    /// libSQL authentication token, for remote databases.
    #[clap(long, env)]
    auth_token: Option<String>,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "127.0.0.1:1414")]
    address: String,

    /// Mark the auth cookie `Secure`.
    #[arg(long, env)]
    secure_cookies: bool,

    /// How long a login token stays valid.
    #[arg(long, env, default_value_t = 168)]
    token_ttl_hours: i64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "coglearn=debug,tower_http=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let db = Db::new(args.database_url, args.auth_token).await?;
    let state = AppState::new(db, args.secure_cookies, args.token_ttl_hours);
    let app = coglearn::router(state);

    let address = args.address.parse::<std::net::SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!("listening on http://{address}");
    axum::serve(listener, app).await?;

    Ok(())
}
