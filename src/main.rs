use clap::Parser;
use pendek::config::Config;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pendek")]
#[command(about = "A tiny URL shortener with click tracking and web push.", long_about = None)]
struct Args {
    /// Host to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 4000)]
    port: u16,

    /// Path to the SQLite database file
    #[arg(long, required = true)]
    database: String,

    /// Public base URL used when rendering short links
    /// (defaults to http://HOST:PORT)
    #[arg(long)]
    base_url: Option<String>,

    /// Path to a VAPID EC private key in PEM form; push delivery is
    /// disabled when omitted
    #[arg(long)]
    vapid_key: Option<String>,

    /// base64url-encoded VAPID public key matching --vapid-key
    #[arg(long)]
    vapid_public_key: Option<String>,

    /// Contact claim for VAPID tokens
    #[arg(long, default_value = "mailto:admin@example.com")]
    vapid_subject: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::from_default_env().add_directive("pendek=debug".parse().unwrap())
    } else {
        EnvFilter::from_default_env().add_directive("pendek=info".parse().unwrap())
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    let vapid_private_key = args.vapid_key.as_ref().map(|path| {
        std::fs::read_to_string(path).expect("Failed to read VAPID private key")
    });

    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", args.host, args.port));

    let config = Config::new(
        args.database.clone(),
        base_url,
        vapid_private_key,
        args.vapid_public_key.clone(),
        args.vapid_subject.clone(),
    );

    pendek::run(&args.host, args.port, config).await;
}
