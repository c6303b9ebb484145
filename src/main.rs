use chrono::Local;
use clap::Parser;
use estado_diario::{
    browser::WebDriverBrowser,
    fetch::HttpFetcher,
    info_time,
    model::CrawlRequest,
    process::Crawler,
    store::MemoryStore,
    CrawlConfig, Result,
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing_subscriber::EnvFilter;

/// Fetch the PJUD daily case status for one user.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// RUT used to log in
    #[arg(long, env = "PJUD_USUARIO")]
    usuario: String,
    /// "Clave Poder Judicial" password
    #[arg(long, env = "PJUD_PASSWORD", hide_env_values = true)]
    password: String,
    /// Report date dd/mm/yyyy; defaults to the previous working day(s)
    #[arg(long)]
    fecha: Option<String>,
    /// Also extract notification recipients
    #[arg(long)]
    receptor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let start_time = Local::now();
    let args = Args::parse();
    let config = CrawlConfig::load()?;

    let mut request = CrawlRequest::new(args.usuario, args.password).with_recipients(args.receptor);
    if let Some(fecha) = args.fecha {
        request = request.with_date(fecha);
    }

    let browser = WebDriverBrowser::connect(&config).await?;
    let store = MemoryStore::new();
    let fetcher = HttpFetcher::default();
    let crawler = Crawler::new(&browser, &config, &store, &store, &fetcher);

    let cases = match crawler.run(&request).await {
        Ok(cases) => cases,
        Err(err) => {
            eprintln!("{}", serde_json::to_string_pretty(&err.report())?);
            return Err(err);
        }
    };

    let mut file = File::create(&config.output_path).await?;
    file.write_all(&serde_json::to_vec_pretty(&cases)?).await?;
    info_time!(start_time, "Wrote {} causas to file: {}", cases.len(), config.output_path.display());

    Ok(())
}
