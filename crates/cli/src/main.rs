use anyhow::Context;
use clap::Parser;
use rocky_browser::ChromiumRenderer;
use rocky_cli::{Cli, Command};
use rocky_core::PageRenderer;
use rocky_storage::{FileStorage, Storage};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    // RUST_LOG wins over -v / -q
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let renderer = ChromiumRenderer::new();
    let cancel = renderer.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling render");
            cancel.cancel();
        }
    });

    let (data, file, output_dir) = match &cli.command {
        Command::Render(args) => {
            info!(url = %args.url, idle_type = %args.idle_type, "rendering html");
            let html = renderer
                .render_page(&args.url, &args.options())
                .await
                .with_context(|| format!("render {}", args.url))?;
            (html, "result.html", &args.output_dir)
        }
        Command::Pdf(args) => {
            info!(url = %args.render.url, idle_type = %args.render.idle_type, "rendering pdf");
            let pdf = renderer
                .render_pdf(&args.render.url, &args.options())
                .await
                .with_context(|| format!("print {}", args.render.url))?;
            (pdf, "result.pdf", &args.render.output_dir)
        }
    };

    let storage = FileStorage::new(output_dir);
    let path = storage.save(file, &data).await?;
    println!("{}", path.display());
    Ok(())
}
