use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use rocky_core::{BrowserConf, IdleType, PdfOption, RendererConf, RendererOption, WaitConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rocky")]
#[command(about = "Render fully loaded web pages to HTML or PDF with headless Chromium")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a page and save its HTML
    Render(RenderArgs),
    /// Render a page and print it to PDF
    Pdf(PdfArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Page to render
    pub url: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Browser window width
    #[arg(long, default_value_t = 1920, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Browser window height
    #[arg(long, default_value_t = 1080, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// Seconds before giving up on the page
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Load images while rendering
    #[arg(long)]
    pub image_load: bool,

    /// How to decide the page has finished loading
    #[arg(long, default_value = "auto", value_parser = PossibleValuesParser::new(IdleType::VALID))]
    pub idle_type: String,

    /// Milliseconds the network has to stay quiet
    #[arg(long, default_value_t = 500)]
    pub quiet_window_ms: u64,

    /// Requests tolerated in flight while idle
    #[arg(long, default_value_t = 0)]
    pub max_inflight: usize,

    /// Milliseconds after which an open XHR/fetch request no longer blocks idle
    #[arg(long, default_value_t = 5000)]
    pub long_poll_ms: u64,

    /// Browser executable to use
    #[arg(long)]
    pub browser_path: Option<PathBuf>,

    /// Running inside a container (docker / lambda)
    #[arg(long)]
    pub container: bool,

    /// Log every page event the load detector sees
    #[arg(long)]
    pub chromium_debug: bool,

    /// Override the browser user agent
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Directory for the result file
    #[arg(long, default_value = "result")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PdfArgs {
    #[command(flatten)]
    pub render: RenderArgs,

    /// Landscape layout
    #[arg(long)]
    pub landscape: bool,

    /// Show header and footer
    #[arg(long)]
    pub header_footer: bool,

    /// Paper width in centimeters (0 = browser default)
    #[arg(long, default_value_t = 0.0)]
    pub paper_width: f64,

    /// Paper height in centimeters (0 = browser default)
    #[arg(long, default_value_t = 0.0)]
    pub paper_height: f64,

    /// Top margin in centimeters
    #[arg(long, default_value_t = 1.0)]
    pub margin_top: f64,

    /// Bottom margin in centimeters
    #[arg(long, default_value_t = 1.0)]
    pub margin_bottom: f64,

    /// Left margin in centimeters
    #[arg(long, default_value_t = 1.0)]
    pub margin_left: f64,

    /// Right margin in centimeters
    #[arg(long, default_value_t = 1.0)]
    pub margin_right: f64,
}

impl RenderArgs {
    pub fn browser_conf(&self) -> BrowserConf {
        BrowserConf {
            browser_exec_path: self.browser_path.clone(),
            chromium_debug: self.chromium_debug,
            container: self.container,
        }
    }

    pub fn wait_config(&self) -> WaitConfig {
        let defaults = WaitConfig::default();
        WaitConfig::default()
            .with_idle_type(self.idle_type.clone())
            .with_idle_check(Duration::from_millis(self.quiet_window_ms), self.max_inflight)
            .with_long_poll(Duration::from_millis(self.long_poll_ms), defaults.promote_interval)
            .with_timeout(self.timeout.saturating_mul(1000))
    }

    pub fn renderer_conf(&self) -> RendererConf {
        RendererConf {
            headless: !self.headed,
            window_width: self.width,
            window_height: self.height,
            image_load: self.image_load,
            user_agent: self.user_agent.clone(),
            wait: self.wait_config(),
        }
    }

    pub fn options(&self) -> RendererOption {
        RendererOption {
            browser: self.browser_conf(),
            renderer: self.renderer_conf(),
        }
    }
}

impl PdfArgs {
    pub fn options(&self) -> PdfOption {
        PdfOption {
            browser: self.render.browser_conf(),
            renderer: self.render.renderer_conf(),
            landscape: self.landscape,
            display_header_footer: self.header_footer,
            paper_width_cm: self.paper_width,
            paper_height_cm: self.paper_height,
            margin_top_cm: self.margin_top,
            margin_bottom_cm: self.margin_bottom,
            margin_left_cm: self.margin_left,
            margin_right_cm: self.margin_right,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["rocky", "render", "https://example.com"]).unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render");
        };
        let opts = args.options();
        assert_eq!(args.url, "https://example.com");
        assert!(opts.renderer.headless);
        assert_eq!(opts.renderer.window_width, 1920);
        assert_eq!(opts.renderer.wait.idle_type, "auto");
        assert_eq!(opts.renderer.wait.timeout, Duration::from_secs(30));
        assert_eq!(opts.renderer.wait.quiet_window, Duration::from_millis(500));
        assert_eq!(opts.renderer.wait.long_poll_threshold, Duration::from_secs(5));
        assert_eq!(args.output_dir, PathBuf::from("result"));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn pdf_flags() {
        let cli = Cli::try_parse_from([
            "rocky",
            "-vv",
            "pdf",
            "https://example.com",
            "--landscape",
            "--paper-width",
            "21",
            "--margin-top",
            "2",
            "--idle-type",
            "networkIdle",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Pdf(args) = cli.command else {
            panic!("expected pdf");
        };
        let opts = args.options();
        assert!(opts.landscape);
        assert_eq!(opts.paper_width_cm, 21.0);
        assert_eq!(opts.margin_top_cm, 2.0);
        assert_eq!(opts.margin_left_cm, 1.0);
        assert_eq!(opts.renderer.wait.idle_type, "networkIdle");
    }

    #[test]
    fn rejects_unknown_idle_type() {
        let err = Cli::try_parse_from([
            "rocky",
            "render",
            "https://example.com",
            "--idle-type",
            "load",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn rejects_zero_width() {
        assert!(Cli::try_parse_from(["rocky", "render", "https://a", "--width", "0"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
