//! check_ntp_time: report the offset between the local clock and an NTP server

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use ntp_offset_check::check::{self, error_line, Alarm};
use ntp_offset_check::core::{AddressFamily, CheckConfig, Status, UnknownOffsetPolicy};

#[derive(Debug, Parser)]
#[command(
    name = "check_ntp_time",
    version,
    about = "Checks the clock offset between the local host and a remote NTP server"
)]
struct Cli {
    /// NTP server to query
    #[arg(short = 'H', long)]
    hostname: String,

    /// NTP service port
    #[arg(short, long, default_value_t = ntp_offset_check::core::DEFAULT_PORT)]
    port: u16,

    /// Use IPv4 addresses only
    #[arg(short = '4', long = "use-ipv4", conflicts_with = "use_ipv6")]
    use_ipv4: bool,

    /// Use IPv6 addresses only
    #[arg(short = '6', long = "use-ipv6")]
    use_ipv6: bool,

    /// Offset range that results in a warning status (seconds)
    #[arg(short, long, default_value = ntp_offset_check::core::DEFAULT_WARNING)]
    warning: String,

    /// Offset range that results in a critical status (seconds)
    #[arg(short, long, default_value = ntp_offset_check::core::DEFAULT_CRITICAL)]
    critical: String,

    /// Seconds before the check gives up
    #[arg(short, long, default_value_t = ntp_offset_check::core::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Known offset of the server, added to every sample (seconds)
    #[arg(short = 'o', long, default_value_t = 0.0, allow_negative_numbers = true)]
    time_offset: f64,

    /// Report CRITICAL instead of UNKNOWN when no server qualifies
    #[arg(short, long)]
    quiet: bool,

    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> CheckConfig {
        let address_family = if self.use_ipv4 {
            AddressFamily::Ipv4
        } else if self.use_ipv6 {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Any
        };
        let unknown_offset = if self.quiet {
            UnknownOffsetPolicy::Critical
        } else {
            UnknownOffsetPolicy::Unknown
        };

        CheckConfig {
            port: self.port,
            address_family,
            timeout: Duration::from_secs(self.timeout),
            time_offset: self.time_offset,
            warning: self.warning,
            critical: self.critical,
            unknown_offset,
            ..CheckConfig::for_server(self.hostname)
        }
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version included: anything but a check is UNKNOWN
            let _ = e.print();
            std::process::exit(Status::Unknown.exit_code());
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level(cli.verbose))
        .init();

    let config = cli.into_config();
    let cancel = CancellationToken::new();
    let alarm = Alarm::arm(config.timeout, cancel.clone());

    let (status, line) = match check::run(&config, &cancel).await {
        Ok(report) => (report.status, report.to_string()),
        Err(e) => (e.status(), error_line(&e)),
    };
    drop(alarm);

    println!("{}", line);
    std::process::exit(status.exit_code());
}
