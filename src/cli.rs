use anyhow::{ensure, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "license-pushr",
    about = "Upload a license file to every host behind a management appliance API",
    version
)]
pub struct Cli {
    /// Address of the management appliance (the API listens on port 9993)
    #[arg(long, value_name = "ADDR")]
    pub ip: String,

    /// Account name used to authorize against the appliance
    #[arg(long, value_name = "NAME")]
    pub login: String,

    /// Password for the account
    #[arg(long, value_name = "SECRET")]
    pub password: String,

    /// License file to upload to every managed host
    //
    // Kept as a plain string: clap's `PathBuf` parser refuses an empty
    // value at parse time, and the empty case belongs to `validate`.
    #[arg(long, value_name = "FILE")]
    pub path: String,

    /// Verify the appliance's TLS certificate (skipped by default, since
    /// appliances ship self-signed certificates)
    #[arg(long)]
    pub verify_tls: bool,

    /// Abort on the first rejected upload instead of counting and continuing
    #[arg(long)]
    pub strict: bool,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Show hosts that accepted the license, not just the rejections
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

impl Cli {
    /// Reject blank connection values before anything touches the network.
    /// clap enforces presence; this catches `--ip ""` and friends.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.ip.trim().is_empty(), "ip is empty");
        ensure!(!self.login.trim().is_empty(), "login is empty");
        ensure!(!self.password.trim().is_empty(), "password is empty");
        ensure!(!self.path.is_empty(), "path is empty");
        Ok(())
    }
}
