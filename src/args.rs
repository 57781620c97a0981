use clap::Parser;
use std::path::PathBuf;

use cb_failed_assistant::{
    constants::{DEFAULT_NPI_API_BASE_URL, DEFAULT_NPI_API_VERSION, DEFAULT_REQUEST_TIMEOUT_SECS},
    report::Action,
};

#[derive(Debug, Parser)]
#[command(name = "cb_failed_assistant")]
#[command(about = "Annotate the daily CB Failed report with suggested fixes from dictionaries, USAP corrections and the NPI registry")]
pub struct Args {
    /// CB Failed report workbook (.xlsx, .xls or .ods).
    #[arg(long)]
    pub report: PathBuf,

    /// Pipe-delimited dictionary export. The kind is taken from the file name
    /// (Providers, Surgeons, Coder/DN35113). Repeat for several files.
    #[arg(long = "dictionary", required = true)]
    pub dictionaries: Vec<PathBuf>,

    /// USAP correction workbook. Repeat for several files; later files take precedence.
    #[arg(long = "corrections")]
    pub corrections: Vec<PathBuf>,

    /// Output workbook path. Defaults to PROCESADO_<timestamp>_<report name> next to the report.
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Only write rows with these bot actions (e.g. "COMPLETAR INFO", change-ticket).
    #[arg(long = "action")]
    pub actions: Vec<Action>,

    /// Skip NPI registry requests; rows are classified from dictionaries and corrections only.
    #[arg(long, default_value_t = false)]
    pub skip_api: bool,

    /// NPI API base URL.
    #[arg(long, default_value = DEFAULT_NPI_API_BASE_URL)]
    pub api_base_url: String,

    /// NPI API version query parameter.
    #[arg(long, default_value = DEFAULT_NPI_API_VERSION)]
    pub api_version: String,

    /// Per-request timeout for registry lookups, in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}
