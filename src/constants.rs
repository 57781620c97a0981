pub const DEFAULT_NPI_API_BASE_URL: &str = "https://npiregistry.cms.hhs.gov/api/";
pub const DEFAULT_NPI_API_VERSION: &str = "2.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const HTTP_USER_AGENT: &str = "cb-failed-assistant/0.1";

pub const NPPES_API_DOC_URL: &str = "https://npiregistry.cms.hhs.gov/api-page";

pub const DICTIONARY_DELIMITER: u8 = b'|';
pub const CODER_EXPORT_MARKER: &str = "DN35113";

// Report columns.
pub const REPORT_TICKET_COLUMN: &str = "SIN";
pub const REPORT_NPI_COLUMN: &str = "NPI";
pub const REPORT_TYPE_COLUMN: &str = "Type";
pub const REPORT_DISPLAY_NAME_COLUMN: &str = "Last - Title";

// Bot output columns and the position each one is inserted at.
pub const OUTPUT_COLUMNS: [(&str, usize); 4] = [
    ("Bot_Accion", 5),
    ("Sugerencias_Bot", 6),
    ("Bot_Detalles", 7),
    ("Source", 8),
];

pub const OUTPUT_FILE_PREFIX: &str = "PROCESADO";
