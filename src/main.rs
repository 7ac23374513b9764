//! invoice-forge – compose tax invoices and render them to fitted PDFs.
//!
//! Usage:
//!   invoice-forge compose <invoice.json> <out.html> --profile <org.json>
//!   invoice-forge render <in.html> [out.pdf] [--base-height MM] [--item-height MM] [--title T]
//!   invoice-forge build <invoice.json> [out.pdf] --profile <org.json> [--html out.html]
//!   invoice-forge smoke [--url U] [--token T] [--email E]
//!   invoice-forge proforma <request.json> [--url U] [--token T]
//!
//! Service settings fall back to `API_URL`, `API_SECRET_TOKEN` and
//! `TEST_EMAIL`, which may come from a `.env` file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, fs, process};

use invoice_forge::error::{InvoiceError, Result};
use invoice_forge::fit::{self, HeightPolicy};
use invoice_forge::{Compositor, InvoiceRecord, OrganizationProfile};

/// Positional arguments and `--flag value` pairs of one subcommand.
struct Args {
    positional: Vec<String>,
    flags: HashMap<String, String>,
}

impl Args {
    fn parse(raw: &[String]) -> std::result::Result<Self, String> {
        let mut positional = Vec::new();
        let mut flags = HashMap::new();
        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            match arg.strip_prefix("--") {
                Some(name) => match iter.next() {
                    Some(v) => {
                        flags.insert(name.to_string(), v.clone());
                    }
                    None => return Err(format!("--{name} needs a value")),
                },
                None => positional.push(arg.clone()),
            }
        }
        Ok(Self { positional, flags })
    }

    fn path(&self, idx: usize) -> Option<PathBuf> {
        self.positional.get(idx).map(PathBuf::from)
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn mm(&self, name: &str, default: f32) -> std::result::Result<f32, String> {
        match self.flag(name) {
            None => Ok(default),
            Some(v) => v
                .parse::<f32>()
                .ok()
                .filter(|mm| mm.is_finite() && *mm >= 0.0)
                .ok_or_else(|| format!("--{name} expects millimetres, got '{v}'")),
        }
    }

    fn height_policy(&self) -> std::result::Result<HeightPolicy, String> {
        let d = HeightPolicy::default();
        Ok(HeightPolicy {
            base_height_mm: self.mm("base-height", d.base_height_mm)?,
            item_height_mm: self.mm("item-height", d.item_height_mm)?,
        })
    }
}

fn main() {
    env_logger::init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("invoice-forge");

    let Some(command) = args.get(1) else {
        print_usage(prog);
        process::exit(1);
    };
    if command == "--help" || command == "-h" {
        print_usage(prog);
        process::exit(0);
    }
    let parsed = match Args::parse(&args[2..]) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("Error: {msg}");
            print_usage(prog);
            process::exit(1);
        }
    };

    let result = match command.as_str() {
        "compose" => cmd_compose(&parsed),
        "render" => cmd_render(&parsed),
        "build" => cmd_build(&parsed),
        #[cfg(feature = "client")]
        "smoke" => service::cmd_smoke(&parsed),
        #[cfg(feature = "client")]
        "proforma" => service::cmd_proforma(&parsed),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage(prog);
            process::exit(1);
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(CliError::Usage(msg)) => {
            eprintln!("Error: {msg}");
            print_usage(prog);
            process::exit(1);
        }
        Err(CliError::Failed(e)) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

enum CliError {
    Usage(String),
    Failed(InvoiceError),
}

impl From<InvoiceError> for CliError {
    fn from(e: InvoiceError) -> Self {
        Self::Failed(e)
    }
}

impl From<String> for CliError {
    fn from(msg: String) -> Self {
        Self::Usage(msg)
    }
}

type CliResult = std::result::Result<i32, CliError>;

fn required(args: &Args, idx: usize, what: &str) -> std::result::Result<PathBuf, CliError> {
    args.path(idx)
        .ok_or_else(|| CliError::Usage(format!("no {what} specified")))
}

fn load_profile(args: &Args) -> std::result::Result<OrganizationProfile, CliError> {
    let path = args
        .flag("profile")
        .ok_or_else(|| CliError::Usage("--profile <org.json> is required".into()))?;
    Ok(OrganizationProfile::from_file(path)?)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |e: std::io::Error| InvoiceError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    fs::write(path, bytes).map_err(io_err)
}

fn cmd_compose(args: &Args) -> CliResult {
    let input = required(args, 0, "invoice file")?;
    let output = required(args, 1, "output HTML path")?;
    let profile = load_profile(args)?;

    let doc = Compositor::new(&profile).compose(&InvoiceRecord::from_file(&input)?)?;
    write_file(&output, doc.markup().as_bytes())?;
    eprintln!(
        "Wrote '{}' (invoice {}, {} items)",
        output.display(),
        doc.invoice_number(),
        doc.item_count()
    );
    Ok(0)
}

fn cmd_render(args: &Args) -> CliResult {
    let input = required(args, 0, "input HTML file")?;
    let output = args.path(1);
    let policy = args.height_policy()?;

    let (written, out) = fit::convert_file(&input, output.as_deref(), policy, args.flag("title"))?;
    report(&written, &out);
    Ok(0)
}

fn cmd_build(args: &Args) -> CliResult {
    let input = required(args, 0, "invoice file")?;
    let output = args
        .path(1)
        .unwrap_or_else(|| fit::default_output_path(&input));
    let policy = args.height_policy()?;
    let profile = load_profile(args)?;

    let doc = Compositor::new(&profile).compose(&InvoiceRecord::from_file(&input)?)?;
    if let Some(html_path) = args.flag("html") {
        write_file(Path::new(html_path), doc.markup().as_bytes())?;
    }
    let out = fit::render_document(&doc, policy)?;
    write_file(&output, &out.bytes)?;
    report(&output, &out);
    Ok(0)
}

fn report(path: &Path, out: &fit::RenderOutput) {
    eprintln!(
        "Wrote '{}' ({:.1} KB, {} items, {}x{}mm)",
        path.display(),
        out.size_kb(),
        out.geometry.item_count,
        out.geometry.page_width_mm,
        out.geometry.page_height_mm
    );
}

#[cfg(feature = "client")]
mod service {
    use std::env;

    use serde_json::json;

    use super::{required, Args, CliResult};
    use invoice_forge::client::{InvoiceServiceClient, ServiceConfig};
    use invoice_forge::error::InvoiceError;
    use invoice_forge::InvoiceRequest;

    fn service_config(args: &Args) -> ServiceConfig {
        let url = args
            .flag("url")
            .map(str::to_string)
            .or_else(|| env::var("API_URL").ok())
            .unwrap_or_else(|| ServiceConfig::DEFAULT_URL.to_string());
        let token = args
            .flag("token")
            .map(str::to_string)
            .or_else(|| env::var("API_SECRET_TOKEN").ok())
            .unwrap_or_default();
        ServiceConfig::new(url, token)
    }

    fn smoke_request(email: &str) -> Result<InvoiceRequest, InvoiceError> {
        let body = json!({
            "invoice": {
                "number": "00TI25-TEST001",
                "date_of_issuing": "March 6, 2025",
                "date_of_supply": "March 6, 2025"
            },
            "issued_to": {
                "name": "Test Customer",
                "address": "123 Test Street<br/>Test City, TC 12345",
                "trn": "TEST123456",
                "tel": "+1234567890",
                "email": email
            },
            "terms": {
                "payment_terms": "Payment on Delivery",
                "delivery_terms": "Ex-works Dubai"
            },
            "items": [
                {
                    "description": "Test Item - Sample Product for Testing",
                    "quantity": 2.0, "uom": "Pcs", "price_aed": 5000.0,
                    "discount_pct": 10.0, "vat_pct": 5, "rate_usd": 3.6725
                },
                {
                    "description": "Another Test Item - Second Product",
                    "quantity": 1.0, "uom": "Pcs", "price_aed": 3000.0,
                    "discount_pct": 0, "vat_pct": 5, "rate_usd": 3.6725
                }
            ],
            "supply_total_text": "Twelve thousand six hundred AED ONLY",
            "recipient_emails": [email]
        });
        InvoiceRequest::from_json(&body.to_string())
    }

    pub(super) fn cmd_smoke(args: &Args) -> CliResult {
        let config = service_config(args);
        let email = args
            .flag("email")
            .map(str::to_string)
            .or_else(|| env::var("TEST_EMAIL").ok())
            .unwrap_or_else(|| "test@example.com".to_string());
        println!("Invoice service smoke test against {}", config.base_url);

        let client = InvoiceServiceClient::new(config)?;
        let request = smoke_request(&email)?;

        let results = [
            ("Health Check", client.health()),
            ("Token Validation", client.test_token()),
            ("Invoice Generation", client.generate_invoice(&request)),
        ];

        let mut all_passed = true;
        for (name, result) in results {
            match result {
                Ok(body) => {
                    log::debug!("{name} response: {body}");
                    println!("{name}: PASSED");
                }
                Err(e) => {
                    all_passed = false;
                    println!("{name}: FAILED ({e})");
                }
            }
        }
        println!(
            "{}",
            if all_passed {
                "ALL TESTS PASSED"
            } else {
                "SOME TESTS FAILED"
            }
        );
        Ok(if all_passed { 0 } else { 1 })
    }

    pub(super) fn cmd_proforma(args: &Args) -> CliResult {
        let input = required(args, 0, "request file")?;
        let request = InvoiceRequest::from_file(&input)?;

        let client = InvoiceServiceClient::new(service_config(args))?;
        let receipt = client.generate_proforma_invoice(&request)?;
        println!("Invoice:  {}", receipt.invoice_number);
        println!("PDF file: {}", receipt.pdf_filename);
        println!("PDF size: {} KB", receipt.pdf_size_kb);
        println!("Total:    {} AED", receipt.total_aed);
        println!("Sent to:  {}", receipt.emails_sent_to.join(", "));
        Ok(0)
    }
}

fn print_usage(prog: &str) {
    eprintln!("invoice-forge – tax invoice compositor and PDF renderer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} compose <invoice.json> <out.html> --profile <org.json>");
    eprintln!("  {prog} render <in.html> [out.pdf] [--base-height MM] [--item-height MM] [--title T]");
    eprintln!("  {prog} build <invoice.json> [out.pdf] --profile <org.json> [--html out.html]");
    eprintln!("  {prog} smoke [--url U] [--token T] [--email E]");
    eprintln!("  {prog} proforma <request.json> [--url U] [--token T]");
    eprintln!();
    eprintln!("Page height is base-height + items x item-height (default 377mm + n x 30mm).");
    eprintln!("Service settings default to API_URL, API_SECRET_TOKEN and TEST_EMAIL.");
}
