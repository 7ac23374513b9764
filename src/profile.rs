//! Organization profile – the seller identity, bank details and logo that
//! appear on every invoice. Supplied by the caller (usually from a JSON
//! file) instead of being compiled in, so one process can issue invoices
//! for several organizations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InvoiceError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub company_name: String,
    pub address: String,
    pub trn: String,
    pub tel: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankInfo {
    pub bank_name: String,
    pub iban: String,
    pub swift: String,
    pub beneficiary: String,
}

/// Header logo. `src` is normally a data URI; rasters (PNG/JPEG, base64)
/// are embedded in the PDF, anything else falls back to `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logo {
    pub text: String,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub company: CompanyInfo,
    pub bank: BankInfo,
    pub logo: Logo,
}

impl OrganizationProfile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| InvoiceError::io(path, e))?;
        let profile = Self::from_json(&text)?;
        log::debug!(
            "Loaded organization profile '{}' from {}",
            profile.company.company_name,
            path.display()
        );
        Ok(profile)
    }
}

impl Logo {
    /// Placeholder logo: an SVG data URI that draws `text` centred in a
    /// 120×42 box.
    pub fn placeholder(text: &str) -> Self {
        let src = format!(
            "data:image/svg+xml;utf8,<?xml version='1.0' encoding='UTF-8'?>\
             <svg xmlns='http://www.w3.org/2000/svg' width='120' height='42' viewBox='0 0 120 42'>\
             <text x='50%' y='50%' dominant-baseline='middle' text-anchor='middle' \
             font-family='Arial' font-size='10' fill='%23000'>{text}</text></svg>"
        );
        Self {
            text: text.to_string(),
            src,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_from_json() {
        let json = r#"{
            "company": {"company_name": "Acme Trading", "address": "Dubai", "trn": "100", "tel": "+971", "email": "a@acme.ae"},
            "bank": {"bank_name": "Bank", "iban": "AE00", "swift": "BANKAEAD", "beneficiary": "Acme Trading"},
            "logo": {"text": "ACME", "src": "data:image/png;base64,AAAA"}
        }"#;
        let profile = OrganizationProfile::from_json(json).unwrap();
        assert_eq!(profile.company.company_name, "Acme Trading");
        assert_eq!(profile.bank.swift, "BANKAEAD");
    }

    #[test]
    fn missing_profile_file_is_not_found() {
        let err = OrganizationProfile::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, InvoiceError::NotFound(_)));
    }

    #[test]
    fn placeholder_logo_is_svg_without_double_quotes() {
        let logo = Logo::placeholder("ACME");
        assert!(logo.src.starts_with("data:image/svg+xml"));
        assert!(logo.src.contains(">ACME</text>"));
        assert!(!logo.src.contains('"'));
    }
}
