//! Invoice record types and their validation.
//!
//! Records usually arrive as JSON (a batch file or an HTTP body). Parsing
//! goes through [`InvoiceRecord::from_json`], which reports missing or
//! malformed line-item fields with the item index instead of a bare serde
//! position.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InvoiceError, Result, ValidationError};

/// Invoice header: number and dates, kept as display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMeta {
    pub number: String,
    pub date_of_issuing: String,
    pub date_of_supply: String,
}

/// The buyer the invoice is issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    /// May embed `<br/>` line breaks.
    pub address: String,
    pub trn: String,
    pub tel: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terms {
    pub payment_terms: String,
    pub delivery_terms: String,
}

/// One billable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    /// Unit of measure.
    pub uom: String,
    /// Unit price in AED, excluding VAT.
    pub price_aed: f64,
    #[serde(default)]
    pub discount_pct: f64,
    #[serde(default)]
    pub vat_pct: f64,
    /// AED per USD; zero means "no conversion".
    #[serde(default)]
    pub rate_usd: f64,
}

/// A complete invoice as supplied by the caller. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice: InvoiceMeta,
    pub issued_to: Customer,
    pub terms: Terms,
    pub items: Vec<LineItem>,
    pub supply_total_text: String,
}

/// Body of the remote service's generation endpoints: a record plus the
/// addresses the finished PDF is mailed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    #[serde(flatten)]
    pub record: InvoiceRecord,
    #[serde(default)]
    pub recipient_emails: Vec<String>,
}

impl InvoiceRecord {
    /// Parse and validate a record from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(&value)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| InvoiceError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Build a record from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> std::result::Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::new("$", "invoice record must be a JSON object"))?;

        let items = match obj.get("items") {
            None | Some(Value::Null) => {
                return Err(ValidationError::new("items", "missing required field"))
            }
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| LineItem::from_value(i, v))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            Some(_) => return Err(ValidationError::new("items", "must be an array")),
        };

        let record = Self {
            invoice: section(obj, "invoice")?,
            issued_to: section(obj, "issued_to")?,
            terms: section(obj, "terms")?,
            items,
            supply_total_text: section(obj, "supply_total_text")?,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the invariants the compositor relies on.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::new("items", "at least one line item is required"));
        }
        for (i, item) in self.items.iter().enumerate() {
            item.validate(i)?;
        }
        Ok(())
    }
}

impl InvoiceRequest {
    /// Parse a request body, validating the embedded record.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let record = InvoiceRecord::from_value(&value)?;
        let recipient_emails = match value.get("recipient_emails") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => Vec::<String>::deserialize(v)
                .map_err(|e| ValidationError::new("recipient_emails", e.to_string()))?,
        };
        Ok(Self {
            record,
            recipient_emails,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| InvoiceError::io(path, e))?;
        Self::from_json(&text)
    }
}

fn section<T: serde::de::DeserializeOwned>(
    obj: &Map<String, Value>,
    key: &str,
) -> std::result::Result<T, ValidationError> {
    let value = obj
        .get(key)
        .ok_or_else(|| ValidationError::new(key, "missing required field"))?;
    T::deserialize(value).map_err(|e| ValidationError::new(key, e.to_string()))
}

impl LineItem {
    /// Read line item `index` from JSON, naming the first bad field.
    pub fn from_value(index: usize, value: &Value) -> std::result::Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError {
                field: format!("items[{index}]"),
                message: "line item must be a JSON object".into(),
                item: Some(index),
            })?;

        let item = Self {
            description: required_str(obj, index, "description")?,
            quantity: required_number(obj, index, "quantity")?,
            uom: required_str(obj, index, "uom")?,
            price_aed: required_number(obj, index, "price_aed")?,
            discount_pct: optional_number(obj, index, "discount_pct")?,
            vat_pct: optional_number(obj, index, "vat_pct")?,
            rate_usd: optional_number(obj, index, "rate_usd")?,
        };
        item.validate(index)?;
        Ok(item)
    }

    fn validate(&self, index: usize) -> std::result::Result<(), ValidationError> {
        let numbers = [
            ("quantity", self.quantity),
            ("price_aed", self.price_aed),
            ("discount_pct", self.discount_pct),
            ("vat_pct", self.vat_pct),
            ("rate_usd", self.rate_usd),
        ];
        for (field, v) in numbers {
            if !v.is_finite() {
                return Err(ValidationError::item(index, field, "must be a finite number"));
            }
        }
        if self.quantity < 0.0 {
            return Err(ValidationError::item(index, "quantity", "must not be negative"));
        }
        if !(0.0..=100.0).contains(&self.discount_pct) {
            return Err(ValidationError::item(
                index,
                "discount_pct",
                "must be between 0 and 100",
            ));
        }
        if self.vat_pct < 0.0 {
            return Err(ValidationError::item(index, "vat_pct", "must not be negative"));
        }
        if self.rate_usd < 0.0 {
            return Err(ValidationError::item(index, "rate_usd", "must not be negative"));
        }
        Ok(())
    }
}

fn required_str(
    obj: &Map<String, Value>,
    index: usize,
    field: &str,
) -> std::result::Result<String, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::item(index, field, "missing required field")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::item(index, field, "must be a string")),
    }
}

fn required_number(
    obj: &Map<String, Value>,
    index: usize,
    field: &str,
) -> std::result::Result<f64, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::item(index, field, "missing required field")),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ValidationError::item(index, field, "must be a number")),
    }
}

fn optional_number(
    obj: &Map<String, Value>,
    index: usize,
    field: &str,
) -> std::result::Result<f64, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| ValidationError::item(index, field, "must be a number")),
    }
}
