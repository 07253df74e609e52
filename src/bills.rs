//! Output schemas for the four supported bill shapes.
//!
//! Each struct is both the JSON schema sent to the remote Extract call and
//! the typed view of its answer. Field doc comments are not just docs: they
//! become the `description` of each property and are what the extraction
//! model reads to locate the value on the page, which is why several of them
//! quote the Greek labels printed on the bills.
//!
//! Variants extend [`UtilityBill`] through `#[serde(flatten)]`, so every
//! generated schema is a single flat object with no nesting.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Generic utility bill: issuer, customer, dates and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UtilityBill {
    /// Business full legal name issuing the invoice (usually contains 'Α.Ε.')
    pub issuer_name: String,
    /// Invoice document number or alphanumeric sequence including a space
    pub document_number: String,
    /// Customer identification number (ΚΩΔΙΚΟΣ ΠΕΛΑΤΗ)
    pub customer_id_number: String,
    /// Customer's name. If none is found return [redacted]
    pub customer_name: String,
    /// Customer's address (no newline chars, include postal code). If none is found, return [redacted]
    pub customer_address: String,
    /// Customer VAT number, usually denoted as 'ΑΦΜ' or 'Α.Φ.Μ.'. If none is found, return [redacted]
    pub customer_vat_number: String,
    /// Electricity meter number
    pub customer_meter_number: String,
    /// Type of bill, 'Έναντι' or 'Εκκαθαριστικός' only, 'None' otherwise
    pub bill_type: String,
    /// Publication date in YYYY-MM-DD format
    pub bill_pub_date: String,
    /// Start date of the billing period in YYYY-MM-DD format
    pub bill_period_start: String,
    /// End date of the billing period in YYYY-MM-DD format
    pub bill_period_end: String,
    /// Due date for the invoice payment in YYYY-MM-DD format
    pub bill_due_date: String,
    /// Total fixed charges on the invoice. Subtract any discounts (usually referred to as 'Έκπτωση παγίου')
    pub bill_total_fixed_charges: f64,
    /// Total VAT amount on the invoice (ΦΠΑ)
    pub bill_vat_amount: f64,
    /// Total refund amount on the invoice including minus sign, and excluding fixed charges. If it does not exist, return 'None'
    pub bill_refund_amount: f64,
    /// Total amount due on the invoice
    pub bill_total_amount: f64,
}

/// Natural-gas bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GasBill {
    #[serde(flatten)]
    pub base: UtilityBill,
    /// Commission of natural gas in euros (€)
    pub commission_of_natural_gas: f64,
    /// Distribution of natural gas in euros (€)
    pub distribution_of_natural_gas: f64,
    /// Transport of natural gas in euros (€)
    pub transport_of_natural_gas: f64,
    /// Gas usage in cubic meters (Nm^3)
    pub usage_cubic_meters: f64,
    /// Gas usage in kilowatt hours (kWh)
    pub usage_kilowatt_hours: f64,
    /// Rate per kilowatt hour (€/kWh)
    pub rate_per_kilowatt_hour: f64,
}

/// Electricity bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PowerBill {
    #[serde(flatten)]
    pub base: UtilityBill,
    /// Commission of power charges in euros (€)
    pub commission_of_power_charges: f64,
    /// Adjustable power charges in euros (€)
    pub adjustable_power_charges: f64,
    /// Total fees amount on the invoice, like 'Τέλος', 'Ε.Τ.Μ.Ε.Α.Ρ.' and 'Ειδικός Φόρος Κατανάλωσης', but not 'increase'
    pub bill_fees_amount: f64,
    /// Electricity usage in kilowatt hours (kWh)
    pub usage_kilowatt_hours: f64,
    /// Rate per kilowatt hour (€/kWh). Subtract any consistent payment bonus, like 'Έκπτωση συνέπειας'
    pub rate_per_kilowatt_hour: f64,
    /// Municipality fee in euros (€)
    pub municipality_fee: f64,
    /// Television fee in euros (€) (ΕΡΤ), 'None' otherwise
    pub television_fee: f64,
}

/// Water bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WaterBill {
    #[serde(flatten)]
    pub base: UtilityBill,
    /// Water charges in euros (€)
    pub water_charges: f64,
    /// Sewage charges in euros (€)
    pub sewage_charges: f64,
    /// Total fees amount on the invoice, like 'Τέλος'
    pub bill_fees_amount: f64,
    /// Water usage in cubic meters (m^3)
    pub usage_cubic_meters: f64,
}

/// Which of the four schemas applies to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillKind {
    /// Unrecognised bill type; only the common fields are extracted.
    Base,
    Gas,
    Power,
    Water,
}

impl BillKind {
    pub const ALL: [BillKind; 4] = [BillKind::Base, BillKind::Gas, BillKind::Power, BillKind::Water];

    /// JSON schema document for this variant, as sent to the Extract call.
    pub fn json_schema(&self) -> Value {
        let root = match self {
            BillKind::Base => schemars::schema_for!(UtilityBill),
            BillKind::Gas => schemars::schema_for!(GasBill),
            BillKind::Power => schemars::schema_for!(PowerBill),
            BillKind::Water => schemars::schema_for!(WaterBill),
        };
        // RootSchema is plain data; serialising it cannot fail.
        serde_json::to_value(root).unwrap_or(Value::Null)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillKind::Base => "base",
            BillKind::Gas => "gas",
            BillKind::Power => "power",
            BillKind::Water => "water",
        }
    }
}

impl fmt::Display for BillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
