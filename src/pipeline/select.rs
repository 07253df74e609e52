//! Schema selection by marker phrase.
//!
//! Each supported bill type prints a distinctive heading. The table below is
//! checked in order and the first phrase found in the parsed Markdown wins,
//! so a gas bill that also mentions electricity is still a gas bill. Adding a
//! bill type means adding a row, not a branch.

use crate::bills::BillKind;
use serde_json::Value;
use tracing::{debug, warn};

/// Ordered (marker phrase, bill kind) pairs; first match wins.
pub const BILL_MARKERS: &[(&str, BillKind)] = &[
    ("ΠΡΟΜΗΘΕΙΑ ΦΥΣΙΚΟΥ ΑΕΡΙΟΥ", BillKind::Gas),
    ("ΛΟΓΑΡΙΑΣΜΟΣ ΗΛΕΚΤΡΙΚΟΥ ΡΕΥΜΑΤΟΣ", BillKind::Power),
    ("Ύδρευσης", BillKind::Water),
];

/// Pick the bill kind for a parsed document.
///
/// Falls back to [`BillKind::Base`] with a warning when no marker matches;
/// extraction still runs, with only the common fields.
pub fn select_schema(markdown: &str) -> BillKind {
    select_with(BILL_MARKERS, markdown)
}

/// [`select_schema`] against a caller-supplied marker table.
pub fn select_with(markers: &[(&str, BillKind)], markdown: &str) -> BillKind {
    match markers.iter().find(|(marker, _)| markdown.contains(marker)) {
        Some((marker, kind)) => {
            debug!("Matched marker {:?} → {} schema", marker, kind);
            *kind
        }
        None => {
            warn!("Unrecognized utility bill type. Defaulting to base schema.");
            BillKind::Base
        }
    }
}

/// Select the kind for `markdown` and return its JSON schema document.
pub fn schema_for_markdown(markdown: &str) -> (BillKind, Value) {
    let kind = select_schema(markdown);
    (kind, kind.json_schema())
}
