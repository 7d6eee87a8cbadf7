use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::correlate::Run;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Exception,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Exception => "EXCEPTION",
        })
    }
}

/// Which business entity an identity rule extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Carrier,
    Switch,
    TrunkGroupCategory,
    TrunkGroup,
    TrunkGroupClass,
    ImeExport,
}

/// Message templates in match priority order.
const IDENTITY_TEMPLATES: [(IdentityKind, &str); 14] = [
    (IdentityKind::Carrier, r"Input received for  with carrier ID -(\w*)"),
    (IdentityKind::Switch, r"Input received for Switch Transaction with carrier ID -(\w*)"),
    (IdentityKind::TrunkGroupCategory, r"Input received for Trunk Group category Id -(\w*)"),
    (IdentityKind::TrunkGroup, r"Input received for Trunk Group  with Trunk Group ID -(\w*)"),
    (IdentityKind::TrunkGroupClass, r"Input received for  Trunk Group Class Id -(\w*)"),
    (IdentityKind::Carrier, r"Process started for Carrier New Record with CustID: (\w*)"),
    (IdentityKind::Carrier, r"Process started for Carrier Update Record with CustID: (\w*)"),
    (IdentityKind::Switch, r"Process started for Switch New Record with SwitchID: (\w*)"),
    (IdentityKind::Switch, r"Process started for Switch Update Record with SwitchD: (\w*)"),
    (
        IdentityKind::TrunkGroup,
        r"Process started for Trunk Group New Record with TrunkGroupID: (\w*)",
    ),
    (
        IdentityKind::TrunkGroup,
        r"Process started for Trunk Group Update Record with TrunkGroupID: (\w*)",
    ),
    (
        IdentityKind::TrunkGroupClass,
        r"Process started for Trunk Group Class New Record with TrunkClassID: (\w*)",
    ),
    (
        IdentityKind::TrunkGroupClass,
        r"Process started for Trunk Group Class Update Record with TrunkClassID: (\w*)",
    ),
    (IdentityKind::ImeExport, r"Process started for IME Hourly Export for TrunkGroupID: (\w*)"),
];

pub struct IdentityRule {
    pub kind: IdentityKind,
    pub pattern: Regex,
}

lazy_static! {
    // One non-letter after "Entry" is a separator; a letter starts the subsystem name.
    static ref CATEGORY_REGEX: Regex = Regex::new(r"Entry[^[:alpha:]]?(\w+)").unwrap();
    static ref IDENTITY_RULES: Vec<IdentityRule> = IDENTITY_TEMPLATES
        .iter()
        .map(|(kind, template)| IdentityRule {
            kind: *kind,
            pattern: Regex::new(template).unwrap(),
        })
        .collect();
}

pub fn identity_rules() -> &'static [IdentityRule] {
    &IDENTITY_RULES
}

/// `Exception` when any record's message code mentions "exception" in any case.
pub fn get_status(run: &Run) -> RunStatus {
    status_of(run.records())
}

pub fn status_of(records: &[Record]) -> RunStatus {
    if records
        .iter()
        .any(|r| r.message_code().to_lowercase().contains("exception"))
    {
        RunStatus::Exception
    } else {
        RunStatus::Success
    }
}

/// Subsystem named after "Entry" in the message code, e.g. `Carrier` from `Entry_Carrier`.
pub fn get_category(record: &Record) -> Option<&str> {
    CATEGORY_REGEX
        .captures(record.message_code())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First identity rule that matches the trimmed message, with what it captured.
pub fn match_identity(record: &Record) -> Option<(IdentityKind, &str)> {
    let message = record.message().trim();
    IDENTITY_RULES.iter().find_map(|rule| {
        rule.pattern
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| (rule.kind, m.as_str()))
    })
}

pub fn get_identity(record: &Record) -> Option<&str> {
    match_identity(record).map(|(_, id)| id)
}
