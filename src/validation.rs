//! Findings, the per-parse accumulator and the consistency rules.
//!
//! Nothing in here aborts a parse except [`ValidationContext::structural`] in
//! strict mode. Rules are plain functions from an entity (or the whole graph)
//! to a list of findings; the parser decides where the findings end up.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::config::ParseMode;
use crate::construct::Genealogy;
use crate::entity::{Family, Person, person_key};
use crate::error::{GwError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Family,
    /// Not tied to an entity, e.g. a dropped source line.
    Source,
}

/// Structural findings come from reading the text; rule findings come from
/// the consistency rules and are recomputed on every validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingOrigin {
    Structural,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub entity: EntityKind,
    pub entity_id: Option<String>,
    pub field: Option<String>,
    pub message: String,
    pub line: Option<usize>,
    pub origin: FindingOrigin,
}

impl Finding {
    fn new(severity: Severity, entity: EntityKind, entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity,
            entity,
            entity_id: entity_id.map(str::to_string),
            field: None,
            message: message.into(),
            line: None,
            origin: FindingOrigin::Rule,
        }
    }
    pub fn error(entity: EntityKind, entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, entity, entity_id, message)
    }
    pub fn warning(entity: EntityKind, entity_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, entity, entity_id, message)
    }
    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }
    pub fn structural(mut self) -> Self {
        self.origin = FindingOrigin::Structural;
        self
    }
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
    pub fn to_json_value(&self) -> serde_json::Value {
        json!({
            "severity": match self.severity { Severity::Error => "error", Severity::Warning => "warning" },
            "entity": format!("{:?}", self.entity).to_lowercase(),
            "entity_id": self.entity_id,
            "field": self.field,
            "message": self.message,
            "line": self.line,
        })
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{severity}")?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        if let Some(id) = &self.entity_id {
            write!(f, " [{id}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

// ------------- Context -------------
/// Per-parse accumulator. Owns findings, never entities.
#[derive(Debug)]
pub struct ValidationContext {
    mode: ParseMode,
    findings: Vec<Finding>,
}

impl ValidationContext {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            findings: Vec::new(),
        }
    }
    pub fn mode(&self) -> ParseMode {
        self.mode
    }
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }
    /// The single gate for structural problems in the source text: strict
    /// mode turns them into an error, lenient mode records a warning and lets
    /// the caller drop the offending line.
    pub fn structural(&mut self, message: impl Into<String>, line: Option<usize>) -> Result<()> {
        let message = message.into();
        match self.mode {
            ParseMode::Strict => Err(GwError::structural(message, line)),
            ParseMode::Lenient => {
                warn!(line = line, %message, "skipping malformed input");
                self.findings.push(
                    Finding::warning(EntityKind::Source, None, message)
                        .at_line(line)
                        .structural(),
                );
                Ok(())
            }
        }
    }
    /// Same gate, for a problem inside a record whose owner is known. In
    /// lenient mode the finding is returned too, so the caller can attach it
    /// to the person or family it concerns.
    pub fn structural_for(
        &mut self,
        entity: EntityKind,
        id: &str,
        message: impl Into<String>,
        line: Option<usize>,
    ) -> Result<Finding> {
        let message = message.into();
        match self.mode {
            ParseMode::Strict => Err(GwError::structural(message, line)),
            ParseMode::Lenient => {
                warn!(line = line, owner = id, %message, "skipping malformed input");
                let finding = Finding::warning(entity, Some(id), message).at_line(line).structural();
                self.findings.push(finding.clone());
                Ok(finding)
            }
        }
    }
    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_error()).count()
    }
    pub fn warning_count(&self) -> usize {
        self.findings.len() - self.error_count()
    }
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

/// A value paired with the non-fatal findings gathered while producing it.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub value: T,
    pub findings: Vec<Finding>,
}

impl<T> Validated<T> {
    pub fn new(value: T, findings: Vec<Finding>) -> Self {
        Self { value, findings }
    }
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        Validated {
            value: f(self.value),
            findings: self.findings,
        }
    }
    pub fn into_parts(self) -> (T, Vec<Finding>) {
        (self.value, self.findings)
    }
    /// Findings report; the value itself is left to the caller's exporter.
    pub fn to_json_value(&self) -> serde_json::Value {
        json!({
            "errors": self.errors().count(),
            "warnings": self.warnings().count(),
            "findings": self.findings.iter().map(Finding::to_json_value).collect::<Vec<_>>(),
        })
    }
}

// ------------- Rules -------------
pub fn validate_person(person: &Person) -> Vec<Finding> {
    let id = person.id();
    let id = Some(id.as_str());
    let mut findings = Vec::new();

    if person.surname().trim().is_empty() {
        findings.push(Finding::error(EntityKind::Person, id, "surname is required").with_field("surname"));
    }
    if person.given_name().trim().is_empty() {
        findings.push(Finding::error(EntityKind::Person, id, "given name is required").with_field("given_name"));
    }
    if let (Some(birth), Some(death)) = (&person.birth_date, &person.death_date) {
        if birth.is_after(death) {
            findings.push(
                Finding::error(EntityKind::Person, id, format!("birth {birth} is after death {death}"))
                    .with_field("birth_date"),
            );
        }
    }
    if let (Some(death), Some(burial)) = (&person.death_date, &person.burial_date) {
        if death.is_after(burial) {
            findings.push(
                Finding::error(EntityKind::Person, id, format!("death {death} is after burial {burial}"))
                    .with_field("burial_date"),
            );
        }
    }
    if let (Some(birth), Some(baptism)) = (&person.birth_date, &person.baptism_date) {
        if baptism.is_before(birth) {
            findings.push(
                Finding::error(EntityKind::Person, id, format!("baptism {baptism} is before birth {birth}"))
                    .with_field("baptism_date"),
            );
        }
    }
    if person.death_date.is_some() && person.is_deceased != Some(true) {
        findings.push(
            Finding::warning(EntityKind::Person, id, "death date recorded but person not flagged deceased")
                .with_field("is_deceased"),
        );
    }
    if person.is_deceased == Some(true) && person.death_date.is_none() {
        findings.push(
            Finding::warning(EntityKind::Person, id, "person flagged deceased without a death date")
                .with_field("death_date"),
        );
    }
    findings
}

pub fn validate_family(family: &Family) -> Vec<Finding> {
    let id = Some(family.id());
    let mut findings = Vec::new();

    let spouses = family.spouses().count();
    if spouses == 0 && family.children().is_empty() {
        findings.push(Finding::warning(EntityKind::Family, id, "family has no members"));
    } else if spouses == 1 && family.children().is_empty() {
        findings.push(Finding::warning(
            EntityKind::Family,
            id,
            "family has a single spouse and no children",
        ));
    }
    if let (Some(marriage), Some(divorce)) = (&family.marriage_date, &family.divorce_date) {
        if marriage.is_after(divorce) {
            findings.push(
                Finding::error(EntityKind::Family, id, format!("marriage {marriage} is after divorce {divorce}"))
                    .with_field("marriage_date"),
            );
        }
    }
    if family.divorce_date.is_some() && !family.is_separated {
        findings.push(
            Finding::warning(EntityKind::Family, id, "divorce date recorded but family not flagged separated")
                .with_field("is_separated"),
        );
    }
    findings
}

/// Whole-graph check: dangling identities are errors, one-sided links are
/// warnings.
pub fn validate_graph(genealogy: &Genealogy) -> Vec<Finding> {
    let mut findings = Vec::new();

    for family in genealogy.families() {
        let fid = Some(family.id());
        for (role, member) in family
            .husband()
            .map(|h| ("husband", h))
            .into_iter()
            .chain(family.wife().map(|w| ("wife", w)))
        {
            match genealogy.person(member) {
                None => findings.push(
                    Finding::error(EntityKind::Family, fid, format!("{role} {member} is not a known person"))
                        .with_field(role),
                ),
                Some(p) if !p.families_as_spouse().iter().any(|f| f == family.id()) => findings.push(
                    Finding::warning(
                        EntityKind::Person,
                        Some(member),
                        format!("spouse does not list family {}", family.id()),
                    )
                    .with_field("families_as_spouse"),
                ),
                Some(_) => {}
            }
        }
        for child in family.children() {
            match genealogy.person(&child.person) {
                None => findings.push(
                    Finding::error(EntityKind::Family, fid, format!("child {} is not a known person", child.person))
                        .with_field("children"),
                ),
                Some(p) if !p.families_as_child().iter().any(|f| f == family.id()) => findings.push(
                    Finding::warning(
                        EntityKind::Person,
                        Some(&child.person),
                        format!("child does not list family {}", family.id()),
                    )
                    .with_field("families_as_child"),
                ),
                Some(_) => {}
            }
        }
    }

    for person in genealogy.persons() {
        let me = person.id();
        let links = person
            .families_as_spouse()
            .iter()
            .map(|fid| (fid, "families_as_spouse"))
            .chain(person.families_as_child().iter().map(|fid| (fid, "families_as_child")));
        for (fid, field) in links {
            let Some(family) = genealogy.family(fid) else {
                findings.push(
                    Finding::error(EntityKind::Person, Some(&me), format!("family {fid} is not a known family"))
                        .with_field(field),
                );
                continue;
            };
            let listed = if field == "families_as_spouse" {
                family.spouses().any(|s| s == me)
            } else {
                family.has_child(&me)
            };
            if !listed {
                findings.push(
                    Finding::warning(EntityKind::Family, Some(fid), format!("family does not list {me}"))
                        .with_field(field),
                );
            }
        }
    }
    findings
}

// ------------- Recovery -------------
fn or_unknown(part: &str) -> &str {
    if part.trim().is_empty() { "?" } else { part }
}

/// Placeholder for a person whose record could not be completed.
pub fn partial_person(surname: &str, given_name: &str, occurrence: u32, message: &str, line: Option<usize>) -> Person {
    let surname = or_unknown(surname);
    let given_name = or_unknown(given_name);
    let mut person = Person::new(surname, given_name, occurrence);
    let id = person_key(surname, given_name, occurrence);
    person.add_finding(
        Finding::error(EntityKind::Person, Some(&id), message)
            .at_line(line)
            .structural(),
    );
    person
}

/// Placeholder for a family whose record could not be completed.
pub fn partial_family(
    id: &str,
    husband: Option<String>,
    wife: Option<String>,
    message: &str,
    line: Option<usize>,
) -> Family {
    let mut family = Family::new(id).with_husband(husband).with_wife(wife);
    family.add_finding(
        Finding::error(EntityKind::Family, Some(id), message)
            .at_line(line)
            .structural(),
    );
    family
}
