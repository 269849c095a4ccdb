//! Persons, families and the events attached to them.
//!
//! Identity fields are private so an entity cannot be re-keyed once the
//! aggregate holds it; membership lists (spouses, children, back-references)
//! are private too and only change through [`crate::construct::Genealogy`]
//! or the explicit mutators that document their cross-reference contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::date::Date;
use crate::validation::{Finding, FindingOrigin, Severity};

pub type PersonId = String;
pub type FamilyId = String;

/// Canonical person identity: `surname_given_occurrence`, whitespace inside
/// each name part collapsed to `_`.
pub fn person_key(surname: &str, given_name: &str, occurrence: u32) -> PersonId {
    format!("{}_{}", name_key(surname, given_name), occurrence)
}

/// The occurrence-free part of a person identity.
pub fn name_key(surname: &str, given_name: &str) -> String {
    format!("{}_{}", normalize(surname), normalize(given_name))
}

fn normalize(part: &str) -> String {
    part.split_whitespace().collect::<Vec<_>>().join("_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// `h`/`m` for men, `f` for women, as used on child and witness lines.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "h" | "m" => Some(Gender::Male),
            "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AccessLevel {
    Public,
    Private,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BurialKind {
    Buried,
    Cremated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MarriageStatus {
    #[default]
    Married,
    NotMarried,
    Engaged,
    Separated,
    Divorced,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Title {
    pub name: String,
    pub title_type: Option<String>,
    pub place: Option<String>,
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub number: Option<u32>,
    pub main: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub person: PersonId,
    pub sex: Gender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Adoption,
    Recognition,
    Candidate,
    Godparent,
    Foster,
}

impl RelationKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "adop" => Some(RelationKind::Adoption),
            "reco" => Some(RelationKind::Recognition),
            "cand" => Some(RelationKind::Candidate),
            "godp" => Some(RelationKind::Godparent),
            "fost" => Some(RelationKind::Foster),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRole {
    Father,
    Mother,
}

/// A non-biological link from the owning person to `person`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub role: Option<ParentRole>,
    pub person: PersonId,
}

// ------------- Events -------------
/// An event vocabulary. Personal and family vocabularies are distinct types,
/// so a family event can never be stored on a person and vice versa.
pub trait EventKind: Copy + Eq + fmt::Debug + Serialize {
    const SCOPE: &'static str;
    fn from_tag(tag: &str) -> Option<Self>;
    fn tag(&self) -> &'static str;
    fn scope(&self) -> &'static str {
        Self::SCOPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonalEventKind {
    Birth,
    Baptism,
    Death,
    Burial,
    Cremation,
    Confirmation,
    FirstCommunion,
    Ordination,
    Excommunication,
    Naturalization,
    Occupation,
    Residence,
    Education,
    Graduation,
    MilitaryService,
}

impl EventKind for PersonalEventKind {
    const SCOPE: &'static str = "personal";
    fn from_tag(tag: &str) -> Option<Self> {
        use PersonalEventKind::*;
        match tag {
            "birt" => Some(Birth),
            "bapt" => Some(Baptism),
            "deat" => Some(Death),
            "buri" => Some(Burial),
            "crem" => Some(Cremation),
            "conf" => Some(Confirmation),
            "fcom" => Some(FirstCommunion),
            "ordn" => Some(Ordination),
            "exco" => Some(Excommunication),
            "natu" => Some(Naturalization),
            "occu" => Some(Occupation),
            "resi" => Some(Residence),
            "educ" => Some(Education),
            "grad" => Some(Graduation),
            "mser" => Some(MilitaryService),
            _ => None,
        }
    }
    fn tag(&self) -> &'static str {
        use PersonalEventKind::*;
        match self {
            Birth => "birt",
            Baptism => "bapt",
            Death => "deat",
            Burial => "buri",
            Cremation => "crem",
            Confirmation => "conf",
            FirstCommunion => "fcom",
            Ordination => "ordn",
            Excommunication => "exco",
            Naturalization => "natu",
            Occupation => "occu",
            Residence => "resi",
            Education => "educ",
            Graduation => "grad",
            MilitaryService => "mser",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FamilyEventKind {
    Marriage,
    NoMarriage,
    NoMention,
    Engagement,
    Divorce,
    Separation,
    Annulment,
    MarriageBann,
    MarriageContract,
    MarriageLicense,
    Pacs,
    Residence,
    NameString,
}

impl EventKind for FamilyEventKind {
    const SCOPE: &'static str = "family";
    fn from_tag(tag: &str) -> Option<Self> {
        use FamilyEventKind::*;
        match tag {
            "marr" => Some(Marriage),
            "nmar" => Some(NoMarriage),
            "nmen" => Some(NoMention),
            "enga" => Some(Engagement),
            "div" => Some(Divorce),
            "sep" => Some(Separation),
            "anul" => Some(Annulment),
            "marb" => Some(MarriageBann),
            "marc" => Some(MarriageContract),
            "marl" => Some(MarriageLicense),
            "pacs" => Some(Pacs),
            "resi" => Some(Residence),
            "strng" => Some(NameString),
            _ => None,
        }
    }
    fn tag(&self) -> &'static str {
        use FamilyEventKind::*;
        match self {
            Marriage => "marr",
            NoMarriage => "nmar",
            NoMention => "nmen",
            Engagement => "enga",
            Divorce => "div",
            Separation => "sep",
            Annulment => "anul",
            MarriageBann => "marb",
            MarriageContract => "marc",
            MarriageLicense => "marl",
            Pacs => "pacs",
            Residence => "resi",
            NameString => "strng",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<K: EventKind> {
    pub kind: K,
    pub date: Option<Date>,
    pub place: Option<String>,
    pub source: Option<String>,
    pub reason: Option<String>,
    pub witnesses: Vec<Witness>,
    pub notes: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl<K: EventKind> Event<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            date: None,
            place: None,
            source: None,
            reason: None,
            witnesses: Vec::new(),
            notes: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
    pub fn is_family_event(&self) -> bool {
        K::SCOPE == FamilyEventKind::SCOPE
    }
}

pub type PersonalEvent = Event<PersonalEventKind>;
pub type FamilyEvent = Event<FamilyEventKind>;

// ------------- Person -------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    surname: String,
    given_name: String,
    occurrence: u32,
    pub gender: Gender,
    pub birth_date: Option<Date>,
    pub birth_place: Option<String>,
    pub baptism_date: Option<Date>,
    pub baptism_place: Option<String>,
    pub death_date: Option<Date>,
    pub death_place: Option<String>,
    pub burial_date: Option<Date>,
    pub burial_place: Option<String>,
    pub burial: Option<BurialKind>,
    pub is_deceased: Option<bool>,
    pub occupation: Option<String>,
    pub access: AccessLevel,
    pub titles: Vec<Title>,
    pub events: Vec<PersonalEvent>,
    pub relations: Vec<Relation>,
    pub notes: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    families_as_spouse: Vec<FamilyId>,
    families_as_child: Vec<FamilyId>,
    findings: Vec<Finding>,
}

impl Person {
    pub fn new(surname: impl Into<String>, given_name: impl Into<String>, occurrence: u32) -> Self {
        Self {
            surname: surname.into(),
            given_name: given_name.into(),
            occurrence,
            gender: Gender::Unknown,
            birth_date: None,
            birth_place: None,
            baptism_date: None,
            baptism_place: None,
            death_date: None,
            death_place: None,
            burial_date: None,
            burial_place: None,
            burial: None,
            is_deceased: None,
            occupation: None,
            access: AccessLevel::Default,
            titles: Vec::new(),
            events: Vec::new(),
            relations: Vec::new(),
            notes: Vec::new(),
            metadata: BTreeMap::new(),
            families_as_spouse: Vec::new(),
            families_as_child: Vec::new(),
            findings: Vec::new(),
        }
    }
    pub fn id(&self) -> PersonId {
        person_key(&self.surname, &self.given_name, self.occurrence)
    }
    pub fn surname(&self) -> &str {
        &self.surname
    }
    pub fn given_name(&self) -> &str {
        &self.given_name
    }
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.surname)
    }
    pub fn families_as_spouse(&self) -> &[FamilyId] {
        &self.families_as_spouse
    }
    pub fn families_as_child(&self) -> &[FamilyId] {
        &self.families_as_child
    }
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
    /// A person carrying an error-severity finding is invalid but still usable.
    pub fn is_valid(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Error)
    }
    pub fn is_living(&self) -> bool {
        self.is_deceased != Some(true) && self.death_date.is_none()
    }
    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
    pub(crate) fn replace_rule_findings(&mut self, findings: Vec<Finding>) {
        self.findings.retain(|f| f.origin == FindingOrigin::Structural);
        self.findings.extend(findings);
    }

    // back-references are only touched by the aggregate
    pub(crate) fn link_spouse(&mut self, family: &str) {
        if !self.families_as_spouse.iter().any(|f| f == family) {
            self.families_as_spouse.push(family.to_string());
        }
    }
    pub(crate) fn link_child(&mut self, family: &str) {
        if !self.families_as_child.iter().any(|f| f == family) {
            self.families_as_child.push(family.to_string());
        }
    }
    pub(crate) fn unlink_family(&mut self, family: &str) {
        self.families_as_spouse.retain(|f| f != family);
        self.families_as_child.retain(|f| f != family);
    }
    pub(crate) fn clear_family_links(&mut self) {
        self.families_as_spouse.clear();
        self.families_as_child.clear();
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.surname, self.given_name)?;
        if self.occurrence > 0 {
            write!(f, ".{}", self.occurrence)?;
        }
        Ok(())
    }
}

// ------------- Family -------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub person: PersonId,
    pub sex: Gender,
    pub surname_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    id: FamilyId,
    husband: Option<PersonId>,
    wife: Option<PersonId>,
    pub marriage_date: Option<Date>,
    pub marriage_place: Option<String>,
    pub marriage_source: Option<String>,
    pub status: MarriageStatus,
    pub divorce_date: Option<Date>,
    pub is_separated: bool,
    children: Vec<Child>,
    pub witnesses: Vec<Witness>,
    pub events: Vec<FamilyEvent>,
    pub comments: Vec<String>,
    pub source: Option<String>,
    pub common_birth_place: Option<String>,
    pub common_children_source: Option<String>,
    findings: Vec<Finding>,
}

impl Family {
    pub fn new(id: impl Into<FamilyId>) -> Self {
        Self {
            id: id.into(),
            husband: None,
            wife: None,
            marriage_date: None,
            marriage_place: None,
            marriage_source: None,
            status: MarriageStatus::Married,
            divorce_date: None,
            is_separated: false,
            children: Vec::new(),
            witnesses: Vec::new(),
            events: Vec::new(),
            comments: Vec::new(),
            source: None,
            common_birth_place: None,
            common_children_source: None,
            findings: Vec::new(),
        }
    }
    pub fn with_husband(mut self, husband: Option<PersonId>) -> Self {
        self.husband = husband;
        self
    }
    pub fn with_wife(mut self, wife: Option<PersonId>) -> Self {
        self.wife = wife;
        self
    }
    /// Appends a child before the family is attached. Once attached, use
    /// [`crate::construct::Genealogy::add_child`] so the back-reference follows.
    pub fn push_child(&mut self, child: Child) {
        self.children.push(child);
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn husband(&self) -> Option<&str> {
        self.husband.as_deref()
    }
    pub fn wife(&self) -> Option<&str> {
        self.wife.as_deref()
    }
    pub fn children(&self) -> &[Child] {
        &self.children
    }
    pub fn has_child(&self, person: &str) -> bool {
        self.children.iter().any(|c| c.person == person)
    }
    pub fn spouses(&self) -> impl Iterator<Item = &str> {
        self.husband().into_iter().chain(self.wife())
    }
    /// Every person named by the family: spouses first, then children in order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.spouses()
            .chain(self.children.iter().map(|c| c.person.as_str()))
    }
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
    pub fn is_valid(&self) -> bool {
        !self.findings.iter().any(|f| f.severity == Severity::Error)
    }
    pub fn add_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }
    pub(crate) fn replace_rule_findings(&mut self, findings: Vec<Finding>) {
        self.findings.retain(|f| f.origin == FindingOrigin::Structural);
        self.findings.extend(findings);
    }
    pub(crate) fn forget_person(&mut self, person: &str) {
        if self.husband.as_deref() == Some(person) {
            self.husband = None;
        }
        if self.wife.as_deref() == Some(person) {
            self.wife = None;
        }
        self.children.retain(|c| c.person != person);
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({} + {}, {} children)",
            self.id,
            self.husband.as_deref().unwrap_or("?"),
            self.wife.as_deref().unwrap_or("?"),
            self.children.len()
        )
    }
}
