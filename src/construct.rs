use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};

// we will use a fast hashing algo for hashmaps and hashsets keyed by identities
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::hash::Hash;

// timestamps in the metadata
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// our own stuff that we need
use crate::entity::{Child, Family, FamilyId, Gender, Person, PersonId, name_key, person_key};
use crate::error::{GwError, Result};
use crate::validation::{self, Finding};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Occurrences -------------
/// Keeps track of which occurrence numbers are taken for every name, so that
/// two distinct people sharing a name get distinct identities.
#[derive(Debug, Default)]
pub struct OccurrenceGenerator {
    retained: HashMap<String, HashSet<u32, OtherHasher>, OtherHasher>,
}

impl OccurrenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn retain(&mut self, name: &str, occurrence: u32) {
        self.retained
            .entry(name.to_string())
            .or_default()
            .insert(occurrence);
    }
    pub fn release(&mut self, name: &str, occurrence: u32) {
        if let Some(taken) = self.retained.get_mut(name) {
            taken.remove(&occurrence);
            if taken.is_empty() {
                self.retained.remove(name);
            }
        }
    }
    /// Lowest free occurrence for the name, retained before it is returned.
    pub fn generate(&mut self, name: &str) -> u32 {
        let taken = self.retained.entry(name.to_string()).or_default();
        let mut occurrence = 0;
        while taken.contains(&occurrence) {
            occurrence += 1;
        }
        taken.insert(occurrence);
        occurrence
    }
}

// ------------- Lookup -------------
#[derive(Debug)]
pub struct Lookup<K, V, H> {
    index: HashMap<K, HashSet<V>, H>,
}

impl<K: Eq + Hash, V: Eq + Hash, H: std::hash::BuildHasher + Default> Lookup<K, V, H> {
    pub fn new() -> Self {
        Self {
            index: HashMap::<K, HashSet<V>, H>::default(),
        }
    }
    pub fn insert(&mut self, key: K, value: V) {
        let set = self.index.entry(key).or_default();
        set.insert(value);
    }
    pub fn remove(&mut self, key: &K, value: &V) {
        if let Some(set) = self.index.get_mut(key) {
            set.remove(value);
            if set.is_empty() {
                self.index.remove(key);
            }
        }
    }
    pub fn lookup(&self, key: &K) -> Option<&HashSet<V>> {
        self.index.get(key)
    }
    pub fn clear(&mut self) {
        self.index.clear();
    }
}

impl<K: Eq + Hash, V: Eq + Hash, H: std::hash::BuildHasher + Default> Default for Lookup<K, V, H> {
    fn default() -> Self {
        Self::new()
    }
}

type CoupleKey = (Option<PersonId>, Option<PersonId>);

fn couple_key(family: &Family) -> CoupleKey {
    (
        family.husband().map(str::to_string),
        family.wife().map(str::to_string),
    )
}

// ------------- Metadata -------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source_file: Option<String>,
    pub encoding: String,
    pub is_gwplus: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub database_notes: Vec<String>,
    pub wizard_notes: BTreeMap<String, Vec<String>>,
}

impl Default for Metadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            source_file: None,
            encoding: String::from("utf-8"),
            is_gwplus: false,
            created: now,
            modified: now,
            database_notes: Vec::new(),
            wizard_notes: BTreeMap::new(),
        }
    }
}

// ------------- Statistics -------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub persons: usize,
    pub families: usize,
    pub children: usize,
    pub males: usize,
    pub females: usize,
    pub unknown_gender: usize,
    pub living: usize,
    pub deceased: usize,
    pub with_birth_date: usize,
    pub with_death_date: usize,
    pub families_with_children: usize,
}

impl Statistics {
    fn compute(genealogy: &Genealogy) -> Self {
        let mut stats = Statistics {
            persons: genealogy.person_count(),
            families: genealogy.family_count(),
            ..Statistics::default()
        };
        for person in genealogy.persons() {
            match person.gender {
                Gender::Male => stats.males += 1,
                Gender::Female => stats.females += 1,
                Gender::Unknown => stats.unknown_gender += 1,
            }
            if person.is_living() {
                stats.living += 1;
            } else {
                stats.deceased += 1;
            }
            if person.birth_date.is_some() {
                stats.with_birth_date += 1;
            }
            if person.death_date.is_some() {
                stats.with_death_date += 1;
            }
        }
        for family in genealogy.families() {
            stats.children += family.children().len();
            if !family.children().is_empty() {
                stats.families_with_children += 1;
            }
        }
        stats
    }
}

// ------------- Genealogy -------------
/// The parsed graph: persons keyed by identity, families keyed by identifier,
/// plus the indexes that keep both sides of every membership in step.
#[derive(Debug, Default)]
pub struct Genealogy {
    persons: HashMap<PersonId, Person, OtherHasher>,
    person_order: Vec<PersonId>,
    families: HashMap<FamilyId, Family, OtherHasher>,
    family_order: Vec<FamilyId>,
    // owns the identity resolver
    occurrences: OccurrenceGenerator,
    // (husband, wife) -> families, used to resolve couple references
    couple_lookup: Lookup<CoupleKey, FamilyId, OtherHasher>,
    family_sequence: u32,
    // the family that an orphan `beg ... end` list continues
    current_family: Option<FamilyId>,
    pub metadata: Metadata,
    statistics: OnceCell<Statistics>,
}

impl Genealogy {
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self) {
        self.statistics.take();
    }

    // ---- read accessors ----
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.get(id)
    }
    pub fn family(&self, id: &str) -> Option<&Family> {
        self.families.get(id)
    }
    /// Mutable access for non-membership fields. Statistics are invalidated.
    pub fn person_mut(&mut self, id: &str) -> Option<&mut Person> {
        self.touch();
        self.persons.get_mut(id)
    }
    pub fn family_mut(&mut self, id: &str) -> Option<&mut Family> {
        self.touch();
        self.families.get_mut(id)
    }
    /// Persons in the order they were first created.
    pub fn persons(&self) -> impl Iterator<Item = &Person> {
        self.person_order.iter().filter_map(|id| self.persons.get(id))
    }
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.family_order.iter().filter_map(|id| self.families.get(id))
    }
    pub fn person_ids(&self) -> &[PersonId] {
        &self.person_order
    }
    pub fn family_ids(&self) -> &[FamilyId] {
        &self.family_order
    }
    pub fn person_count(&self) -> usize {
        self.persons.len()
    }
    pub fn family_count(&self) -> usize {
        self.families.len()
    }
    pub fn contains_person(&self, id: &str) -> bool {
        self.persons.contains_key(id)
    }
    pub fn latest_family_id(&self) -> Option<&str> {
        self.family_order.last().map(String::as_str)
    }
    /// The family most recently attached or addressed by a `fevt` block.
    pub fn current_family_id(&self) -> Option<&str> {
        self.current_family.as_deref()
    }
    pub(crate) fn focus_family(&mut self, id: &str) {
        if self.families.contains_key(id) {
            self.current_family = Some(id.to_string());
        }
    }
    pub fn find_person(&self, surname: &str, given_name: &str, occurrence: u32) -> Option<&Person> {
        self.person(&person_key(surname, given_name, occurrence))
    }
    /// Families recorded for exactly this couple, ordered by identifier.
    pub fn families_of_couple(&self, husband: Option<&str>, wife: Option<&str>) -> Vec<FamilyId> {
        let key = (husband.map(str::to_string), wife.map(str::to_string));
        let mut ids: Vec<FamilyId> = self
            .couple_lookup
            .lookup(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    // ---- navigation ----
    pub fn families_of(&self, person: &str) -> Vec<&Family> {
        let Some(p) = self.person(person) else {
            return Vec::new();
        };
        p.families_as_spouse()
            .iter()
            .chain(p.families_as_child())
            .filter_map(|fid| self.family(fid))
            .collect()
    }
    pub fn parents_of(&self, person: &str) -> Vec<&Person> {
        let Some(p) = self.person(person) else {
            return Vec::new();
        };
        p.families_as_child()
            .iter()
            .filter_map(|fid| self.family(fid))
            .flat_map(|f| f.spouses())
            .filter_map(|id| self.person(id))
            .collect()
    }
    pub fn children_of(&self, person: &str) -> Vec<&Person> {
        let Some(p) = self.person(person) else {
            return Vec::new();
        };
        p.families_as_spouse()
            .iter()
            .filter_map(|fid| self.family(fid))
            .flat_map(|f| f.children())
            .filter_map(|c| self.person(&c.person))
            .collect()
    }
    pub fn spouses_of(&self, person: &str) -> Vec<&Person> {
        let Some(p) = self.person(person) else {
            return Vec::new();
        };
        p.families_as_spouse()
            .iter()
            .filter_map(|fid| self.family(fid))
            .flat_map(|f| f.spouses())
            .filter(|id| *id != person)
            .filter_map(|id| self.person(id))
            .collect()
    }
    pub fn siblings_of(&self, person: &str) -> Vec<&Person> {
        let Some(p) = self.person(person) else {
            return Vec::new();
        };
        let mut seen = HashSet::<&str, OtherHasher>::default();
        p.families_as_child()
            .iter()
            .filter_map(|fid| self.family(fid))
            .flat_map(|f| f.children())
            .map(|c| c.person.as_str())
            .filter(|id| *id != person && seen.insert(*id))
            .filter_map(|id| self.person(id))
            .collect()
    }

    // ---- identity resolver ----
    /// Returns the identity for the name, creating the person when absent.
    /// Without an explicit occurrence the name resolves to occurrence 0.
    pub fn get_or_create_person(&mut self, surname: &str, given_name: &str, occurrence: Option<u32>) -> PersonId {
        let occurrence = occurrence.unwrap_or(0);
        let id = person_key(surname, given_name, occurrence);
        if !self.persons.contains_key(&id) {
            self.store_person(Person::new(surname, given_name, occurrence));
        }
        id
    }

    /// Always creates a new individual, taking the lowest free occurrence.
    pub fn create_distinct_person(&mut self, surname: &str, given_name: &str) -> PersonId {
        let occurrence = self.occurrences.generate(&name_key(surname, given_name));
        let person = Person::new(surname, given_name, occurrence);
        let id = person.id();
        self.store_person(person);
        id
    }

    pub fn insert_person(&mut self, person: Person) -> Result<PersonId> {
        let id = person.id();
        if self.persons.contains_key(&id) {
            return Err(GwError::Duplicate(id));
        }
        self.store_person(person);
        Ok(id)
    }

    fn store_person(&mut self, person: Person) {
        let id = person.id();
        self.occurrences
            .retain(&name_key(person.surname(), person.given_name()), person.occurrence());
        debug!(person = %id, "person created");
        self.person_order.push(id.clone());
        self.persons.insert(id, person);
        self.touch();
    }

    /// Removes the person and every membership naming them.
    pub fn remove_person(&mut self, id: &str) -> Result<Person> {
        let person = self
            .persons
            .remove(id)
            .ok_or_else(|| GwError::UnknownEntity(id.to_string()))?;
        self.person_order.retain(|p| p != id);
        self.occurrences
            .release(&name_key(person.surname(), person.given_name()), person.occurrence());
        let linked: Vec<FamilyId> = person
            .families_as_spouse()
            .iter()
            .chain(person.families_as_child())
            .cloned()
            .collect();
        for fid in linked {
            if let Some(family) = self.families.get_mut(&fid) {
                let before = couple_key(family);
                family.forget_person(id);
                let after = couple_key(family);
                if before != after {
                    self.couple_lookup.remove(&before, &fid);
                    self.couple_lookup.insert(after, fid.clone());
                }
            }
        }
        self.touch();
        Ok(person)
    }

    // ---- families ----
    /// Next free identifier of the form `FAM_001`.
    pub fn next_family_id(&mut self) -> FamilyId {
        loop {
            self.family_sequence += 1;
            let id = format!("FAM_{:03}", self.family_sequence);
            if !self.families.contains_key(&id) {
                return id;
            }
        }
    }

    /// Stores the family and links every known member back to it.
    pub fn attach_family(&mut self, family: Family) -> Result<FamilyId> {
        let id = family.id().to_string();
        if self.families.contains_key(&id) {
            return Err(GwError::Duplicate(id));
        }
        self.link_members(&family);
        self.couple_lookup.insert(couple_key(&family), id.clone());
        debug!(family = %id, children = family.children().len(), "family attached");
        self.family_order.push(id.clone());
        self.families.insert(id.clone(), family);
        self.current_family = Some(id.clone());
        self.touch();
        Ok(id)
    }

    pub fn add_child(&mut self, family_id: &str, child: Child) -> Result<()> {
        let family = self
            .families
            .get_mut(family_id)
            .ok_or_else(|| GwError::UnknownEntity(family_id.to_string()))?;
        if let Some(person) = self.persons.get_mut(&child.person) {
            person.link_child(family_id);
        }
        family.push_child(child);
        self.touch();
        Ok(())
    }

    pub fn remove_family(&mut self, id: &str) -> Result<Family> {
        let family = self
            .families
            .remove(id)
            .ok_or_else(|| GwError::UnknownEntity(id.to_string()))?;
        self.family_order.retain(|f| f != id);
        if self.current_family.as_deref() == Some(id) {
            self.current_family = self.family_order.last().cloned();
        }
        self.couple_lookup.remove(&couple_key(&family), &family.id().to_string());
        for member in family.members() {
            if let Some(person) = self.persons.get_mut(member) {
                person.unlink_family(id);
            }
        }
        self.touch();
        Ok(family)
    }

    fn link_members(&mut self, family: &Family) {
        for spouse in family.spouses() {
            if let Some(person) = self.persons.get_mut(spouse) {
                person.link_spouse(family.id());
            }
        }
        for child in family.children() {
            if let Some(person) = self.persons.get_mut(&child.person) {
                person.link_child(family.id());
            }
        }
    }

    /// Rebuilds every back-reference list and the couple index from the
    /// families alone. Running it any number of times gives the same result.
    pub fn sync_cross_references(&mut self) {
        for person in self.persons.values_mut() {
            person.clear_family_links();
        }
        self.couple_lookup.clear();
        let order = self.family_order.clone();
        for fid in &order {
            if let Some(family) = self.families.remove(fid) {
                self.link_members(&family);
                self.couple_lookup.insert(couple_key(&family), fid.clone());
                self.families.insert(fid.clone(), family);
            }
        }
        self.touch();
    }

    // ---- validation ----
    /// Whole-graph findings for the current state. Nothing is attached.
    pub fn validate_consistency(&self) -> Vec<Finding> {
        validation::validate_graph(self)
    }

    /// Re-runs the per-entity rules, replacing earlier rule findings on every
    /// entity, and returns everything that was found.
    pub fn revalidate(&mut self) -> Vec<Finding> {
        let mut all = Vec::new();
        for id in &self.person_order {
            if let Some(person) = self.persons.get_mut(id) {
                let findings = validation::validate_person(person);
                all.extend(findings.iter().cloned());
                person.replace_rule_findings(findings);
            }
        }
        for id in &self.family_order {
            if let Some(family) = self.families.get_mut(id) {
                let findings = validation::validate_family(family);
                all.extend(findings.iter().cloned());
                family.replace_rule_findings(findings);
            }
        }
        all
    }

    pub fn statistics(&self) -> &Statistics {
        self.statistics.get_or_init(|| Statistics::compute(self))
    }
}
