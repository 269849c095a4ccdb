//! One parser per record kind.
//!
//! Every parser consumes a [`RecordSpan`] produced by the tokenizer and mutates
//! the [`Genealogy`] in place. Problems with the text go through
//! [`ValidationContext::structural`], or [`ValidationContext::structural_for`]
//! once the record's owner is known, so the strict/lenient decision is made in
//! exactly one spot for every record kind. Findings of the second kind end up
//! on the person or family as well. Dates are always read with
//! [`Date::parse_with_fallback`].

use std::iter::Peekable;
use std::str::SplitWhitespace;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::construct::Genealogy;
use crate::date::Date;
use crate::entity::{
    AccessLevel, BurialKind, Child, Event, EventKind, Family, FamilyEvent, FamilyEventKind, FamilyId,
    Gender, MarriageStatus, ParentRole, Person, PersonId, PersonalEvent, PersonalEventKind, Relation,
    RelationKind, Title, Witness,
};
use crate::error::Result;
use crate::tokenizer::{RecordKind, RecordSpan, SourceLine};
use crate::validation::{self, EntityKind, Finding, ValidationContext};

lazy_static! {
    static ref DATE_TOKEN: Regex =
        Regex::new(r"^(?:0\(.*\)|[~?<>]?[kmes]?[0-9][0-9/|.]*[JFH]?)$").unwrap();
    static ref OCCURRENCE: Regex = Regex::new(r"^(.+)\.([0-9]+)$").unwrap();
    static ref WITNESS: Regex = Regex::new(r"^wit\s*([mfh])?\s*:\s*(.*)$").unwrap();
    static ref RELATION: Regex = Regex::new(r"^-\s*([a-z]+)(?:\s+(fath|moth))?\s*:\s*(.+)$").unwrap();
}

type Tokens<'a> = Peekable<SplitWhitespace<'a>>;

fn is_date_token(token: &str) -> bool {
    DATE_TOKEN.is_match(token)
}

fn is_name_token(token: &str) -> bool {
    !token.starts_with('#') && !token.starts_with('[') && !token.starts_with('+') && !is_date_token(token)
}

// ------------- Names -------------
/// A person as named in the text: `SURNAME Given` or `SURNAME Given.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRef {
    pub surname: String,
    pub given_name: String,
    pub occurrence: Option<u32>,
}

impl PersonRef {
    pub fn new(surname: &str, given: &str) -> Self {
        let (given_name, occurrence) = match OCCURRENCE.captures(given) {
            Some(caps) => (caps[1].to_string(), caps[2].parse().ok()),
            None => (given.to_string(), None),
        };
        Self {
            surname: surname.to_string(),
            given_name,
            occurrence,
        }
    }
    pub fn resolve(&self, genealogy: &mut Genealogy) -> PersonId {
        genealogy.get_or_create_person(&self.surname, &self.given_name, self.occurrence)
    }
}

fn take_person_ref(tokens: &mut Tokens<'_>) -> std::result::Result<PersonRef, String> {
    let surname = tokens
        .next_if(|t| is_name_token(t))
        .ok_or_else(|| String::from("missing surname"))?;
    let given = tokens
        .next_if(|t| is_name_token(t))
        .ok_or_else(|| format!("missing given name after `{surname}`"))?;
    Ok(PersonRef::new(surname, given))
}

pub fn parse_person_ref(text: &str) -> std::result::Result<PersonRef, String> {
    take_person_ref(&mut text.split_whitespace().peekable())
}

/// A header that names exactly one person, with whatever trails the name.
fn parse_header_ref(text: &str) -> std::result::Result<(PersonRef, Option<String>), String> {
    let mut tokens = text.split_whitespace().peekable();
    let person = take_person_ref(&mut tokens)?;
    let rest = tokens.collect::<Vec<_>>().join(" ");
    Ok((person, (!rest.is_empty()).then_some(rest)))
}

// ------------- Inline person information -------------
#[derive(Debug, Default)]
struct InlineInfo {
    birth: Option<Date>,
    death: Option<Date>,
    birth_place: Option<String>,
    death_place: Option<String>,
    occupation: Option<String>,
    access: Option<AccessLevel>,
    titles: Vec<Title>,
}

impl InlineInfo {
    fn apply(self, person: &mut Person) {
        if self.birth.is_some() {
            person.birth_date = self.birth;
        }
        if self.death.is_some() {
            person.death_date = self.death;
            person.is_deceased = Some(true);
        }
        if self.birth_place.is_some() {
            person.birth_place = self.birth_place;
        }
        if self.death_place.is_some() {
            person.death_place = self.death_place;
        }
        if self.occupation.is_some() {
            person.occupation = self.occupation;
        }
        if let Some(access) = self.access {
            person.access = access;
        }
        person.titles.extend(self.titles);
    }
}

#[derive(Debug)]
struct MarriageInfo {
    date: Option<Date>,
    place: Option<String>,
    source: Option<String>,
    status: MarriageStatus,
    separated: bool,
    divorce_date: Option<Date>,
}

impl Default for MarriageInfo {
    fn default() -> Self {
        Self {
            date: None,
            place: None,
            source: None,
            status: MarriageStatus::Married,
            separated: false,
            divorce_date: None,
        }
    }
}

impl MarriageInfo {
    // true when the token belonged to the marriage
    fn take(&mut self, token: &str, tokens: &mut Tokens<'_>) -> bool {
        match token {
            "#mp" => self.place = tokens.next().map(str::to_string),
            "#ms" => self.source = tokens.next().map(str::to_string),
            "#nm" => self.status = MarriageStatus::NotMarried,
            "#eng" => self.status = MarriageStatus::Engaged,
            "#sep" => {
                self.status = MarriageStatus::Separated;
                self.separated = true;
            }
            "#div" => {
                self.status = MarriageStatus::Divorced;
                self.separated = true;
                if let Some(date) = tokens.next_if(|t| is_date_token(t)) {
                    self.divorce_date = Some(Date::parse_with_fallback(date));
                }
            }
            _ => return false,
        }
        true
    }
    fn apply(self, family: &mut Family) {
        family.marriage_date = self.date;
        family.marriage_place = self.place;
        family.marriage_source = self.source;
        family.status = self.status;
        family.is_separated = self.separated;
        family.divorce_date = self.divorce_date;
    }
}

// `[*name:type:place:start:end:number]`, possibly split over several tokens
fn take_title(first: &str, tokens: &mut Tokens<'_>) -> Title {
    let mut raw = first.to_string();
    while !raw.ends_with(']') {
        match tokens.next() {
            Some(t) => {
                raw.push(' ');
                raw.push_str(t);
            }
            None => break,
        }
    }
    let inner = raw.trim_start_matches('[').trim_end_matches(']');
    let (main, inner) = match inner.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    let mut fields = inner.split(':').map(str::trim);
    let mut field = || fields.next().filter(|f| !f.is_empty());
    Title {
        name: field().unwrap_or_default().to_string(),
        title_type: field().map(str::to_string),
        place: field().map(str::to_string),
        start: field().map(Date::parse_with_fallback),
        end: field().map(Date::parse_with_fallback),
        number: field().and_then(|n| n.parse().ok()),
        main,
    }
}

/// Reads everything after a name. Marriage tokens are accepted too when a
/// marriage is given; anything else is reported in `notices`.
fn take_inline(
    tokens: &mut Tokens<'_>,
    mut marriage: Option<&mut MarriageInfo>,
    notices: &mut Vec<String>,
) -> InlineInfo {
    let mut info = InlineInfo::default();
    while let Some(token) = tokens.next() {
        if let Some(m) = marriage.as_deref_mut() {
            if m.take(token, tokens) {
                continue;
            }
        }
        match token {
            "#bp" => info.birth_place = tokens.next().map(str::to_string),
            "#dp" => info.death_place = tokens.next().map(str::to_string),
            "#occu" => info.occupation = tokens.next().map(str::to_string),
            "#apubl" => info.access = Some(AccessLevel::Public),
            "#apriv" => info.access = Some(AccessLevel::Private),
            t if t.starts_with('[') => info.titles.push(take_title(t, tokens)),
            t if is_date_token(t) && info.birth.is_none() => info.birth = Some(Date::parse_with_fallback(t)),
            t if is_date_token(t) && info.death.is_none() => info.death = Some(Date::parse_with_fallback(t)),
            t => notices.push(format!("unexpected token `{t}`")),
        }
    }
    info
}

fn update_person(genealogy: &mut Genealogy, id: &str, update: impl FnOnce(&mut Person)) {
    if let Some(person) = genealogy.person_mut(id) {
        update(person);
    }
}

fn set_gender_if_unknown(genealogy: &mut Genealogy, id: &str, gender: Gender) {
    if gender == Gender::Unknown {
        return;
    }
    update_person(genealogy, id, |p| {
        if p.gender == Gender::Unknown {
            p.gender = gender;
        }
    });
}

/// The entity a dropped line inside a record is reported against.
#[derive(Debug, Clone, Copy)]
struct Owner<'a> {
    kind: EntityKind,
    id: &'a str,
}

impl<'a> Owner<'a> {
    fn person(id: &'a str) -> Self {
        Self {
            kind: EntityKind::Person,
            id,
        }
    }
    fn family(id: &'a str) -> Self {
        Self {
            kind: EntityKind::Family,
            id,
        }
    }
    fn report(
        self,
        ctx: &mut ValidationContext,
        message: impl Into<String>,
        line: usize,
        dropped: &mut Vec<Finding>,
    ) -> Result<()> {
        dropped.push(ctx.structural_for(self.kind, self.id, message, Some(line))?);
        Ok(())
    }
    // the owner must already be in the graph
    fn attach(self, genealogy: &mut Genealogy, dropped: Vec<Finding>) {
        if dropped.is_empty() {
            return;
        }
        match self.kind {
            EntityKind::Family => {
                if let Some(family) = genealogy.family_mut(self.id) {
                    dropped.into_iter().for_each(|f| family.add_finding(f));
                }
            }
            _ => update_person(genealogy, self.id, |p| dropped.into_iter().for_each(|f| p.add_finding(f))),
        }
    }
}

/// Resolves the person a one-name header refers to. Tokens after the name are
/// reported against that person; an unusable name comes back as `Err` for the
/// caller to handle.
fn header_person(
    span: &RecordSpan<'_>,
    genealogy: &mut Genealogy,
    ctx: &mut ValidationContext,
) -> Result<std::result::Result<PersonId, String>> {
    let (person, rest) = match parse_header_ref(span.header.text) {
        Ok(parsed) => parsed,
        Err(message) => return Ok(Err(message)),
    };
    let id = person.resolve(genealogy);
    if let Some(rest) = rest {
        let keyword = span.kind.keyword().unwrap_or("?");
        let owner = Owner::person(&id);
        let mut dropped = Vec::new();
        owner.report(ctx, format!("{keyword} header: unexpected `{rest}` after the name"), span.line(), &mut dropped)?;
        owner.attach(genealogy, dropped);
    }
    Ok(Ok(id))
}

// ------------- Lines shared by several records -------------
fn parse_witness(text: &str) -> Option<std::result::Result<(Gender, PersonRef), String>> {
    let caps = WITNESS.captures(text)?;
    let sex = caps
        .get(1)
        .and_then(|m| Gender::from_marker(m.as_str()))
        .unwrap_or_default();
    Some(parse_person_ref(&caps[2]).map(|r| (sex, r)).map_err(|e| format!("witness: {e}")))
}

/// `- [h|f] [SURNAME] Given [inline info]`. Problems are reported against
/// the family and collected in `dropped`.
fn parse_child_line(
    line: &SourceLine<'_>,
    family: Owner<'_>,
    surname_fallback: Option<&str>,
    genealogy: &mut Genealogy,
    ctx: &mut ValidationContext,
    dropped: &mut Vec<Finding>,
) -> Result<Option<Child>> {
    let Some(rest) = line.text.trim().strip_prefix('-') else {
        family.report(ctx, "child line must start with `-`", line.number, dropped)?;
        return Ok(None);
    };
    let mut tokens = rest.split_whitespace().peekable();
    let sex = tokens
        .next_if(|t| *t == "h" || *t == "f")
        .and_then(Gender::from_marker)
        .unwrap_or_default();
    let Some(first) = tokens.next_if(|t| is_name_token(t)) else {
        family.report(ctx, "child line without a name", line.number, dropped)?;
        return Ok(None);
    };
    let (surname_override, given) = match tokens.next_if(|t| is_name_token(t)) {
        Some(given) => (Some(first), given),
        None => (None, first),
    };
    let Some(surname) = surname_override.or(surname_fallback) else {
        family.report(ctx, format!("no surname can be given to child `{given}`"), line.number, dropped)?;
        return Ok(None);
    };
    let mut notices = Vec::new();
    let info = take_inline(&mut tokens, None, &mut notices);
    for notice in notices {
        family.report(ctx, format!("child line: {notice}"), line.number, dropped)?;
    }
    let id = PersonRef::new(surname, given).resolve(genealogy);
    update_person(genealogy, &id, |p| info.apply(p));
    set_gender_if_unknown(genealogy, &id, sex);
    Ok(Some(Child {
        person: id,
        sex,
        surname_override: surname_override.map(str::to_string),
    }))
}

fn spouse_surnames(genealogy: &Genealogy, family: &str) -> Option<String> {
    let family = genealogy.family(family)?;
    family
        .spouses()
        .filter_map(|id| genealogy.person(id))
        .map(|p| p.surname().to_string())
        .next()
}

fn block_text(lines: &[SourceLine<'_>]) -> String {
    let skip = usize::from(lines.first().is_some_and(|l| l.text.trim() == "beg"));
    lines[skip..]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
}

// ------------- Events -------------
fn parse_event_line<K: EventKind>(text: &str) -> std::result::Result<Event<K>, String> {
    let mut tokens = text.split_whitespace();
    let tag = tokens.next().unwrap_or_default().trim_start_matches('#');
    let kind = K::from_tag(tag).ok_or_else(|| format!("unknown {} event tag `#{tag}`", K::SCOPE))?;
    let mut event = Event::new(kind);
    let mut date = None;
    let mut free: Vec<&str> = Vec::new();
    let mut place: Vec<&str> = Vec::new();
    let mut source: Vec<&str> = Vec::new();
    let mut reason: Vec<&str> = Vec::new();
    let mut target: Option<&mut Vec<&str>> = None;
    for token in tokens {
        match token {
            "#p" => target = Some(&mut place),
            "#s" => target = Some(&mut source),
            "#c" => target = Some(&mut reason),
            t => match target.as_deref_mut() {
                Some(parts) => parts.push(t),
                None if date.is_none() && free.is_empty() && is_date_token(t) => date = Some(t),
                None => free.push(t),
            },
        }
    }
    let joined = |parts: Vec<&str>| (!parts.is_empty()).then(|| parts.join(" "));
    // a present tag without a date still records the event, with an unknown date
    event.date = Some(date.map(Date::parse_with_fallback).unwrap_or_else(Date::unknown));
    event.place = joined(place);
    event.source = joined(source);
    event.reason = joined(reason);
    if let Some(text) = joined(free) {
        event.metadata.insert(String::from("text"), text);
    }
    Ok(event)
}

struct EventBody<K: EventKind> {
    events: Vec<Event<K>>,
    notes: Vec<String>,
    dropped: Vec<Finding>,
}

fn parse_event_body<K: EventKind>(
    span: &RecordSpan<'_>,
    owner: Owner<'_>,
    genealogy: &mut Genealogy,
    ctx: &mut ValidationContext,
) -> Result<EventBody<K>> {
    let mut body = EventBody {
        events: Vec::new(),
        notes: Vec::new(),
        dropped: Vec::new(),
    };
    for line in &span.body {
        let text = line.text.trim();
        if text.starts_with('#') {
            match parse_event_line::<K>(text) {
                Ok(event) => body.events.push(event),
                Err(message) => owner.report(ctx, message, line.number, &mut body.dropped)?,
            }
        } else if let Some(witness) = parse_witness(text) {
            match (witness, body.events.last_mut()) {
                (Ok((sex, person)), Some(event)) => {
                    let id = person.resolve(genealogy);
                    set_gender_if_unknown(genealogy, &id, sex);
                    event.witnesses.push(Witness { person: id, sex });
                }
                (Ok(_), None) => owner.report(ctx, "witness before any event", line.number, &mut body.dropped)?,
                (Err(message), _) => owner.report(ctx, message, line.number, &mut body.dropped)?,
            }
        } else if let Some(note) = text
            .strip_prefix("note")
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            let note = note.trim().to_string();
            match body.events.last_mut() {
                Some(event) => event.notes.push(note),
                None => body.notes.push(note),
            }
        } else {
            owner.report(
                ctx,
                format!("unrecognized line in `{}` block", span.kind.keyword().unwrap_or("?")),
                line.number,
                &mut body.dropped,
            )?;
        }
    }
    Ok(body)
}

fn project_personal(person: &mut Person, event: &PersonalEvent) {
    let date = event.date.clone();
    let place = event.place.clone();
    match event.kind {
        PersonalEventKind::Birth => {
            person.birth_date = date;
            if place.is_some() {
                person.birth_place = place;
            }
        }
        PersonalEventKind::Baptism => {
            person.baptism_date = date;
            if place.is_some() {
                person.baptism_place = place;
            }
        }
        PersonalEventKind::Death => {
            person.death_date = date;
            person.is_deceased = Some(true);
            if place.is_some() {
                person.death_place = place;
            }
        }
        PersonalEventKind::Burial | PersonalEventKind::Cremation => {
            person.burial_date = date;
            person.burial = Some(if event.kind == PersonalEventKind::Cremation {
                BurialKind::Cremated
            } else {
                BurialKind::Buried
            });
            if place.is_some() {
                person.burial_place = place;
            }
        }
        PersonalEventKind::Occupation => {
            if let Some(text) = event.metadata.get("text") {
                person.occupation = Some(text.clone());
            }
        }
        _ => {}
    }
}

fn project_family(family: &mut Family, event: &FamilyEvent) {
    match event.kind {
        FamilyEventKind::Marriage => {
            family.marriage_date = event.date.clone();
            if event.place.is_some() {
                family.marriage_place = event.place.clone();
            }
            if event.source.is_some() {
                family.marriage_source = event.source.clone();
            }
            family.status = MarriageStatus::Married;
        }
        FamilyEventKind::Divorce => {
            family.divorce_date = event.date.clone();
            family.status = MarriageStatus::Divorced;
        }
        FamilyEventKind::Separation => {
            family.is_separated = true;
            family.status = MarriageStatus::Separated;
        }
        FamilyEventKind::Engagement => family.status = MarriageStatus::Engaged,
        FamilyEventKind::NoMarriage => family.status = MarriageStatus::NotMarried,
        _ => {}
    }
}

// ------------- Record parsers -------------
pub trait RecordParser {
    const KIND: RecordKind;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()>;
}

fn run<P: RecordParser>(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
    debug!(kind = ?P::KIND, line = span.line(), terminated = span.terminated, "parsing record");
    P::parse(span, genealogy, ctx)
}

/// Routes a span to the parser for its kind.
pub fn dispatch(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
    match span.kind {
        RecordKind::Family => run::<FamilyRecord>(span, genealogy, ctx),
        RecordKind::PersonEvents => run::<PersonEventsRecord>(span, genealogy, ctx),
        RecordKind::FamilyEvents => run::<FamilyEventsRecord>(span, genealogy, ctx),
        RecordKind::Notes => run::<NotesRecord>(span, genealogy, ctx),
        RecordKind::Relations => run::<RelationsRecord>(span, genealogy, ctx),
        RecordKind::DatabaseNotes => run::<DatabaseNotesRecord>(span, genealogy, ctx),
        RecordKind::ExtendedPage => run::<ExtendedPageRecord>(span, genealogy, ctx),
        RecordKind::WizardNote => run::<WizardNoteRecord>(span, genealogy, ctx),
        RecordKind::Children => run::<ChildrenRecord>(span, genealogy, ctx),
        RecordKind::Directive => run::<DirectiveRecord>(span, genealogy, ctx),
    }
}

// ---- fam ----
struct FamilyHeader {
    husband: Option<(PersonRef, InlineInfo)>,
    wife: Option<(PersonRef, InlineInfo)>,
    marriage: MarriageInfo,
    notices: Vec<String>,
}

impl FamilyHeader {
    /// `H_SURNAME H_Given [info] +[date] [marriage] W_SURNAME W_Given [info]`
    fn parse(payload: &str) -> std::result::Result<Self, String> {
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(String::from("missing spouse names"));
        }
        let plus = tokens.iter().position(|t| t.starts_with('+'));
        let (left, right) = match plus {
            Some(i) => (&tokens[..i], Some(&tokens[i..])),
            None => (&tokens[..], None),
        };
        let mut header = FamilyHeader {
            husband: None,
            wife: None,
            marriage: MarriageInfo::default(),
            notices: Vec::new(),
        };

        if !left.is_empty() {
            let joined = left.join(" ");
            let mut tokens = joined.split_whitespace().peekable();
            let person = take_person_ref(&mut tokens).map_err(|e| format!("husband: {e}"))?;
            let info = take_inline(&mut tokens, None, &mut header.notices);
            header.husband = Some((person, info));
        }

        if let Some(right) = right {
            let joined = right.join(" ");
            let glued = joined.trim_start_matches('+');
            let mut tokens = glued.split_whitespace().peekable();
            while let Some(token) = tokens.peek().copied() {
                if is_date_token(token) && header.marriage.date.is_none() {
                    header.marriage.date = Some(Date::parse_with_fallback(token));
                    tokens.next();
                } else if token.starts_with('#') {
                    tokens.next();
                    if !header.marriage.take(token, &mut tokens) {
                        header.notices.push(format!("unexpected token `{token}` before wife"));
                    }
                } else {
                    break;
                }
            }
            let person = take_person_ref(&mut tokens).map_err(|e| format!("wife: {e}"))?;
            let info = take_inline(&mut tokens, Some(&mut header.marriage), &mut header.notices);
            header.wife = Some((person, info));
        }
        Ok(header)
    }
}

pub struct FamilyRecord;

impl FamilyRecord {
    fn body_line(
        line: &SourceLine<'_>,
        owner: Owner<'_>,
        family: &mut Family,
        genealogy: &mut Genealogy,
        ctx: &mut ValidationContext,
        dropped: &mut Vec<Finding>,
    ) -> Result<()> {
        let text = line.text.trim();
        if let Some(witness) = parse_witness(text) {
            match witness {
                Ok((sex, person)) => {
                    let id = person.resolve(genealogy);
                    set_gender_if_unknown(genealogy, &id, sex);
                    family.witnesses.push(Witness { person: id, sex });
                }
                Err(message) => owner.report(ctx, message, line.number, dropped)?,
            }
            return Ok(());
        }
        let (keyword, value) = text
            .split_once(char::is_whitespace)
            .map(|(k, v)| (k, v.trim().to_string()))
            .unwrap_or((text, String::new()));
        match keyword {
            "src" => family.source = Some(value),
            "comm" => family.comments.push(value),
            "cbp" => family.common_birth_place = Some(value),
            "csrc" => family.common_children_source = Some(value),
            _ => owner.report(ctx, format!("unrecognized family line `{keyword}`"), line.number, dropped)?,
        }
        Ok(())
    }
}

impl RecordParser for FamilyRecord {
    const KIND: RecordKind = RecordKind::Family;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let line = Some(span.line());
        let id = genealogy.next_family_id();
        let header = match FamilyHeader::parse(span.header.text) {
            Ok(header) => header,
            Err(message) => {
                ctx.structural(format!("family header: {message}"), line)?;
                warn!(family = %id, %message, "keeping partial family");
                genealogy.attach_family(validation::partial_family(&id, None, None, &message, line))?;
                return Ok(());
            }
        };
        let owner = Owner::family(&id);
        let mut dropped = Vec::new();
        for notice in &header.notices {
            owner.report(ctx, format!("family header: {notice}"), span.line(), &mut dropped)?;
        }

        let mut surname_fallback = None;
        let mut spouse = |slot: Option<(PersonRef, InlineInfo)>, gender: Gender, genealogy: &mut Genealogy| {
            slot.map(|(person, info)| {
                if surname_fallback.is_none() {
                    surname_fallback = Some(person.surname.clone());
                }
                let id = person.resolve(genealogy);
                update_person(genealogy, &id, |p| info.apply(p));
                set_gender_if_unknown(genealogy, &id, gender);
                id
            })
        };
        let husband = spouse(header.husband, Gender::Male, genealogy);
        let wife = spouse(header.wife, Gender::Female, genealogy);

        let mut family = Family::new(id.clone()).with_husband(husband).with_wife(wife);
        header.marriage.apply(&mut family);
        for body_line in &span.body {
            Self::body_line(body_line, owner, &mut family, genealogy, ctx, &mut dropped)?;
        }
        for child_line in &span.children {
            let child = parse_child_line(child_line, owner, surname_fallback.as_deref(), genealogy, ctx, &mut dropped)?;
            if let Some(child) = child {
                family.push_child(child);
            }
        }
        dropped.into_iter().for_each(|f| family.add_finding(f));
        genealogy.attach_family(family)?;
        Ok(())
    }
}

// ---- pevt ----
pub struct PersonEventsRecord;

impl RecordParser for PersonEventsRecord {
    const KIND: RecordKind = RecordKind::PersonEvents;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        genealogy.metadata.is_gwplus = true;
        let id = match header_person(span, genealogy, ctx)? {
            Ok(id) => id,
            Err(message) => {
                ctx.structural(format!("pevt header: {message}"), Some(span.line()))?;
                let mut words = span.header.text.split_whitespace();
                let partial = validation::partial_person(
                    words.next().unwrap_or_default(),
                    words.next().unwrap_or_default(),
                    0,
                    &message,
                    Some(span.line()),
                );
                let id = partial.id();
                if !genealogy.contains_person(&id) {
                    genealogy.insert_person(partial)?;
                }
                id
            }
        };
        let owner = Owner::person(&id);
        let body = parse_event_body::<PersonalEventKind>(span, owner, genealogy, ctx)?;
        update_person(genealogy, &id, |person| {
            for event in &body.events {
                project_personal(person, event);
            }
            person.events.extend(body.events);
            person.notes.extend(body.notes);
        });
        owner.attach(genealogy, body.dropped);
        Ok(())
    }
}

// ---- fevt ----
pub struct FamilyEventsRecord;

impl FamilyEventsRecord {
    fn resolve(
        payload: &str,
        genealogy: &mut Genealogy,
    ) -> std::result::Result<FamilyId, (String, Option<PersonId>, Option<PersonId>)> {
        let payload = payload.trim();
        if payload.is_empty() {
            return genealogy
                .latest_family_id()
                .map(str::to_string)
                .ok_or((String::from("no family precedes this block"), None, None));
        }
        if genealogy.family(payload).is_some() {
            return Ok(payload.to_string());
        }
        if let Some((left, right)) = payload.split_once('+') {
            let husband = parse_person_ref(left).ok().map(|p| p.resolve(genealogy));
            let wife = parse_person_ref(right).ok().map(|p| p.resolve(genealogy));
            if let Some(found) = genealogy
                .families_of_couple(husband.as_deref(), wife.as_deref())
                .into_iter()
                .next()
            {
                return Ok(found);
            }
            return Err((format!("no family recorded for `{payload}`"), husband, wife));
        }
        Err((format!("unknown family reference `{payload}`"), None, None))
    }
}

impl RecordParser for FamilyEventsRecord {
    const KIND: RecordKind = RecordKind::FamilyEvents;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        genealogy.metadata.is_gwplus = true;
        let line = Some(span.line());
        let id = match Self::resolve(span.header.text, genealogy) {
            Ok(id) => {
                genealogy.focus_family(&id);
                id
            }
            Err((message, husband, wife)) => {
                ctx.structural(format!("fevt: {message}"), line)?;
                let id = genealogy.next_family_id();
                warn!(family = %id, %message, "events attached to a partial family");
                genealogy.attach_family(validation::partial_family(&id, husband, wife, &message, line))?
            }
        };
        let owner = Owner::family(&id);
        let body = parse_event_body::<FamilyEventKind>(span, owner, genealogy, ctx)?;
        if let Some(family) = genealogy.family_mut(&id) {
            for event in &body.events {
                project_family(family, event);
            }
            family.events.extend(body.events);
            family.comments.extend(body.notes);
        }
        owner.attach(genealogy, body.dropped);
        Ok(())
    }
}

// ---- orphan beg ... end ----
pub struct ChildrenRecord;

impl RecordParser for ChildrenRecord {
    const KIND: RecordKind = RecordKind::Children;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let Some(id) = genealogy.current_family_id().map(str::to_string) else {
            ctx.structural("child list without a preceding family", Some(span.line()))?;
            return Ok(());
        };
        let owner = Owner::family(&id);
        let fallback = spouse_surnames(genealogy, &id);
        let mut dropped = Vec::new();
        for line in &span.children {
            if let Some(child) = parse_child_line(line, owner, fallback.as_deref(), genealogy, ctx, &mut dropped)? {
                genealogy.add_child(&id, child)?;
            }
        }
        owner.attach(genealogy, dropped);
        Ok(())
    }
}

// ---- notes ----
pub struct NotesRecord;

impl RecordParser for NotesRecord {
    const KIND: RecordKind = RecordKind::Notes;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let id = match header_person(span, genealogy, ctx)? {
            Ok(id) => id,
            Err(message) => {
                ctx.structural(format!("notes header: {message}"), Some(span.line()))?;
                return Ok(());
            }
        };
        let text = block_text(&span.body);
        if !text.is_empty() {
            update_person(genealogy, &id, |p| p.notes.push(text));
        }
        Ok(())
    }
}

// ---- rel ----
pub struct RelationsRecord;

impl RecordParser for RelationsRecord {
    const KIND: RecordKind = RecordKind::Relations;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let subject = match header_person(span, genealogy, ctx)? {
            Ok(id) => id,
            Err(message) => {
                ctx.structural(format!("rel header: {message}"), Some(span.line()))?;
                return Ok(());
            }
        };
        let owner = Owner::person(&subject);
        let mut dropped = Vec::new();
        for line in &span.body {
            owner.report(ctx, "relation lines belong inside `beg ... end`", line.number, &mut dropped)?;
        }
        for line in &span.children {
            let Some(caps) = RELATION.captures(line.text.trim()) else {
                owner.report(ctx, "malformed relation line", line.number, &mut dropped)?;
                continue;
            };
            let Some(kind) = RelationKind::from_keyword(&caps[1]) else {
                owner.report(ctx, format!("unknown relation `{}`", &caps[1]), line.number, &mut dropped)?;
                continue;
            };
            let role = caps.get(2).map(|m| match m.as_str() {
                "fath" => ParentRole::Father,
                _ => ParentRole::Mother,
            });
            let related = match parse_person_ref(&caps[3]) {
                Ok(person) => person.resolve(genealogy),
                Err(message) => {
                    owner.report(ctx, format!("relation: {message}"), line.number, &mut dropped)?;
                    continue;
                }
            };
            match role {
                Some(ParentRole::Father) => set_gender_if_unknown(genealogy, &related, Gender::Male),
                Some(ParentRole::Mother) => set_gender_if_unknown(genealogy, &related, Gender::Female),
                None => {}
            }
            update_person(genealogy, &subject, |p| {
                p.relations.push(Relation {
                    kind,
                    role,
                    person: related,
                })
            });
        }
        owner.attach(genealogy, dropped);
        Ok(())
    }
}

// ---- notes-db ----
pub struct DatabaseNotesRecord;

impl RecordParser for DatabaseNotesRecord {
    const KIND: RecordKind = RecordKind::DatabaseNotes;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, _ctx: &mut ValidationContext) -> Result<()> {
        let text = block_text(&span.body);
        if !text.is_empty() {
            genealogy.metadata.database_notes.push(text);
        }
        Ok(())
    }
}

// ---- page-ext ----
pub struct ExtendedPageRecord;

impl RecordParser for ExtendedPageRecord {
    const KIND: RecordKind = RecordKind::ExtendedPage;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let id = match header_person(span, genealogy, ctx)? {
            Ok(id) => id,
            Err(message) => {
                ctx.structural(format!("page-ext header: {message}"), Some(span.line()))?;
                return Ok(());
            }
        };
        let text = block_text(&span.body);
        update_person(genealogy, &id, |p| {
            p.metadata.insert(String::from("extended_page"), text);
        });
        Ok(())
    }
}

// ---- wizard-note ----
pub struct WizardNoteRecord;

impl RecordParser for WizardNoteRecord {
    const KIND: RecordKind = RecordKind::WizardNote;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let wizard = span.header.text.trim();
        if wizard.is_empty() {
            ctx.structural("wizard-note without a wizard id", Some(span.line()))?;
            return Ok(());
        }
        genealogy
            .metadata
            .wizard_notes
            .entry(wizard.to_string())
            .or_default()
            .push(block_text(&span.body));
        Ok(())
    }
}

// ---- encoding: / gwplus ----
pub struct DirectiveRecord;

impl RecordParser for DirectiveRecord {
    const KIND: RecordKind = RecordKind::Directive;
    fn parse(span: &RecordSpan<'_>, genealogy: &mut Genealogy, ctx: &mut ValidationContext) -> Result<()> {
        let text = span.header.text.trim();
        if text == "gwplus" {
            genealogy.metadata.is_gwplus = true;
        } else if let Some(encoding) = text.strip_prefix("encoding:") {
            let encoding = encoding.trim();
            if encoding.is_empty() {
                ctx.structural("empty encoding directive", Some(span.line()))?;
            } else {
                genealogy.metadata.encoding = encoding.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_suffix_is_split_off() {
        let r = parse_person_ref("DUPONT Jean.2").unwrap();
        assert_eq!(r.given_name, "Jean");
        assert_eq!(r.occurrence, Some(2));
        assert!(parse_person_ref("DUPONT").is_err());
    }

    #[test]
    fn header_names_exactly_one_person() {
        let (person, rest) = parse_header_ref("CORNO Joseph.1").unwrap();
        assert_eq!(person.occurrence, Some(1));
        assert_eq!(rest, None);
        let (_, rest) = parse_header_ref("CORNO Joseph garbage here").unwrap();
        assert_eq!(rest.as_deref(), Some("garbage here"));
        assert!(parse_header_ref("CORNO").is_err());
    }

    #[test]
    fn date_tokens_are_told_apart_from_names() {
        for t in ["1990", "~10/5/1990", "0", "0(5_Mai_1990)", "k1914", "10/9/5750H", "1700|1701", "1890..1895"] {
            assert!(is_date_token(t), "{t} should be a date");
        }
        for t in ["CORNO", "Marie", "Jean.2"] {
            assert!(is_name_token(t), "{t} should be a name");
        }
        for t in ["#bp", "[Duc]", "+", "+1905"] {
            assert!(!is_name_token(t), "{t} is not a name");
        }
    }

    #[test]
    fn header_with_glued_marriage_date() {
        let header = FamilyHeader::parse("CORNO Joseph 1880 #bp Arras +10/5/1905 #mp Lille THOMAS Marie").unwrap();
        let (husband, info) = header.husband.unwrap();
        assert_eq!(husband.surname, "CORNO");
        assert_eq!(info.birth.unwrap().year(), Some(1880));
        assert_eq!(info.birth_place.as_deref(), Some("Arras"));
        assert_eq!(header.marriage.date.unwrap().year(), Some(1905));
        assert_eq!(header.marriage.place.as_deref(), Some("Lille"));
        assert_eq!(header.wife.unwrap().0.given_name, "Marie");
        assert!(header.notices.is_empty());
    }

    #[test]
    fn title_fields() {
        let mut rest = "".split_whitespace().peekable();
        let t = take_title("[*Duc:de_Berry:Berry:1800:1820:2]", &mut rest);
        assert!(t.main);
        assert_eq!(t.name, "Duc");
        assert_eq!(t.place.as_deref(), Some("Berry"));
        assert_eq!(t.end.unwrap().year(), Some(1820));
        assert_eq!(t.number, Some(2));
    }
}
