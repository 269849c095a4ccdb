//! Splits a GW source into classified record spans.
//!
//! A record opens with a keyword at the start of a line (`fam`, `pevt`,
//! `fevt`, `notes`, `rel`, `notes-db`, `page-ext`, `wizard-note`) and the rest
//! of that line is its header payload. Block records close on `end <keyword>`.
//! `fam` and `rel` records are closed by a blank line or the next keyword and
//! may hold one `beg ... end` list. A `beg ... end` list at top level belongs to
//! the current family, see [`Genealogy::current_family_id`].
//!
//! [`Genealogy::current_family_id`]: crate::construct::Genealogy::current_family_id
//!
//! The tokenizer only groups lines. What the lines mean is decided by the
//! record parsers.

use bimap::BiMap;
use lazy_static::lazy_static;
use tracing::debug;

use crate::error::Result;
use crate::validation::ValidationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Family,
    PersonEvents,
    FamilyEvents,
    Notes,
    Relations,
    DatabaseNotes,
    ExtendedPage,
    WizardNote,
    /// A `beg ... end` list outside of any record.
    Children,
    /// `encoding:` and `gwplus` lines.
    Directive,
}

lazy_static! {
    static ref KEYWORDS: BiMap<RecordKind, &'static str> = {
        let mut keywords = BiMap::new();
        keywords.insert(RecordKind::Family, "fam");
        keywords.insert(RecordKind::PersonEvents, "pevt");
        keywords.insert(RecordKind::FamilyEvents, "fevt");
        keywords.insert(RecordKind::Notes, "notes");
        keywords.insert(RecordKind::Relations, "rel");
        keywords.insert(RecordKind::DatabaseNotes, "notes-db");
        keywords.insert(RecordKind::ExtendedPage, "page-ext");
        keywords.insert(RecordKind::WizardNote, "wizard-note");
        keywords
    };
}

impl RecordKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        KEYWORDS.get_by_right(keyword).copied()
    }
    pub fn keyword(&self) -> Option<&'static str> {
        KEYWORDS.get_by_left(self).copied()
    }
    // closed by `end <keyword>` rather than by a blank line
    fn is_block(&self) -> bool {
        !matches!(
            self,
            RecordKind::Family | RecordKind::Relations | RecordKind::Children | RecordKind::Directive
        )
    }
    // body kept verbatim, blank lines and keywords included
    fn is_verbatim(&self) -> bool {
        matches!(
            self,
            RecordKind::Notes | RecordKind::DatabaseNotes | RecordKind::ExtendedPage | RecordKind::WizardNote
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number in the source.
    pub number: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpan<'a> {
    pub kind: RecordKind,
    /// The opening line with its keyword stripped.
    pub header: SourceLine<'a>,
    pub body: Vec<SourceLine<'a>>,
    /// Lines of the `beg ... end` list.
    pub children: Vec<SourceLine<'a>>,
    /// False when the block had to be closed without its terminator.
    pub terminated: bool,
}

impl<'a> RecordSpan<'a> {
    fn open(kind: RecordKind, number: usize, payload: &'a str) -> Self {
        Self {
            kind,
            header: SourceLine { number, text: payload },
            body: Vec::new(),
            children: Vec::new(),
            terminated: !kind.is_block(),
        }
    }
    pub fn line(&self) -> usize {
        self.header.number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    Record(RecordKind),
    ChildList,
}

enum Classified<'a> {
    Blank,
    Directive,
    Opener(RecordKind, &'a str),
    ChildListStart,
    Terminator(Option<&'a str>),
    Other,
}

fn classify(text: &str) -> Classified<'_> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Classified::Blank;
    }
    if trimmed == "gwplus" || trimmed.starts_with("encoding:") {
        return Classified::Directive;
    }
    if trimmed == "beg" {
        return Classified::ChildListStart;
    }
    let (keyword, payload) = trimmed
        .split_once(char::is_whitespace)
        .map(|(k, p)| (k, p.trim()))
        .unwrap_or((trimmed, ""));
    if keyword == "end" {
        return Classified::Terminator((!payload.is_empty()).then_some(payload));
    }
    match RecordKind::from_keyword(keyword) {
        Some(kind) => Classified::Opener(kind, payload),
        None => Classified::Other,
    }
}

pub struct BlockTokenizer<'a> {
    lines: Vec<SourceLine<'a>>,
}

impl<'a> BlockTokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, text)| SourceLine {
                number: i + 1,
                text: text.trim_end(),
            })
            .collect();
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn tokenize(&self, ctx: &mut ValidationContext) -> Result<Vec<RecordSpan<'a>>> {
        let mut spans = Vec::new();
        let mut stack: Vec<OpenBlock> = Vec::new();
        let mut current: Option<RecordSpan<'a>> = None;
        let mut i = 0;

        while i < self.lines.len() {
            let line = self.lines[i];
            let mut advance = true;

            match (stack.last().copied(), classify(line.text)) {
                // ---- top level ----
                (None, Classified::Blank) => {}
                (None, Classified::Directive) => {
                    spans.push(RecordSpan::open(RecordKind::Directive, line.number, line.text.trim()));
                }
                (None, Classified::ChildListStart) => {
                    current = Some(RecordSpan::open(RecordKind::Children, line.number, ""));
                    stack.push(OpenBlock::Record(RecordKind::Children));
                    stack.push(OpenBlock::ChildList);
                }
                (None, Classified::Opener(kind, payload)) => {
                    debug!(line = line.number, kind = ?kind, "record opened");
                    current = Some(RecordSpan::open(kind, line.number, payload));
                    stack.push(OpenBlock::Record(kind));
                }
                (None, Classified::Terminator(_)) => {
                    ctx.structural(format!("unmatched terminator `{}`", line.text.trim()), Some(line.number))?;
                }
                (None, Classified::Other) => {
                    let keyword = line.text.split_whitespace().next().unwrap_or_default();
                    ctx.structural(format!("unknown keyword `{keyword}`"), Some(line.number))?;
                }

                // ---- inside a beg ... end list ----
                (Some(OpenBlock::ChildList), Classified::Terminator(None)) => {
                    stack.pop();
                    if stack.last() == Some(&OpenBlock::Record(RecordKind::Children)) {
                        stack.pop();
                        finish(&mut current, &mut spans);
                    }
                }
                (Some(OpenBlock::ChildList), Classified::Blank) => {}
                (Some(OpenBlock::ChildList), Classified::Opener(..) | Classified::Directive | Classified::Terminator(Some(_))) => {
                    ctx.structural("child list not closed with `end`", Some(line.number))?;
                    if let Some(span) = current.as_mut() {
                        span.terminated = false;
                    }
                    stack.clear();
                    finish(&mut current, &mut spans);
                    advance = false;
                }
                (Some(OpenBlock::ChildList), _) => {
                    if let Some(span) = current.as_mut() {
                        span.children.push(line);
                    }
                }

                // ---- inside a block record ----
                (Some(OpenBlock::Record(kind)), classified) if kind.is_block() => match classified {
                    Classified::Terminator(Some(closing)) if Some(closing) == kind.keyword() => {
                        if let Some(span) = current.as_mut() {
                            span.terminated = true;
                        }
                        stack.pop();
                        finish(&mut current, &mut spans);
                    }
                    _ if kind.is_verbatim() => {
                        if let Some(span) = current.as_mut() {
                            span.body.push(line);
                        }
                    }
                    Classified::Blank => {}
                    Classified::Opener(..) | Classified::Directive => {
                        ctx.structural(
                            format!("`{}` block not closed before this line", kind.keyword().unwrap_or("?")),
                            Some(line.number),
                        )?;
                        stack.pop();
                        finish(&mut current, &mut spans);
                        advance = false;
                    }
                    Classified::Terminator(_) => {
                        ctx.structural(format!("mismatched terminator `{}`", line.text.trim()), Some(line.number))?;
                    }
                    Classified::ChildListStart | Classified::Other => {
                        if let Some(span) = current.as_mut() {
                            span.body.push(line);
                        }
                    }
                },

                // ---- inside fam / rel ----
                (Some(OpenBlock::Record(kind)), classified) => match classified {
                    Classified::Blank => {
                        stack.pop();
                        finish(&mut current, &mut spans);
                    }
                    Classified::Terminator(Some(closing)) if Some(closing) == kind.keyword() => {
                        stack.pop();
                        finish(&mut current, &mut spans);
                    }
                    Classified::Terminator(_) => {
                        ctx.structural(format!("unmatched terminator `{}`", line.text.trim()), Some(line.number))?;
                    }
                    Classified::ChildListStart => stack.push(OpenBlock::ChildList),
                    Classified::Opener(..) | Classified::Directive => {
                        stack.pop();
                        finish(&mut current, &mut spans);
                        advance = false;
                    }
                    Classified::Other => {
                        if let Some(span) = current.as_mut() {
                            span.body.push(line);
                        }
                    }
                },
            }

            if advance {
                i += 1;
            }
        }

        if let Some(span) = current.as_mut() {
            if stack.contains(&OpenBlock::ChildList) {
                ctx.structural(
                    format!("child list opened for record at line {} is never closed", span.line()),
                    Some(span.line()),
                )?;
                span.terminated = false;
            } else if span.kind.is_block() && !span.terminated {
                ctx.structural(
                    format!("`{}` block is never closed", span.kind.keyword().unwrap_or("?")),
                    Some(span.line()),
                )?;
            }
        }
        finish(&mut current, &mut spans);
        Ok(spans)
    }
}

fn finish<'a>(current: &mut Option<RecordSpan<'a>>, spans: &mut Vec<RecordSpan<'a>>) {
    if let Some(span) = current.take() {
        spans.push(span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseMode;

    fn lenient(source: &str) -> (Vec<RecordSpan<'_>>, ValidationContext) {
        let mut ctx = ValidationContext::new(ParseMode::Lenient);
        let spans = BlockTokenizer::new(source).tokenize(&mut ctx).unwrap();
        (spans, ctx)
    }

    #[test]
    fn family_with_children_is_one_span() {
        let (spans, ctx) = lenient("fam CORNO Joseph + THOMAS Marie\nbeg\n- h Jean\n- f Anne\nend\n");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, RecordKind::Family);
        assert_eq!(spans[0].header.text, "CORNO Joseph + THOMAS Marie");
        assert_eq!(spans[0].children.len(), 2);
        assert!(ctx.findings().is_empty());
    }

    #[test]
    fn blank_line_closes_a_family() {
        let (spans, _) = lenient("fam A B + C D\n\nfam E F + G H\n");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].line(), 3);
    }

    #[test]
    fn event_block_needs_its_own_terminator() {
        let (spans, ctx) = lenient("pevt CORNO Joseph\n#birt 1880\n\n#deat\nend pevt\n");
        assert_eq!(spans.len(), 1);
        assert!(spans[0].terminated);
        assert_eq!(spans[0].body.len(), 2);
        assert!(ctx.findings().is_empty());
    }

    #[test]
    fn keyword_inside_event_block_closes_it_with_a_warning() {
        let (spans, ctx) = lenient("pevt A B\n#birt 1880\nfam A B + C D\n");
        assert_eq!(spans.len(), 2);
        assert!(!spans[0].terminated);
        assert_eq!(spans[1].kind, RecordKind::Family);
        assert_eq!(ctx.warning_count(), 1);
    }

    #[test]
    fn notes_keep_blank_lines_and_keywords() {
        let (spans, _) = lenient("notes A B\nbeg\nfirst\n\nfam is just text here\nend notes\n");
        assert_eq!(spans.len(), 1);
        let texts: Vec<_> = spans[0].body.iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["beg", "first", "", "fam is just text here"]);
    }

    #[test]
    fn unknown_keyword_is_dropped_leniently_and_fatal_strictly() {
        let (spans, ctx) = lenient("bogus line\nfam A B + C D\n");
        assert_eq!(spans.len(), 1);
        assert_eq!(ctx.findings()[0].line, Some(1));

        let mut strict = ValidationContext::new(ParseMode::Strict);
        let err = BlockTokenizer::new("bogus line\n").tokenize(&mut strict).unwrap_err();
        assert!(matches!(err, crate::error::GwError::Structural { line: Some(1), .. }));
    }

    #[test]
    fn top_level_child_list_and_directives() {
        let (spans, _) = lenient("encoding: utf-8\ngwplus\n\nfam A B + C D\nfevt\n#marr 1900\nend fevt\nbeg\n- h E\nend\n");
        let kinds: Vec<_> = spans.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Directive,
                RecordKind::Directive,
                RecordKind::Family,
                RecordKind::FamilyEvents,
                RecordKind::Children
            ]
        );
        assert_eq!(spans[4].children.len(), 1);
    }

    #[test]
    fn unterminated_block_at_end_of_input() {
        let (spans, ctx) = lenient("fevt\n#marr 1900\n");
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].terminated);
        assert_eq!(ctx.warning_count(), 1);
    }
}
