use gwgraph::date::{Calendar, Date, DatePrefix, DeathType};
use gwgraph::error::GwError;

#[test]
fn complete_date_has_iso_form() {
    let d = Date::parse("25/12/1990").expect("valid date");
    assert!(d.is_complete(), "day, month and year present");
    assert!(!d.is_partial());
    assert_eq!(d.to_iso_format().as_deref(), Some("1990-12-25"));
    assert_eq!(d.to_naive_date(), chrono::NaiveDate::from_ymd_opt(1990, 12, 25));
}

#[test]
fn month_year_is_partial() {
    let d = Date::parse("12/1990").unwrap();
    assert_eq!(d.day(), None, "day must be absent");
    assert_eq!(d.month(), Some(12));
    assert_eq!(d.year(), Some(1990));
    assert!(d.is_partial());
    assert_eq!(d.to_iso_format(), None);
}

#[test]
fn year_only() {
    let d = Date::parse("1990").unwrap();
    assert_eq!((d.day(), d.month(), d.year()), (None, None, Some(1990)));
    assert!(d.is_partial());
}

#[test]
fn empty_blank_and_zero_are_unknown() {
    for input in ["", "   ", "0"] {
        assert!(Date::parse(input).unwrap().is_unknown(), "{input:?} should be unknown");
        assert!(Date::parse_with_fallback(input).is_unknown());
    }
    let unknown = Date::unknown();
    assert_eq!(unknown.year(), None);
    assert_eq!(unknown.text(), None);
}

#[test]
fn textual_date_keeps_text_verbatim() {
    let d = Date::parse("0(5_Mai_1990)").unwrap();
    assert_eq!(d.text(), Some("5_Mai_1990"));
    assert_eq!(d.year(), None, "no numeric fields on a text date");
    assert!(!d.is_unknown());
    assert_eq!(d.to_string(), "0(5_Mai_1990)");
}

#[test]
fn about_prefix() {
    let d = Date::parse("~10/5/1990").unwrap();
    assert_eq!(d.prefix(), Some(DatePrefix::About));
    assert_eq!((d.day(), d.month(), d.year()), (Some(10), Some(5), Some(1990)));
    assert_eq!(d.to_string(), "~10/05/1990");
}

#[test]
fn hebrew_calendar_suffix() {
    let d = Date::parse("10/9/5750H").unwrap();
    assert_eq!(d.calendar(), Calendar::Hebrew);
    assert_eq!(d.year(), Some(5750));
    assert_eq!(d.to_naive_date(), None, "only gregorian dates convert");
}

#[test]
fn other_prefixes_and_death_types() {
    assert_eq!(Date::parse("?1900").unwrap().prefix(), Some(DatePrefix::Maybe));
    assert_eq!(Date::parse("<1900").unwrap().prefix(), Some(DatePrefix::Before));
    assert_eq!(Date::parse(">1900").unwrap().prefix(), Some(DatePrefix::After));
    assert_eq!(Date::parse("k1914").unwrap().death_type(), DeathType::Killed);
    assert_eq!(Date::parse("m1914").unwrap().death_type(), DeathType::Murdered);
    assert_eq!(Date::parse("e1794F").unwrap().death_type(), DeathType::Executed);
    assert_eq!(Date::parse("e1794F").unwrap().calendar(), Calendar::FrenchRepublican);
    assert_eq!(Date::parse("s1944").unwrap().death_type(), DeathType::Disappeared);
}

#[test]
fn fully_specified_dates_render_back_to_themselves() {
    for (y, m, d) in [(1990, 12, 25), (1, 1, 1), (1884, 3, 12)] {
        let date = Date::ymd(y, m, d).unwrap();
        let reparsed = Date::parse(&date.to_string()).unwrap();
        assert_eq!(reparsed, date, "render/parse of {date}");
    }
}

#[test]
fn modifiers_survive_rendering() {
    for text in ["~10/05/1990", "<1700J", "1990|1991", "1890..1895", "k12/03/1916"] {
        let d = Date::parse(text).unwrap();
        assert_eq!(d.to_string(), text);
    }
}

#[test]
fn range_end_is_the_second_segment() {
    let d = Date::parse("1990..1995").unwrap();
    assert_eq!(d.prefix(), Some(DatePrefix::Between));
    assert_eq!(d.year(), Some(1990));
    assert_eq!(d.alternatives()[0].year(), Some(1995));

    let d = Date::parse("1990..1995..2000").expect("extra range segments are tolerated");
    assert_eq!(d.prefix(), Some(DatePrefix::Between));
    assert_eq!(d.year(), Some(1990));
    assert_eq!(d.alternatives().len(), 1);
    assert_eq!(d.alternatives()[0].year(), Some(1995), "the range ends at the second segment");
}

#[test]
fn fallback_is_total() {
    let garbage = [
        "abc", "//", "1/2/3/4", "~", "0(", "99999999999999", "32/13/0", "1..x", "|", "é", "~é", "--", "#p",
        "0()", "1990-", "12//",
    ];
    for input in garbage {
        let _ = Date::parse_with_fallback(input);
    }
    assert!(Date::parse_with_fallback("abc").is_unknown());
    assert!(Date::parse_with_fallback("//").is_unknown(), "all-empty fields");
    assert!(Date::parse_with_fallback("1/2/3/4").is_unknown());
}

#[test]
fn strict_entry_point_reports_the_failure() {
    assert!(matches!(Date::parse("abc"), Err(GwError::DateFormat(_))));
    assert!(matches!(Date::parse("0/0/0"), Err(GwError::InvalidDate(_))));
    assert!(matches!(Date::new(Some(0), None, Some(1900)), Err(GwError::InvalidDate(_))));
    assert!(matches!(Date::year_only(0), Err(GwError::InvalidDate(_))));
}

#[test]
fn comparisons_use_most_specific_shared_field() {
    let y1900 = Date::parse("1900").unwrap();
    let jan1901 = Date::parse("1/1/1901").unwrap();
    assert!(y1900.is_before(&jan1901));
    assert!(jan1901.is_after(&y1900));

    let may = Date::parse("5/1900").unwrap();
    let may12 = Date::parse("12/5/1900").unwrap();
    assert!(!may.is_before(&may12), "missing day means no ordering inside the month");
    assert!(!may.is_after(&may12));

    let d1 = Date::parse("1/5/1900").unwrap();
    assert!(d1.is_before(&may12));
}

#[test]
fn unknown_and_text_dates_never_compare() {
    let known = Date::parse("1900").unwrap();
    for other in [Date::unknown(), Date::parse("0(Spring)").unwrap()] {
        assert!(!known.is_before(&other));
        assert!(!known.is_after(&other));
        assert!(!other.is_before(&known));
        assert!(!other.is_after(&known));
    }
}
