mod common;

use common::lenient;
use gwgraph::entity::{AccessLevel, Gender, MarriageStatus};
use gwgraph::GwParser;
use gwgraph::error::GwError;
use gwgraph::validation::{EntityKind, FindingOrigin, Severity};

const CORNO: &str = "fam CORNO Joseph + THOMAS Marie
beg
- h Jean
- f Anne
end
";

#[test]
fn couple_with_two_children() {
    let parsed = lenient(CORNO);
    let g = &parsed.value;

    assert_eq!(g.family_count(), 1);
    assert_eq!(g.person_count(), 4);
    let family = g.family("FAM_001").expect("first family id");
    assert_eq!(family.husband(), Some("CORNO_Joseph_0"));
    assert_eq!(family.wife(), Some("THOMAS_Marie_0"));
    let children: Vec<_> = family.children().iter().map(|c| c.person.as_str()).collect();
    assert_eq!(children, vec!["CORNO_Jean_0", "CORNO_Anne_0"], "children keep source order");

    for child in ["CORNO_Jean_0", "CORNO_Anne_0"] {
        let person = g.person(child).unwrap();
        assert_eq!(person.families_as_child(), ["FAM_001".to_string()]);
        assert_eq!(person.surname(), "CORNO", "surname inherited from the husband");
    }
    assert_eq!(g.person("CORNO_Jean_0").unwrap().gender, Gender::Male);
    assert_eq!(g.person("CORNO_Anne_0").unwrap().gender, Gender::Female);
    assert_eq!(g.person("CORNO_Joseph_0").unwrap().families_as_spouse(), ["FAM_001".to_string()]);
    assert!(parsed.findings.is_empty(), "clean input yields no findings: {:?}", parsed.findings);
}

#[test]
fn husband_only_family_warns_once() {
    let parsed = lenient("fam CORNO Joseph\n");
    let family = parsed.value.family("FAM_001").unwrap();
    assert_eq!(family.husband(), Some("CORNO_Joseph_0"));
    assert_eq!(family.wife(), None);
    assert_eq!(family.findings().len(), 1);
    assert_eq!(family.findings()[0].severity, Severity::Warning);
    assert!(family.is_valid(), "a warning does not invalidate");
    assert_eq!(parsed.findings.len(), 1);
    assert!(!parsed.has_errors());
}

#[test]
fn wife_only_family_passes_her_surname_to_children() {
    let parsed = lenient("fam + THOMAS Marie\nbeg\n- f Lucie\nend\n");
    let family = parsed.value.family("FAM_001").unwrap();
    assert_eq!(family.husband(), None);
    assert_eq!(family.wife(), Some("THOMAS_Marie_0"));
    assert_eq!(family.children()[0].person, "THOMAS_Lucie_0");
    assert!(family.findings().is_empty(), "a spouse with children is complete");
}

#[test]
fn inline_person_and_marriage_information() {
    let parsed = lenient(
        "fam CORNO Joseph 1880 #bp Arras #occu Miner +1905 #mp Lille #nm THOMAS Marie 1885 1950 #dp Lens #apriv\n",
    );
    let g = &parsed.value;
    let husband = g.person("CORNO_Joseph_0").unwrap();
    assert_eq!(husband.birth_date.as_ref().and_then(|d| d.year()), Some(1880));
    assert_eq!(husband.birth_place.as_deref(), Some("Arras"));
    assert_eq!(husband.occupation.as_deref(), Some("Miner"));
    assert_eq!(husband.is_deceased, None);

    let wife = g.person("THOMAS_Marie_0").unwrap();
    assert_eq!(wife.birth_date.as_ref().and_then(|d| d.year()), Some(1885));
    assert_eq!(wife.death_date.as_ref().and_then(|d| d.year()), Some(1950));
    assert_eq!(wife.death_place.as_deref(), Some("Lens"));
    assert_eq!(wife.is_deceased, Some(true), "an inline death date marks the person deceased");
    assert_eq!(wife.access, AccessLevel::Private);

    let family = g.family("FAM_001").unwrap();
    assert_eq!(family.marriage_date.as_ref().and_then(|d| d.year()), Some(1905));
    assert_eq!(family.marriage_place.as_deref(), Some("Lille"));
    assert_eq!(family.status, MarriageStatus::NotMarried);
    assert!(parsed.findings.is_empty(), "{:?}", parsed.findings);
}

#[test]
fn separation_and_divorce_in_the_header() {
    let parsed = lenient("fam A B + #sep C D\n\nfam E F + #div 1930 G H\n");
    let g = &parsed.value;
    let separated = g.family("FAM_001").unwrap();
    assert!(separated.is_separated);
    assert_eq!(separated.status, MarriageStatus::Separated);

    let divorced = g.family("FAM_002").unwrap();
    assert!(divorced.is_separated);
    assert_eq!(divorced.status, MarriageStatus::Divorced);
    assert_eq!(divorced.divorce_date.as_ref().and_then(|d| d.year()), Some(1930));
    assert!(divorced.findings().is_empty());
}

#[test]
fn family_body_lines() {
    let parsed = lenient(
        "fam A B + C D
wit m: E F
src Parish records
comm Married in secret
cbp Paris
csrc Census
beg
- h G
- f SMITH Jane
end
",
    );
    let g = &parsed.value;
    let family = g.family("FAM_001").unwrap();
    assert_eq!(family.witnesses.len(), 1);
    assert_eq!(family.witnesses[0].person, "E_F_0");
    assert_eq!(g.person("E_F_0").unwrap().gender, Gender::Male);
    assert_eq!(family.source.as_deref(), Some("Parish records"));
    assert_eq!(family.comments, vec!["Married in secret".to_string()]);
    assert_eq!(family.common_birth_place.as_deref(), Some("Paris"));
    assert_eq!(family.common_children_source.as_deref(), Some("Census"));

    assert_eq!(family.children()[0].person, "A_G_0");
    assert_eq!(family.children()[0].surname_override, None);
    assert_eq!(family.children()[1].person, "SMITH_Jane_0");
    assert_eq!(family.children()[1].surname_override.as_deref(), Some("SMITH"));
    assert!(parsed.findings.is_empty(), "{:?}", parsed.findings);
}

#[test]
fn child_inline_information() {
    let parsed = lenient("fam CORNO Joseph + THOMAS Marie\nbeg\n- h Jean 1910 #bp Arras\nend\n");
    let jean = parsed.value.person("CORNO_Jean_0").unwrap();
    assert_eq!(jean.birth_date.as_ref().and_then(|d| d.year()), Some(1910));
    assert_eq!(jean.birth_place.as_deref(), Some("Arras"));
}

#[test]
fn same_names_resolve_to_the_same_person() {
    let parsed = lenient("fam CORNO Joseph + THOMAS Marie\n\nfam CORNO Joseph + DUBOIS Claire\n");
    let g = &parsed.value;
    assert_eq!(g.person_count(), 3);
    let joseph = g.person("CORNO_Joseph_0").unwrap();
    assert_eq!(joseph.families_as_spouse(), ["FAM_001".to_string(), "FAM_002".to_string()]);
    let spouses: Vec<_> = g.spouses_of("CORNO_Joseph_0").iter().map(|p| p.id()).collect();
    assert_eq!(spouses, vec!["THOMAS_Marie_0", "DUBOIS_Claire_0"]);
}

#[test]
fn occurrence_suffix_keeps_homonyms_apart() {
    let parsed = lenient("fam DUPONT Jean + MARTIN Anne\n\nfam DUPONT Jean.1 + LEROY Rose\n");
    let g = &parsed.value;
    assert!(g.contains_person("DUPONT_Jean_0"));
    assert!(g.contains_person("DUPONT_Jean_1"));
    assert_eq!(g.family("FAM_002").unwrap().husband(), Some("DUPONT_Jean_1"));
    assert_eq!(g.find_person("DUPONT", "Jean", 1).map(|p| p.occurrence()), Some(1));
}

#[test]
fn unreadable_header_keeps_a_partial_family() {
    let parsed = lenient("fam CORNO\n");
    let family = parsed.value.family("FAM_001").expect("partial family is kept");
    assert!(!family.is_valid(), "the header failure is attached as an error");
    assert_eq!(parsed.findings.iter().filter(|f| f.line == Some(1)).count(), 1);
}

#[test]
fn navigation_helpers() {
    let parsed = lenient(CORNO);
    let g = &parsed.value;
    let parents: Vec<_> = g.parents_of("CORNO_Jean_0").iter().map(|p| p.id()).collect();
    assert_eq!(parents, vec!["CORNO_Joseph_0", "THOMAS_Marie_0"]);
    let children: Vec<_> = g.children_of("THOMAS_Marie_0").iter().map(|p| p.id()).collect();
    assert_eq!(children, vec!["CORNO_Jean_0", "CORNO_Anne_0"]);
    let siblings: Vec<_> = g.siblings_of("CORNO_Anne_0").iter().map(|p| p.id()).collect();
    assert_eq!(siblings, vec!["CORNO_Jean_0"]);
    assert_eq!(g.families_of("CORNO_Jean_0").len(), 1);

    let stats = g.statistics();
    assert_eq!(stats.persons, 4);
    assert_eq!(stats.families_with_children, 1);
    assert_eq!(stats.children, 2);
}

#[test]
fn marriage_after_divorce_is_an_error() {
    let parsed = lenient("fam A B +1930 #div 1920 C D
");
    let family = parsed.value.family("FAM_001").unwrap();
    assert_eq!(family.marriage_date.as_ref().and_then(|d| d.year()), Some(1930));
    assert_eq!(family.divorce_date.as_ref().and_then(|d| d.year()), Some(1920));
    assert!(!family.is_valid());
    assert_eq!(family.findings().len(), 1, "{:?}", family.findings());
    assert_eq!(family.findings()[0].severity, Severity::Error);
    assert_eq!(family.findings()[0].field.as_deref(), Some("marriage_date"));

    let parsed = GwParser::strict()
        .parse("fam A B +1930 #div 1920 C D
")
        .expect("rule findings never abort");
    assert_eq!(parsed.errors().count(), 1);
}

#[test]
fn dropped_child_lines_are_attached_to_the_family() {
    let source = "fam A B + C D
beg
- h E
* f F
- h G #bogus
end
";
    let parsed = lenient(source);
    let family = parsed.value.family("FAM_001").unwrap();
    assert_eq!(family.children().len(), 2, "the line with an odd token still names a child");
    let lines: Vec<_> = family.findings().iter().map(|f| f.line).collect();
    assert_eq!(lines, vec![Some(4), Some(5)]);
    for finding in family.findings() {
        assert_eq!(finding.entity, EntityKind::Family);
        assert_eq!(finding.entity_id.as_deref(), Some("FAM_001"));
        assert_eq!(finding.origin, FindingOrigin::Structural);
    }
    assert!(family.is_valid(), "dropped lines are warnings");
    assert_eq!(parsed.findings.len(), 2);

    assert!(matches!(
        GwParser::strict().parse(source).unwrap_err(),
        GwError::Structural { line: Some(4), .. }
    ));
}

#[test]
fn header_notices_and_body_lines_are_attached_to_the_family() {
    let parsed = lenient("fam A B #zz + C D
bogus line
beg
- h E
end
");
    let family = parsed.value.family("FAM_001").unwrap();
    let lines: Vec<_> = family.findings().iter().map(|f| f.line).collect();
    assert_eq!(lines, vec![Some(1), Some(2)]);
    assert!(family.findings().iter().all(|f| f.entity_id.as_deref() == Some("FAM_001")));
}
