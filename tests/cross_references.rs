mod common;

use common::lenient;
use gwgraph::entity::{Child, Family, Gender, Person};
use gwgraph::validation::Severity;
use gwgraph::{Genealogy, GwParser};

const TWO_GENERATIONS: &str = "fam CORNO Joseph + THOMAS Marie
beg
- h Jean
- f Anne
end

fam CORNO Jean + LEROY Rose
beg
- h Pierre
end
";

fn back_references(g: &Genealogy) -> Vec<(String, Vec<String>, Vec<String>)> {
    g.persons()
        .map(|p| (p.id(), p.families_as_spouse().to_vec(), p.families_as_child().to_vec()))
        .collect()
}

#[test]
fn every_membership_is_mirrored_exactly_once() {
    let parsed = lenient(TWO_GENERATIONS);
    let g = &parsed.value;
    for family in g.families() {
        for spouse in family.spouses() {
            let listed = g.person(spouse).unwrap().families_as_spouse();
            assert_eq!(listed.iter().filter(|f| *f == family.id()).count(), 1, "{spouse} in {}", family.id());
        }
        for child in family.children() {
            let listed = g.person(&child.person).unwrap().families_as_child();
            assert_eq!(listed.iter().filter(|f| *f == family.id()).count(), 1);
        }
    }
    let jean = g.person("CORNO_Jean_0").unwrap();
    assert_eq!(jean.families_as_child(), ["FAM_001".to_string()]);
    assert_eq!(jean.families_as_spouse(), ["FAM_002".to_string()]);
    assert!(g.validate_consistency().is_empty());
}

#[test]
fn synchronising_twice_changes_nothing() {
    let mut g = lenient(TWO_GENERATIONS).value;
    let before = back_references(&g);
    g.sync_cross_references();
    g.sync_cross_references();
    assert_eq!(back_references(&g), before);
}

#[test]
fn forward_references_are_resolved() {
    let parsed = lenient(
        "pevt CORNO Jean
#birt 1910
end pevt

fam CORNO Joseph + THOMAS Marie
beg
- h Jean
end
",
    );
    let g = &parsed.value;
    assert_eq!(g.person_count(), 3, "the event block and the child line name the same person");
    let jean = g.person("CORNO_Jean_0").unwrap();
    assert_eq!(jean.families_as_child(), ["FAM_001".to_string()]);
    assert_eq!(jean.birth_date.as_ref().and_then(|d| d.year()), Some(1910));
    assert_eq!(jean.gender, Gender::Male);
}

#[test]
fn consistency_check_reports_dangling_and_one_sided_links() {
    let mut g = Genealogy::new();
    let fid = g.next_family_id();
    g.attach_family(Family::new(fid.clone()).with_husband(Some("GHOST_Person_0".to_string())))
        .unwrap();

    let findings = g.validate_consistency();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Error, "unknown person is an error");

    // inserted after the family, so nothing links it back yet
    g.insert_person(Person::new("GHOST", "Person", 0)).unwrap();
    let findings = g.validate_consistency();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::Warning, "one-sided link is a warning");

    g.sync_cross_references();
    assert!(g.validate_consistency().is_empty());
}

#[test]
fn duplicate_identity_is_refused() {
    let mut g = Genealogy::new();
    g.insert_person(Person::new("A", "B", 0)).unwrap();
    assert!(g.insert_person(Person::new("A", "B", 0)).is_err());
    let distinct = g.create_distinct_person("A", "B");
    assert_eq!(distinct, "A_B_1");
}

#[test]
fn removing_entities_detaches_them() {
    let mut g = lenient(TWO_GENERATIONS).value;

    let removed = g.remove_person("THOMAS_Marie_0").unwrap();
    assert_eq!(removed.given_name(), "Marie");
    let family = g.family("FAM_001").unwrap();
    assert_eq!(family.wife(), None);
    assert_eq!(g.families_of_couple(Some("CORNO_Joseph_0"), None), vec!["FAM_001".to_string()]);
    assert!(g.validate_consistency().is_empty());

    g.remove_family("FAM_002").unwrap();
    assert!(g.person("CORNO_Jean_0").unwrap().families_as_spouse().is_empty());
    assert!(g.person("CORNO_Pierre_0").unwrap().families_as_child().is_empty());
    assert!(g.validate_consistency().is_empty());
    assert!(g.remove_family("FAM_002").is_err());
}

#[test]
fn children_added_later_are_linked() {
    let mut g = lenient("fam CORNO Joseph + THOMAS Marie\n").value;
    let id = g.get_or_create_person("CORNO", "Luc", None);
    g.add_child(
        "FAM_001",
        Child {
            person: id.clone(),
            sex: Gender::Male,
            surname_override: None,
        },
    )
    .unwrap();
    assert_eq!(g.person(&id).unwrap().families_as_child(), ["FAM_001".to_string()]);
    assert_eq!(g.statistics().children, 1);
}

#[test]
fn parsing_into_an_existing_genealogy_extends_it() {
    let parser = GwParser::lenient();
    let first = parser.parse(TWO_GENERATIONS).unwrap().value;
    let extended = parser
        .parse_into("pevt CORNO Pierre\n#birt 1935\nend pevt\n\nfam CORNO Pierre + DUVAL Lea\n", first)
        .unwrap();
    let g = &extended.value;
    assert_eq!(g.family_count(), 3);
    assert_eq!(g.family_ids().last().map(String::as_str), Some("FAM_003"));
    let pierre = g.person("CORNO_Pierre_0").unwrap();
    assert_eq!(pierre.families_as_child(), ["FAM_002".to_string()]);
    assert_eq!(pierre.families_as_spouse(), ["FAM_003".to_string()]);
    assert!(pierre.birth_date.is_some());
}
