//! Parser integration tests over embedded TEI snippets.

use std::collections::BTreeSet;

use cbgm_core::comparison::{compare, RelationMode};
use cbgm_core::variation_unit::Connectivity;
use cbgm_parser::{parse_collation, ParseOptions};

const COLLATION: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<TEI>
  <teiHeader>
    <fileDesc>
      <sourceDesc>
        <listWit>
          <witness xml:id="01"/>
          <witness xml:id="02"/>
          <witness xml:id="03"/>
          <witness xml:id="P46"/>
        </listWit>
      </sourceDesc>
    </fileDesc>
  </teiHeader>
  <text>
    <body>
      <app xml:id="B1K1V1U2">
        <note>
          <label>1 John 1:1/2</label>
          <fs><f name="connectivity"><numeric value="5"/></f></fs>
          <graph>
            <node n="a"/>
            <node n="b"/>
            <node n="b2"/>
            <node n="c"/>
            <node n="d"/>
            <arc from="a" to="b"/>
            <arc from="a" to="c" weight="2"/>
            <arc from="b" to="b2"/>
            <arc from="b" to="d"/>
          </graph>
        </note>
        <rdg n="a" wit="#01 #P46C">alpha</rdg>
        <rdg n="b" wit="#02">beta</rdg>
        <rdg n="b2" type="split" wit="#03">beta</rdg>
        <rdg n="c" type="orthographic" wit=""></rdg>
        <rdg n="d" type="defective" wit="#P46-1">gamma</rdg>
      </app>
      <app xml:id="B1K1V1U4">
        <rdg n="a" wit="#01 #02">one</rdg>
        <rdg n="b" wit="#03">two</rdg>
      </app>
    </body>
  </text>
</TEI>
"##;

fn options() -> ParseOptions {
    ParseOptions {
        merge_splits: true,
        trivial_reading_types: ["orthographic".to_owned()].into_iter().collect(),
        dropped_reading_types: ["defective".to_owned()].into_iter().collect(),
        ignored_suffixes: ["*", "C", "-1", "-2"].iter().map(|&s| s.to_owned()).collect(),
    }
}

#[test]
fn witness_list_and_units_are_ordered() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    assert_eq!(app.list_wit(), ["01", "02", "03", "P46"]);
    assert_eq!(app.passage_count(), 2);
    assert_eq!(app.passage_index("B1K1V1U2").unwrap(), 0);
    assert_eq!(app.units()[0].label(), "1 John 1:1/2");
    assert_eq!(app.units()[1].label(), "B1K1V1U4");
}

#[test]
fn connectivity_defaults_to_absolute() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    assert_eq!(app.units()[0].connectivity(), Connectivity::Limited(5));
    assert_eq!(app.units()[1].connectivity(), Connectivity::Absolute);
}

#[test]
fn sigla_are_stripped_to_base_witnesses() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    let vu = &app.units()[0];
    // #P46C strips to P46; #P46-1 attested the dropped reading d, so P46's
    // attestation there is discarded, leaving the reading-a support.
    assert_eq!(vu.reading_for("P46"), Some("a"));
    assert_eq!(vu.reading_for("01"), Some("a"));
    assert_eq!(vu.reading_for("02"), Some("b"));
    assert_eq!(vu.reading_for("03"), Some("b2"));
}

#[test]
fn dropped_readings_make_witnesses_lacunose() {
    let mut opts = options();
    opts.ignored_suffixes = ["*", "-1"].iter().map(|&s| s.to_owned()).collect();
    let app = parse_collation(COLLATION, &opts).unwrap();
    let vu = &app.units()[0];
    // Without the C suffix rule, P46's only surviving attestation was on
    // the dropped reading d: lacunose.
    assert_eq!(vu.reading_for("P46"), None);
    assert!(!vu.readings().contains(&"d".to_owned()));
}

#[test]
fn merged_splits_are_trivially_equal() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    let stemma = app.units()[0].stemma();
    // b2 is a split attestation of beta: zero-weight edges in both
    // directions link it to b.
    assert!(stemma.trivially_equal("b", "b2").unwrap());
    // 02 (b) and 03 (b2) therefore agree at this passage.
    let comp = compare(&app, "02", "03", RelationMode::Open).unwrap();
    assert!(comp.agreements.contains(0));
}

#[test]
fn trivial_reading_types_zero_their_incoming_edges() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    let stemma = app.units()[0].stemma();
    // c is orthographic: the a -> c arc collapses to weight 0 even though
    // the XML declared weight 2.
    assert!(stemma.trivially_equal("a", "c").unwrap());
    let path = stemma.path("a", "c").unwrap().unwrap();
    assert_eq!(path.weight, 0.0);
}

#[test]
fn graph_weights_reach_comparison_costs() {
    let app = parse_collation(COLLATION, &options()).unwrap();
    // 02 reads b, derived from 01's a through the weight-1 arc.
    let comp = compare(&app, "02", "01", RelationMode::Open).unwrap();
    assert!(comp.posterior.contains(0));
    assert_eq!(comp.cost, 1.0);
}

#[test]
fn missing_witness_list_is_invalid_input() {
    let err = parse_collation("<TEI><teiHeader/></TEI>", &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, cbgm_parser::Error::InvalidInput { .. }));
}

#[test]
fn bad_connectivity_value_is_invalid_input() {
    let doc = COLLATION.replace("value=\"5\"", "value=\"five\"");
    let err = parse_collation(&doc, &options()).unwrap_err();
    assert!(matches!(err, cbgm_parser::Error::InvalidInput { .. }));
}

#[test]
fn reading_filter_sets_are_honored_without_options() {
    // With no normalization options, the split reading stays distinct and
    // the defective reading is kept.
    let app = parse_collation(COLLATION, &ParseOptions::default()).unwrap();
    let vu = &app.units()[0];
    assert!(vu.readings().contains(&"d".to_owned()));
    let stemma = vu.stemma();
    assert!(!stemma.trivially_equal("b", "b2").unwrap());
}
