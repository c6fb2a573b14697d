use catalogue_flattener::{flatten, flatten_all, CatalogueError, TERM_CODE, TERM_EXTENDED_NAME};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TWO_HIERARCHIES: &str = r#"Export generated by catalogue service
<?xml version="1.0" encoding="UTF-8"?>
<catalogue>
  <catalogueDesc>
    <code>H1</code>
    <name>H1</name>
    <label>Test catalogue</label>
  </catalogueDesc>
  <catalogueVersion>
    <version>3.0</version>
  </catalogueVersion>
  <catalogueGroups>
    <catalogueGroup>FOOD</catalogueGroup>
  </catalogueGroups>
  <hierarchies>
    <hierarchy>
      <hierarchyDesc><code>H1</code><label>Master</label></hierarchyDesc>
      <hierarchyVersion><version>1</version></hierarchyVersion>
    </hierarchy>
    <hierarchy>
      <hierarchyDesc><code>H2</code><label>Reporting</label><order>2</order></hierarchyDesc>
    </hierarchy>
  </hierarchies>
  <attributes>
    <attribute>
      <attributeDesc><code>allFacets</code><label>Facets</label><type>string</type></attributeDesc>
    </attribute>
  </attributes>
  <terms>
    <term>
      <termDesc>
        <termCode>T1</termCode>
        <termExtendedName>First term</termExtendedName>
      </termDesc>
      <termVersion><status>APPROVED</status></termVersion>
      <hierarchyAssignments>
        <hierarchyAssignment>
          <hierarchyCode>H1</hierarchyCode>
          <parentCode>root</parentCode>
          <order>1</order>
        </hierarchyAssignment>
        <hierarchyAssignment>
          <hierarchyCode>H2</hierarchyCode>
          <parentCode>P2</parentCode>
          <order>4</order>
          <reportable>true</reportable>
        </hierarchyAssignment>
      </hierarchyAssignments>
      <implicitAttributes>
        <implicitAttribute>
          <attributeCode>allFacets</attributeCode>
          <attributeValue>F01.A0B</attributeValue>
        </implicitAttribute>
      </implicitAttributes>
    </term>
    <term>
      <termDesc>
        <termCode>T2</termCode>
        <termExtendedName>Second term</termExtendedName>
      </termDesc>
      <hierarchyAssignments>
        <hierarchyAssignment>
          <hierarchyCode>H2</hierarchyCode>
          <parentCode>T1</parentCode>
          <order>9</order>
          <reportable>false</reportable>
        </hierarchyAssignment>
      </hierarchyAssignments>
    </term>
  </terms>
</catalogue>
"#;

fn xml_without_preamble(xml: &str) -> String {
    catalogue_flattener::strip_preamble(xml)
}

#[test]
fn two_hierarchy_scenario() {
    let tables = flatten_all(&xml_without_preamble(TWO_HIERARCHIES)).unwrap();

    assert_eq!(tables.metadata.num_rows(), 1);
    assert_eq!(tables.catalogue_name(), Some("H1"));
    assert_eq!(tables.metadata.value(0, "catalogueGroup"), Some("FOOD"));

    assert_eq!(tables.hierarchies.num_rows(), 2);
    assert_eq!(tables.hierarchies.columns(), ["code", "label", "version", "order"]);
    assert_eq!(tables.hierarchies.value(1, "code"), Some("H2"));
    assert_eq!(tables.hierarchies.value(1, "version"), None);

    assert_eq!(tables.attributes.num_rows(), 1);
    assert_eq!(tables.attributes.value(0, "type"), Some("string"));

    let terms = &tables.terms;
    assert_eq!(terms.num_rows(), 2);
    assert_eq!(
        terms.columns(),
        [
            "termCode",
            "termExtendedName",
            "status",
            "allFacets",
            "masterFlag",
            "masterParentCode",
            "masterOrder",
            "masterReportable",
            "masterHierarchyCode",
            "H2ParentCode",
            "H2Order",
            "H2Reportable",
            "H2HierarchyCode",
        ]
    );

    // First term sits in both hierarchies; no reportable flag for H1.
    assert_eq!(terms.value(0, "masterParentCode"), Some("root"));
    assert_eq!(terms.value(0, "masterOrder"), Some("1"));
    assert_eq!(terms.value(0, "masterReportable"), None);
    assert_eq!(terms.value(0, "masterHierarchyCode"), Some("H1"));
    assert_eq!(terms.value(0, "H2ParentCode"), Some("P2"));
    assert_eq!(terms.value(0, "H2Order"), Some("4"));
    assert_eq!(terms.value(0, "H2Reportable"), Some("true"));
    assert_eq!(terms.value(0, "H2HierarchyCode"), Some("H2"));
    assert_eq!(terms.value(0, "allFacets"), Some("F01.A0B"));

    // Second term only in H2.
    assert_eq!(terms.value(1, "masterFlag"), None);
    assert_eq!(terms.value(1, "masterParentCode"), None);
    assert_eq!(terms.value(1, "masterOrder"), None);
    assert_eq!(terms.value(1, "masterReportable"), None);
    assert_eq!(terms.value(1, "H2ParentCode"), Some("T1"));
    assert_eq!(terms.value(1, "H2Order"), Some("9"));
    assert_eq!(terms.value(1, "H2Reportable"), Some("false"));
    assert_eq!(terms.value(1, "H2HierarchyCode"), Some("H2"));
    assert_eq!(terms.value(1, "status"), None);
    assert_eq!(terms.value(1, "allFacets"), None);

    assert!(terms.column_index("H1ParentCode").is_none());
}

#[test]
fn projection_of_scenario() {
    let table = flatten(&xml_without_preamble(TWO_HIERARCHIES)).unwrap();
    assert_eq!(table.columns(), [TERM_CODE, TERM_EXTENDED_NAME]);
    assert_eq!(table.column(TERM_CODE).unwrap(), [Some("T1"), Some("T2")]);
    assert_eq!(
        table.column(TERM_EXTENDED_NAME).unwrap(),
        [Some("First term"), Some("Second term")]
    );
}

#[test]
fn preamble_breaks_parsing_when_left_in() {
    assert!(matches!(flatten(TWO_HIERARCHIES), Err(CatalogueError::Parse(_))));
}

#[test]
fn empty_terms_still_produce_rows() {
    let xml = r#"<catalogue><catalogueDesc><name>C</name></catalogueDesc><terms>
        <term><termDesc><termCode>   </termCode></termDesc></term>
        <term/>
        <term><termDesc><termCode>X</termCode></termDesc></term>
    </terms></catalogue>"#;
    let table = flatten(xml).unwrap();
    assert_eq!(table.num_rows(), 3);
    assert_eq!(table.rows()[0], vec![None, None]);
    assert_eq!(table.rows()[1], vec![None, None]);
    assert_eq!(table.value(2, TERM_CODE), Some("X"));
}

#[test]
fn malformed_xml_is_a_parse_error() {
    assert!(matches!(
        flatten("<catalogue><terms></catalogue>"),
        Err(CatalogueError::Parse(_))
    ));
}

/// What the generator put into one term, for checking the flattened output.
struct GeneratedTerm {
    code: Option<String>,
    name: Option<String>,
    master_parent: Option<String>,
    secondary: Vec<(String, String, Option<String>)>,
}

const MASTER: &str = "CAT";
const SECONDARY: [&str; 3] = ["REP", "EXPO", "PEST"];
const ATTRIBUTES: [&str; 4] = ["allFacets", "scientificName", "commonName", "state"];

/// Builds a catalogue with randomly sparse terms, in the spirit of a large
/// synthetic export with missing fields.
fn random_catalogue(seed: u64, num_terms: usize) -> (String, Vec<GeneratedTerm>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut generated = Vec::with_capacity(num_terms);
    let mut xml = format!(
        "<catalogue>\n<catalogueDesc><code>{0}</code><name>{0}</name></catalogueDesc>\n<terms>\n",
        MASTER
    );

    for i in 0..num_terms {
        let code = rng.random_bool(0.9).then(|| format!("A{:04}", i));
        let name = rng.random_bool(0.8).then(|| format!("Term number {}", i));

        xml.push_str("<term>\n<termDesc>");
        if let Some(code) = &code {
            xml.push_str(&format!("<termCode>{}</termCode>", code));
        }
        if let Some(name) = &name {
            xml.push_str(&format!("<termExtendedName>{}</termExtendedName>", name));
        }
        if rng.random_bool(0.3) {
            xml.push_str("<termShortName>short</termShortName>");
        }
        xml.push_str("</termDesc>\n");

        if rng.random_bool(0.5) {
            xml.push_str("<termVersion><status>APPROVED</status></termVersion>\n");
        }

        let mut master_parent = None;
        let mut secondary = Vec::new();
        xml.push_str("<hierarchyAssignments>\n");
        if rng.random_bool(0.7) {
            let parent = format!("M{}", rng.random_range(0..50));
            xml.push_str(&format!(
                "<hierarchyAssignment><hierarchyCode>{}</hierarchyCode><parentCode>{}</parentCode><order>{}</order></hierarchyAssignment>\n",
                MASTER, parent, i
            ));
            master_parent = Some(parent);
        }
        for hierarchy in SECONDARY {
            if rng.random_bool(0.4) {
                let parent = format!("{}-{}", hierarchy, rng.random_range(0..10));
                let reportable = rng.random_bool(0.5).then(|| "true".to_string());
                xml.push_str(&format!(
                    "<hierarchyAssignment><hierarchyCode>{}</hierarchyCode><parentCode>{}</parentCode><order>{}</order>{}</hierarchyAssignment>\n",
                    hierarchy,
                    parent,
                    i,
                    reportable
                        .as_ref()
                        .map(|r| format!("<reportable>{}</reportable>", r))
                        .unwrap_or_default()
                ));
                secondary.push((hierarchy.to_string(), parent, reportable));
            }
        }
        xml.push_str("</hierarchyAssignments>\n");

        let attr_count = rng.random_range(0..=ATTRIBUTES.len());
        if attr_count > 0 {
            xml.push_str("<implicitAttributes>");
            for attr in &ATTRIBUTES[..attr_count] {
                xml.push_str(&format!(
                    "<implicitAttribute><attributeCode>{}</attributeCode><attributeValue>v{}</attributeValue></implicitAttribute>",
                    attr, i
                ));
            }
            xml.push_str("</implicitAttributes>\n");
        }

        xml.push_str("</term>\n");
        generated.push(GeneratedTerm {
            code,
            name,
            master_parent,
            secondary,
        });
    }

    xml.push_str("</terms>\n</catalogue>\n");
    (xml, generated)
}

#[test]
fn random_catalogues_keep_one_row_per_term() {
    for seed in 0..20 {
        let num_terms = (seed as usize) * 7;
        let (xml, generated) = random_catalogue(seed, num_terms);
        let table = flatten(&xml).unwrap();

        assert_eq!(table.num_rows(), num_terms, "seed {}", seed);
        assert_eq!(table.columns(), [TERM_CODE, TERM_EXTENDED_NAME]);
        for (i, term) in generated.iter().enumerate() {
            assert_eq!(table.value(i, TERM_CODE), term.code.as_deref(), "seed {} row {}", seed, i);
            assert_eq!(table.value(i, TERM_EXTENDED_NAME), term.name.as_deref(), "seed {} row {}", seed, i);
        }
    }
}

#[test]
fn random_catalogues_flatten_deterministically() {
    let (xml, _) = random_catalogue(42, 200);
    let first = flatten_all(&xml).unwrap();
    let second = flatten_all(&xml).unwrap();
    assert_eq!(first, second);
}

#[test]
fn random_catalogues_separate_master_and_secondary_fields() {
    let (xml, generated) = random_catalogue(7, 150);
    let terms = flatten_all(&xml).unwrap().terms;

    for suffix in ["ParentCode", "Order", "Reportable", "HierarchyCode"] {
        assert!(terms.column_index(&format!("{}{}", MASTER, suffix)).is_none());
    }

    let master_pos = terms.column_index("masterFlag").unwrap();
    for hierarchy in SECONDARY {
        if let Some(pos) = terms.column_index(&format!("{}ParentCode", hierarchy)) {
            assert!(pos > master_pos);
        }
    }

    for (i, term) in generated.iter().enumerate() {
        assert_eq!(terms.value(i, "masterParentCode"), term.master_parent.as_deref());
        assert_eq!(
            terms.value(i, "masterHierarchyCode"),
            term.master_parent.as_ref().map(|_| MASTER)
        );

        for hierarchy in SECONDARY {
            let assigned = term.secondary.iter().find(|(h, _, _)| h == hierarchy);
            let parent_col = format!("{}ParentCode", hierarchy);
            let reportable_col = format!("{}Reportable", hierarchy);
            match assigned {
                Some((_, parent, reportable)) => {
                    assert_eq!(terms.value(i, &parent_col), Some(parent.as_str()));
                    assert_eq!(terms.value(i, &reportable_col), reportable.as_deref());
                }
                None => {
                    assert_eq!(terms.value(i, &parent_col), None);
                    assert_eq!(terms.value(i, &reportable_col), None);
                }
            }
        }
    }
}
