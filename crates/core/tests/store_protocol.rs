mod common;

use common::{at, instant, n3, CountingTransport, MemoryTransport};
use starvers::{Prefixes, StarversError, TripleStoreEngine};

const ASK_ALICE: &str =
    "ASK { <http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> }";

const INTERVALS: &str = "PREFIX vers: <https://github.com/GreenfishK/DataCitation/versioning/>\n\
     SELECT ?from ?until WHERE {\n\
       << <http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> >> vers:valid_from ?from .\n\
       << <http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> >> vers:valid_until ?until .\n\
     }";

fn alice() -> Vec<String> {
    vec![n3("alice", "worksAt", "<http://ex.org/acme>")]
}

fn engine() -> TripleStoreEngine<MemoryTransport> {
    TripleStoreEngine::with_transport(MemoryTransport::new())
}

fn holds(engine: &TripleStoreEngine<MemoryTransport>, query: &str, when: &str) -> bool {
    engine
        .query(query, Some(at(when)), true)
        .unwrap()
        .as_boolean()
        .unwrap()
}

#[test]
fn connection_test_passes_on_rdf_star_store() {
    engine().test_connection().unwrap();
}

#[test]
fn fact_is_visible_exactly_within_its_interval() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+01:00")), 1000)
        .unwrap();
    engine
        .outdate(&alice(), None, Some(at("2022-06-01T00:00:00+01:00")), 1000)
        .unwrap();

    assert!(!holds(&engine, ASK_ALICE, "2021-12-31T23:59:59+01:00"));
    assert!(holds(&engine, ASK_ALICE, "2022-01-01T00:00:00+01:00"));
    assert!(holds(&engine, ASK_ALICE, "2022-03-15T12:00:00+01:00"));
    assert!(!holds(&engine, ASK_ALICE, "2022-06-01T00:00:00+01:00"));
    assert!(!holds(&engine, ASK_ALICE, "2023-01-01T00:00:00+01:00"));
}

#[test]
fn insert_then_outdate_leaves_one_closed_version() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+01:00")), 1000)
        .unwrap();
    engine
        .outdate(&alice(), None, Some(at("2022-06-01T00:00:00+01:00")), 1000)
        .unwrap();

    let table = engine.query(INTERVALS, None, false).unwrap();
    assert_eq!(table.len(), 1, "expected one version, got {table:?}");
    let row = &table.rows[0];
    assert_eq!(
        instant(row[0].as_deref().unwrap()),
        at("2022-01-01T00:00:00+01:00")
    );
    assert_eq!(
        instant(row[1].as_deref().unwrap()),
        at("2022-06-01T00:00:00+01:00")
    );
}

#[test]
fn inserting_an_open_fact_again_adds_no_version() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .insert(&alice(), None, Some(at("2022-02-01T00:00:00+00:00")), 1000)
        .unwrap();
    let table = engine.query(INTERVALS, None, false).unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn outdating_a_closed_fact_is_a_no_op() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .outdate(&alice(), None, Some(at("2022-02-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .outdate(&alice(), None, Some(at("2022-03-01T00:00:00+00:00")), 1000)
        .unwrap();

    let table = engine.query(INTERVALS, None, false).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(
        instant(table.rows[0][1].as_deref().unwrap()),
        at("2022-02-01T00:00:00+00:00")
    );
}

#[test]
fn outdating_an_unknown_fact_is_a_no_op() {
    let engine = engine();
    engine
        .outdate(&alice(), None, Some(at("2022-02-01T00:00:00+00:00")), 1000)
        .unwrap();
    assert!(engine.query(INTERVALS, None, false).unwrap().is_empty());
}

#[test]
fn chunk_size_changes_round_trips_not_contents() {
    let triples: Vec<String> = (0..2500)
        .map(|i| n3(&format!("s{i}"), "value", &format!("\"{i}\"")))
        .collect();
    let when = Some(at("2022-05-05T05:05:05.500+02:00"));
    let listing = "PREFIX vers: <https://github.com/GreenfishK/DataCitation/versioning/>\n\
                   SELECT ?s ?o ?from WHERE { << ?s <http://ex.org/value> ?o >> vers:valid_from ?from } \
                   ORDER BY ?s";

    let small = TripleStoreEngine::with_transport(CountingTransport::new(MemoryTransport::new()));
    small.insert(&triples, None, when, 1000).unwrap();
    let large = TripleStoreEngine::with_transport(CountingTransport::new(MemoryTransport::new()));
    large.insert(&triples, None, when, 10_000).unwrap();

    assert_eq!(small.transport().writes.get(), 3);
    assert_eq!(large.transport().writes.get(), 1);

    let a = small.query(listing, None, false).unwrap();
    let b = large.query(listing, None, false).unwrap();
    assert_eq!(a.len(), 2500);
    assert_eq!(a, b);
}

#[test]
fn reserved_prefix_performs_no_io() {
    let engine = TripleStoreEngine::with_transport(CountingTransport::new(MemoryTransport::new()));
    let prefixes = Prefixes::new().with("vers", "http://example.com/not-versioning/");

    let err = engine
        .insert(&alice(), Some(&prefixes), None, 1000)
        .unwrap_err();
    assert!(matches!(err, StarversError::ReservedPrefix(_)));
    let err = engine
        .outdate(&alice(), Some(&prefixes), None, 1000)
        .unwrap_err();
    assert!(matches!(err, StarversError::ReservedPrefix(_)));
    let err = engine
        .query(
            "PREFIX vers: <http://example.com/not-versioning/>\nSELECT * WHERE { ?s ?p ?o }",
            None,
            true,
        )
        .unwrap_err();
    assert!(matches!(err, StarversError::ReservedPrefix(_)));

    assert_eq!(engine.transport().reads.get(), 0);
    assert_eq!(engine.transport().writes.get(), 0);
}

#[test]
fn unsupported_path_performs_no_io() {
    let engine = TripleStoreEngine::with_transport(CountingTransport::new(MemoryTransport::new()));
    let err = engine
        .query(
            "SELECT ?b WHERE { <http://ex.org/alice> <http://ex.org/knows>* ?b }",
            None,
            true,
        )
        .unwrap_err();
    match err {
        StarversError::ExpressionNotCovered(msg) => assert!(msg.contains("zero-or-more")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.transport().reads.get(), 0);
}

#[test]
fn update_replaces_a_component_at_one_instant() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    let old = vec![vec![
        "<http://ex.org/alice>".to_string(),
        "<http://ex.org/worksAt>".to_string(),
        "<http://ex.org/acme>".to_string(),
    ]];
    let new = vec![vec![None, None, Some("<http://ex.org/globex>".to_string())]];
    engine
        .update(&old, &new, None, Some(at("2022-07-01T00:00:00+00:00")), 1000)
        .unwrap();

    let employer = "SELECT ?org WHERE { <http://ex.org/alice> <http://ex.org/worksAt> ?org }";
    let before = engine
        .query(employer, Some(at("2022-03-01T00:00:00+00:00")), true)
        .unwrap();
    assert_eq!(before.column("org"), Some(vec![Some("http://ex.org/acme")]));
    let after = engine
        .query(employer, Some(at("2022-08-01T00:00:00+00:00")), true)
        .unwrap();
    assert_eq!(after.column("org"), Some(vec![Some("http://ex.org/globex")]));
}

#[test]
fn version_all_triples_wraps_plain_data() {
    let transport = MemoryTransport::new();
    transport.load(
        "INSERT DATA { <http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> . \
                       <http://ex.org/bob> <http://ex.org/worksAt> <http://ex.org/acme> . }",
    );
    let engine = TripleStoreEngine::with_transport(transport);
    engine
        .version_all_triples(Some(at("2020-01-01T00:00:00+00:00")))
        .unwrap();

    let who = "SELECT ?who WHERE { ?who <http://ex.org/worksAt> <http://ex.org/acme> } ORDER BY ?who";
    let now = engine
        .query(who, Some(at("2021-01-01T00:00:00+00:00")), true)
        .unwrap();
    assert_eq!(
        now.column("who"),
        Some(vec![Some("http://ex.org/alice"), Some("http://ex.org/bob")])
    );
    let earlier = engine
        .query(who, Some(at("2019-01-01T00:00:00+00:00")), true)
        .unwrap();
    assert!(earlier.is_empty());

    // Running it again must not add a second version.
    engine
        .version_all_triples(Some(at("2021-01-01T00:00:00+00:00")))
        .unwrap();
    assert_eq!(engine.query(INTERVALS, None, false).unwrap().len(), 1);
}

#[test]
fn snapshot_contains_only_valid_facts() {
    let engine = engine();
    let bob = vec![n3("bob", "worksAt", "<http://ex.org/acme>")];
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .insert(&bob, None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .outdate(&bob, None, Some(at("2022-02-01T00:00:00+00:00")), 1000)
        .unwrap();

    let snapshot = engine
        .retrieve_snapshot(Some(at("2022-03-01T00:00:00+00:00")))
        .unwrap();
    assert!(snapshot.contains("<http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> ."));
    assert!(!snapshot.contains("http://ex.org/bob"));

    let earlier = engine
        .retrieve_snapshot(Some(at("2022-01-15T00:00:00+00:00")))
        .unwrap();
    assert!(earlier.contains("http://ex.org/bob"));
}

#[test]
fn delete_triples_removes_history() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine.delete_triples(&alice(), None).unwrap();
    assert!(engine.query(INTERVALS, None, false).unwrap().is_empty());
}

#[test]
fn reset_all_versions_drops_every_annotation() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine.reset_all_versions().unwrap();
    assert!(engine.query(INTERVALS, None, false).unwrap().is_empty());
    assert!(!holds(&engine, ASK_ALICE, "2022-02-01T00:00:00+00:00"));
}

#[test]
fn user_prefixes_are_usable_in_write_input() {
    let engine = engine();
    let prefixes = Prefixes::new().with("ex", "http://ex.org/");
    let triples = vec!["ex:carol ex:worksAt ex:acme .".to_string()];
    engine
        .insert(&triples, Some(&prefixes), Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    assert!(holds(
        &engine,
        "PREFIX ex: <http://ex.org/>\nASK { ex:carol ex:worksAt ex:acme }",
        "2022-06-01T00:00:00+00:00"
    ));
}

#[test]
fn blank_node_text_inside_a_literal_is_stored_verbatim() {
    let engine = engine();
    let note = vec!["<http://ex.org/a> <http://ex.org/note> \"see _:b1 here\" .".to_string()];
    engine
        .insert(&note, None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();

    let read = "SELECT ?note WHERE { <http://ex.org/a> <http://ex.org/note> ?note }";
    let table = engine
        .query(read, Some(at("2022-02-01T00:00:00+00:00")), true)
        .unwrap();
    assert_eq!(table.column("note"), Some(vec![Some("see _:b1 here")]));

    engine
        .outdate(&note, None, Some(at("2022-03-01T00:00:00+00:00")), 1000)
        .unwrap();
    let later = engine
        .query(read, Some(at("2022-04-01T00:00:00+00:00")), true)
        .unwrap();
    assert!(later.is_empty());
}

#[test]
fn malformed_line_writes_nothing() {
    let engine = TripleStoreEngine::with_transport(CountingTransport::new(MemoryTransport::new()));
    let batch = vec![
        n3("a", "p", "<http://ex.org/b>"),
        n3("c", "p", "<http://ex.org/d>"),
        "<http://ex.org/e> <http://ex.org/p> .".to_string(),
    ];
    let err = engine.insert(&batch, None, None, 1).unwrap_err();
    assert!(matches!(err, StarversError::WrongInputFormat(_)));
    let err = engine.outdate(&batch, None, None, 1).unwrap_err();
    assert!(matches!(err, StarversError::WrongInputFormat(_)));
    assert_eq!(engine.transport().writes.get(), 0);
}

#[test]
fn update_into_an_open_fact_keeps_a_single_open_version() {
    let engine = engine();
    let acme = n3("alice", "worksAt", "<http://ex.org/acme>");
    let globex = n3("alice", "worksAt", "<http://ex.org/globex>");
    engine
        .insert(&[acme, globex], None, Some(at("2022-01-01T00:00:00+00:00")), 1000)
        .unwrap();

    let old = vec![vec![
        "<http://ex.org/alice>".to_string(),
        "<http://ex.org/worksAt>".to_string(),
        "<http://ex.org/acme>".to_string(),
    ]];
    let new = vec![vec![None, None, Some("<http://ex.org/globex>".to_string())]];
    engine
        .update(&old, &new, None, Some(at("2022-06-01T00:00:00+00:00")), 1000)
        .unwrap();

    let globex_versions = "PREFIX vers: <https://github.com/GreenfishK/DataCitation/versioning/>\n\
         SELECT ?from WHERE {\n\
           << <http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/globex> >> vers:valid_from ?from .\n\
         }";
    let table = engine.query(globex_versions, None, false).unwrap();
    assert_eq!(table.len(), 1, "expected one version, got {table:?}");
    assert_eq!(
        instant(table.rows[0][0].as_deref().unwrap()),
        at("2022-01-01T00:00:00+00:00")
    );

    // The replaced fact is still closed.
    assert!(!holds(&engine, ASK_ALICE, "2022-07-01T00:00:00+00:00"));
}

#[test]
fn reinserted_fact_is_absent_in_the_gap() {
    let engine = engine();
    engine
        .insert(&alice(), None, Some(at("2020-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .outdate(&alice(), None, Some(at("2021-01-01T00:00:00+00:00")), 1000)
        .unwrap();
    engine
        .insert(&alice(), None, Some(at("2023-01-01T00:00:00+00:00")), 1000)
        .unwrap();

    assert!(holds(&engine, ASK_ALICE, "2020-06-01T00:00:00+00:00"));
    assert!(!holds(&engine, ASK_ALICE, "2022-01-01T00:00:00+00:00"));
    assert!(holds(&engine, ASK_ALICE, "2024-01-01T00:00:00+00:00"));

    let gap = engine
        .retrieve_snapshot(Some(at("2022-01-01T00:00:00+00:00")))
        .unwrap();
    assert!(!gap.contains("http://ex.org/alice"));
    let later = engine
        .retrieve_snapshot(Some(at("2024-01-01T00:00:00+00:00")))
        .unwrap();
    assert!(later.contains("http://ex.org/alice"));
}
