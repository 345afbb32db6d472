//! Integration tests for overlap graph construction.
//!
//! These tests verify that:
//! 1. OVL text files and binary overlap stores load into the same graph
//! 2. Every dovetail has its mirror and every containment its granger mate
//! 3. Adjacency lists never exceed their thresholds
//! 4. Removed fragments stay out of the graph

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use fragment_graph::ovl_store::{encode_error_rate, write_records};
    use fragment_graph::{
        label_fragment, load_sequence_file, read_messages, write_message, Disposition,
        EdgeClass, EdgeKind, EdgeLabel, FragEnd, GraphConfig, InMemoryFragmentStore,
        Orientation, OverlapGraphStore, OverlapMessage, OverlapStoreFile, OverlapType,
        RawOverlap, RepairMode, StoreRecord, Thresholds, VertexId,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn fragments(count: u32, length: usize) -> InMemoryFragmentStore {
        let mut store = InMemoryFragmentStore::new();
        for iid in 1..=count {
            store.insert(iid, "ACGT".repeat(length / 4));
        }
        store
    }

    fn wide_config() -> GraphConfig {
        GraphConfig {
            thresholds: Thresholds {
                dovetail: 10_000,
                containment: 10_000,
            },
            ..Default::default()
        }
    }

    fn message(a: u32, b: u32, ori: Orientation, olt: OverlapType, ahg: i32, bhg: i32) -> OverlapMessage {
        OverlapMessage {
            a_iid: a,
            b_iid: b,
            orientation: ori,
            overlap_type: olt,
            a_hang: ahg,
            b_hang: bhg,
            quality: 0.02,
            min_offset: ahg,
            max_offset: ahg,
            polymorphism_count: 0,
            delta: vec![3, -7, 12],
        }
    }

    fn random_overlaps(rng: &mut StdRng, fragments: u32, count: usize) -> Vec<RawOverlap> {
        let orientations = [
            Orientation::Normal,
            Orientation::Anti,
            Orientation::Innie,
            Orientation::Outtie,
        ];
        let mut overlaps = Vec::with_capacity(count);
        while overlaps.len() < count {
            let a = rng.gen_range(1..=fragments);
            let b = rng.gen_range(1..=fragments);
            if a == b {
                continue;
            }
            let ori = orientations[rng.gen_range(0..4)];
            overlaps.push(RawOverlap::new(
                a,
                b,
                rng.gen_range(-400..400),
                rng.gen_range(-400..400),
                ori,
            ));
        }
        overlaps
    }

    fn all_edges(graph: &OverlapGraphStore) -> Vec<fragment_graph::EdgeId> {
        let mut ids = Vec::new();
        for (vid, _) in graph.fragments().iter() {
            for end in FragEnd::BOTH {
                ids.extend(graph.edges_at(vid, end));
            }
        }
        ids
    }

    #[test]
    fn ovl_file_ingest() {
        let mut fasta = tempfile::Builder::new().suffix(".fasta").tempfile().unwrap();
        for iid in 1..=4 {
            writeln!(fasta, ">{iid}\n{}", "ACGT".repeat(150)).unwrap();
        }
        fasta.flush().unwrap();
        let store = load_sequence_file(fasta.path()).unwrap();

        let mut text = Vec::new();
        for msg in [
            message(1, 2, Orientation::Normal, OverlapType::Dovetail, 200, 250),
            message(2, 3, Orientation::Innie, OverlapType::Dovetail, 100, 150),
            message(1, 4, Orientation::Normal, OverlapType::Containment, 50, -80),
            message(3, 4, Orientation::Normal, OverlapType::Other('X'), 10, 10),
        ] {
            write_message(&mut text, &msg).unwrap();
        }
        let messages = read_messages(Cursor::new(text), "mem").unwrap();
        assert_eq!(messages.len(), 4);

        let mut graph = OverlapGraphStore::from_store(&store, GraphConfig::default()).unwrap();
        let stats = graph.ingest_messages(messages).unwrap();
        assert_eq!(stats.dovetail, 2);
        assert_eq!(stats.containment, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(graph.num_edges(), 6);
        assert_eq!(graph.check_symmetry(), 0);

        let v1 = graph.vertex_of(1).unwrap();
        let v4 = graph.vertex_of(4).unwrap();
        let contained: Vec<_> = graph
            .adjacency(v1, FragEnd::Suffix, EdgeClass::Containment)
            .map(|id| graph.edge(id).clone())
            .collect();
        assert_eq!(contained.len(), 1);
        assert_eq!(contained[0].dst.vertex, v4);
        assert!(!contained[0].grangered);
        assert_eq!(graph.degree(v4, FragEnd::Suffix, EdgeClass::Containment), 1);
        assert_eq!(graph.fragment(v4).raw_from_contained_count(), 1);
        assert_eq!(graph.fragment(v1).raw_to_contained_count(), 1);
    }

    #[test]
    fn overlap_store_ingest_matches_text_ingest() {
        let records = vec![
            StoreRecord {
                a_iid: 1,
                b_iid: 2,
                a_hang: 200,
                b_hang: 250,
                corr_erate: encode_error_rate(0.01),
                orig_erate: encode_error_rate(0.02),
                flipped: false,
            },
            // the other direction of the same overlap, from the contained side
            StoreRecord {
                a_iid: 4,
                b_iid: 1,
                a_hang: -50,
                b_hang: 80,
                corr_erate: encode_error_rate(0.01),
                orig_erate: encode_error_rate(0.01),
                flipped: false,
            },
            StoreRecord {
                a_iid: 1,
                b_iid: 4,
                a_hang: 50,
                b_hang: -80,
                corr_erate: encode_error_rate(0.01),
                orig_erate: encode_error_rate(0.01),
                flipped: false,
            },
            // too noisy
            StoreRecord {
                a_iid: 2,
                b_iid: 3,
                a_hang: 100,
                b_hang: 150,
                corr_erate: encode_error_rate(0.09),
                orig_erate: encode_error_rate(0.01),
                flipped: true,
            },
        ];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write_records(&mut file, &records).unwrap();
        file.flush().unwrap();
        let mapped = OverlapStoreFile::open(file.path()).unwrap();
        assert_eq!(mapped.len(), 4);

        let store = fragments(4, 600);
        let mut graph = OverlapGraphStore::from_store(&store, GraphConfig::default()).unwrap();
        let stats = graph.ingest_store_records(mapped.iter()).unwrap();
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.dovetail, 1);
        assert_eq!(stats.containment, 1);
        assert_eq!(graph.num_edges(), 4);
        assert_eq!(graph.check_symmetry(), 0);
    }

    #[test]
    fn every_edge_has_its_companion() {
        let mut rng = StdRng::seed_from_u64(42);
        let store = fragments(40, 1000);
        let mut graph = OverlapGraphStore::from_store(&store, wide_config()).unwrap();
        graph.ingest(random_overlaps(&mut rng, 40, 400)).unwrap();

        assert_eq!(graph.check_symmetry(), 0);
        for id in all_edges(&graph) {
            let edge = graph.edge(id);
            if let EdgeKind::Containment(_) = edge.kind {
                let mate = edge.granger();
                let src = (mate.src.vertex, mate.src.end);
                let dst = (mate.dst.vertex, mate.dst.end);
                assert!(
                    graph
                        .adjacency(src.0, src.1, EdgeClass::Containment)
                        .any(|other| graph.edge(other).joins(src, dst)),
                    "no granger mate for {edge:?}"
                );
            }
        }
    }

    #[test]
    fn degree_stays_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let store = fragments(20, 1000);
        let config = GraphConfig {
            thresholds: Thresholds {
                dovetail: 3,
                containment: 2,
            },
            ..Default::default()
        };
        let mut graph = OverlapGraphStore::from_store(&store, config).unwrap();
        graph.ingest(random_overlaps(&mut rng, 20, 500)).unwrap();

        let mut attempted = 0;
        for (vid, fragment) in graph.fragments().iter() {
            for end in FragEnd::BOTH {
                assert!(graph.degree(vid, end, EdgeClass::Dovetail) <= 3);
                assert!(graph.degree(vid, end, EdgeClass::Containment) <= 2);
                assert_eq!(
                    graph.adjacency(vid, end, EdgeClass::Dovetail).count() as u32,
                    graph.degree(vid, end, EdgeClass::Dovetail)
                );
                attempted += fragment.raw_dovetail_count(end);
            }
        }
        assert!(attempted > 6 * 20);
    }

    #[test]
    fn removed_fragment_stays_out() {
        let mut rng = StdRng::seed_from_u64(42);
        let store = fragments(15, 1000);
        let mut graph = OverlapGraphStore::from_store(&store, wide_config()).unwrap();
        graph.ingest(random_overlaps(&mut rng, 15, 150)).unwrap();

        let k = graph.vertex_of(7).unwrap();
        label_fragment(&mut graph, 7, RepairMode::RemoveAll).unwrap();
        let touching = |graph: &OverlapGraphStore, k: VertexId| -> Vec<EdgeLabel> {
            all_edges(graph)
                .into_iter()
                .map(|id| graph.edge(id))
                .filter(|e| e.src.vertex == k || e.dst.vertex == k)
                .map(|e| e.label)
                .collect()
        };
        let before = touching(&graph, k);
        assert!(!before.is_empty());
        assert!(before.iter().all(|&l| l == EdgeLabel::RemovedByBreaker));

        for raw in random_overlaps(&mut rng, 15, 150) {
            let outcome = graph
                .add_overlap(&raw, graph.config().thresholds, false)
                .unwrap();
            if raw.a_iid == 7 || raw.b_iid == 7 {
                assert_eq!(outcome.disposition, Disposition::Excluded);
            }
        }
        assert_eq!(touching(&graph, k), before);
    }
}
