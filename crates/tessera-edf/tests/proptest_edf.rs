//! Property tests for the definition pipeline.
//!
//! Random dependency graphs must order every node after its dependencies or
//! report a cycle, and arbitrary text must never make the parser or linker
//! panic.

use proptest::prelude::*;
use tessera_edf::prelude::*;

fn edge_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0..16u8, 0..16u8), 0..40)
}

fn has_cycle(edges: &[(u8, u8)]) -> bool {
    // Depth-first search over the a -> b "depends on" edges.
    fn visit(node: u8, edges: &[(u8, u8)], state: &mut [u8; 16]) -> bool {
        match state[node as usize] {
            1 => return true,
            2 => return false,
            _ => {}
        }
        state[node as usize] = 1;
        for &(a, b) in edges {
            if a == node && visit(b, edges, state) {
                return true;
            }
        }
        state[node as usize] = 2;
        false
    }
    let mut state = [0u8; 16];
    (0..16u8).any(|n| visit(n, edges, &mut state))
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[!*$]?[A-Za-z]{1,6}(\\([A-Za-z]{1,6}\\))?(:[A-Za-z]{1,6})?".prop_map(|h| format!("[{h}]")),
        Just("[$require]".to_owned()),
        Just("[*]".to_owned()),
        "@[A-Za-z]{1,8}",
        "[a-z]{1,6} = [0-9a-z\"\\[\\]{},]{0,10}",
        "\\$[a-z]{1,6} = [A-Za-z]{1,6}\\.[a-z]{1,6}",
        Just("\"[".to_owned()),
        Just("]\"".to_owned()),
        Just("\"".to_owned()),
        ".{0,20}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn chain_orders_dependencies_first(edges in edge_strategy()) {
        let mut chain = DependencyChain::new();
        for &(a, b) in &edges {
            chain.connect_ab(a, b);
        }
        match chain.resolve_chain_to_list() {
            Some(order) => {
                prop_assert!(!has_cycle(&edges));
                prop_assert_eq!(order.len(), chain.len());
                let pos = |n: u8| order.iter().position(|&x| x == n).unwrap();
                for &(a, b) in &edges {
                    if a != b {
                        prop_assert!(pos(b) < pos(a), "{} must precede {}", b, a);
                    }
                }
            }
            None => prop_assert!(has_cycle(&edges)),
        }
    }

    #[test]
    fn partial_resolution_covers_every_node(edges in edge_strategy()) {
        let mut chain = DependencyChain::new();
        for &(a, b) in &edges {
            chain.connect_ab(a, b);
        }
        let resolution = chain.resolve();
        prop_assert_eq!(resolution.ordered.len() + resolution.unresolved.len(), chain.len());
    }

    #[test]
    fn parser_and_linker_never_panic(lines in prop::collection::vec(line_strategy(), 0..30)) {
        let text = lines.join("\n");
        let mut sink = CollectingSink::new();
        let parsed = EdfParser::new(&mut sink).parse("fuzz.edf", &text).unwrap();
        let linked = link(&parsed.entries, &mut sink);
        for name in &linked.link_order {
            prop_assert!(linked.get(name).is_some());
        }
    }
}
