// tests/grammar_codec.rs
use uav_oracle::{ComponentType, DesignError, NODE_ID_ALPHABET, UNPARSED_CAPACITY, decode, encode};

const BASELINE: &str = "*aMM0+++++*bNM2+++*cMN1+++*dLM2+++*eML1+++^ab^ac^ad^ae,5,3";

#[test]
fn test_baseline_decodes() {
    let design = decode(BASELINE).unwrap();

    assert_eq!(design.nodes.len(), 5, "Should have 5 nodes");
    assert_eq!(design.edges.len(), 4, "Should have 4 edges");
    assert_eq!(design.payload_capacity, 5.0);
    assert_eq!(design.controller_index, 3);

    let a = design.node(0).unwrap();
    assert_eq!((a.grid_x, a.grid_z), (0, 0));
    assert_eq!(a.component, ComponentType::Structure);
    assert_eq!(a.size, 5);

    let b = design.node(1).unwrap();
    assert_eq!((b.grid_x, b.grid_z), (1, 0));
    assert_eq!(b.component, ComponentType::MotorCcw);

    let e = design.node(4).unwrap();
    assert_eq!((e.grid_x, e.grid_z), (0, -1));
    assert_eq!(e.component, ComponentType::MotorCw);

    // Edges are all from the root; decode cannot know about cycles yet.
    for (edge, to) in design.edges.iter().zip(1..) {
        assert_eq!(edge.from, 0);
        assert_eq!(edge.to, to);
        assert!(edge.introduces_new_node);
    }
}

#[test]
fn test_round_trip() {
    let samples = [
        BASELINE,
        "*aMM0*bNM3--*cAY4^ab^bc^ca,0,0",
        "*aMM0-*<YA1++,12.5,7",
        "*aMM0,-1,-1",
        "",
    ];
    for sample in samples {
        let design = decode(sample).unwrap();
        let text = encode(&design).unwrap();
        assert_eq!(decode(&text).unwrap(), design, "round trip of `{sample}`");
    }
}

#[test]
fn test_baseline_encodes_verbatim() {
    let design = decode(BASELINE).unwrap();
    assert_eq!(encode(&design).unwrap(), BASELINE);
}

#[test]
fn test_suffix_is_written_after_the_edges() {
    let mut design = decode("*aMM0*bNM1^ab,0,0").unwrap();
    design.payload_capacity = 12.5;
    design.controller_index = -1;
    assert_eq!(encode(&design).unwrap(), "*aMM0*bNM1^ab,12.5,-1");

    design.payload_capacity = UNPARSED_CAPACITY;
    assert!(encode(&design).unwrap().ends_with(",-1,-1"));
}

#[test]
fn test_capacity_exceeded() {
    let mut text = String::new();
    for symbol in NODE_ID_ALPHABET.iter().chain(std::iter::once(&'a')) {
        text.push('*');
        text.push(*symbol);
        text.push_str("MM4");
    }
    text.push_str(",0,0");

    assert_eq!(
        decode(&text),
        Err(DesignError::CapacityExceeded { limit: 42 })
    );
}

#[test]
fn test_full_alphabet_fits() {
    let text: String = NODE_ID_ALPHABET
        .iter()
        .map(|symbol| format!("*{symbol}MM4"))
        .collect();
    let design = decode(&text).unwrap();
    assert_eq!(design.nodes.len(), 42);
    assert_eq!(design.nodes[41].index, 41);
}

#[test]
fn test_position_out_of_range() {
    assert_eq!(
        decode("*aZM0,1,1"),
        Err(DesignError::OutOfRange { symbol: 'Z' })
    );
    assert_eq!(
        decode("*aM?0,1,1"),
        Err(DesignError::OutOfRange { symbol: '?' })
    );
}

#[test]
fn test_invalid_grammar() {
    let broken = [
        "x*aMM0,1,1",     // text before the first node
        "*~MM0,1,1",      // unknown id symbol
        "*aMM7,1,1",      // unknown component digit
        "*aMM",           // truncated node
        "*aMM0+-+,1,1",   // mixed size run
        "*aMM0*aNM0,1,1", // repeated id
        "*aMM0^abc,1,1",  // edge too long
        "*aMM0^ab,1,1",   // edge to an undeclared node
    ];
    for text in broken {
        assert!(
            matches!(decode(text), Err(DesignError::InvalidGrammar { .. })),
            "`{text}` should be rejected"
        );
    }
}

#[test]
fn test_unparsable_suffix_is_not_fatal() {
    let design = decode("*aMM0,heavy,1").unwrap();
    assert_eq!(design.payload_capacity, UNPARSED_CAPACITY);
    assert_eq!(design.controller_index, 1);
    assert_eq!(design.payload_mass(), 0.0);

    let design = decode("*aMM0").unwrap();
    assert_eq!(design.payload_capacity, UNPARSED_CAPACITY);
}
