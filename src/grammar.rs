//! Codec between the compact design string and its node/edge graph.
//!
//! A design string looks like `*aMM0+++++*bNM2+++^ab,5,3`:
//!
//! * `*` opens a node token: id symbol, x symbol, z symbol, component digit,
//!   then a run of `+` or `-` whose length and sign give the size.
//! * `^` opens an edge token: source id symbol then destination id symbol.
//! * The first `,` starts the numeric suffix: payload capacity, then the
//!   controller index.

use crate::error::DesignError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Index of a node; doubles as the position of its id symbol in [`NODE_ID_ALPHABET`].
pub type NodeIndex = usize;

/// Symbols that name nodes. The position of a symbol is the node index.
pub const NODE_ID_ALPHABET: [char; 42] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '!', '@', '#', '$', '%', '&', '(', ')', '_', '=', '[', ']',
    '{', '}', '<', '>',
];

/// Largest absolute grid coordinate a position symbol can express.
pub const GRID_HALF_EXTENT: i32 = 12;

/// First position symbol; `POSITION_FIRST + k` encodes coordinate `k - 12`.
const POSITION_FIRST: u8 = b'A';

pub const NODE_MARKER: char = '*';
pub const EDGE_MARKER: char = '^';
pub const FIELD_DELIMITER: char = ',';

/// Payload capacity reported when the suffix cannot be parsed.
pub const UNPARSED_CAPACITY: f32 = -1.0;
/// Controller index reported when the suffix cannot be parsed.
pub const UNPARSED_CONTROLLER: i32 = -1;

/// Kind of component hosted at a node, keyed by its grammar digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Structure,
    MotorCw,
    MotorCcw,
    Foil,
    None,
}

impl ComponentType {
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Self::Structure),
            '1' => Some(Self::MotorCw),
            '2' => Some(Self::MotorCcw),
            '3' => Some(Self::Foil),
            '4' => Some(Self::None),
            _ => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            Self::Structure => '0',
            Self::MotorCw => '1',
            Self::MotorCcw => '2',
            Self::Foil => '3',
            Self::None => '4',
        }
    }
}

/// A joint of the structural graph as declared by the design string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique index, equal to the position of the id symbol in the alphabet.
    pub index: NodeIndex,
    /// Grid column in `[-12, 12]`.
    pub grid_x: i32,
    /// Grid row in `[-12, 12]`.
    pub grid_z: i32,
    /// Component placed at this joint.
    pub component: ComponentType,
    /// Signed number of resize steps.
    pub size: i32,
    /// Identity is final and must not be renumbered.
    pub locked: bool,
}

/// A connector between two nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeIndex,
    pub to: NodeIndex,
    /// `false` when the destination cell was already occupied (a cycle edge).
    ///
    /// Decoding cannot know this yet, so decoded edges start as `true` and the
    /// assembler resolves the flag.
    pub introduces_new_node: bool,
}

impl Edge {
    pub fn new(from: NodeIndex, to: NodeIndex) -> Self {
        Self {
            from,
            to,
            introduces_new_node: true,
        }
    }
}

/// A decoded design: the graph plus its numeric suffix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Payload capacity, or [`UNPARSED_CAPACITY`].
    pub payload_capacity: f32,
    /// Controller index, or [`UNPARSED_CONTROLLER`].
    pub controller_index: i32,
}

impl Design {
    /// Looks up a declared node by index.
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.iter().find(|n| n.index == index)
    }

    /// Mass carried as payload: the whole part of the capacity, never negative.
    pub fn payload_mass(&self) -> f32 {
        self.payload_capacity.trunc().max(0.0)
    }
}

impl FromStr for Design {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Returns the node index named by `symbol`.
pub fn node_index(symbol: char) -> Option<NodeIndex> {
    NODE_ID_ALPHABET.iter().position(|&c| c == symbol)
}

/// Returns the symbol that names `index`.
pub fn node_symbol(index: NodeIndex) -> Option<char> {
    NODE_ID_ALPHABET.get(index).copied()
}

/// Decodes a position symbol into a grid coordinate.
pub fn position_value(symbol: char) -> Result<i32, DesignError> {
    if !symbol.is_ascii_uppercase() {
        return Err(DesignError::OutOfRange { symbol });
    }
    let value = i32::from(symbol as u8 - POSITION_FIRST) - GRID_HALF_EXTENT;
    if value > GRID_HALF_EXTENT {
        return Err(DesignError::OutOfRange { symbol });
    }
    Ok(value)
}

/// Encodes a grid coordinate as a position symbol.
pub fn position_symbol(value: i32) -> Option<char> {
    if !(-GRID_HALF_EXTENT..=GRID_HALF_EXTENT).contains(&value) {
        return None;
    }
    Some(char::from(POSITION_FIRST + (value + GRID_HALF_EXTENT) as u8))
}

/// Parses a design string.
///
/// Malformed node or edge tokens abort with an error. A malformed numeric
/// suffix does not: the affected field falls back to its sentinel.
pub fn decode(s: &str) -> Result<Design, DesignError> {
    let (body, suffix) = match s.split_once(FIELD_DELIMITER) {
        Some((body, suffix)) => (body, Some(suffix)),
        None => (s, None),
    };
    let (node_section, edge_section) = match body.split_once(EDGE_MARKER) {
        Some((nodes, edges)) => (nodes, Some(edges)),
        None => (body, None),
    };

    let mut node_tokens = node_section.split(NODE_MARKER);
    if let Some(prefix) = node_tokens.next()
        && !prefix.is_empty()
    {
        return Err(invalid(prefix, "text before the first node marker"));
    }
    let node_tokens: Vec<&str> = node_tokens.collect();
    if node_tokens.len() > NODE_ID_ALPHABET.len() {
        return Err(DesignError::CapacityExceeded {
            limit: NODE_ID_ALPHABET.len(),
        });
    }

    let mut nodes = Vec::with_capacity(node_tokens.len());
    for token in node_tokens {
        let node = decode_node(token)?;
        if nodes.iter().any(|n: &Node| n.index == node.index) {
            return Err(invalid(token, "node id declared twice"));
        }
        nodes.push(node);
    }

    let mut edges = Vec::new();
    if let Some(section) = edge_section {
        for token in section.split(EDGE_MARKER) {
            let edge = decode_edge(token)?;
            for end in [edge.from, edge.to] {
                if !nodes.iter().any(|n| n.index == end) {
                    return Err(invalid(token, "edge names an undeclared node"));
                }
            }
            edges.push(edge);
        }
    }

    let (payload_capacity, controller_index) = decode_suffix(suffix);

    Ok(Design {
        nodes,
        edges,
        payload_capacity,
        controller_index,
    })
}

/// Serializes a design back into its string form.
///
/// For any design produced by [`decode`], `decode(&encode(&d)?)? == d`.
pub fn encode(design: &Design) -> Result<String, DesignError> {
    let mut out = String::new();

    for node in &design.nodes {
        let id = symbol_for(node.index)?;
        let x = position_symbol(node.grid_x).ok_or(DesignError::InvalidGrammar {
            token: node.grid_x.to_string(),
            reason: "grid column outside [-12, 12]",
        })?;
        let z = position_symbol(node.grid_z).ok_or(DesignError::InvalidGrammar {
            token: node.grid_z.to_string(),
            reason: "grid row outside [-12, 12]",
        })?;
        out.push(NODE_MARKER);
        out.push(id);
        out.push(x);
        out.push(z);
        out.push(node.component.digit());
        let step = if node.size > 0 { '+' } else { '-' };
        out.extend(std::iter::repeat_n(step, node.size.unsigned_abs() as usize));
    }

    for edge in &design.edges {
        out.push(EDGE_MARKER);
        out.push(symbol_for(edge.from)?);
        out.push(symbol_for(edge.to)?);
    }

    out.push_str(&format!(
        "{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
        design.payload_capacity, design.controller_index
    ));
    Ok(out)
}

fn symbol_for(index: NodeIndex) -> Result<char, DesignError> {
    node_symbol(index).ok_or(DesignError::CapacityExceeded {
        limit: NODE_ID_ALPHABET.len(),
    })
}

fn invalid(token: &str, reason: &'static str) -> DesignError {
    DesignError::InvalidGrammar {
        token: token.to_owned(),
        reason,
    }
}

fn decode_node(token: &str) -> Result<Node, DesignError> {
    let mut chars = token.chars();
    let (Some(id), Some(x), Some(z), Some(digit)) =
        (chars.next(), chars.next(), chars.next(), chars.next())
    else {
        return Err(invalid(token, "node token shorter than four symbols"));
    };

    let index = node_index(id).ok_or_else(|| invalid(token, "unknown node id symbol"))?;
    let grid_x = position_value(x)?;
    let grid_z = position_value(z)?;
    let component =
        ComponentType::from_digit(digit).ok_or_else(|| invalid(token, "unknown component digit"))?;

    let run = chars.as_str();
    let size = if run.is_empty() {
        0
    } else if run.chars().all(|c| c == '+') {
        run.len() as i32
    } else if run.chars().all(|c| c == '-') {
        -(run.len() as i32)
    } else {
        return Err(invalid(token, "size run mixes symbols"));
    };

    Ok(Node {
        index,
        grid_x,
        grid_z,
        component,
        size,
        locked: false,
    })
}

fn decode_edge(token: &str) -> Result<Edge, DesignError> {
    let mut chars = token.chars();
    let (Some(from), Some(to), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(invalid(token, "edge token must be exactly two symbols"));
    };
    let from = node_index(from).ok_or_else(|| invalid(token, "unknown node id symbol"))?;
    let to = node_index(to).ok_or_else(|| invalid(token, "unknown node id symbol"))?;
    Ok(Edge::new(from, to))
}

fn decode_suffix(suffix: Option<&str>) -> (f32, i32) {
    let mut fields = suffix.unwrap_or_default().split(FIELD_DELIMITER);
    let capacity = parse_capacity(fields.next()).unwrap_or_else(|e| {
        warn!(error = %e, "falling back to sentinel payload capacity");
        UNPARSED_CAPACITY
    });
    let controller = parse_controller(fields.next()).unwrap_or_else(|e| {
        warn!(error = %e, "falling back to sentinel controller index");
        UNPARSED_CONTROLLER
    });
    (capacity, controller)
}

/// Parses the payload capacity field.
pub fn parse_capacity(field: Option<&str>) -> Result<f32, DesignError> {
    field
        .and_then(|f| f.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .ok_or(DesignError::NumericParseFailure { field: "capacity" })
}

/// Parses the controller index field.
pub fn parse_controller(field: Option<&str>) -> Result<i32, DesignError> {
    field
        .and_then(|f| f.trim().parse::<i32>().ok())
        .ok_or(DesignError::NumericParseFailure { field: "controller" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_alphabet_spans_the_grid() {
        assert_eq!(position_value('A'), Ok(-12));
        assert_eq!(position_value('M'), Ok(0));
        assert_eq!(position_value('Y'), Ok(12));
        assert_eq!(position_value('Z'), Err(DesignError::OutOfRange { symbol: 'Z' }));
        assert_eq!(position_value('m'), Err(DesignError::OutOfRange { symbol: 'm' }));
        assert_eq!(position_symbol(-12), Some('A'));
        assert_eq!(position_symbol(13), None);
    }

    #[test]
    fn size_runs() {
        assert_eq!(decode_node("aMM0").map(|n| n.size), Ok(0));
        assert_eq!(decode_node("aMM0+++").map(|n| n.size), Ok(3));
        assert_eq!(decode_node("aMM0--").map(|n| n.size), Ok(-2));
        assert!(matches!(
            decode_node("aMM0+-"),
            Err(DesignError::InvalidGrammar { .. })
        ));
    }

    #[test]
    fn suffix_fallbacks() {
        assert_eq!(decode_suffix(Some("5,3")), (5.0, 3));
        assert_eq!(decode_suffix(Some("x,3")), (UNPARSED_CAPACITY, 3));
        assert_eq!(decode_suffix(None), (UNPARSED_CAPACITY, UNPARSED_CONTROLLER));
    }
}
