//! Chimera and spur breaker patterns.
//!
//! A pattern names a small fixed set of unitigs by role. Chimera lines read
//! `s : (a,sa) (b,sb) (c,sc) (d,sd)` and spur lines `(s,ss) (c,sc) (d,sd)`,
//! where each pair is a unitig iid and a suffix flag. Roles are stored in
//! the order s, c, d, a, b.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};

use crate::error::{GraphError, Result};
use crate::unitig::UnitigLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    S,
    C,
    D,
    A,
    B,
}

impl Role {
    pub fn index(self) -> usize {
        match self {
            Role::S => 0,
            Role::C => 1,
            Role::D => 2,
            Role::A => 3,
            Role::B => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerKind {
    Chimera,
    Spur,
}

impl BreakerKind {
    pub fn roles(self) -> &'static [Role] {
        match self {
            BreakerKind::Chimera => &[Role::S, Role::C, Role::D, Role::A, Role::B],
            BreakerKind::Spur => &[Role::S, Role::C, Role::D],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BreakerKind::Chimera => "chimera",
            BreakerKind::Spur => "spur",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleSlot {
    pub iid: u32,
    pub suffix: bool,
    /// Layout copied in by cross-reference.
    pub unitig: Option<UnitigLayout>,
}

impl RoleSlot {
    fn new(iid: u32, suffix: bool) -> Self {
        Self {
            iid,
            suffix,
            unitig: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakerPattern {
    pub kind: BreakerKind,
    slots: Vec<RoleSlot>,
}

impl BreakerPattern {
    pub fn role(&self, role: Role) -> &RoleSlot {
        &self.slots[role.index()]
    }

    pub fn slots(&self) -> &[RoleSlot] {
        &self.slots
    }

    fn ids_distinct(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(i, a)| self.slots[i + 1..].iter().all(|b| b.iid != a.iid))
    }
}

/// One role of one pattern, for the sorted cross-reference index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkItem {
    pub iid: u32,
    pub pattern: usize,
    pub role: Role,
}

fn parse_pairs(text: &str) -> Option<Vec<(u32, bool)>> {
    let mut pairs = Vec::new();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let body = rest.strip_prefix('(')?;
        let close = body.find(')')?;
        let (iid, suffix) = body[..close].split_once(',')?;
        let iid = iid.trim().parse().ok()?;
        let suffix: i32 = suffix.trim().parse().ok()?;
        pairs.push((iid, suffix != 0));
        rest = body[close + 1..].trim_start();
    }
    Some(pairs)
}

fn parse_pattern(line: &str, kind: BreakerKind) -> std::result::Result<BreakerPattern, String> {
    let mut slots = vec![RoleSlot::new(0, false); kind.roles().len()];
    let mut put = |role: Role, (iid, suffix): (u32, bool)| {
        slots[role.index()] = RoleSlot::new(iid, suffix);
    };
    match kind {
        BreakerKind::Chimera => {
            let (head, tail) = line
                .split_once(':')
                .ok_or_else(|| "chimera line has no ':'".to_string())?;
            let pairs = parse_pairs(tail).ok_or_else(|| "malformed (iid,suffix) pair".to_string())?;
            let head = head.trim();
            let fields = match head.parse::<u32>() {
                Ok(s) if pairs.len() == 4 => {
                    put(Role::S, (s, false));
                    &pairs[..]
                }
                Err(_) if pairs.len() == 5 => {
                    put(Role::S, pairs[0]);
                    &pairs[1..]
                }
                _ => {
                    return Err(format!(
                        "chimera line with head {head:?} and {} pairs",
                        pairs.len()
                    ))
                }
            };
            for (role, pair) in [Role::A, Role::B, Role::C, Role::D].into_iter().zip(fields) {
                put(role, *pair);
            }
        }
        BreakerKind::Spur => {
            let pairs = parse_pairs(line).ok_or_else(|| "malformed (iid,suffix) pair".to_string())?;
            if pairs.len() != 3 {
                return Err(format!("spur line with {} pairs", pairs.len()));
            }
            for (role, pair) in [Role::S, Role::C, Role::D].into_iter().zip(pairs) {
                put(role, pair);
            }
        }
    }
    Ok(BreakerPattern { kind, slots })
}

#[derive(Debug, Clone)]
pub struct BreakerCatalog {
    kind: BreakerKind,
    patterns: Vec<BreakerPattern>,
    index: Vec<ChunkItem>,
    dropped: usize,
}

impl BreakerCatalog {
    /// Parse a pattern file. With `validate`, patterns whose role ids are not
    /// pairwise distinct are dropped.
    pub fn parse<R: BufRead>(
        reader: R,
        kind: BreakerKind,
        validate: bool,
        source_name: &str,
    ) -> Result<Self> {
        let mut patterns = Vec::new();
        let mut dropped = 0;
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let pattern = parse_pattern(trimmed, kind)
                .map_err(|reason| GraphError::parse(source_name, i + 1, reason))?;
            if validate && !pattern.ids_distinct() {
                warn!(
                    "{} {}:{} has repeated unitig ids, dropped",
                    kind.name(),
                    source_name,
                    i + 1
                );
                dropped += 1;
                continue;
            }
            patterns.push(pattern);
        }

        let mut index: Vec<ChunkItem> = patterns
            .iter()
            .enumerate()
            .flat_map(|(p, pattern)| {
                kind.roles().iter().map(move |&role| ChunkItem {
                    iid: pattern.role(role).iid,
                    pattern: p,
                    role,
                })
            })
            .collect();
        index.sort_by_key(|item| item.iid);

        info!(
            "Read {} {} patterns from {} ({} dropped)",
            patterns.len(),
            kind.name(),
            source_name,
            dropped
        );
        Ok(Self {
            kind,
            patterns,
            index,
            dropped,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, kind: BreakerKind, validate: bool) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        Self::parse(reader, kind, validate, &path.display().to_string())
    }

    pub fn kind(&self) -> BreakerKind {
        self.kind
    }

    pub fn patterns(&self) -> &[BreakerPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Role index sorted ascending by unitig iid.
    pub fn index(&self) -> &[ChunkItem] {
        &self.index
    }

    /// Patterns rejected by validation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn expected_slots(&self) -> usize {
        self.patterns.len() * self.kind.roles().len()
    }

    fn populated_slots(&self) -> usize {
        self.patterns
            .iter()
            .flat_map(|p| p.slots.iter())
            .filter(|slot| slot.unitig.is_some())
            .count()
    }

    fn slot_mut(&mut self, item: ChunkItem) -> &mut RoleSlot {
        &mut self.patterns[item.pattern].slots[item.role.index()]
    }

    /// Copy unitig layouts into every role slot that names them. The stream
    /// must be ascending by unitig iid.
    pub fn populate_from_unitig_stream<I>(&mut self, unitigs: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<UnitigLayout>>,
    {
        populate_catalogs(&mut [self], unitigs)
    }
}

/// Cross-reference several catalogs against one pass over a unitig stream.
pub fn populate_catalogs<I>(catalogs: &mut [&mut BreakerCatalog], unitigs: I) -> Result<()>
where
    I: IntoIterator<Item = Result<UnitigLayout>>,
{
    let mut cursors = vec![0usize; catalogs.len()];
    let mut previous: Option<u32> = None;

    for unitig in unitigs {
        let unitig = unitig?;
        if let Some(prev) = previous {
            if unitig.iid < prev {
                return Err(GraphError::UnitigStreamNotSorted {
                    previous: prev,
                    current: unitig.iid,
                });
            }
        }
        previous = Some(unitig.iid);

        for (catalog, cursor) in catalogs.iter_mut().zip(cursors.iter_mut()) {
            while *cursor < catalog.index.len() && catalog.index[*cursor].iid < unitig.iid {
                *cursor += 1;
            }
            while *cursor < catalog.index.len() && catalog.index[*cursor].iid == unitig.iid {
                let item = catalog.index[*cursor];
                catalog.slot_mut(item).unitig = Some(unitig.clone());
                *cursor += 1;
            }
        }
    }

    fix_up_collisions(catalogs);

    let expected: usize = catalogs.iter().map(|c| c.expected_slots()).sum();
    let found: usize = catalogs.iter().map(|c| c.populated_slots()).sum();
    if expected != found {
        return Err(GraphError::IncompleteUnitigCrossReference { expected, found });
    }
    Ok(())
}

/// Fill empty slots from any populated slot naming the same unitig, in the
/// same pattern or another one.
fn fix_up_collisions(catalogs: &mut [&mut BreakerCatalog]) {
    let mut donors: std::collections::HashMap<u32, UnitigLayout> = std::collections::HashMap::new();
    for catalog in catalogs.iter() {
        for slot in catalog.patterns.iter().flat_map(|p| p.slots.iter()) {
            if let Some(unitig) = &slot.unitig {
                donors.entry(slot.iid).or_insert_with(|| unitig.clone());
            }
        }
    }
    for catalog in catalogs.iter_mut() {
        for slot in catalog.patterns.iter_mut().flat_map(|p| p.slots.iter_mut()) {
            if slot.unitig.is_none() {
                if let Some(unitig) = donors.get(&slot.iid) {
                    slot.unitig = Some(unitig.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn unitig(iid: u32) -> UnitigLayout {
        UnitigLayout {
            iid,
            consensus: "ACGT".to_string(),
            quality: "llll".to_string(),
            fragments: Vec::new(),
        }
    }

    fn stream(iids: &[u32]) -> Vec<Result<UnitigLayout>> {
        iids.iter().map(|&iid| Ok(unitig(iid))).collect()
    }

    #[test]
    fn labelled_chimera_line() {
        let input = "S : (10,0) (11,0) (12,1) (13,0) (14,1)\n";
        let catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Chimera, true, "c").unwrap();
        let p = &catalog.patterns()[0];
        assert_eq!(p.role(Role::S).iid, 10);
        assert_eq!((p.role(Role::A).iid, p.role(Role::A).suffix), (11, false));
        assert_eq!((p.role(Role::B).iid, p.role(Role::B).suffix), (12, true));
        assert_eq!((p.role(Role::C).iid, p.role(Role::C).suffix), (13, false));
        assert_eq!((p.role(Role::D).iid, p.role(Role::D).suffix), (14, true));
    }

    #[test]
    fn numeric_chimera_head_is_s() {
        let input = "# header\n\n20 : (21,1) (22,0) (23,1) (24,0)\n";
        let catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Chimera, true, "c").unwrap();
        assert_eq!(catalog.len(), 1);
        let p = &catalog.patterns()[0];
        assert_eq!(p.role(Role::S).iid, 20);
        assert!(!p.role(Role::S).suffix);
        assert_eq!(p.role(Role::A).iid, 21);
        assert_eq!(p.role(Role::D).iid, 24);
    }

    #[test]
    fn spur_line_and_index_order() {
        let input = "(30,1) (5,0) (17,1)\n(2,0) (40,1) (9,0)\n";
        let catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap();
        assert_eq!(catalog.len(), 2);
        let iids: Vec<u32> = catalog.index().iter().map(|item| item.iid).collect();
        assert_eq!(iids, vec![2, 5, 9, 17, 30, 40]);
        let first = catalog.index()[0];
        assert_eq!((first.pattern, first.role), (1, Role::S));
    }

    #[test]
    fn malformed_line_is_an_error() {
        let input = "(1,0) (2,0)\n";
        let err = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap_err();
        assert!(matches!(err, GraphError::Parse { line: 1, .. }));
    }

    #[test]
    fn validation_drops_colliding_patterns() {
        let input = "(1,0) (1,1) (2,0)\n(3,0) (4,0) (3,1)\n(5,1) (6,0) (6,1)\n";
        let catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.dropped(), 3);
        assert!(catalog.index().is_empty());

        let kept = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, false, "s").unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn cross_reference_fills_every_role() {
        let input = "(3,1) (8,0) (5,1)\n(5,0) (3,0) (12,1)\n";
        let mut catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap();
        catalog
            .populate_from_unitig_stream(stream(&[1, 3, 5, 7, 8, 12]))
            .unwrap();
        for pattern in catalog.patterns() {
            for slot in pattern.slots() {
                assert_eq!(slot.unitig.as_ref().map(|u| u.iid), Some(slot.iid));
            }
        }
    }

    #[test]
    fn repeated_ids_filled_without_validation() {
        let input = "(4,0) (4,1) (6,0)\n";
        let mut catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, false, "s").unwrap();
        catalog.populate_from_unitig_stream(stream(&[4, 6])).unwrap();
        assert!(catalog.patterns()[0].role(Role::C).unitig.is_some());
    }

    #[test]
    fn unsorted_stream_fails_fast() {
        let input = "(3,1) (8,0) (5,1)\n";
        let mut catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap();
        let err = catalog
            .populate_from_unitig_stream(stream(&[3, 8, 5]))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnitigStreamNotSorted {
                previous: 8,
                current: 5
            }
        ));
    }

    #[test]
    fn missing_unitig_is_incomplete() {
        let input = "(3,1) (8,0) (5,1)\n";
        let mut catalog = BreakerCatalog::parse(Cursor::new(input), BreakerKind::Spur, true, "s").unwrap();
        let err = catalog
            .populate_from_unitig_stream(stream(&[3, 5]))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::IncompleteUnitigCrossReference {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn one_pass_serves_both_catalogs() {
        let mut chims = BreakerCatalog::parse(
            Cursor::new("1 : (2,0) (3,1) (4,0) (5,1)\n"),
            BreakerKind::Chimera,
            true,
            "c",
        )
        .unwrap();
        let mut spurs =
            BreakerCatalog::parse(Cursor::new("(6,1) (2,0) (7,0)\n"), BreakerKind::Spur, true, "s").unwrap();
        populate_catalogs(&mut [&mut chims, &mut spurs], stream(&[1, 2, 3, 4, 5, 6, 7])).unwrap();
        assert!(spurs.patterns()[0].role(Role::C).unitig.is_some());
        assert!(chims.patterns()[0].role(Role::A).unitig.is_some());
    }
}
