//! # Stack Profiler
//!
//! Merges periodic call-stack samples into a weighted call tree.
//!
//! The target writes each sample as pointer-sized words:
//!
//! ```text
//! [sentinel, leaf, caller, ..., root]
//! ```
//!
//! The sentinel carries `0xFEED` in bits 16-31 and the byte length of the
//! whole sample, sentinel included, in bits 0-15. A payload may hold several
//! samples back to back. Payloads are walked from the end so that each sample
//! is seen root first, which is the order the tree is descended in.
//!
//! Nodes live in an arena and refer to each other by index. Each node's
//! children stay sorted by descending hit count, ties broken by descending
//! address, so the hottest path is always the first child.

use scroll::{Pread, LE};
use smallvec::SmallVec;

use crate::error::{KestrelError, KestrelResult};

/// Marker in bits 16-31 of a sentinel word.
pub const SENTINEL_MARKER: u64 = 0xFEED_0000;

/// Build a sentinel for a sample of `length` bytes, sentinel included.
#[must_use]
pub fn sentinel(length: u16) -> u64
{
    SENTINEL_MARKER | u64::from(length)
}

/// True if `word` is a sample sentinel.
#[must_use]
pub fn is_sentinel(word: u64) -> bool
{
    word & !0xFFFF == SENTINEL_MARKER
}

/// One call stack, root first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackSample
{
    pub frames: SmallVec<[u64; 16]>,
}

fn read_word(data: &[u8], offset: usize, pointer_size: usize) -> KestrelResult<u64>
{
    Ok(match pointer_size {
        4 => u64::from(data.pread_with::<u32>(offset, LE)?),
        _ => data.pread_with::<u64>(offset, LE)?,
    })
}

/// Split a payload into samples, validating every sentinel.
///
/// Words are 4 or 8 bytes wide, as given by `pointer_size`.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] when the payload size is not a multiple of
/// the pointer size, when a sentinel's length disagrees with the frames seen,
/// or when trailing frames are not closed by a sentinel.
pub fn parse_payload(data: &[u8], pointer_size: usize) -> KestrelResult<Vec<StackSample>>
{
    if !matches!(pointer_size, 4 | 8) || data.len() % pointer_size != 0 {
        return Err(KestrelError::invalid(format!("Bad profiler data size {}.", data.len())));
    }

    let mut samples = Vec::new();
    let mut current = StackSample::default();
    for offset in (0..data.len()).step_by(pointer_size).rev() {
        let word = read_word(data, offset, pointer_size)?;

        if is_sentinel(word) {
            let words = usize::from((word & 0xFFFF) as u16) / pointer_size;
            if words == 0 || current.frames.len() != words - 1 {
                return Err(KestrelError::invalid("Profiler collected incomplete call stack."));
            }
            samples.push(std::mem::take(&mut current));
            continue;
        }

        current.frames.push(word);
    }

    if !current.frames.is_empty() {
        return Err(KestrelError::invalid("Profiler collected incomplete call stack."));
    }

    Ok(samples)
}

/// A call-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNode
{
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub address: u64,
    /// Symbolized address, computed once when the node is created.
    pub symbol: Option<String>,
    pub count: u64,
}

/// Weighted call tree. Index 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTree
{
    nodes: Vec<CallNode>,
}

impl Default for CallTree
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl CallTree
{
    pub const ROOT: usize = 0;

    #[must_use]
    pub fn new() -> Self
    {
        Self {
            nodes: vec![CallNode {
                parent: None,
                children: Vec::new(),
                address: 0,
                symbol: None,
                count: 0,
            }],
        }
    }

    #[must_use]
    pub fn node(&self, index: usize) -> Option<&CallNode>
    {
        self.nodes.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.nodes.len()
    }

    /// Number of samples merged so far.
    #[must_use]
    pub fn total(&self) -> u64
    {
        self.nodes[Self::ROOT].count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.total() == 0
    }

    /// Drop every node except a zeroed root.
    pub fn clear(&mut self)
    {
        *self = Self::new();
    }

    /// Find the first child of `parent` whose symbol text matches.
    #[must_use]
    pub fn child_named(&self, parent: usize, symbol: &str) -> Option<usize>
    {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[*child].symbol.as_deref() == Some(symbol))
    }

    fn ranks_before(&self, left: usize, right: usize) -> bool
    {
        let (left, right) = (&self.nodes[left], &self.nodes[right]);
        left.count > right.count || (left.count == right.count && left.address > right.address)
    }

    fn reposition(&mut self, parent: usize, child: usize)
    {
        let mut siblings = std::mem::take(&mut self.nodes[parent].children);
        siblings.retain(|sibling| *sibling != child);
        let position = siblings
            .iter()
            .position(|sibling| self.ranks_before(child, *sibling))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.nodes[parent].children = siblings;
    }

    /// Merge one sample, creating nodes for addresses not yet seen under
    /// their caller.
    pub fn merge(&mut self, sample: &StackSample, symbolize: &dyn Fn(u64) -> String)
    {
        let mut parent = Self::ROOT;
        for address in &sample.frames {
            let existing = self.nodes[parent]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[*child].address == *address);

            let node = existing.unwrap_or_else(|| {
                self.nodes.push(CallNode {
                    parent: Some(parent),
                    children: Vec::new(),
                    address: *address,
                    symbol: Some(symbolize(*address)),
                    count: 0,
                });
                self.nodes.len() - 1
            });

            self.nodes[node].count += 1;
            self.reposition(parent, node);
            parent = node;
        }
        self.nodes[Self::ROOT].count += 1;
    }

    fn percent(&self, index: usize) -> u64
    {
        self.nodes[index].count * 100 / self.total()
    }

    /// Render the tree depth first, hiding nodes below `threshold` percent.
    ///
    /// Each line is `{indent} +name: P%, N`, with `-` in place of `+` for
    /// leaves. The indent grows by two columns per level and carries a `|`
    /// while the parent's next sibling is still to be printed.
    #[must_use]
    pub fn render(&self, threshold: u32) -> String
    {
        let mut out = String::new();
        if self.total() == 0 {
            return out;
        }
        let mut indent = String::new();
        self.render_node(Self::ROOT, u64::from(threshold), &mut indent, &mut out);
        out
    }

    fn render_node(&self, index: usize, threshold: u64, indent: &mut String, out: &mut String)
    {
        let node = &self.nodes[index];
        let marker = if node.children.is_empty() { " -" } else { " +" };
        let name = node.symbol.as_deref().unwrap_or("Root");
        out.push_str(&format!("{indent}{marker}{name}: {}%, {}\n", self.percent(index), node.count));

        let visible: Vec<usize> = node
            .children
            .iter()
            .copied()
            .take_while(|child| self.percent(*child) >= threshold)
            .collect();
        if visible.is_empty() {
            return;
        }

        let sibling_follows = node.parent.is_some_and(|parent| {
            let siblings = &self.nodes[parent].children;
            siblings
                .iter()
                .position(|sibling| *sibling == index)
                .and_then(|position| siblings.get(position + 1))
                .is_some_and(|next| self.percent(*next) >= threshold)
        });

        indent.push(' ');
        indent.push(if sibling_follows { '|' } else { ' ' });
        for child in visible {
            self.render_node(child, threshold, indent, out);
        }
        indent.truncate(indent.len() - 2);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn payload(words: &[u64]) -> Vec<u8>
    {
        words.iter().flat_map(|word| (*word as u32).to_le_bytes()).collect()
    }

    fn name(address: u64) -> String
    {
        format!("f{address:x}")
    }

    #[test]
    fn test_parse_multiple_samples_root_first()
    {
        let data = payload(&[sentinel(12), 0xb, 0xa, sentinel(8), 0xc]);
        let samples = parse_payload(&data, 4).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].frames.as_slice(), &[0xc]);
        assert_eq!(samples[1].frames.as_slice(), &[0xa, 0xb]);
    }

    #[test]
    fn test_parse_rejects_length_mismatch()
    {
        let data = payload(&[sentinel(16), 0xb, 0xa]);
        assert!(parse_payload(&data, 4).is_err());
    }

    #[test]
    fn test_parse_rejects_unterminated_frames()
    {
        let data = payload(&[0xb, sentinel(8), 0xa]);
        assert!(parse_payload(&data, 4).is_err());
    }

    #[test]
    fn test_parse_rejects_ragged_size()
    {
        assert_eq!(
            parse_payload(&[0; 6], 4).unwrap_err().to_string(),
            "Bad profiler data size 6."
        );
    }

    #[test]
    fn test_parse_wide_pointers()
    {
        let data: Vec<u8> = [sentinel(24), 0xffff_f800_0000_0010, 0xffff_f800_0000_0020]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        let samples = parse_payload(&data, 8).unwrap();
        assert_eq!(samples[0].frames.as_slice(), &[0xffff_f800_0000_0020, 0xffff_f800_0000_0010]);
    }

    #[test]
    fn test_children_sorted_by_count_then_address()
    {
        let mut tree = CallTree::new();
        for frames in [[0x10, 0x1], [0x10, 0x2], [0x10, 0x2], [0x10, 0x3]] {
            let sample = StackSample {
                frames: frames.iter().copied().collect(),
            };
            tree.merge(&sample, &name);
        }

        let a = tree.node(CallTree::ROOT).unwrap().children[0];
        let order: Vec<u64> = tree
            .node(a)
            .unwrap()
            .children
            .iter()
            .map(|child| tree.node(*child).unwrap().address)
            .collect();
        assert_eq!(order, vec![0x2, 0x3, 0x1]);
        assert_eq!(tree.total(), 4);
    }

    #[test]
    fn test_render_threshold_and_bars()
    {
        let mut tree = CallTree::new();
        let samples: [&[u64]; 4] = [&[0xa, 0xb], &[0xa, 0xb], &[0xa, 0xc], &[0xd]];
        for frames in samples {
            tree.merge(
                &StackSample {
                    frames: frames.iter().copied().collect(),
                },
                &name,
            );
        }

        assert_eq!(
            tree.render(0),
            " +Root: 100%, 4\n   +fa: 75%, 3\n   | -fb: 50%, 2\n   | -fc: 25%, 1\n   -fd: 25%, 1\n"
        );
        assert_eq!(tree.render(50), " +Root: 100%, 4\n   +fa: 75%, 3\n     -fb: 50%, 2\n");
    }
}
